//! Dedupe command - merge duplicate transactions

use anyhow::Result;

use super::{get_context, record};
use crate::output;
use bubble_core::LogEvent;

pub async fn run(dry_run: bool, json: bool) -> Result<()> {
    let ctx = get_context()?;

    if dry_run {
        let plan = ctx.deduplicator.plan().await?;
        if json {
            println!(
                "{}",
                serde_json::json!({
                    "dry_run": true,
                    "updated_count": plan.updates.len(),
                    "deleted_count": plan.deletions.len(),
                    "deletions": plan.deletions.iter().map(|id| id.as_str()).collect::<Vec<_>>(),
                })
            );
            return Ok(());
        }
        if plan.is_empty() {
            output::success("No duplicates found");
            return Ok(());
        }
        output::warning("DRY RUN - No changes applied");
        println!("  Would update: {}", plan.updates.len());
        println!("  Would delete: {}", plan.deletions.len());
        for id in &plan.deletions {
            println!("    - {}", id);
        }
        return Ok(());
    }

    let result = ctx.deduplicator.run().await?;
    record(LogEvent::duplicates_removed(&result).with_command("dedupe"));
    if json {
        println!("{}", serde_json::to_string_pretty(&result)?);
    } else if result.deleted_count == 0 {
        output::success("No duplicates found");
    } else {
        output::success(&format!(
            "Merged duplicates: {} removed, {} updated",
            result.deleted_count, result.updated_count
        ));
    }
    Ok(())
}
