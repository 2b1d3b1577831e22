//! Reset command - delete every stored transaction

use anyhow::Result;
use dialoguer::Confirm;

use super::{get_context, record};
use crate::output;
use bubble_core::LogEvent;

pub async fn run(force: bool) -> Result<()> {
    let ctx = get_context()?;

    if !force
        && !Confirm::new()
            .with_prompt("Delete ALL stored transactions? This cannot be undone")
            .default(false)
            .interact()?
    {
        println!("Cancelled.");
        return Ok(());
    }

    let removed = ctx.reset().await?;
    record(LogEvent::store_reset(removed).with_command("reset"));
    output::success(&format!("Removed {} transactions", removed));
    Ok(())
}
