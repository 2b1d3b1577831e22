//! Deduplicator - collapse records of the same real-world operation
//!
//! Records are grouped by [`ContentFingerprint`]. In each group the most
//! completely categorized record survives, absorbs what the others know, and
//! the others are deleted.

use std::collections::BTreeMap;
use std::sync::Arc;

use anyhow::{Context, Result};
use serde::Serialize;

use crate::domain::{ContentFingerprint, Identity, Transaction};
use crate::ports::TransactionStore;

/// Changes needed to leave one record per fingerprint
#[derive(Debug, Clone, Default, PartialEq)]
pub struct DedupePlan {
    /// Survivors that absorbed information from their duplicates
    pub updates: Vec<Transaction>,
    pub deletions: Vec<Identity>,
}

impl DedupePlan {
    pub fn is_empty(&self) -> bool {
        self.updates.is_empty() && self.deletions.is_empty()
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct DedupeResult {
    pub updated_count: usize,
    pub deleted_count: usize,
}

/// Completeness score in hundredths
fn score(tx: &Transaction) -> u32 {
    let mut score = 0;
    if tx.category().is_some() {
        score += 400;
    }
    if tx.subcategory().is_some() {
        score += 100;
    }
    if tx.is_refund {
        score += 75;
    }
    if tx.refund_category().is_some() {
        score += 50;
    }
    if tx.refund_subcategory().is_some() {
        score += 25;
    }
    if tx.has_splits() {
        score += 60;
    }
    if tx.movement_id().is_some() {
        score += 10;
    }
    score
}

fn fill(target: &mut Option<String>, source: Option<&str>) -> bool {
    let empty = target.as_deref().map_or(true, str::is_empty);
    match source {
        Some(value) if empty => {
            *target = Some(value.to_string());
            true
        }
        _ => false,
    }
}

/// Copy into `survivor` what it lacks from `other`; returns whether it changed
fn absorb(survivor: &mut Transaction, other: &Transaction) -> bool {
    let mut changed = false;

    if !survivor.has_splits() {
        changed |= fill(&mut survivor.category, other.category());
        changed |= fill(&mut survivor.subcategory, other.subcategory());
    }
    if !survivor.is_refund && other.is_refund {
        survivor.is_refund = true;
        changed = true;
    }
    changed |= fill(&mut survivor.refund_category, other.refund_category());
    changed |= fill(&mut survivor.refund_subcategory, other.refund_subcategory());
    changed |= fill(&mut survivor.movement_id, other.movement_id());

    if !survivor.has_splits() && other.has_splits() {
        survivor.splits = other.splits.clone();
        // a split record never carries a top-level category
        survivor.category = None;
        survivor.subcategory = None;
        changed = true;
    }

    changed
}

/// Compute the dedupe plan for a set of records
///
/// The plan depends only on the set, not on the order it is given in.
pub fn plan_dedupe(transactions: &[Transaction]) -> DedupePlan {
    let mut groups: BTreeMap<ContentFingerprint, Vec<&Transaction>> = BTreeMap::new();
    for tx in transactions {
        groups.entry(tx.fingerprint()).or_default().push(tx);
    }

    let mut plan = DedupePlan::default();
    for (_, mut members) in groups {
        if members.len() < 2 {
            continue;
        }
        members.sort_by(|a, b| a.id.cmp(&b.id));

        // highest score wins; on ties the first (smallest id) is kept
        let survivor_idx = members
            .iter()
            .enumerate()
            .fold(0, |best, (i, tx)| if score(tx) > score(members[best]) { i } else { best });

        let mut survivor = members[survivor_idx].clone();
        let mut changed = false;
        for (i, other) in members.iter().enumerate() {
            if i == survivor_idx {
                continue;
            }
            changed |= absorb(&mut survivor, other);
            plan.deletions.push(other.id.clone());
        }
        if changed {
            plan.updates.push(survivor);
        }
    }
    plan
}

/// Applies the dedupe plan to a store
pub struct Deduplicator {
    store: Arc<dyn TransactionStore>,
}

impl Deduplicator {
    pub fn new(store: Arc<dyn TransactionStore>) -> Self {
        Self { store }
    }

    /// Compute the plan over the whole store without writing
    pub async fn plan(&self) -> Result<DedupePlan> {
        let all = self.store.get_all().await.context("Failed to load transactions")?;
        Ok(plan_dedupe(&all))
    }

    /// Merge and delete duplicates across the whole store
    pub async fn run(&self) -> Result<DedupeResult> {
        let plan = self.plan().await?;
        if plan.is_empty() {
            return Ok(DedupeResult::default());
        }

        self.store
            .upsert_many(&plan.updates)
            .await
            .context("Failed to update surviving transactions")?;
        self.store
            .delete_many(&plan.deletions)
            .await
            .context("Failed to delete duplicate transactions")?;

        let result = DedupeResult {
            updated_count: plan.updates.len(),
            deleted_count: plan.deletions.len(),
        };
        tracing::info!(
            updated = result.updated_count,
            deleted = result.deleted_count,
            "deduplicated transactions"
        );
        Ok(result)
    }
}
