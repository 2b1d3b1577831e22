//! Aggregation engine: recap and overview figures
//!
//! Every view is computed from the full transaction list on demand. Money is
//! counted once: a split expense contributes its splits and never its own
//! category, and a refund is subtracted from the category it refunds.

use std::collections::{BTreeMap, HashMap};

use rust_decimal::Decimal;
use serde::Serialize;

use crate::domain::{
    normalize_description, CategoryTaxonomy, Classification, ReportLayout, Transaction, TOTAL,
    UNCLASSIFIED,
};

/// One subcategory line of an expense block
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ExpenseRow {
    pub subcategory: String,
    /// Net of refunds, so it may be negative
    pub total: Decimal,
    pub count: usize,
}

/// Net spending for one expense category
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ExpenseBlock {
    pub category: String,
    pub title: String,
    pub rows: Vec<ExpenseRow>,
    pub total: Decimal,
    /// Money booked on the category without a subcategory
    pub to_classify: Decimal,
}

/// Income received for one category (refunds excluded)
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct IncomeRow {
    pub category: String,
    pub total: Decimal,
    pub count: usize,
}

/// Headline totals over raw signs
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct Summary {
    pub incomes: Decimal,
    pub expenses: Decimal,
    pub net: Decimal,
}

/// The full recap view
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Recap {
    pub expense_blocks: Vec<ExpenseBlock>,
    pub income_rows: Vec<IncomeRow>,
    /// Outflows with neither a category nor splits
    pub uncategorized_expenses: Decimal,
    /// Block totals plus uncategorized outflows
    pub total_expenses: Decimal,
    pub total_incomes: Decimal,
    pub net: Decimal,
}

/// Sort key for display names: accent- and case-insensitive, then exact
fn collate(s: &str) -> (String, String) {
    (normalize_description(s), s.to_string())
}

#[derive(Default)]
struct BlockAcc {
    rows: HashMap<String, ExpenseRow>,
    to_classify: Decimal,
}

impl BlockAcc {
    fn add(&mut self, key: &str, amount: Decimal) {
        let row = self.rows.entry(key.to_string()).or_insert_with(|| ExpenseRow {
            subcategory: key.to_string(),
            total: Decimal::ZERO,
            count: 0,
        });
        row.total += amount;
        row.count += 1;
    }
}

/// Row key for money booked on `category` with an optional subcategory
fn row_key<'a>(taxonomy: &CategoryTaxonomy, category: &str, sub: Option<&'a str>) -> &'a str {
    if taxonomy.declares_subcategories(category) {
        sub.filter(|s| !s.is_empty()).unwrap_or(UNCLASSIFIED)
    } else {
        TOTAL
    }
}

/// Display order of expense categories: primary ones, the rest of the taxonomy
/// by label, then categories only seen in the data, alphabetically
fn block_order(
    taxonomy: &CategoryTaxonomy,
    primary: &[String],
    seen: impl Iterator<Item = String>,
) -> Vec<String> {
    let mut order: Vec<String> = primary
        .iter()
        .filter(|c| taxonomy.contains(c))
        .cloned()
        .collect();

    let mut rest: Vec<&str> = taxonomy
        .categories()
        .iter()
        .map(|c| c.name.as_str())
        .filter(|c| !primary.iter().any(|p| p == c))
        .collect();
    rest.sort_by_key(|c| collate(taxonomy.label(c)));
    order.extend(rest.into_iter().map(str::to_string));

    let mut ad_hoc: Vec<String> = seen.filter(|c| !taxonomy.contains(c)).collect();
    ad_hoc.sort_by_key(|c| collate(c));
    ad_hoc.dedup();
    order.extend(ad_hoc);

    order
}

/// Per-category expense blocks with subcategory rows
pub fn expense_blocks(
    txs: &[Transaction],
    taxonomy: &CategoryTaxonomy,
    primary: &[String],
) -> Vec<ExpenseBlock> {
    let mut acc: BTreeMap<String, BlockAcc> = BTreeMap::new();

    for tx in txs {
        match tx.classification() {
            Classification::Split { splits } => {
                for split in &splits {
                    let amount = split.amount.abs();
                    let sub = split.subcategory.as_deref().filter(|s| !s.is_empty());
                    let key = row_key(taxonomy, &split.category, sub);
                    let block = acc.entry(split.category.clone()).or_default();
                    block.add(key, amount);
                    if key == UNCLASSIFIED && sub.is_none() {
                        block.to_classify += amount;
                    }
                }
            }
            Classification::Expense {
                category,
                subcategory,
            } => {
                let amount = tx.amount.abs();
                let key = row_key(taxonomy, &category, subcategory.as_deref());
                let block = acc.entry(category.clone()).or_default();
                block.add(key, amount);
                if key == UNCLASSIFIED && subcategory.is_none() {
                    block.to_classify += amount;
                }
            }
            Classification::Refund {
                category: Some(category),
                subcategory,
            } => {
                let key = row_key(taxonomy, &category, subcategory.as_deref());
                acc.entry(category.clone())
                    .or_default()
                    .add(key, -tx.amount.abs());
            }
            _ => {}
        }
    }

    let order = block_order(taxonomy, primary, acc.keys().cloned());

    order
        .into_iter()
        .map(|category| {
            let declared = taxonomy.subcategories(&category);
            let mut block = acc.remove(&category).unwrap_or_default();

            // Declared rows and the main Total row are shown even when empty
            if declared.is_empty() {
                block.rows.entry(TOTAL.to_string()).or_insert_with(|| ExpenseRow {
                    subcategory: TOTAL.to_string(),
                    total: Decimal::ZERO,
                    count: 0,
                });
            }
            for sub in declared {
                block.rows.entry(sub.clone()).or_insert_with(|| ExpenseRow {
                    subcategory: sub.clone(),
                    total: Decimal::ZERO,
                    count: 0,
                });
            }

            let mut rows = Vec::with_capacity(block.rows.len());
            let leading: Vec<&str> = if declared.is_empty() {
                vec![TOTAL]
            } else {
                declared
                    .iter()
                    .map(String::as_str)
                    .chain(std::iter::once(UNCLASSIFIED))
                    .collect()
            };
            for key in leading {
                if let Some(row) = block.rows.remove(key) {
                    rows.push(row);
                }
            }
            let mut others: Vec<ExpenseRow> = block.rows.into_values().collect();
            others.sort_by_key(|r| collate(&r.subcategory));
            rows.extend(others);

            let total = rows.iter().map(|r| r.total).sum();
            ExpenseBlock {
                title: taxonomy.label(&category).to_string(),
                category,
                rows,
                total,
                to_classify: block.to_classify,
            }
        })
        .collect()
}

/// Income per category; configured categories always listed, then
/// uncategorized inflows, then categories only seen in the data
pub fn income_rows(txs: &[Transaction], income_categories: &[String]) -> Vec<IncomeRow> {
    let mut totals: HashMap<String, IncomeRow> = HashMap::new();

    for tx in txs {
        let category = match tx.classification() {
            Classification::Income { category } => category,
            Classification::Unclassified if tx.is_inflow() => UNCLASSIFIED.to_string(),
            _ => continue,
        };
        let row = totals.entry(category.clone()).or_insert_with(|| IncomeRow {
            category,
            total: Decimal::ZERO,
            count: 0,
        });
        row.total += tx.amount;
        row.count += 1;
    }

    let mut rows: Vec<IncomeRow> = income_categories
        .iter()
        .map(|c| {
            totals.remove(c).unwrap_or_else(|| IncomeRow {
                category: c.clone(),
                total: Decimal::ZERO,
                count: 0,
            })
        })
        .collect();
    if let Some(row) = totals.remove(UNCLASSIFIED) {
        rows.push(row);
    }
    let mut others: Vec<IncomeRow> = totals.into_values().collect();
    others.sort_by_key(|r| collate(&r.category));
    rows.extend(others);
    rows
}

/// Net expense per category: splits and plain expenses added, refunds subtracted
pub fn category_totals(txs: &[Transaction]) -> BTreeMap<String, Decimal> {
    let mut totals: BTreeMap<String, Decimal> = BTreeMap::new();
    for tx in txs {
        match tx.classification() {
            Classification::Split { splits } => {
                for split in splits {
                    *totals.entry(split.category).or_default() += split.amount.abs();
                }
            }
            Classification::Expense { category, .. } => {
                *totals.entry(category).or_default() += tx.amount.abs();
            }
            Classification::Refund {
                category: Some(category),
                ..
            } => {
                *totals.entry(category).or_default() -= tx.amount.abs();
            }
            _ => {}
        }
    }
    totals
}

/// All inflows against all outflows, ignoring categorization
pub fn summary(txs: &[Transaction]) -> Summary {
    let incomes: Decimal = txs.iter().filter(|t| t.is_inflow()).map(|t| t.amount).sum();
    let expenses: Decimal = txs
        .iter()
        .filter(|t| t.is_outflow())
        .map(|t| t.amount.abs())
        .sum();
    Summary {
        incomes,
        expenses,
        net: incomes - expenses,
    }
}

/// Build the recap view
pub fn recap(txs: &[Transaction], taxonomy: &CategoryTaxonomy, layout: &ReportLayout) -> Recap {
    let expense_blocks = expense_blocks(txs, taxonomy, &layout.primary_categories);
    let income_rows = income_rows(txs, taxonomy.income_categories());

    let uncategorized_expenses: Decimal = txs
        .iter()
        .filter(|t| t.is_outflow() && t.classification() == Classification::Unclassified)
        .map(|t| t.amount.abs())
        .sum();

    let blocks_total: Decimal = expense_blocks.iter().map(|b| b.total).sum();
    let total_expenses = blocks_total + uncategorized_expenses;
    let total_incomes: Decimal = income_rows.iter().map(|r| r.total).sum();

    Recap {
        expense_blocks,
        income_rows,
        uncategorized_expenses,
        total_expenses,
        total_incomes,
        net: total_incomes - total_expenses,
    }
}

/// An amount with and without VAT
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize)]
pub struct VatAmount {
    pub incl_vat: Decimal,
    pub excl_vat: Decimal,
}

impl VatAmount {
    fn new(incl_vat: Decimal, vat_rate: Decimal) -> Self {
        let divisor = Decimal::ONE + vat_rate;
        let excl_vat = if divisor.is_zero() {
            incl_vat
        } else {
            incl_vat / divisor
        };
        Self { incl_vat, excl_vat }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct OverviewLine {
    pub category: String,
    pub label: String,
    pub amount: VatAmount,
}

/// Budget overview: income by kind, expenses by configured group, profit
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Overview {
    pub operating_income: Vec<OverviewLine>,
    pub non_operating_income: Vec<OverviewLine>,
    /// Inflows outside the configured income categories
    pub other_income: VatAmount,
    pub operating_income_total: VatAmount,
    pub non_operating_income_total: VatAmount,
    pub income_total: VatAmount,
    pub operating_expenses: Vec<OverviewLine>,
    pub extra_costs: Vec<OverviewLine>,
    pub operating_expenses_total: VatAmount,
    pub extra_costs_total: VatAmount,
    pub expenses_total: VatAmount,
    /// Income minus expenses, both VAT included
    pub profit_incl_vat: Decimal,
    /// Income without VAT minus expenses with VAT
    pub profit_excl_vat_income: Decimal,
}

/// Build the budget overview
pub fn overview(txs: &[Transaction], taxonomy: &CategoryTaxonomy, layout: &ReportLayout) -> Overview {
    let rate = layout.vat_rate;

    let mut income: HashMap<String, Decimal> = HashMap::new();
    let mut other = Decimal::ZERO;
    for tx in txs {
        if !tx.is_inflow() || tx.is_refund {
            continue;
        }
        match tx.category().filter(|c| taxonomy.is_income_category(c)) {
            Some(c) => *income.entry(c.to_string()).or_default() += tx.amount,
            None => other += tx.amount,
        }
    }
    let expenses = category_totals(txs);

    let lines = |cats: &[String], source: &dyn Fn(&str) -> Decimal| -> (Vec<OverviewLine>, VatAmount) {
        let lines: Vec<OverviewLine> = cats
            .iter()
            .map(|c| OverviewLine {
                category: c.clone(),
                label: taxonomy.label(c).to_string(),
                amount: VatAmount::new(source(c), rate),
            })
            .collect();
        let total = lines.iter().map(|l| l.amount.incl_vat).sum();
        (lines, VatAmount::new(total, rate))
    };

    let income_of = |c: &str| income.get(c).copied().unwrap_or_default();
    let expense_of = |c: &str| expenses.get(c).copied().unwrap_or_default();

    let (operating_income, operating_income_total) = lines(&layout.operating_income, &income_of);
    let (non_operating_income, non_operating_income_total) =
        lines(&layout.non_operating_income, &income_of);
    let (operating_expenses, operating_expenses_total) =
        lines(&layout.operating_expenses, &expense_of);
    let (extra_costs, extra_costs_total) = lines(&layout.extra_costs, &expense_of);

    let income_total = VatAmount::new(
        operating_income_total.incl_vat + non_operating_income_total.incl_vat + other,
        rate,
    );
    let expenses_total = VatAmount::new(
        operating_expenses_total.incl_vat + extra_costs_total.incl_vat,
        rate,
    );

    Overview {
        operating_income,
        non_operating_income,
        other_income: VatAmount::new(other, rate),
        operating_income_total,
        non_operating_income_total,
        income_total,
        operating_expenses,
        extra_costs,
        operating_expenses_total,
        extra_costs_total,
        expenses_total,
        profit_incl_vat: income_total.incl_vat - expenses_total.incl_vat,
        profit_excl_vat_income: income_total.excl_vat - expenses_total.incl_vat,
    }
}
