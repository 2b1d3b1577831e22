//! Schema of `bubble.duckdb`
//!
//! Each file is applied once, in list order, and recorded by name.
//! New migrations go at the end as `NNN_description.sql`.

/// One embedded SQL migration
#[derive(Debug, Clone, Copy)]
pub struct Migration {
    pub name: &'static str,
    pub sql: &'static str,
}

pub const MIGRATIONS: &[Migration] = &[
    Migration {
        name: "001_initial_schema.sql",
        sql: include_str!("001_initial_schema.sql"),
    },
    Migration {
        name: "002_transactions_view.sql",
        sql: include_str!("002_transactions_view.sql"),
    },
];
