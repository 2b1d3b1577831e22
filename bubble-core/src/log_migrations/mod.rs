//! Schema of `logs.duckdb`, kept apart from the transaction store

use crate::migrations::Migration;

pub const LOG_MIGRATIONS: &[Migration] = &[Migration {
    name: "001_initial_schema.sql",
    sql: include_str!("001_initial_schema.sql"),
}];
