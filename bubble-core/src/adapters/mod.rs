//! Adapter implementations
//!
//! Adapters implement the port traits with concrete technologies:
//! - DuckDB for the TransactionStore port
//! - An in-memory map for tests and scratch work

pub mod duckdb;
pub mod memory;

pub use self::duckdb::DuckDbStore;
pub use self::memory::MemoryStore;
