//! Core domain entities
//!
//! All business entities are defined here. These are pure data structures
//! with validation logic - no I/O or external dependencies.

mod taxonomy;
mod transaction;
pub mod result;

pub use taxonomy::{CategoryDef, CategoryTaxonomy, ReportLayout, TOTAL, UNCLASSIFIED};
pub use transaction::{
    display_amount, normalize_description, validate_splits, Classification, ClassificationEdit,
    ContentFingerprint, Identity, RawRow, Split, Transaction, CONTENT_IDENTITY_MAX_CHARS,
    SPLIT_SUM_TOLERANCE,
};
