//! Service layer - business logic orchestration
//!
//! Services coordinate domain logic and port interactions. Each service
//! focuses on a specific use case or feature area.

pub mod aggregate;
mod categorize;
pub mod csv_io;
pub mod dedupe;
mod doctor;
mod import;
pub mod locale;
pub mod logging;
pub mod mapping;
pub mod merge;
pub mod migration;
pub mod normalize;
pub mod period;
mod status;

pub use aggregate::{
    category_totals, expense_blocks, income_rows, overview, recap, summary, ExpenseBlock,
    ExpenseRow, IncomeRow, Overview, OverviewLine, Recap, Summary, VatAmount,
};
pub use categorize::{CategorizeService, EntryKind, ManualEntry};
pub use csv_io::{
    export_expense_recap, export_income_recap, export_transactions, read_csv, read_csv_file,
    CsvTable,
};
pub use dedupe::{plan_dedupe, DedupePlan, DedupeResult, Deduplicator};
pub use doctor::{check_transactions, CheckResult, CheckStatus, DoctorResult, DoctorService, DoctorSummary};
pub use import::{ImportPreview, ImportResult, ImportService};
pub use locale::{parse_amount, parse_date, Parsed};
pub use logging::{EntryPoint, LogEntry, LogEvent, LogFilter, LogStats, LoggingService};
pub use mapping::{infer_mapping, ColumnField, ColumnMapping};
pub use merge::merge_with_previous;
pub use migration::{MigrationReport, Migrator};
pub use normalize::{normalize, normalize_all, normalize_batch, normalize_row, NormalizeReport, NormalizedRow};
pub use period::{available_years, Period};
pub use status::{DateRange, StatusService, StatusSummary};
