//! Error type of the domain, the store and CSV handling
//!
//! Services wrap these in `anyhow` with context. Callers that need to react to
//! a specific failure downcast to [`Error`].

use thiserror::Error;

#[derive(Error, Debug)]
pub enum Error {
    /// The store rejected or failed an operation
    #[error("Database error: {0}")]
    Database(String),

    #[error("Not found: {0}")]
    NotFound(String),

    /// A user edit or entry broke a rule; nothing was written
    #[error("Validation error: {0}")]
    Validation(String),

    /// Unreadable or malformed CSV input
    #[error("CSV error: {0}")]
    Csv(String),

    #[error(transparent)]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

impl Error {
    pub fn database(msg: impl Into<String>) -> Self {
        Self::Database(msg.into())
    }

    pub fn not_found(msg: impl Into<String>) -> Self {
        Self::NotFound(msg.into())
    }

    pub fn validation(msg: impl Into<String>) -> Self {
        Self::Validation(msg.into())
    }

    pub fn csv(msg: impl Into<String>) -> Self {
        Self::Csv(msg.into())
    }

    pub fn is_validation(&self) -> bool {
        matches!(self, Self::Validation(_))
    }
}

impl From<duckdb::Error> for Error {
    fn from(err: duckdb::Error) -> Self {
        Self::Database(err.to_string())
    }
}

/// Keeps the line number when the reader knows it
impl From<csv::Error> for Error {
    fn from(err: csv::Error) -> Self {
        match err.position() {
            Some(pos) => Self::Csv(format!("line {}: {}", pos.line(), err)),
            None => Self::Csv(err.to_string()),
        }
    }
}

pub type Result<T> = std::result::Result<T, Error>;
