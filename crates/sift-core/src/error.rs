//! Error types for Sift

use thiserror::Error;

#[derive(Error, Debug)]
pub enum Error {
    #[error("Database error: {0}")]
    Database(#[from] rusqlite::Error),

    #[error("Database pool error: {0}")]
    Pool(#[from] r2d2::Error),

    #[error("CSV parsing error: {0}")]
    Csv(#[from] csv::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// Invalid or missing classifier configuration. Fatal before any row is processed.
    #[error("Configuration error: {0}")]
    Config(String),

    /// A transaction lacks a field one classification pass needs.
    /// Recovered per pass: the row is skipped for that pass only.
    #[error("Malformed transaction {id}: {reason}")]
    MalformedTransaction { id: String, reason: String },

    #[error("Import error: {0}")]
    Import(String),

    #[error("Invalid data: {0}")]
    InvalidData(String),

    #[error("Not found: {0}")]
    NotFound(String),
}

impl Error {
    pub(crate) fn malformed(id: &str, reason: impl Into<String>) -> Self {
        Self::MalformedTransaction {
            id: if id.is_empty() {
                "<no id>".to_string()
            } else {
                id.to_string()
            },
            reason: reason.into(),
        }
    }
}

pub type Result<T> = std::result::Result<T, Error>;
