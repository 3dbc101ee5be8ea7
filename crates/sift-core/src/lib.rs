//! Sift Core Library
//!
//! Shared functionality for the Sift personal finance tool:
//! - CSV import with per-source column mappings and fingerprinting
//! - Merchant category rules
//! - Transfer, refund and recurring classification
//! - Gross vs real period summaries
//! - SQLite storage with connection pooling
//! - TOML classifier configuration with embedded defaults

pub mod categorize;
pub mod classify;
pub mod config;
pub mod db;
pub mod error;
pub mod import;
pub mod models;
pub mod summary;

pub use categorize::Categorizer;
pub use classify::{
    classify_batch, find_transfer_pairs, flag_recurring, ClassificationRun, Classifier, Pass,
    PassReport, PatternFlags, PatternMatcher, RunReport, SkippedRow, TransferPair,
};
pub use config::{load_config, ClassifierConfig, PatternRule, SourceConfig};
pub use db::Database;
pub use error::{Error, Result};
pub use import::{clean_merchant, fingerprint, parse_csv, ImportResult};
pub use models::{CategoryTotal, Period, RefundPolicy, Summary, Transaction};
pub use summary::{category_breakdown, summarize, summarize_months};
