//! Database access layer with connection pooling and migrations
//!
//! This module is organized by domain:
//! - `transactions` - Transaction storage, label updates and period queries
//! - `runs` - Classification run history

use r2d2::{Pool, PooledConnection};
use r2d2_sqlite::SqliteConnectionManager;
use tracing::info;

use crate::error::Result;

mod runs;
mod transactions;


pub use runs::RunRecord;
pub use transactions::InsertSummary;

pub type DbPool = Pool<SqliteConnectionManager>;
pub type DbConn = PooledConnection<SqliteConnectionManager>;

/// Storage format for `posted_at`
pub(crate) const DATETIME_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

/// Database wrapper with connection pooling
#[derive(Clone)]
pub struct Database {
    pool: DbPool,
    /// Path to the database file
    db_path: String,
}

impl Database {
    /// Open (or create) a database file and bring its schema up to date
    pub fn new(path: &str) -> Result<Self> {
        let manager = SqliteConnectionManager::file(path);
        let pool = Pool::builder().max_size(10).build(manager)?;

        let db = Self {
            pool,
            db_path: path.to_string(),
        };
        db.run_migrations()?;

        Ok(db)
    }

    /// Get the path to the database file
    pub fn path(&self) -> &str {
        &self.db_path
    }

    /// Create a throwaway database (for testing)
    ///
    /// Uses a temporary file rather than `:memory:` so every pooled connection
    /// sees the same data.
    pub fn in_memory() -> Result<Self> {
        use std::sync::atomic::{AtomicU64, Ordering};
        static COUNTER: AtomicU64 = AtomicU64::new(0);

        let id = COUNTER.fetch_add(1, Ordering::SeqCst);
        let path = std::env::temp_dir().join(format!(
            "sift_test_{}_{}.db",
            std::process::id(),
            id
        ));

        // Remove any existing file
        let _ = std::fs::remove_file(&path);

        Self::new(&path.to_string_lossy())
    }

    /// Get a connection from the pool
    pub fn conn(&self) -> Result<DbConn> {
        Ok(self.pool.get()?)
    }

    /// Run database migrations
    fn run_migrations(&self) -> Result<()> {
        let conn = self.conn()?;

        conn.execute_batch(
            r#"
            -- WAL mode: readers don't block writers
            PRAGMA journal_mode = WAL;
            PRAGMA synchronous = NORMAL;
            PRAGMA temp_store = MEMORY;

            -- Transactions, keyed by fingerprint
            CREATE TABLE IF NOT EXISTS transactions (
                id TEXT PRIMARY KEY,
                posted_at TEXT,
                description TEXT NOT NULL,
                merchant TEXT NOT NULL DEFAULT '',
                amount REAL NOT NULL,
                currency TEXT NOT NULL DEFAULT 'AUD',
                account TEXT NOT NULL,
                balance REAL,
                category TEXT,
                subcategory TEXT,
                is_fixed INTEGER NOT NULL DEFAULT 0,
                is_internal_transfer INTEGER NOT NULL DEFAULT 0,
                is_refund INTEGER NOT NULL DEFAULT 0,
                is_recurring INTEGER NOT NULL DEFAULT 0,
                transfer_counterpart TEXT,
                source TEXT NOT NULL DEFAULT '',
                imported_at TEXT NOT NULL DEFAULT CURRENT_TIMESTAMP
            );

            CREATE INDEX IF NOT EXISTS idx_transactions_posted_at ON transactions(posted_at);
            CREATE INDEX IF NOT EXISTS idx_transactions_account ON transactions(account);

            -- One row per classification run
            CREATE TABLE IF NOT EXISTS classification_runs (
                id INTEGER PRIMARY KEY,
                run_at TEXT NOT NULL DEFAULT CURRENT_TIMESTAMP,
                examined INTEGER NOT NULL,
                pattern_flagged INTEGER NOT NULL,
                pattern_skipped INTEGER NOT NULL,
                pairs INTEGER NOT NULL,
                pairing_skipped INTEGER NOT NULL,
                recurring INTEGER NOT NULL,
                recurrence_skipped INTEGER NOT NULL
            );
            "#,
        )?;

        info!("Database migrations complete");
        Ok(())
    }
}
