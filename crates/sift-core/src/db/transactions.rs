//! Transaction operations

use chrono::{NaiveDate, NaiveDateTime};
use rusqlite::{params, OptionalExtension, Statement};
use tracing::{debug, warn};

use super::{Database, DATETIME_FORMAT};
use crate::error::Result;
use crate::models::Transaction;

const SELECT_COLUMNS: &str = "id, posted_at, description, merchant, amount, currency, account, \
     balance, category, subcategory, is_fixed, is_internal_transfer, is_refund, is_recurring, \
     transfer_counterpart, source";

/// Outcome of a bulk insert
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct InsertSummary {
    pub inserted: usize,
    /// Already stored under the same id
    pub duplicates: usize,
}

impl Database {
    /// Insert a transaction (skips an existing id)
    ///
    /// Returns whether a row was written.
    pub fn insert_transaction(&self, txn: &Transaction) -> Result<bool> {
        let conn = self.conn()?;
        let mut stmt = conn.prepare(INSERT_SQL)?;
        Ok(execute_insert(&mut stmt, txn)? > 0)
    }

    /// Insert a batch in one transaction, skipping existing ids
    pub fn insert_transactions(&self, transactions: &[Transaction]) -> Result<InsertSummary> {
        let mut conn = self.conn()?;
        let tx = conn.transaction()?;
        let mut summary = InsertSummary::default();
        {
            let mut stmt = tx.prepare(INSERT_SQL)?;
            for txn in transactions {
                if execute_insert(&mut stmt, txn)? > 0 {
                    summary.inserted += 1;
                } else {
                    summary.duplicates += 1;
                }
            }
        }
        tx.commit()?;

        debug!(
            inserted = summary.inserted,
            duplicates = summary.duplicates,
            "Stored transactions"
        );
        Ok(summary)
    }

    /// Persist classification flags and categories by id
    ///
    /// Never creates rows; ids not in the store are ignored. Returns the
    /// number of rows updated.
    pub fn save_labels(&self, transactions: &[Transaction]) -> Result<usize> {
        let mut conn = self.conn()?;
        let tx = conn.transaction()?;
        let mut updated = 0;
        {
            let mut stmt = tx.prepare(
                r#"
                UPDATE transactions SET
                    category = ?2,
                    subcategory = ?3,
                    is_fixed = ?4,
                    is_internal_transfer = ?5,
                    is_refund = ?6,
                    is_recurring = ?7,
                    transfer_counterpart = ?8
                WHERE id = ?1
                "#,
            )?;
            for txn in transactions {
                updated += stmt.execute(params![
                    txn.id,
                    txn.category,
                    txn.subcategory,
                    txn.is_fixed,
                    txn.is_internal_transfer,
                    txn.is_refund,
                    txn.is_recurring,
                    txn.transfer_counterpart,
                ])?;
            }
        }
        tx.commit()?;
        Ok(updated)
    }

    /// Clear transfer, refund and recurring flags so a run starts fresh
    pub fn reset_labels(&self) -> Result<usize> {
        let conn = self.conn()?;
        let cleared = conn.execute(
            r#"
            UPDATE transactions SET
                is_internal_transfer = 0,
                is_refund = 0,
                is_recurring = 0,
                transfer_counterpart = NULL
            "#,
            [],
        )?;
        Ok(cleared)
    }

    /// Get a transaction by id
    pub fn get_transaction(&self, id: &str) -> Result<Option<Transaction>> {
        let conn = self.conn()?;
        let txn = conn
            .query_row(
                &format!("SELECT {} FROM transactions WHERE id = ?", SELECT_COLUMNS),
                params![id],
                Self::row_to_transaction,
            )
            .optional()?;
        Ok(txn)
    }

    /// All transactions, oldest first (undated rows last)
    pub fn list_transactions(&self) -> Result<Vec<Transaction>> {
        let conn = self.conn()?;
        let mut stmt = conn.prepare(&format!(
            "SELECT {} FROM transactions ORDER BY posted_at IS NULL, posted_at, id",
            SELECT_COLUMNS
        ))?;
        let rows = stmt.query_map([], Self::row_to_transaction)?;
        Ok(rows.collect::<std::result::Result<Vec<_>, _>>()?)
    }

    /// Transactions posted on `from` through `to`, inclusive
    pub fn list_transactions_between(
        &self,
        from: NaiveDate,
        to: NaiveDate,
    ) -> Result<Vec<Transaction>> {
        let conn = self.conn()?;
        let mut stmt = conn.prepare(&format!(
            "SELECT {} FROM transactions
             WHERE date(posted_at) >= date(?1) AND date(posted_at) <= date(?2)
             ORDER BY posted_at, id",
            SELECT_COLUMNS
        ))?;
        let rows = stmt.query_map(
            params![from.to_string(), to.to_string()],
            Self::row_to_transaction,
        )?;
        Ok(rows.collect::<std::result::Result<Vec<_>, _>>()?)
    }

    /// Distinct `YYYY-MM` months with data, newest first
    pub fn available_months(&self) -> Result<Vec<String>> {
        let conn = self.conn()?;
        let mut stmt = conn.prepare(
            "SELECT DISTINCT substr(posted_at, 1, 7) AS month FROM transactions
             WHERE posted_at IS NOT NULL ORDER BY month DESC",
        )?;
        let rows = stmt.query_map([], |row| row.get::<_, String>(0))?;
        Ok(rows.collect::<std::result::Result<Vec<_>, _>>()?)
    }

    pub fn count_transactions(&self) -> Result<i64> {
        let conn = self.conn()?;
        let count = conn.query_row("SELECT COUNT(*) FROM transactions", [], |row| row.get(0))?;
        Ok(count)
    }

    pub(crate) fn row_to_transaction(row: &rusqlite::Row) -> rusqlite::Result<Transaction> {
        let id: String = row.get(0)?;
        let posted_str: Option<String> = row.get(1)?;
        let posted_at = posted_str.as_deref().and_then(|s| {
            let parsed = NaiveDateTime::parse_from_str(s, DATETIME_FORMAT).ok();
            if parsed.is_none() {
                warn!(id = %id, value = s, "Stored posted_at is unparseable");
            }
            parsed
        });

        Ok(Transaction {
            id,
            posted_at,
            description: row.get(2)?,
            merchant: row.get(3)?,
            amount: row.get(4)?,
            currency: row.get(5)?,
            account: row.get(6)?,
            balance: row.get(7)?,
            category: row.get(8)?,
            subcategory: row.get(9)?,
            is_fixed: row.get(10)?,
            is_internal_transfer: row.get(11)?,
            is_refund: row.get(12)?,
            is_recurring: row.get(13)?,
            transfer_counterpart: row.get(14)?,
            source: row.get(15)?,
        })
    }
}

const INSERT_SQL: &str = r#"
    INSERT OR IGNORE INTO transactions (
        id, posted_at, description, merchant, amount, currency, account, balance,
        category, subcategory, is_fixed, is_internal_transfer, is_refund, is_recurring,
        transfer_counterpart, source
    )
    VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13, ?14, ?15, ?16)
"#;

fn execute_insert(stmt: &mut Statement<'_>, txn: &Transaction) -> rusqlite::Result<usize> {
    stmt.execute(params![
        txn.id,
        txn.posted_at.map(|dt| dt.format(DATETIME_FORMAT).to_string()),
        txn.description,
        txn.merchant,
        txn.amount,
        txn.currency,
        txn.account,
        txn.balance,
        txn.category,
        txn.subcategory,
        txn.is_fixed,
        txn.is_internal_transfer,
        txn.is_refund,
        txn.is_recurring,
        txn.transfer_counterpart,
        txn.source,
    ])
}
