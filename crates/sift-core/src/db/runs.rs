//! Classification run history

use rusqlite::params;
use serde::Serialize;

use super::Database;
use crate::classify::RunReport;
use crate::error::Result;

/// A stored classification run
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RunRecord {
    pub id: i64,
    pub run_at: String,
    pub examined: i64,
    pub pattern_flagged: i64,
    pub pattern_skipped: i64,
    pub pairs: i64,
    pub pairing_skipped: i64,
    pub recurring: i64,
    pub recurrence_skipped: i64,
}

impl RunRecord {
    pub fn total_skipped(&self) -> i64 {
        self.pattern_skipped + self.pairing_skipped + self.recurrence_skipped
    }
}

impl Database {
    /// Record a run's per-pass counts, returning the run id
    pub fn record_run(&self, report: &RunReport) -> Result<i64> {
        let conn = self.conn()?;
        conn.execute(
            r#"
            INSERT INTO classification_runs (
                examined, pattern_flagged, pattern_skipped, pairs,
                pairing_skipped, recurring, recurrence_skipped
            )
            VALUES (?, ?, ?, ?, ?, ?, ?)
            "#,
            params![
                report.pattern.examined as i64,
                report.pattern.flagged as i64,
                report.pattern.skipped as i64,
                report.pairs.len() as i64,
                report.pairing.skipped as i64,
                report.recurrence.flagged as i64,
                report.recurrence.skipped as i64,
            ],
        )?;
        Ok(conn.last_insert_rowid())
    }

    /// Most recent runs first
    pub fn list_runs(&self, limit: i64) -> Result<Vec<RunRecord>> {
        let conn = self.conn()?;
        let mut stmt = conn.prepare(
            r#"
            SELECT id, run_at, examined, pattern_flagged, pattern_skipped, pairs,
                   pairing_skipped, recurring, recurrence_skipped
            FROM classification_runs
            ORDER BY id DESC
            LIMIT ?
            "#,
        )?;
        let rows = stmt.query_map(params![limit], |row| {
            Ok(RunRecord {
                id: row.get(0)?,
                run_at: row.get(1)?,
                examined: row.get(2)?,
                pattern_flagged: row.get(3)?,
                pattern_skipped: row.get(4)?,
                pairs: row.get(5)?,
                pairing_skipped: row.get(6)?,
                recurring: row.get(7)?,
                recurrence_skipped: row.get(8)?,
            })
        })?;
        Ok(rows.collect::<std::result::Result<Vec<_>, _>>()?)
    }
}
