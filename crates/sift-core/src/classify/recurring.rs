//! Recurring merchant detection
//!
//! A merchant is recurring when it shows up in enough distinct calendar months
//! of a trailing window. Several charges in one month count once.

use std::collections::{BTreeMap, BTreeSet, HashSet};

use chrono::{Datelike, NaiveDate};
use serde::Serialize;
use tracing::debug;

use super::{Pass, SkippedRow};
use crate::error::{Error, Result};
use crate::import::clean_merchant;
use crate::models::Transaction;

/// A merchant that met the threshold
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RecurringMerchant {
    pub merchant: String,
    /// Distinct `YYYY-MM` months seen inside the window
    pub months: Vec<String>,
    /// Flagged rows for this merchant
    pub rows: usize,
}

/// Result of a recurrence pass
#[derive(Debug, Default)]
pub struct RecurrenceOutcome {
    /// Positions in the input slice of flagged rows
    pub flagged: Vec<usize>,
    pub merchants: Vec<RecurringMerchant>,
    pub skipped: Vec<SkippedRow>,
    /// First day of the oldest month in the window
    pub window_start: Option<NaiveDate>,
}

impl RecurrenceOutcome {
    pub fn ids<'a>(&self, transactions: &'a [Transaction]) -> HashSet<&'a str> {
        self.flagged
            .iter()
            .filter_map(|&i| transactions.get(i))
            .map(|t| t.id.as_str())
            .collect()
    }
}

/// Grouping key: the merchant, or a cleaned description when the merchant is empty
pub fn merchant_key(txn: &Transaction) -> Option<String> {
    let merchant = txn.merchant.trim();
    let key = if merchant.is_empty() {
        clean_merchant(&txn.description)
    } else {
        merchant.to_string()
    };
    let key = key.to_uppercase();
    (!key.is_empty()).then_some(key)
}

/// Months since year 0, for window arithmetic
fn month_index(date: NaiveDate) -> i64 {
    i64::from(date.year()) * 12 + i64::from(date.month0())
}

fn check(txn: &Transaction) -> Result<(NaiveDate, String)> {
    let date = txn
        .date()
        .ok_or_else(|| Error::malformed(&txn.id, "missing or unparseable posted_at"))?;
    let key = merchant_key(txn)
        .ok_or_else(|| Error::malformed(&txn.id, "no merchant or description"))?;
    Ok((date, key))
}

/// Flag rows of merchants seen in at least `min_distinct_months` of the
/// trailing `trailing_months` calendar months
///
/// The window ends with the month of the latest dated row in the batch, so the
/// result depends only on the input, never on the current date.
pub fn flag_recurring(
    transactions: &[Transaction],
    trailing_months: u32,
    min_distinct_months: u32,
) -> RecurrenceOutcome {
    let mut outcome = RecurrenceOutcome::default();

    let mut rows = Vec::with_capacity(transactions.len());
    for (index, txn) in transactions.iter().enumerate() {
        match check(txn) {
            Ok((date, key)) => rows.push((index, date, key)),
            Err(e) => outcome
                .skipped
                .push(SkippedRow::from_error(Pass::Recurrence, e)),
        }
    }

    let Some(latest) = rows.iter().map(|(_, date, _)| *date).max() else {
        return outcome;
    };
    let last = month_index(latest);
    let first = last - i64::from(trailing_months.max(1)) + 1;
    outcome.window_start = NaiveDate::from_ymd_opt(
        first.div_euclid(12) as i32,
        first.rem_euclid(12) as u32 + 1,
        1,
    );

    // merchant -> (months, row indices), inside the window only
    let mut groups: BTreeMap<String, (BTreeSet<i64>, Vec<usize>)> = BTreeMap::new();
    for (index, date, key) in rows {
        let month = month_index(date);
        if month < first || month > last {
            continue;
        }
        let group = groups.entry(key).or_default();
        group.0.insert(month);
        group.1.push(index);
    }

    for (merchant, (months, indices)) in groups {
        if months.len() < min_distinct_months as usize {
            continue;
        }
        debug!(
            merchant = %merchant,
            months = months.len(),
            rows = indices.len(),
            "Recurring merchant"
        );
        outcome.merchants.push(RecurringMerchant {
            merchant,
            months: months
                .iter()
                .map(|m| format!("{:04}-{:02}", m.div_euclid(12), m.rem_euclid(12) + 1))
                .collect(),
            rows: indices.len(),
        });
        outcome.flagged.extend(indices);
    }
    outcome.flagged.sort_unstable();

    outcome
}
