//! Period summaries over classified transactions
//!
//! Gross figures count everything except internal transfers. Real figures also
//! take refunds out of income, and either offset expenses with them or leave
//! them out, depending on the [`RefundPolicy`].

use std::collections::{BTreeMap, BTreeSet, HashSet};

use chrono::Datelike;

use crate::models::{CategoryTotal, Period, RefundPolicy, Summary, Transaction};

/// Summarize one period
///
/// Rows without a date or outside the period are ignored.
pub fn summarize(transactions: &[Transaction], period: Period, policy: RefundPolicy) -> Summary {
    let rows: Vec<&Transaction> = transactions
        .iter()
        .filter(|t| t.date().is_some_and(|d| period.contains(d)))
        .collect();
    let in_period: HashSet<&str> = rows.iter().map(|t| t.id.as_str()).collect();

    let mut summary = Summary {
        period,
        gross_income: 0.0,
        gross_expenses: 0.0,
        real_income: 0.0,
        real_expenses: 0.0,
        transfer_total: 0.0,
        transfer_count: 0,
        refund_total: 0.0,
        refund_count: 0,
        net: 0.0,
        transaction_count: rows.len(),
        real_transaction_count: 0,
    };

    for txn in rows {
        let amount = txn.amount;
        if !amount.is_finite() {
            continue;
        }

        if txn.is_internal_transfer {
            summary.transfer_count += 1;
            if transfer_counts_once(txn, &in_period) {
                summary.transfer_total += amount.abs();
            }
            continue;
        }

        if txn.is_inflow() {
            summary.gross_income += amount;
        } else {
            summary.gross_expenses += amount;
        }

        if txn.is_refund {
            summary.refund_total += amount.abs();
            summary.refund_count += 1;
            if policy == RefundPolicy::OffsetExpenses {
                summary.real_expenses += amount;
            }
        } else {
            summary.real_transaction_count += 1;
            if txn.is_inflow() {
                summary.real_income += amount;
            } else {
                summary.real_expenses += amount;
            }
        }
    }

    summary.net = summary.real_income + summary.real_expenses;
    summary
}

/// A confirmed pair contributes its outflow side only, unless the outflow
/// falls outside the rows being summarized
fn transfer_counts_once(txn: &Transaction, in_period: &HashSet<&str>) -> bool {
    match &txn.transfer_counterpart {
        None => true,
        Some(_) if txn.is_outflow() => true,
        Some(other) => !in_period.contains(other.as_str()),
    }
}

/// One summary per calendar month present in the data, oldest first
pub fn summarize_months(transactions: &[Transaction], policy: RefundPolicy) -> Vec<Summary> {
    let months: BTreeSet<(i32, u32)> = transactions
        .iter()
        .filter_map(|t| t.date())
        .map(|d| (d.year(), d.month()))
        .collect();

    months
        .into_iter()
        .filter_map(|(year, month)| Period::month(year, month).ok())
        .map(|period| summarize(transactions, period, policy))
        .collect()
}

/// Real totals by category, biggest spending first
///
/// Transfers and refunds are left out. Uncategorized rows group under `None`.
pub fn category_breakdown(transactions: &[Transaction], period: Period) -> Vec<CategoryTotal> {
    let mut totals: BTreeMap<Option<&str>, (f64, usize)> = BTreeMap::new();

    for txn in transactions {
        if txn.is_internal_transfer || txn.is_refund || !txn.amount.is_finite() {
            continue;
        }
        if !txn.date().is_some_and(|d| period.contains(d)) {
            continue;
        }
        let entry = totals.entry(txn.category.as_deref()).or_default();
        entry.0 += txn.amount;
        entry.1 += 1;
    }

    let mut result: Vec<CategoryTotal> = totals
        .into_iter()
        .map(|(category, (total, count))| CategoryTotal {
            category: category.map(str::to_string),
            total,
            count,
        })
        .collect();
    result.sort_by(|a, b| a.total.total_cmp(&b.total));
    result
}
