//! Cross-account transfer pair matching
//!
//! Two rows pair up when they sit on different accounts, carry equal and
//! opposite amounts (within a tolerance) and post within a window of calendar
//! days of each other. Each row joins at most one pair, including pairs
//! confirmed by earlier runs.

use std::collections::{HashMap, HashSet};

use serde::Serialize;
use tracing::debug;

use super::{Pass, SkippedRow};
use crate::error::{Error, Result};
use crate::models::Transaction;

/// Absorbs float noise at the tolerance boundary (100.00 vs -100.01)
const AMOUNT_EPSILON: f64 = 1e-9;

/// A confirmed transfer between two of the user's accounts
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TransferPair {
    pub outflow_id: String,
    pub inflow_id: String,
    /// Positions in the input slice
    pub outflow_index: usize,
    pub inflow_index: usize,
    /// Magnitude of the outflow side
    pub amount: f64,
    /// Seconds between the two postings
    pub delta_seconds: i64,
}

/// Result of a pairing pass
#[derive(Debug, Default)]
pub struct PairOutcome {
    pub pairs: Vec<TransferPair>,
    pub skipped: Vec<SkippedRow>,
}

impl PairOutcome {
    /// Ids of every row in a confirmed pair
    pub fn ids(&self) -> HashSet<&str> {
        self.pairs
            .iter()
            .flat_map(|p| [p.outflow_id.as_str(), p.inflow_id.as_str()])
            .collect()
    }
}

/// A row the pairing pass can use
struct Eligible<'a> {
    index: usize,
    txn: &'a Transaction,
    magnitude: f64,
}

/// Row fit for pairing. `Ok(false)` means silently ineligible (zero amount).
fn check(txn: &Transaction) -> Result<bool> {
    if txn.id.trim().is_empty() {
        return Err(Error::malformed(&txn.id, "missing id"));
    }
    if txn.account.trim().is_empty() {
        return Err(Error::malformed(&txn.id, "missing account"));
    }
    if txn.posted_at.is_none() {
        return Err(Error::malformed(&txn.id, "missing or unparseable posted_at"));
    }
    if !txn.amount.is_finite() {
        return Err(Error::malformed(&txn.id, "amount is not a finite number"));
    }
    Ok(txn.amount != 0.0)
}

/// Find transfer pairs in a batch
///
/// Rows already linked to another row of the batch through
/// `transfer_counterpart` keep that partner: mutual links come back as pairs
/// and both sides are claimed before any new candidate is considered.
///
/// New candidates are gathered by sorting on amount magnitude and sweeping
/// forward while magnitudes stay within the tolerance. The window compares
/// calendar dates, so times of day never push a pair out of it. Confirmation
/// is greedy: closest in time first, ties by input order, skipping rows
/// already claimed.
///
/// Transfer and refund flags are ignored, so rows the pattern pass flagged
/// still pair.
pub fn find_transfer_pairs(
    transactions: &[Transaction],
    window_days: u32,
    tolerance: f64,
) -> PairOutcome {
    let mut outcome = PairOutcome::default();
    let mut claimed = vec![false; transactions.len()];
    claim_existing(transactions, &mut claimed, &mut outcome.pairs);

    let mut eligible = Vec::with_capacity(transactions.len());

    for (index, txn) in transactions.iter().enumerate() {
        match check(txn) {
            Ok(true) if claimed[index] => {}
            Ok(true) => eligible.push(Eligible {
                index,
                txn,
                magnitude: txn.amount.abs(),
            }),
            Ok(false) => {}
            Err(e) => outcome.skipped.push(SkippedRow::from_error(Pass::Pairing, e)),
        }
    }

    eligible.sort_by(|a, b| {
        a.magnitude
            .total_cmp(&b.magnitude)
            .then(a.index.cmp(&b.index))
    });

    let limit = tolerance + AMOUNT_EPSILON;
    let window = i64::from(window_days);

    // (delta seconds, lower index, higher index)
    let mut candidates: Vec<(i64, usize, usize)> = Vec::new();
    for (i, a) in eligible.iter().enumerate() {
        for b in &eligible[i + 1..] {
            if b.magnitude - a.magnitude > limit {
                break;
            }
            if let Some(delta) = candidate_delta(a.txn, b.txn, limit, window) {
                candidates.push((delta, a.index.min(b.index), a.index.max(b.index)));
            }
        }
    }
    candidates.sort_unstable();
    debug!(
        rows = eligible.len(),
        candidates = candidates.len(),
        "Pair candidates"
    );

    for (delta, lo, hi) in candidates {
        if claimed[lo] || claimed[hi] {
            continue;
        }
        claimed[lo] = true;
        claimed[hi] = true;

        let pair = make_pair(transactions, lo, hi, delta);
        debug!(
            outflow = %pair.outflow_id,
            inflow = %pair.inflow_id,
            amount = pair.amount,
            delta_seconds = delta,
            "Confirmed transfer pair"
        );
        outcome.pairs.push(pair);
    }

    outcome
}

/// Claim rows linked by earlier runs
///
/// A row whose counterpart is another row of the batch is claimed together
/// with that row. Mutual links are reported as pairs again.
fn claim_existing(
    transactions: &[Transaction],
    claimed: &mut [bool],
    pairs: &mut Vec<TransferPair>,
) {
    let positions: HashMap<&str, usize> = transactions
        .iter()
        .enumerate()
        .map(|(index, txn)| (txn.id.as_str(), index))
        .collect();

    for (index, txn) in transactions.iter().enumerate() {
        let Some(other) = txn
            .transfer_counterpart
            .as_deref()
            .and_then(|id| positions.get(id).copied())
        else {
            continue;
        };
        if other == index || claimed[index] {
            continue;
        }

        let mutual =
            transactions[other].transfer_counterpart.as_deref() == Some(txn.id.as_str());
        let already = claimed[other];
        claimed[index] = true;
        claimed[other] = true;
        if !mutual || already {
            continue;
        }

        let delta = match (txn.posted_at, transactions[other].posted_at) {
            (Some(a), Some(b)) => (a - b).num_seconds().abs(),
            _ => 0,
        };
        let (lo, hi) = (index.min(other), index.max(other));
        let pair = make_pair(transactions, lo, hi, delta);
        debug!(outflow = %pair.outflow_id, inflow = %pair.inflow_id, "Kept existing pair");
        pairs.push(pair);
    }
}

fn make_pair(transactions: &[Transaction], lo: usize, hi: usize, delta: i64) -> TransferPair {
    let (out_idx, in_idx) = if transactions[lo].is_outflow() {
        (lo, hi)
    } else {
        (hi, lo)
    };
    TransferPair {
        outflow_id: transactions[out_idx].id.clone(),
        inflow_id: transactions[in_idx].id.clone(),
        outflow_index: out_idx,
        inflow_index: in_idx,
        amount: transactions[out_idx].amount.abs(),
        delta_seconds: delta,
    }
}

/// Seconds between `a` and `b` if they could be two sides of one transfer
///
/// `window` is in calendar days between the posting dates.
fn candidate_delta(a: &Transaction, b: &Transaction, limit: f64, window: i64) -> Option<i64> {
    if a.id == b.id || a.account == b.account {
        return None;
    }
    if a.is_outflow() == b.is_outflow() {
        return None;
    }
    if (a.amount + b.amount).abs() > limit {
        return None;
    }
    let (a_at, b_at) = (a.posted_at?, b.posted_at?);
    let days = (a_at.date() - b_at.date()).num_days().abs();
    (days <= window).then(|| (a_at - b_at).num_seconds().abs())
}
