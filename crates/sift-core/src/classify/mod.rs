//! Transaction classification
//!
//! Three passes over one batch, always in this order:
//! 1. Pattern rules, per row (transfer and refund flags)
//! 2. Cross-account pair matching (transfer flag, counterpart id)
//! 3. Recurrence detection (recurring flag)
//!
//! Flags merge by logical OR and are never cleared. A row a pass cannot handle
//! is skipped for that pass only, keeps its flags, and is reported.

pub mod pairs;
pub mod patterns;
pub mod recurring;

use serde::Serialize;
use tracing::{info, warn};

use crate::config::{ClassifierConfig, PairingConfig, RecurrenceConfig};
use crate::error::{Error, Result};
use crate::models::Transaction;

pub use pairs::{find_transfer_pairs, PairOutcome, TransferPair};
pub use patterns::{PatternFlags, PatternMatcher};
pub use recurring::{flag_recurring, merchant_key, RecurrenceOutcome, RecurringMerchant};

/// Classification pass
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Pass {
    Pattern,
    Pairing,
    Recurrence,
}

impl Pass {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Pattern => "pattern",
            Self::Pairing => "pairing",
            Self::Recurrence => "recurrence",
        }
    }

    pub fn all() -> &'static [Pass] {
        &[Self::Pattern, Self::Pairing, Self::Recurrence]
    }
}

impl std::fmt::Display for Pass {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// A row one pass could not process
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SkippedRow {
    pub id: String,
    pub pass: Pass,
    pub reason: String,
}

impl SkippedRow {
    pub(crate) fn from_error(pass: Pass, error: Error) -> Self {
        let skipped = match error {
            Error::MalformedTransaction { id, reason } => Self { id, pass, reason },
            other => Self {
                id: "<no id>".to_string(),
                pass,
                reason: other.to_string(),
            },
        };
        warn!(
            id = %skipped.id,
            pass = %pass,
            "Skipping transaction: {}",
            skipped.reason
        );
        skipped
    }
}

/// Counts for one pass
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
pub struct PassReport {
    pub examined: usize,
    /// Rows this pass flagged (including rows already flagged before it ran)
    pub flagged: usize,
    pub skipped: usize,
}

/// What a classification run did
#[derive(Debug, Clone, Default, Serialize)]
pub struct RunReport {
    pub pattern: PassReport,
    pub pairing: PassReport,
    pub recurrence: PassReport,
    pub pattern_transfers: usize,
    pub pattern_refunds: usize,
    pub pairs: Vec<TransferPair>,
    pub recurring_merchants: Vec<RecurringMerchant>,
    pub skipped: Vec<SkippedRow>,
}

impl RunReport {
    pub fn pass(&self, pass: Pass) -> &PassReport {
        match pass {
            Pass::Pattern => &self.pattern,
            Pass::Pairing => &self.pairing,
            Pass::Recurrence => &self.recurrence,
        }
    }

    pub fn skipped_for(&self, pass: Pass) -> usize {
        self.pass(pass).skipped
    }

    pub fn total_skipped(&self) -> usize {
        self.skipped.len()
    }
}

/// Classified batch plus its report
#[derive(Debug, Clone)]
pub struct ClassificationRun {
    pub transactions: Vec<Transaction>,
    pub report: RunReport,
}

/// Validated configuration with compiled rules
#[derive(Debug)]
pub struct Classifier {
    matcher: PatternMatcher,
    pairing: PairingConfig,
    recurrence: RecurrenceConfig,
}

impl Classifier {
    /// Fails on any configuration problem, before any row is touched
    pub fn new(config: &ClassifierConfig) -> Result<Self> {
        config.validate()?;
        let matcher = PatternMatcher::new(&config.rules, config.round_amount)?;
        Ok(Self {
            matcher,
            pairing: config.pairing,
            recurrence: config.recurrence,
        })
    }

    /// Run all three passes over the batch
    ///
    /// Deterministic: the same input and configuration give the same flags,
    /// and classifying an already classified batch changes nothing.
    pub fn classify_batch(&self, mut transactions: Vec<Transaction>) -> ClassificationRun {
        let mut report = RunReport::default();
        let examined = transactions.len();

        // Pass 1: per-row patterns
        report.pattern.examined = examined;
        for txn in transactions.iter_mut() {
            match self.matcher.try_classify(txn) {
                Ok(flags) => {
                    if flags.any() {
                        report.pattern.flagged += 1;
                    }
                    if flags.is_internal_transfer {
                        report.pattern_transfers += 1;
                        txn.is_internal_transfer = true;
                    }
                    if flags.is_refund {
                        report.pattern_refunds += 1;
                        txn.is_refund = true;
                    }
                }
                Err(e) => report.skipped.push(SkippedRow::from_error(Pass::Pattern, e)),
            }
        }
        report.pattern.skipped = count_for(&report.skipped, Pass::Pattern);
        info!(
            transfers = report.pattern_transfers,
            refunds = report.pattern_refunds,
            skipped = report.pattern.skipped,
            "Pattern pass complete"
        );

        // Pass 2: cross-account pairs
        let outcome = find_transfer_pairs(
            &transactions,
            self.pairing.window_days,
            self.pairing.tolerance,
        );
        report.pairing = PassReport {
            examined,
            flagged: outcome.pairs.len() * 2,
            skipped: outcome.skipped.len(),
        };
        for pair in &outcome.pairs {
            link(&mut transactions[pair.outflow_index], &pair.inflow_id);
            link(&mut transactions[pair.inflow_index], &pair.outflow_id);
        }
        info!(
            pairs = outcome.pairs.len(),
            skipped = report.pairing.skipped,
            "Pairing pass complete"
        );
        report.pairs = outcome.pairs;
        report.skipped.extend(outcome.skipped);

        // Pass 3: recurrence
        let outcome = flag_recurring(
            &transactions,
            self.recurrence.trailing_months,
            self.recurrence.min_distinct_months,
        );
        report.recurrence = PassReport {
            examined,
            flagged: outcome.flagged.len(),
            skipped: outcome.skipped.len(),
        };
        for &index in &outcome.flagged {
            transactions[index].is_recurring = true;
        }
        info!(
            merchants = outcome.merchants.len(),
            rows = outcome.flagged.len(),
            skipped = report.recurrence.skipped,
            "Recurrence pass complete"
        );
        report.recurring_merchants = outcome.merchants;
        report.skipped.extend(outcome.skipped);

        ClassificationRun {
            transactions,
            report,
        }
    }
}

/// Validate `config` and classify one batch
pub fn classify_batch(
    transactions: Vec<Transaction>,
    config: &ClassifierConfig,
) -> Result<ClassificationRun> {
    Ok(Classifier::new(config)?.classify_batch(transactions))
}

fn link(txn: &mut Transaction, counterpart: &str) {
    txn.is_internal_transfer = true;
    if txn.transfer_counterpart.is_none() {
        txn.transfer_counterpart = Some(counterpart.to_string());
    }
}

fn count_for(skipped: &[SkippedRow], pass: Pass) -> usize {
    skipped.iter().filter(|s| s.pass == pass).count()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::PatternRule;
    use crate::models::{PatternType, RuleAction};
    use chrono::{Duration, NaiveDate, NaiveDateTime};

    fn base() -> NaiveDateTime {
        NaiveDate::from_ymd_opt(2025, 3, 3)
            .unwrap()
            .and_hms_opt(10, 0, 0)
            .unwrap()
    }

    fn txn(account: &str, days: i64, description: &str, amount: f64) -> Transaction {
        Transaction::new(account, base() + Duration::days(days), description, amount)
    }

    fn config() -> ClassifierConfig {
        ClassifierConfig::embedded().unwrap()
    }

    fn sample_batch() -> Vec<Transaction> {
        vec![
            txn("Everyday", 0, "SALARY ACME PTY LTD", 3000.0),
            txn("Everyday", 1, "MOVE MONEY", -500.0),
            txn("Saver", 2, "MOVE MONEY", 500.0),
            txn("Everyday", 3, "REFUND MYER", 50.0),
            txn("Everyday", 4, "PAYPAL TRANSFER", -200.0),
            txn("Everyday", -30, "NETFLIX.COM", -15.99),
            txn("Everyday", 0, "NETFLIX.COM", -15.99),
        ]
    }

    fn flags(t: &Transaction) -> (bool, bool, bool) {
        (t.is_internal_transfer, t.is_refund, t.is_recurring)
    }

    #[test]
    fn test_full_run() {
        let run = classify_batch(sample_batch(), &config()).unwrap();
        let t = &run.transactions;

        assert_eq!(flags(&t[0]), (false, false, false));
        assert_eq!(flags(&t[1]), (true, false, false));
        assert_eq!(flags(&t[2]), (true, false, false));
        assert_eq!(t[1].transfer_counterpart.as_deref(), Some(t[2].id.as_str()));
        assert_eq!(t[2].transfer_counterpart.as_deref(), Some(t[1].id.as_str()));
        assert_eq!(flags(&t[3]), (false, true, false));
        // Pattern alone, no counterpart
        assert_eq!(flags(&t[4]), (true, false, false));
        assert_eq!(t[4].transfer_counterpart, None);
        assert!(t[5].is_recurring && t[6].is_recurring);

        let report = &run.report;
        assert_eq!(report.pairs.len(), 1);
        assert_eq!(report.pattern_transfers, 1);
        assert_eq!(report.pattern_refunds, 1);
        assert_eq!(report.pairing.flagged, 2);
        assert_eq!(report.recurrence.flagged, 2);
        assert_eq!(report.total_skipped(), 0);
    }

    #[test]
    fn test_reclassification_is_idempotent() {
        let classifier = Classifier::new(&config()).unwrap();
        let once = classifier.classify_batch(sample_batch());
        let twice = classifier.classify_batch(once.transactions.clone());
        assert_eq!(once.transactions, twice.transactions);
    }

    #[test]
    fn test_reclassify_after_new_rows_keeps_pairs_exclusive() {
        let classifier = Classifier::new(&config()).unwrap();
        let first = classifier.classify_batch(vec![
            txn("Everyday", 0, "MOVE MONEY", -437.0),
            txn("Saver", 2, "MOVE MONEY", 437.0),
        ]);
        assert_eq!(first.report.pairs.len(), 1);

        let mut batch = first.transactions;
        batch.push(txn("Joint", 0, "GIFT FROM MUM", 437.0));
        let second = classifier.classify_batch(batch);
        let t = &second.transactions;

        assert_eq!(second.report.pairs.len(), 1);
        assert_eq!(t[1].transfer_counterpart.as_deref(), Some(t[0].id.as_str()));
        assert!(!t[2].is_internal_transfer);
        assert_eq!(t[2].transfer_counterpart, None);

        let naming_outflow = t
            .iter()
            .filter(|r| r.transfer_counterpart.as_deref() == Some(t[0].id.as_str()))
            .count();
        assert_eq!(naming_outflow, 1);
    }

    #[test]
    fn test_flags_never_downgraded() {
        let mut batch = sample_batch();
        batch[0].is_refund = true;
        batch[0].is_recurring = true;
        batch[0].is_internal_transfer = true;

        let run = classify_batch(batch, &config()).unwrap();
        assert_eq!(flags(&run.transactions[0]), (true, true, true));
    }

    #[test]
    fn test_existing_counterpart_kept() {
        let mut batch = sample_batch();
        batch[1].transfer_counterpart = Some("manual".to_string());

        let run = classify_batch(batch, &config()).unwrap();
        assert_eq!(
            run.transactions[1].transfer_counterpart.as_deref(),
            Some("manual")
        );
    }

    #[test]
    fn test_malformed_row_skipped_per_pass() {
        let mut batch = sample_batch();
        let mut undated = txn("Saver", 0, "INTEREST PAID", 1.23);
        undated.posted_at = None;
        batch.push(undated);
        let mut nan = txn("Saver", 0, "WEIRD ROW", 0.0);
        nan.amount = f64::NAN;
        batch.push(nan);

        let run = classify_batch(batch, &config()).unwrap();
        let report = &run.report;

        assert_eq!(report.skipped_for(Pass::Pattern), 1); // NaN
        assert_eq!(report.skipped_for(Pass::Pairing), 2); // both
        assert_eq!(report.skipped_for(Pass::Recurrence), 1); // undated
        assert_eq!(report.total_skipped(), 4);

        // Everything else still classified
        assert_eq!(report.pairs.len(), 1);
        assert_eq!(run.transactions.len(), 9);
        assert_eq!(flags(&run.transactions[7]), (false, false, false));
    }

    #[test]
    fn test_invalid_config_fails_before_processing() {
        let mut bad = config();
        bad.pairing.tolerance = 0.0;
        assert!(matches!(
            classify_batch(sample_batch(), &bad),
            Err(Error::Config(_))
        ));

        let mut bad = config();
        bad.rules.push(
            PatternRule::new("(", RuleAction::Refund).with_match_type(PatternType::Regex),
        );
        assert!(matches!(Classifier::new(&bad), Err(Error::Config(_))));
    }

    #[test]
    fn test_pattern_flagged_rows_still_pair() {
        let batch = vec![
            txn("Everyday", 0, "TRANSFER TO SAVER", -1000.0),
            txn("Saver", 1, "TRANSFER FROM EVERYDAY", 1000.0),
        ];
        let run = classify_batch(batch, &config()).unwrap();
        assert_eq!(run.report.pattern_transfers, 2);
        assert_eq!(run.report.pairs.len(), 1);
        assert!(run.transactions[0].transfer_counterpart.is_some());
    }
}
