//! Description pattern rules for transfers and refunds
//!
//! Stateless: each transaction is judged on its own description and amount.

use regex::{Regex, RegexBuilder};
use tracing::debug;

use crate::config::{PatternRule, RoundAmount};
use crate::error::{Error, Result};
use crate::models::{AmountSign, PatternType, RuleAction, RuleStrength, Transaction};

/// Flags the pattern pass can raise
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct PatternFlags {
    pub is_internal_transfer: bool,
    pub is_refund: bool,
}

impl PatternFlags {
    pub fn any(&self) -> bool {
        self.is_internal_transfer || self.is_refund
    }
}

#[derive(Debug)]
enum Matcher {
    /// Upper-cased alternatives
    Contains(Vec<String>),
    Regex(Regex),
    Exact(String),
}

impl Matcher {
    fn compile(rule: &PatternRule) -> Result<Self> {
        Ok(match rule.match_type {
            PatternType::Contains => Self::Contains(
                rule.pattern
                    .split('|')
                    .map(|p| p.trim().to_uppercase())
                    .filter(|p| !p.is_empty())
                    .collect(),
            ),
            PatternType::Regex => Self::Regex(
                RegexBuilder::new(&rule.pattern)
                    .case_insensitive(true)
                    .build()
                    .map_err(|e| {
                        Error::Config(format!("Invalid rule pattern '{}': {}", rule.pattern, e))
                    })?,
            ),
            PatternType::Exact => Self::Exact(rule.pattern.trim().to_uppercase()),
        })
    }

    fn is_match(&self, desc_upper: &str) -> bool {
        match self {
            Self::Contains(alternatives) => alternatives.iter().any(|p| desc_upper.contains(p)),
            Self::Regex(re) => re.is_match(desc_upper),
            Self::Exact(s) => desc_upper == s,
        }
    }
}

#[derive(Debug)]
struct CompiledRule {
    pattern: String,
    matcher: Matcher,
    action: RuleAction,
    strength: RuleStrength,
    amount_sign: AmountSign,
}

/// Compiled transfer/refund rules
#[derive(Debug)]
pub struct PatternMatcher {
    rules: Vec<CompiledRule>,
    round: RoundAmount,
}

impl PatternMatcher {
    /// Compile rules in order. Bad regex syntax is a configuration error.
    pub fn new(rules: &[PatternRule], round: RoundAmount) -> Result<Self> {
        let rules = rules
            .iter()
            .map(|rule| {
                Ok(CompiledRule {
                    pattern: rule.pattern.clone(),
                    matcher: Matcher::compile(rule)?,
                    action: rule.action,
                    strength: rule.strength,
                    amount_sign: rule.amount_sign,
                })
            })
            .collect::<Result<Vec<_>>>()?;
        Ok(Self { rules, round })
    }

    /// Judge one transaction
    ///
    /// A strong transfer rule flags on its own. A generic one also needs a
    /// large round amount and no matching exclude rule. Any refund rule flags
    /// a refund whatever the amount sign.
    pub fn classify(&self, txn: &Transaction) -> PatternFlags {
        let desc_upper = txn.description.to_uppercase();

        let mut strong = false;
        let mut generic = false;
        let mut excluded = false;
        let mut refund = false;

        for rule in &self.rules {
            if !rule.amount_sign.admits(txn.amount) || !rule.matcher.is_match(&desc_upper) {
                continue;
            }
            match (rule.action, rule.strength) {
                (RuleAction::Transfer, RuleStrength::Strong) => strong = true,
                (RuleAction::Transfer, RuleStrength::Generic) => generic = true,
                (RuleAction::Exclude, _) => excluded = true,
                (RuleAction::Refund, _) => refund = true,
            }
            debug!(id = %txn.id, rule = %rule.pattern, action = %rule.action, "Rule matched");
        }

        let transfer = strong || (generic && !excluded && self.round.matches(txn.amount));
        if generic && !strong && !transfer {
            debug!(
                id = %txn.id,
                amount = txn.amount,
                excluded,
                "Generic transfer keyword without round amount"
            );
        }

        PatternFlags {
            is_internal_transfer: transfer,
            is_refund: refund,
        }
    }

    /// Like [`classify`](Self::classify), but a non-finite amount is malformed
    pub fn try_classify(&self, txn: &Transaction) -> Result<PatternFlags> {
        if !txn.amount.is_finite() {
            return Err(Error::malformed(&txn.id, "amount is not a finite number"));
        }
        Ok(self.classify(txn))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::ClassifierConfig;
    use chrono::NaiveDate;

    fn txn(description: &str, amount: f64) -> Transaction {
        let posted = NaiveDate::from_ymd_opt(2025, 5, 10)
            .unwrap()
            .and_hms_opt(12, 0, 0)
            .unwrap();
        Transaction::new("ubank Spend", posted, description, amount)
    }

    fn default_matcher() -> PatternMatcher {
        let config = ClassifierConfig::embedded().unwrap();
        PatternMatcher::new(&config.rules, config.round_amount).unwrap()
    }

    #[test]
    fn test_peer_payment_flags_alone() {
        let matcher = default_matcher();
        let flags = matcher.classify(&txn("PAYPAL TRANSFER", -200.0));
        assert!(flags.is_internal_transfer);
        assert!(!flags.is_refund);
    }

    #[test]
    fn test_card_repayment() {
        let matcher = default_matcher();
        assert!(
            matcher
                .classify(&txn("PAYMENT THANK YOU", 1234.56))
                .is_internal_transfer
        );
        assert!(
            matcher
                .classify(&txn("COMMBANK CREDIT CARD PAYMENT", -87.10))
                .is_internal_transfer
        );
        assert!(
            matcher
                .classify(&txn("BPAY AMEX CARD 3791", -310.00))
                .is_internal_transfer
        );
    }

    #[test]
    fn test_generic_keyword_needs_round_amount() {
        let matcher = default_matcher();
        assert!(
            matcher
                .classify(&txn("TRANSFER TO SAVINGS", -1000.0))
                .is_internal_transfer
        );
        assert!(
            !matcher
                .classify(&txn("TRANSFER TO SAVINGS", -123.45))
                .is_internal_transfer
        );
        // Round, but under the floor
        assert!(
            !matcher
                .classify(&txn("ATM WITHDRAWAL", -200.0))
                .is_internal_transfer
        );
    }

    #[test]
    fn test_round_amount_alone_never_flags() {
        let matcher = default_matcher();
        assert!(!matcher.classify(&txn("JB HI-FI", -1500.0)).any());
    }

    #[test]
    fn test_exclude_vetoes_generic_only() {
        let matcher = default_matcher();
        assert!(
            !matcher
                .classify(&txn("RENT TRANSFER MAY", -2000.0))
                .is_internal_transfer
        );
        // Strong rule still wins over an exclude
        assert!(
            matcher
                .classify(&txn("BPAY VISA CARD PAYMENT", -600.0))
                .is_internal_transfer
        );
    }

    #[test]
    fn test_refund_any_sign() {
        let matcher = default_matcher();
        assert!(matcher.classify(&txn("REFUND - MYER", 50.0)).is_refund);
        assert!(matcher.classify(&txn("REVERSAL OF FEE", -5.0)).is_refund);
        assert!(matcher.classify(&txn("Merchant Credit KMART", 19.0)).is_refund);
        assert!(!matcher.classify(&txn("DIRECT CREDIT SALARY", 3000.0)).is_refund);
        assert!(!matcher.classify(&txn("RETURNS-R-US PURCHASE", -10.0)).is_refund);
    }

    #[test]
    fn test_amount_sign_restriction() {
        let rules = vec![PatternRule::new("PAYMENT THANK YOU", RuleAction::Transfer)
            .with_amount_sign(AmountSign::Inflow)];
        let matcher = PatternMatcher::new(&rules, RoundAmount::default()).unwrap();

        assert!(
            matcher
                .classify(&txn("PAYMENT THANK YOU", 100.0))
                .is_internal_transfer
        );
        assert!(
            !matcher
                .classify(&txn("PAYMENT THANK YOU", -100.0))
                .is_internal_transfer
        );
    }

    #[test]
    fn test_match_types() {
        let rules = vec![
            PatternRule::new("sweep", RuleAction::Transfer).with_match_type(PatternType::Exact),
            PatternRule::new(r"^ret\w+$", RuleAction::Refund).with_match_type(PatternType::Regex),
        ];
        let matcher = PatternMatcher::new(&rules, RoundAmount::default()).unwrap();

        assert!(matcher.classify(&txn("Sweep", -5.0)).is_internal_transfer);
        assert!(!matcher.classify(&txn("SWEEP OUT", -5.0)).is_internal_transfer);
        assert!(matcher.classify(&txn("returned", 5.0)).is_refund);
        assert!(!matcher.classify(&txn("returned item", 5.0)).is_refund);
    }

    #[test]
    fn test_bad_regex_is_config_error() {
        let rules =
            vec![PatternRule::new("([", RuleAction::Refund).with_match_type(PatternType::Regex)];
        let err = PatternMatcher::new(&rules, RoundAmount::default()).unwrap_err();
        assert!(matches!(err, Error::Config(_)));
    }

    #[test]
    fn test_non_finite_amount_is_malformed() {
        let matcher = default_matcher();
        let mut t = txn("PAYPAL TRANSFER", 0.0);
        t.amount = f64::NAN;
        assert!(matches!(
            matcher.try_classify(&t),
            Err(Error::MalformedTransaction { .. })
        ));
    }
}
