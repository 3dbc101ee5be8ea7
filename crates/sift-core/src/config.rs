//! Classifier configuration
//!
//! Rules, thresholds and CSV source mappings are read from TOML.
//!
//! ## Configuration Resolution
//!
//! Config is loaded with a two-layer resolution:
//! 1. An explicit path, or the override in the data dir
//!    (~/.local/share/sift/config/classifier.toml)
//! 2. Embedded defaults (compiled into binary)
//!
//! An override only needs the keys it changes. A `[[rules]]` or `[[categories]]`
//! list in an override replaces the default list; `[sources.<name>]` tables
//! replace the source of the same name.

use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};

use serde::Deserialize;
use tracing::debug;

use crate::error::{Error, Result};
use crate::models::{AmountSign, PatternType, RefundPolicy, RuleAction, RuleStrength};

/// Embedded default config (compiled into binary)
const DEFAULT_CONFIG: &str = include_str!("../../../config/classifier.toml");

/// Amount shape that lets a generic transfer keyword flag a row
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RoundAmount {
    /// Magnitude must be a multiple of this
    pub unit: f64,
    /// Magnitude must be at least this
    pub floor: f64,
}

impl Default for RoundAmount {
    fn default() -> Self {
        Self {
            unit: 100.0,
            floor: 500.0,
        }
    }
}

impl RoundAmount {
    /// Large round amount, e.g. 500.00 or 1200.00 at the defaults
    pub fn matches(&self, amount: f64) -> bool {
        let magnitude = amount.abs();
        if !magnitude.is_finite() || magnitude < self.floor || magnitude == 0.0 {
            return false;
        }
        let remainder = magnitude % self.unit;
        remainder < 0.005 || (self.unit - remainder) < 0.005
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PairingConfig {
    /// Max |a.amount + b.amount| for a pair
    pub tolerance: f64,
    /// Max days between the two postings (inclusive)
    pub window_days: u32,
}

impl Default for PairingConfig {
    fn default() -> Self {
        Self {
            tolerance: 0.01,
            window_days: 3,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RecurrenceConfig {
    pub trailing_months: u32,
    pub min_distinct_months: u32,
}

impl Default for RecurrenceConfig {
    fn default() -> Self {
        Self {
            trailing_months: 3,
            min_distinct_months: 2,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct SummaryConfig {
    pub refund_policy: RefundPolicy,
}

/// A transfer/refund/exclude rule matched against transaction descriptions
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct PatternRule {
    pub pattern: String,
    #[serde(default)]
    pub match_type: PatternType,
    pub action: RuleAction,
    #[serde(default)]
    pub strength: RuleStrength,
    #[serde(default)]
    pub amount_sign: AmountSign,
}

impl PatternRule {
    /// Strong `contains` rule, the common case
    pub fn new(pattern: impl Into<String>, action: RuleAction) -> Self {
        Self {
            pattern: pattern.into(),
            match_type: PatternType::Contains,
            action,
            strength: RuleStrength::Strong,
            amount_sign: AmountSign::Any,
        }
    }

    pub fn with_match_type(mut self, match_type: PatternType) -> Self {
        self.match_type = match_type;
        self
    }

    pub fn with_strength(mut self, strength: RuleStrength) -> Self {
        self.strength = strength;
        self
    }

    pub fn with_amount_sign(mut self, amount_sign: AmountSign) -> Self {
        self.amount_sign = amount_sign;
        self
    }
}

/// Merchant category rule (regex, case-insensitive)
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct CategoryRule {
    pub pattern: String,
    pub category: String,
    #[serde(default)]
    pub subcategory: Option<String>,
    /// Marks matching rows as fixed expenses
    #[serde(default)]
    pub fixed: bool,
}

/// Column mapping for one bank's CSV export
///
/// Empty candidate lists fall back to the generic header names in
/// [`crate::import`].
#[derive(Debug, Clone, PartialEq, Default, Deserialize)]
#[serde(default)]
pub struct SourceConfig {
    /// Logical account id; defaults to the source name
    pub account: Option<String>,
    pub currency: Option<String>,
    pub date_cols: Vec<String>,
    /// chrono format tried before the built-in formats
    pub date_format: Option<String>,
    pub desc_cols: Vec<String>,
    pub amount_cols: Vec<String>,
    pub balance_cols: Vec<String>,
    pub debit_cols: Vec<String>,
    pub credit_cols: Vec<String>,
    /// Flip signs for exports that show charges as positive
    pub negate_amounts: bool,
}

/// Complete classifier configuration
#[derive(Debug, Clone, PartialEq, Default)]
pub struct ClassifierConfig {
    pub round_amount: RoundAmount,
    pub pairing: PairingConfig,
    pub recurrence: RecurrenceConfig,
    pub summary: SummaryConfig,
    /// Evaluated in order
    pub rules: Vec<PatternRule>,
    /// First match wins
    pub categories: Vec<CategoryRule>,
    pub sources: BTreeMap<String, SourceConfig>,
}

impl ClassifierConfig {
    /// The embedded default configuration
    pub fn embedded() -> Result<Self> {
        let mut config = Self::default();
        apply(&mut config, parse_raw(DEFAULT_CONFIG)?);
        config.validate()?;
        Ok(config)
    }

    /// Source mapping by name, or an empty mapping (generic columns)
    pub fn source(&self, name: &str) -> SourceConfig {
        self.sources
            .get(&name.to_lowercase())
            .cloned()
            .unwrap_or_default()
    }

    /// Check thresholds. Regex syntax is checked when the rules are compiled.
    pub fn validate(&self) -> Result<()> {
        let RoundAmount { unit, floor } = self.round_amount;
        if !(unit.is_finite() && unit > 0.0) {
            return Err(Error::Config(format!(
                "round_amount.unit must be positive, got {}",
                unit
            )));
        }
        if !(floor.is_finite() && floor >= 0.0) {
            return Err(Error::Config(format!(
                "round_amount.floor must not be negative, got {}",
                floor
            )));
        }

        let tolerance = self.pairing.tolerance;
        if !(tolerance.is_finite() && tolerance > 0.0) {
            return Err(Error::Config(format!(
                "pairing.tolerance must be positive, got {}",
                tolerance
            )));
        }
        if self.pairing.window_days == 0 {
            return Err(Error::Config(
                "pairing.window_days must be at least 1".to_string(),
            ));
        }

        let RecurrenceConfig {
            trailing_months,
            min_distinct_months,
        } = self.recurrence;
        if trailing_months == 0 {
            return Err(Error::Config(
                "recurrence.trailing_months must be at least 1".to_string(),
            ));
        }
        if min_distinct_months == 0 || min_distinct_months > trailing_months {
            return Err(Error::Config(format!(
                "recurrence.min_distinct_months must be between 1 and {}, got {}",
                trailing_months, min_distinct_months
            )));
        }

        for (i, rule) in self.rules.iter().enumerate() {
            if rule.pattern.trim().is_empty() {
                return Err(Error::Config(format!("rules[{}] has an empty pattern", i)));
            }
        }
        for (i, rule) in self.categories.iter().enumerate() {
            if rule.pattern.trim().is_empty() || rule.category.trim().is_empty() {
                return Err(Error::Config(format!(
                    "categories[{}] needs a pattern and a category",
                    i
                )));
            }
        }

        Ok(())
    }
}

/// Default config override path
pub fn default_config_path() -> Option<PathBuf> {
    dirs::data_local_dir().map(|d| d.join("sift").join("config").join("classifier.toml"))
}

/// Load configuration (explicit path, then override location, then embedded)
///
/// An explicit path that does not exist is an error; a missing file at the
/// default override location is not.
pub fn load_config(path: Option<&Path>) -> Result<ClassifierConfig> {
    let content = match path {
        Some(path) => Some(fs::read_to_string(path).map_err(|e| {
            Error::Config(format!("Failed to read config {}: {}", path.display(), e))
        })?),
        None => match default_config_path() {
            Some(default_path) if default_path.exists() => {
                debug!(path = %default_path.display(), "Using config override");
                Some(fs::read_to_string(&default_path).map_err(|e| {
                    Error::Config(format!(
                        "Failed to read config {}: {}",
                        default_path.display(),
                        e
                    ))
                })?)
            }
            _ => None,
        },
    };

    match content {
        Some(content) => parse_config(&content),
        None => ClassifierConfig::embedded(),
    }
}

/// Parse an override on top of the embedded defaults
pub fn parse_config(content: &str) -> Result<ClassifierConfig> {
    let mut config = ClassifierConfig::default();
    apply(&mut config, parse_raw(DEFAULT_CONFIG)?);
    apply(&mut config, parse_raw(content)?);
    config.validate()?;
    Ok(config)
}

/// Raw config structure for TOML parsing
#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct RawConfig {
    round_amount: Option<RawRoundAmount>,
    pairing: Option<RawPairing>,
    recurrence: Option<RawRecurrence>,
    summary: Option<RawSummary>,
    rules: Option<Vec<PatternRule>>,
    categories: Option<Vec<CategoryRule>>,
    sources: Option<BTreeMap<String, SourceConfig>>,
}

#[derive(Debug, Deserialize)]
struct RawRoundAmount {
    unit: Option<f64>,
    floor: Option<f64>,
}

#[derive(Debug, Deserialize)]
struct RawPairing {
    tolerance: Option<f64>,
    window_days: Option<u32>,
}

#[derive(Debug, Deserialize)]
struct RawRecurrence {
    trailing_months: Option<u32>,
    min_distinct_months: Option<u32>,
}

#[derive(Debug, Deserialize)]
struct RawSummary {
    refund_policy: Option<RefundPolicy>,
}

fn parse_raw(content: &str) -> Result<RawConfig> {
    toml::from_str(content).map_err(|e| Error::Config(format!("Invalid config TOML: {}", e)))
}

fn apply(config: &mut ClassifierConfig, raw: RawConfig) {
    if let Some(round) = raw.round_amount {
        if let Some(unit) = round.unit {
            config.round_amount.unit = unit;
        }
        if let Some(floor) = round.floor {
            config.round_amount.floor = floor;
        }
    }

    if let Some(pairing) = raw.pairing {
        if let Some(tolerance) = pairing.tolerance {
            config.pairing.tolerance = tolerance;
        }
        if let Some(window) = pairing.window_days {
            config.pairing.window_days = window;
        }
    }

    if let Some(recurrence) = raw.recurrence {
        if let Some(months) = recurrence.trailing_months {
            config.recurrence.trailing_months = months;
        }
        if let Some(min) = recurrence.min_distinct_months {
            config.recurrence.min_distinct_months = min;
        }
    }

    if let Some(summary) = raw.summary {
        if let Some(policy) = summary.refund_policy {
            config.summary.refund_policy = policy;
        }
    }

    if let Some(rules) = raw.rules {
        config.rules = rules;
    }
    if let Some(categories) = raw.categories {
        config.categories = categories;
    }
    if let Some(sources) = raw.sources {
        for (name, source) in sources {
            config.sources.insert(name.to_lowercase(), source);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_default_config() {
        let config = ClassifierConfig::embedded().unwrap();
        assert_eq!(config.round_amount, RoundAmount::default());
        assert_eq!(config.pairing, PairingConfig::default());
        assert_eq!(config.recurrence, RecurrenceConfig::default());
        assert_eq!(config.summary.refund_policy, RefundPolicy::OffsetExpenses);
        assert!(!config.rules.is_empty());
        assert!(!config.categories.is_empty());
        assert!(config.sources.contains_key("ubank"));
    }

    #[test]
    fn test_default_rules_cover_each_action() {
        let config = ClassifierConfig::embedded().unwrap();
        for action in [RuleAction::Transfer, RuleAction::Refund, RuleAction::Exclude] {
            assert!(
                config.rules.iter().any(|r| r.action == action),
                "no {} rule",
                action
            );
        }
        assert!(config
            .rules
            .iter()
            .any(|r| r.strength == RuleStrength::Generic));
    }

    #[test]
    fn test_override_keeps_unset_defaults() {
        let config = parse_config(
            r#"
[pairing]
window_days = 5

[summary]
refund_policy = "separate"
"#,
        )
        .unwrap();

        assert_eq!(config.pairing.window_days, 5);
        assert_eq!(config.pairing.tolerance, 0.01);
        assert_eq!(config.summary.refund_policy, RefundPolicy::Separate);
        // Lists not mentioned in the override stay as embedded
        assert!(!config.rules.is_empty());
    }

    #[test]
    fn test_override_replaces_rule_list() {
        let config = parse_config(
            r#"
[[rules]]
pattern = "MOVE MONEY"
action = "transfer"
"#,
        )
        .unwrap();

        assert_eq!(config.rules.len(), 1);
        assert_eq!(config.rules[0], PatternRule::new("MOVE MONEY", RuleAction::Transfer));
    }

    #[test]
    fn test_override_adds_source() {
        let config = parse_config(
            r#"
[sources.Westpac]
account = "Westpac Choice"
date_format = "%d/%m/%Y"
debit_cols = ["Debit Amount"]
credit_cols = ["Credit Amount"]
"#,
        )
        .unwrap();

        let westpac = config.source("westpac");
        assert_eq!(westpac.account.as_deref(), Some("Westpac Choice"));
        assert_eq!(westpac.debit_cols, vec!["Debit Amount".to_string()]);
        assert!(config.sources.contains_key("ubank"));
        assert_eq!(config.source("unknown"), SourceConfig::default());
    }

    #[test]
    fn test_invalid_values_are_config_errors() {
        let cases = [
            "[pairing]\ntolerance = 0.0",
            "[pairing]\ntolerance = -1.0",
            "[pairing]\nwindow_days = 0",
            "[recurrence]\ntrailing_months = 0",
            "[recurrence]\nmin_distinct_months = 4",
            "[round_amount]\nunit = 0.0",
            "[summary]\nrefund_policy = \"sometimes\"",
            "[[rules]]\npattern = \"X\"\naction = \"teleport\"",
            "[[rules]]\npattern = \"  \"\naction = \"refund\"",
            "not toml at all [",
        ];
        for case in cases {
            match parse_config(case) {
                Err(Error::Config(_)) => {}
                other => panic!("expected config error for {:?}, got {:?}", case, other),
            }
        }
    }

    #[test]
    fn test_load_missing_explicit_path_fails() {
        let dir = tempfile::tempdir().unwrap();
        let result = load_config(Some(&dir.path().join("nope.toml")));
        assert!(matches!(result, Err(Error::Config(_))));
    }

    #[test]
    fn test_load_explicit_path() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("classifier.toml");
        fs::write(&path, "[recurrence]\ntrailing_months = 6\nmin_distinct_months = 3\n").unwrap();

        let config = load_config(Some(&path)).unwrap();
        assert_eq!(config.recurrence.trailing_months, 6);
        assert_eq!(config.recurrence.min_distinct_months, 3);
    }

    #[test]
    fn test_round_amount_shape() {
        let round = RoundAmount::default();
        assert!(round.matches(500.0));
        assert!(round.matches(-1200.0));
        assert!(round.matches(-1500.00));
        assert!(!round.matches(400.0)); // below floor
        assert!(!round.matches(550.0)); // not a multiple
        assert!(!round.matches(523.45));
        assert!(!round.matches(0.0));
        assert!(!round.matches(f64::NAN));
    }
}
