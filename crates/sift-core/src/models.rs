//! Domain models for Sift

use chrono::{Datelike, NaiveDate, NaiveDateTime};
use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};
use crate::import::{clean_merchant, fingerprint};

/// A normalized bank or card transaction
///
/// Identity fields are fixed at ingestion. The classification flags only ever
/// go from `false` to `true` during a run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Transaction {
    /// Fingerprint of account, posted_at, amount and description
    pub id: String,
    /// `None` when the source value could not be parsed
    pub posted_at: Option<NaiveDateTime>,
    /// Raw description as exported by the bank
    pub description: String,
    /// Cleaned merchant text, used for recurrence grouping
    pub merchant: String,
    /// Negative = outflow, positive = inflow
    pub amount: f64,
    pub currency: String,
    /// Logical account identifier
    pub account: String,
    pub balance: Option<f64>,
    pub category: Option<String>,
    pub subcategory: Option<String>,
    /// Fixed expense (rent, insurance, ...), set by merchant category rules
    pub is_fixed: bool,
    pub is_internal_transfer: bool,
    pub is_refund: bool,
    pub is_recurring: bool,
    /// Id of the other side of a confirmed transfer pair
    pub transfer_counterpart: Option<String>,
    /// Where the row came from (CSV source name)
    pub source: String,
}

impl Transaction {
    /// Build an unlabeled transaction, deriving its id and merchant
    pub fn new(
        account: impl Into<String>,
        posted_at: NaiveDateTime,
        description: impl Into<String>,
        amount: f64,
    ) -> Self {
        let account = account.into();
        let description = description.into();
        Self {
            id: fingerprint(&account, Some(posted_at), amount, &description),
            posted_at: Some(posted_at),
            merchant: clean_merchant(&description),
            description,
            amount,
            currency: "AUD".to_string(),
            account,
            balance: None,
            category: None,
            subcategory: None,
            is_fixed: false,
            is_internal_transfer: false,
            is_refund: false,
            is_recurring: false,
            transfer_counterpart: None,
            source: String::new(),
        }
    }

    /// Calendar date of the posting, if known
    pub fn date(&self) -> Option<NaiveDate> {
        self.posted_at.map(|dt| dt.date())
    }

    pub fn is_inflow(&self) -> bool {
        self.amount > 0.0
    }

    pub fn is_outflow(&self) -> bool {
        self.amount < 0.0
    }
}

/// How a rule pattern is compared against a description
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum PatternType {
    /// Case-insensitive substring match (supports | for OR)
    #[default]
    Contains,
    /// Regular expression match (case-insensitive)
    Regex,
    /// Exact string match (case-insensitive)
    Exact,
}

impl PatternType {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Contains => "contains",
            Self::Regex => "regex",
            Self::Exact => "exact",
        }
    }
}

impl std::str::FromStr for PatternType {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "contains" => Ok(Self::Contains),
            "regex" => Ok(Self::Regex),
            "exact" => Ok(Self::Exact),
            _ => Err(format!("Unknown pattern type: {}", s)),
        }
    }
}

impl std::fmt::Display for PatternType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// What a matching pattern rule contributes
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RuleAction {
    /// Candidate internal transfer
    Transfer,
    /// Refund, return or reversal
    Refund,
    /// Legitimate expense phrasing that vetoes generic transfer matches
    Exclude,
}

impl RuleAction {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Transfer => "transfer",
            Self::Refund => "refund",
            Self::Exclude => "exclude",
        }
    }
}

impl std::fmt::Display for RuleAction {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Whether a transfer keyword is enough on its own
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum RuleStrength {
    /// Specific phrasing ("PAYMENT THANK YOU", "PAYPAL TRANSFER"): flags alone
    #[default]
    Strong,
    /// Generic keyword ("TRANSFER", "DEPOSIT"): needs a large round amount too
    Generic,
}

/// Amount sign a rule is restricted to
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum AmountSign {
    #[default]
    Any,
    Inflow,
    Outflow,
}

impl AmountSign {
    pub fn admits(&self, amount: f64) -> bool {
        match self {
            Self::Any => true,
            Self::Inflow => amount > 0.0,
            Self::Outflow => amount < 0.0,
        }
    }
}

/// How refunds are treated on the expense side of a summary
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum RefundPolicy {
    /// Positive refunds stay in real expenses as a negative offset
    #[default]
    OffsetExpenses,
    /// Refund rows are left out of real expenses entirely
    Separate,
}

impl RefundPolicy {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::OffsetExpenses => "offset_expenses",
            Self::Separate => "separate",
        }
    }
}

impl std::str::FromStr for RefundPolicy {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.to_lowercase().replace('-', "_").as_str() {
            "offset_expenses" | "offset" => Ok(Self::OffsetExpenses),
            "separate" => Ok(Self::Separate),
            _ => Err(format!(
                "Unknown refund policy: {} (valid: offset_expenses, separate)",
                s
            )),
        }
    }
}

// ========== Report Models ==========

/// Inclusive date range a summary covers
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Period {
    pub from: NaiveDate,
    pub to: NaiveDate,
}

impl Period {
    pub fn new(from: NaiveDate, to: NaiveDate) -> Result<Self> {
        if from > to {
            return Err(Error::InvalidData(format!(
                "Period start {} is after end {}",
                from, to
            )));
        }
        Ok(Self { from, to })
    }

    /// The whole calendar month
    pub fn month(year: i32, month: u32) -> Result<Self> {
        let from = NaiveDate::from_ymd_opt(year, month, 1)
            .ok_or_else(|| Error::InvalidData(format!("Invalid month: {}-{:02}", year, month)))?;
        let next = if month == 12 {
            NaiveDate::from_ymd_opt(year + 1, 1, 1)
        } else {
            NaiveDate::from_ymd_opt(year, month + 1, 1)
        };
        let to = next
            .and_then(|d| d.pred_opt())
            .ok_or_else(|| Error::InvalidData(format!("Invalid month: {}-{:02}", year, month)))?;
        Ok(Self { from, to })
    }

    /// Parse a `YYYY-MM` month label
    pub fn parse_month(label: &str) -> Result<Self> {
        let (year, month) = label
            .trim()
            .split_once('-')
            .ok_or_else(|| Error::InvalidData(format!("Expected YYYY-MM, got: {}", label)))?;
        let year: i32 = year
            .parse()
            .map_err(|_| Error::InvalidData(format!("Invalid year in: {}", label)))?;
        let month: u32 = month
            .parse()
            .map_err(|_| Error::InvalidData(format!("Invalid month in: {}", label)))?;
        Self::month(year, month)
    }

    pub fn contains(&self, date: NaiveDate) -> bool {
        date >= self.from && date <= self.to
    }

    /// `YYYY-MM` for whole calendar months, `from..to` otherwise
    pub fn label(&self) -> String {
        let whole_month = self.from.day() == 1
            && Self::month(self.from.year(), self.from.month())
                .map(|m| m.to == self.to)
                .unwrap_or(false);
        if whole_month {
            self.from.format("%Y-%m").to_string()
        } else {
            format!("{}..{}", self.from, self.to)
        }
    }
}

impl std::fmt::Display for Period {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.label())
    }
}

/// Cash-flow summary for a period
///
/// Gross and real figures are always reported together. Expenses are negative.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Summary {
    pub period: Period,
    pub gross_income: f64,
    pub gross_expenses: f64,
    pub real_income: f64,
    pub real_expenses: f64,
    pub transfer_total: f64,
    pub transfer_count: usize,
    pub refund_total: f64,
    pub refund_count: usize,
    pub net: f64,
    pub transaction_count: usize,
    /// Rows that are neither transfers nor refunds
    pub real_transaction_count: usize,
}

/// Real spending or income for one category in a period
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CategoryTotal {
    /// `None` for uncategorized rows
    pub category: Option<String>,
    pub total: f64,
    pub count: usize,
}
