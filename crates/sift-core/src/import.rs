//! CSV import for bank and card exports
//!
//! Columns are located by per-source candidate header names (case-insensitive),
//! so one parser handles every bank. Rows with no parseable date or amount are
//! dropped and counted; duplicate fingerprints within one file are dropped with
//! a warning.

use std::collections::HashSet;
use std::io::Read;
use std::sync::OnceLock;

use chrono::{NaiveDate, NaiveDateTime};
use csv::{ReaderBuilder, StringRecord};
use regex::Regex;
use sha2::{Digest, Sha256};
use tracing::{debug, warn};

use crate::config::SourceConfig;
use crate::error::{Error, Result};
use crate::models::Transaction;

const DEFAULT_DATE_COLS: &[&str] = &["Date", "Transaction Date", "Posted Date", "Date and time"];
const DEFAULT_DESC_COLS: &[&str] = &["Description", "Narrative", "Details", "Memo"];
const DEFAULT_AMOUNT_COLS: &[&str] = &["Amount", "Value"];
const DEFAULT_BALANCE_COLS: &[&str] = &["Balance", "Running Balance"];
const DEFAULT_DEBIT_COLS: &[&str] = &["Debit"];
const DEFAULT_CREDIT_COLS: &[&str] = &["Credit"];

/// Date formats tried after the source's own `date_format`
const DATETIME_FORMATS: &[&str] = &[
    "%Y-%m-%d %H:%M:%S",
    "%Y-%m-%dT%H:%M:%S",
    "%Y-%m-%d %H:%M",
    "%H:%M %d-%m-%y", // ubank: 13:26 25-08-25
];
const DATE_FORMATS: &[&str] = &[
    "%d/%m/%Y", // 15/01/2024
    "%d/%m/%y", // 15/01/24
    "%Y-%m-%d", // 2024-01-15
    "%d-%m-%Y", // 15-01-2024
    "%d %b %Y", // 15 Jan 2024
];

/// Parsed rows plus what was dropped on the way
#[derive(Debug, Default)]
pub struct ImportResult {
    pub transactions: Vec<Transaction>,
    /// No parseable date or amount
    pub dropped_rows: usize,
    /// Same fingerprint as an earlier row in this file
    pub duplicate_rows: usize,
}

/// Column positions resolved from the header row
#[derive(Debug)]
struct Columns {
    date: usize,
    desc: usize,
    amount: Amounts,
    balance: Option<usize>,
}

#[derive(Debug)]
enum Amounts {
    Single(usize),
    DebitCredit { debit: usize, credit: usize },
}

/// Parse a CSV export into normalized transactions
///
/// `source_name` becomes the transaction's `source` and, unless the source
/// config names one, its `account`.
pub fn parse_csv<R: Read>(
    reader: R,
    source: &SourceConfig,
    source_name: &str,
) -> Result<ImportResult> {
    let mut rdr = ReaderBuilder::new()
        .has_headers(true)
        .flexible(true)
        .trim(csv::Trim::All)
        .from_reader(reader);

    let headers = rdr.headers()?.clone();
    let columns = resolve_columns(&headers, source)?;

    let account = source
        .account
        .clone()
        .unwrap_or_else(|| source_name.to_string());
    let currency = source.currency.clone().unwrap_or_else(|| "AUD".to_string());

    let mut result = ImportResult::default();
    let mut seen = HashSet::new();

    for (line, record) in rdr.records().enumerate() {
        let record = record?;
        let row = line + 2; // header is row 1

        let date_str = record.get(columns.date).unwrap_or("");
        let posted_at = match parse_datetime(date_str, source.date_format.as_deref()) {
            Ok(dt) => dt,
            Err(e) => {
                debug!(row, "Dropping row: {}", e);
                result.dropped_rows += 1;
                continue;
            }
        };

        let amount = match read_amount(&record, &columns.amount) {
            Ok(amount) if source.negate_amounts => -amount,
            Ok(amount) => amount,
            Err(e) => {
                debug!(row, "Dropping row: {}", e);
                result.dropped_rows += 1;
                continue;
            }
        };

        let description = record.get(columns.desc).unwrap_or("").to_string();

        let mut txn = Transaction::new(account.clone(), posted_at, description, amount);
        if !seen.insert(txn.id.clone()) {
            result.duplicate_rows += 1;
            continue;
        }
        txn.currency = currency.clone();
        txn.source = source_name.to_string();
        txn.balance = columns
            .balance
            .and_then(|i| record.get(i))
            .filter(|s| !s.is_empty())
            .and_then(|s| parse_amount(s).ok());

        result.transactions.push(txn);
    }

    if result.duplicate_rows > 0 {
        warn!(
            "Found {} duplicate transactions within the current file",
            result.duplicate_rows
        );
    }
    debug!(
        "Parsed {} {} transactions ({} dropped)",
        result.transactions.len(),
        source_name,
        result.dropped_rows
    );
    Ok(result)
}

fn resolve_columns(headers: &StringRecord, source: &SourceConfig) -> Result<Columns> {
    let available = || headers.iter().collect::<Vec<_>>().join(", ");

    let date = guess_column(headers, &source.date_cols, DEFAULT_DATE_COLS).ok_or_else(|| {
        Error::Import(format!("No date column found. Available columns: {}", available()))
    })?;
    let desc = guess_column(headers, &source.desc_cols, DEFAULT_DESC_COLS).ok_or_else(|| {
        Error::Import(format!(
            "No description column found. Available columns: {}",
            available()
        ))
    })?;

    let debit = guess_column(headers, &source.debit_cols, DEFAULT_DEBIT_COLS);
    let credit = guess_column(headers, &source.credit_cols, DEFAULT_CREDIT_COLS);
    let amount = match (debit, credit) {
        (Some(debit), Some(credit)) => Amounts::DebitCredit { debit, credit },
        _ => Amounts::Single(
            guess_column(headers, &source.amount_cols, DEFAULT_AMOUNT_COLS).ok_or_else(|| {
                Error::Import(format!(
                    "Could not determine amount from columns: {}",
                    available()
                ))
            })?,
        ),
    };

    Ok(Columns {
        date,
        desc,
        amount,
        balance: guess_column(headers, &source.balance_cols, DEFAULT_BALANCE_COLS),
    })
}

/// Index of the first candidate present in the header (case-insensitive)
fn guess_column(headers: &StringRecord, configured: &[String], fallback: &[&str]) -> Option<usize> {
    let find = |candidate: &str| {
        headers
            .iter()
            .position(|h| h.trim().eq_ignore_ascii_case(candidate.trim()))
    };
    if configured.is_empty() {
        fallback.iter().find_map(|c| find(c))
    } else {
        configured.iter().find_map(|c| find(c))
    }
}

fn read_amount(record: &StringRecord, amounts: &Amounts) -> Result<f64> {
    match *amounts {
        Amounts::Single(i) => parse_amount(record.get(i).unwrap_or("")),
        Amounts::DebitCredit { debit, credit } => {
            let part = |i: usize| -> Result<f64> {
                match record.get(i).map(str::trim) {
                    None | Some("") => Ok(0.0),
                    Some(s) => parse_amount(s).map(f64::abs),
                }
            };
            Ok(part(credit)? - part(debit)?)
        }
    }
}

/// Parse a posting timestamp, trying the source format first
///
/// Date-only formats post at midnight.
pub fn parse_datetime(s: &str, preferred: Option<&str>) -> Result<NaiveDateTime> {
    let s = s.trim();

    if let Some(fmt) = preferred {
        if let Ok(dt) = NaiveDateTime::parse_from_str(s, fmt) {
            return Ok(dt);
        }
        if let Ok(date) = NaiveDate::parse_from_str(s, fmt) {
            return Ok(date.and_time(chrono::NaiveTime::MIN));
        }
    }

    for fmt in DATETIME_FORMATS {
        if let Ok(dt) = NaiveDateTime::parse_from_str(s, fmt) {
            return Ok(dt);
        }
    }
    for fmt in DATE_FORMATS {
        if let Ok(date) = NaiveDate::parse_from_str(s, fmt) {
            return Ok(date.and_time(chrono::NaiveTime::MIN));
        }
    }

    Err(Error::Import(format!("Unable to parse date: {}", s)))
}

/// Parse an amount string, handling currency symbols and commas
pub fn parse_amount(s: &str) -> Result<f64> {
    let cleaned: String = s
        .trim()
        .replace(['$', ',', ' '], "")
        .replace('(', "-")
        .replace(')', "");

    match cleaned.parse::<f64>() {
        Ok(amount) if amount.is_finite() => Ok(amount),
        _ => Err(Error::Import(format!("Unable to parse amount: {}", s))),
    }
}

/// Stable transaction id: SHA-256 of `account|posted_at|amount|description`
///
/// The same row re-imported always gets the same id.
pub fn fingerprint(
    account: &str,
    posted_at: Option<NaiveDateTime>,
    amount: f64,
    description: &str,
) -> String {
    let posted = posted_at
        .map(|dt| dt.format("%Y-%m-%dT%H:%M:%S").to_string())
        .unwrap_or_default();
    let key = format!("{}|{}|{:.2}|{}", account, posted, amount, description);

    let mut hasher = Sha256::new();
    hasher.update(key.as_bytes());
    hex::encode(hasher.finalize())
}

fn whitespace_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"\s+").expect("valid regex"))
}

fn country_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"(?i)\bAU\b").expect("valid regex"))
}

fn card_tail_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"\*+\d{2,}$").expect("valid regex"))
}

/// Merchant text from a raw description
///
/// Collapses whitespace, drops stand-alone `AU` country tokens and trailing
/// `*1234` card codes.
pub fn clean_merchant(text: &str) -> String {
    let t = whitespace_re().replace_all(text.trim(), " ");
    let t = country_re().replace_all(&t, "");
    let t = card_tail_re().replace(t.trim_end(), "");
    whitespace_re().replace_all(t.trim(), " ").into_owned()
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;

    fn at(y: i32, m: u32, d: u32, h: u32, min: u32) -> NaiveDateTime {
        NaiveDate::from_ymd_opt(y, m, d)
            .unwrap()
            .and_hms_opt(h, min, 0)
            .unwrap()
    }

    #[test]
    fn test_parse_datetime() {
        assert_eq!(
            parse_datetime("13:26 25-08-25", None).unwrap(),
            at(2025, 8, 25, 13, 26)
        );
        assert_eq!(
            parse_datetime("15/01/2024", None).unwrap(),
            at(2024, 1, 15, 0, 0)
        );
        assert_eq!(
            parse_datetime("2024-01-15", None).unwrap(),
            at(2024, 1, 15, 0, 0)
        );
        assert_eq!(
            parse_datetime("01/15/2024", Some("%m/%d/%Y")).unwrap(),
            at(2024, 1, 15, 0, 0)
        );
        assert!(parse_datetime("yesterday", None).is_err());
        assert!(parse_datetime("", None).is_err());
    }

    #[test]
    fn test_parse_amount() {
        assert_eq!(parse_amount("$1,234.56").unwrap(), 1234.56);
        assert_eq!(parse_amount("-123.45").unwrap(), -123.45);
        assert_eq!(parse_amount("(100.00)").unwrap(), -100.00);
        assert!(parse_amount("").is_err());
        assert!(parse_amount("NaN").is_err());
    }

    #[test]
    fn test_fingerprint_is_stable() {
        let dt = at(2024, 3, 1, 9, 30);
        let a = fingerprint("ubank Spend", Some(dt), -15.99, "NETFLIX.COM");
        let b = fingerprint("ubank Spend", Some(dt), -15.99, "NETFLIX.COM");
        assert_eq!(a, b);
        assert_eq!(a.len(), 64);

        assert_ne!(a, fingerprint("Amex Card", Some(dt), -15.99, "NETFLIX.COM"));
        assert_ne!(a, fingerprint("ubank Spend", Some(dt), 15.99, "NETFLIX.COM"));
        assert_ne!(a, fingerprint("ubank Spend", None, -15.99, "NETFLIX.COM"));
    }

    #[test]
    fn test_clean_merchant() {
        assert_eq!(clean_merchant("  WOOLWORTHS   1234  SYDNEY AU "), "WOOLWORTHS 1234 SYDNEY");
        assert_eq!(clean_merchant("SPOTIFY P0123*4567"), "SPOTIFY P0123");
        assert_eq!(clean_merchant("Netflix.com au"), "Netflix.com");
        // AU inside a word stays
        assert_eq!(clean_merchant("AUSSIE BROADBAND"), "AUSSIE BROADBAND");
        assert_eq!(clean_merchant(""), "");
    }

    #[test]
    fn test_parse_ubank() {
        let source = SourceConfig {
            account: Some("ubank Spend".to_string()),
            date_cols: vec!["Date and time".to_string()],
            date_format: Some("%H:%M %d-%m-%y".to_string()),
            ..Default::default()
        };
        let csv = "Date and time,Description,Amount,Balance
13:26 25-08-25,NETFLIX.COM AU,-15.99,\"1,984.01\"
09:00 26-08-25,Salary ACME PTY LTD,\"3,000.00\",4984.01";

        let result = parse_csv(csv.as_bytes(), &source, "ubank").unwrap();
        assert_eq!(result.transactions.len(), 2);
        assert_eq!(result.dropped_rows, 0);

        let first = &result.transactions[0];
        assert_eq!(first.account, "ubank Spend");
        assert_eq!(first.source, "ubank");
        assert_eq!(first.currency, "AUD");
        assert_eq!(first.posted_at, Some(at(2025, 8, 25, 13, 26)));
        assert_eq!(first.merchant, "NETFLIX.COM");
        assert_eq!(first.amount, -15.99);
        assert_eq!(first.balance, Some(1984.01));
        assert_eq!(result.transactions[1].amount, 3000.0);
    }

    #[test]
    fn test_parse_debit_credit_columns() {
        let csv = "Date,Narrative,Debit,Credit
03/02/2025,COLES 0456,45.20,
04/02/2025,REFUND COLES,,$12.00";

        let result = parse_csv(csv.as_bytes(), &SourceConfig::default(), "westpac").unwrap();
        let amounts: Vec<f64> = result.transactions.iter().map(|t| t.amount).collect();
        assert_eq!(amounts, vec![-45.20, 12.0]);
        // Account falls back to the source name
        assert_eq!(result.transactions[0].account, "westpac");
    }

    #[test]
    fn test_negate_amounts() {
        let source = SourceConfig {
            negate_amounts: true,
            ..Default::default()
        };
        let csv = "Date,Description,Amount
15/01/2024,AMAZON MARKETPLACE,99.99
16/01/2024,PAYMENT RECEIVED - THANK YOU,-500.00";

        let result = parse_csv(csv.as_bytes(), &source, "amex").unwrap();
        assert_eq!(result.transactions[0].amount, -99.99);
        assert_eq!(result.transactions[1].amount, 500.0);
    }

    #[test]
    fn test_drops_bad_rows_and_in_file_duplicates() {
        let csv = "Date,Description,Amount
15/01/2024,COFFEE,-4.50
not a date,COFFEE,-4.50
16/01/2024,COFFEE,
15/01/2024,COFFEE,-4.50";

        let result = parse_csv(csv.as_bytes(), &SourceConfig::default(), "cba").unwrap();
        assert_eq!(result.transactions.len(), 1);
        assert_eq!(result.dropped_rows, 2);
        assert_eq!(result.duplicate_rows, 1);
    }

    #[test]
    fn test_missing_columns_is_import_error() {
        let csv = "When,What\n15/01/2024,COFFEE";
        let err = parse_csv(csv.as_bytes(), &SourceConfig::default(), "x").unwrap_err();
        assert!(matches!(err, Error::Import(_)));

        let csv = "Date,Description\n15/01/2024,COFFEE";
        let err = parse_csv(csv.as_bytes(), &SourceConfig::default(), "x").unwrap_err();
        assert!(err.to_string().contains("amount"));
    }
}
