//! Merchant category rules
//!
//! Ordered regex rules over the cleaned merchant; the first match sets
//! category, subcategory and the fixed-expense flag.

use regex::{Regex, RegexBuilder};
use tracing::debug;

use crate::config::CategoryRule;
use crate::error::{Error, Result};
use crate::models::Transaction;

/// A category assignment from a matching rule
#[derive(Debug, Clone, PartialEq)]
pub struct CategoryMatch<'a> {
    pub category: &'a str,
    pub subcategory: Option<&'a str>,
    pub fixed: bool,
}

/// Compiled merchant category rules
#[derive(Debug)]
pub struct Categorizer {
    rules: Vec<(Regex, CategoryRule)>,
}

impl Categorizer {
    /// Compile the rules; an invalid pattern is a configuration error
    pub fn new(rules: &[CategoryRule]) -> Result<Self> {
        let rules = rules
            .iter()
            .map(|rule| {
                RegexBuilder::new(&rule.pattern)
                    .case_insensitive(true)
                    .build()
                    .map(|re| (re, rule.clone()))
                    .map_err(|e| {
                        Error::Config(format!(
                            "Invalid category pattern '{}': {}",
                            rule.pattern, e
                        ))
                    })
            })
            .collect::<Result<Vec<_>>>()?;
        Ok(Self { rules })
    }

    /// First rule matching `text`
    pub fn lookup(&self, text: &str) -> Option<CategoryMatch<'_>> {
        self.rules
            .iter()
            .find(|(re, _)| re.is_match(text))
            .map(|(_, rule)| CategoryMatch {
                category: &rule.category,
                subcategory: rule.subcategory.as_deref(),
                fixed: rule.fixed,
            })
    }

    /// Categorize one transaction by merchant (description if the merchant is empty)
    ///
    /// Returns whether a rule matched. Unmatched rows keep what they had.
    pub fn apply(&self, txn: &mut Transaction) -> bool {
        let text = if txn.merchant.trim().is_empty() {
            txn.description.as_str()
        } else {
            txn.merchant.as_str()
        };

        let Some(found) = self.lookup(text) else {
            return false;
        };
        debug!(merchant = %text, category = found.category, "Categorized");
        txn.category = Some(found.category.to_string());
        txn.subcategory = found.subcategory.map(str::to_string);
        txn.is_fixed = found.fixed;
        true
    }

    /// Categorize a batch, returning how many rows matched a rule
    pub fn apply_all(&self, transactions: &mut [Transaction]) -> usize {
        let mut matched = 0;
        for txn in transactions.iter_mut() {
            if self.apply(txn) {
                matched += 1;
            }
        }
        matched
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;

    fn rule(pattern: &str, category: &str, subcategory: Option<&str>, fixed: bool) -> CategoryRule {
        CategoryRule {
            pattern: pattern.to_string(),
            category: category.to_string(),
            subcategory: subcategory.map(str::to_string),
            fixed,
        }
    }

    fn txn(description: &str) -> Transaction {
        let posted = NaiveDate::from_ymd_opt(2025, 3, 4)
            .unwrap()
            .and_hms_opt(10, 0, 0)
            .unwrap();
        Transaction::new("ubank Spend", posted, description, -20.0)
    }

    #[test]
    fn test_first_match_wins() {
        let categorizer = Categorizer::new(&[
            rule(r"\bRENT\b", "Housing", Some("Rent"), true),
            rule("WOOLWORTHS|COLES", "Groceries", None, false),
            rule(".*", "Other", None, false),
        ])
        .unwrap();

        let found = categorizer.lookup("woolworths metro").unwrap();
        assert_eq!(found.category, "Groceries");
        assert_eq!(found.subcategory, None);
        assert!(!found.fixed);

        assert_eq!(categorizer.lookup("RENT MAY").unwrap().category, "Housing");
        assert_eq!(categorizer.lookup("CURRENT ACCOUNT").unwrap().category, "Other");
    }

    #[test]
    fn test_apply_sets_fields() {
        let categorizer =
            Categorizer::new(&[rule("NETFLIX", "Entertainment", Some("Streaming"), true)]).unwrap();

        let mut t = txn("NETFLIX.COM AU");
        assert!(categorizer.apply(&mut t));
        assert_eq!(t.category.as_deref(), Some("Entertainment"));
        assert_eq!(t.subcategory.as_deref(), Some("Streaming"));
        assert!(t.is_fixed);

        let mut other = txn("BUNNINGS 123");
        assert!(!categorizer.apply(&mut other));
        assert_eq!(other.category, None);
    }

    #[test]
    fn test_apply_all_counts_matches() {
        let categorizer = Categorizer::new(&[rule("COLES", "Groceries", None, false)]).unwrap();
        let mut batch = vec![txn("COLES 0456"), txn("KMART"), txn("Coles Express")];
        assert_eq!(categorizer.apply_all(&mut batch), 2);
    }

    #[test]
    fn test_invalid_pattern_is_config_error() {
        let err = Categorizer::new(&[rule("(unclosed", "X", None, false)]).unwrap_err();
        assert!(matches!(err, Error::Config(_)));
    }

    #[test]
    fn test_default_categories_compile() {
        let config = crate::config::ClassifierConfig::embedded().unwrap();
        let categorizer = Categorizer::new(&config.categories).unwrap();
        assert_eq!(
            categorizer.lookup("SALARY ACME PTY LTD").unwrap().subcategory,
            Some("Salary")
        );
        assert!(categorizer.lookup("TELSTRA PREPAID").unwrap().fixed);
    }
}
