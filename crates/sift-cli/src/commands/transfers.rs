//! Transfer review command

use std::collections::HashMap;

use anyhow::{Context, Result};
use sift_core::{
    db::Database,
    models::{Period, Transaction},
};

use super::{money, truncate};

/// Internal transfers in `month` (or everywhere), oldest first
pub fn list_transfers(db: &Database, month: Option<&str>) -> Result<Vec<Transaction>> {
    let transactions = match month {
        Some(month) => {
            let period = Period::parse_month(month).context("Invalid --month (use YYYY-MM)")?;
            db.list_transactions_between(period.from, period.to)?
        }
        None => db.list_transactions()?,
    };
    Ok(transactions
        .into_iter()
        .filter(|t| t.is_internal_transfer)
        .collect())
}

pub fn cmd_transfers(db: &Database, month: Option<&str>, limit: usize) -> Result<()> {
    let transfers = list_transfers(db, month)?;

    if transfers.is_empty() {
        println!("No internal transfers found. Run 'sift classify' after importing.");
        return Ok(());
    }

    let by_id: HashMap<&str, &Transaction> =
        transfers.iter().map(|t| (t.id.as_str(), t)).collect();

    let paired = transfers
        .iter()
        .filter(|t| t.transfer_counterpart.is_some())
        .count();

    println!();
    println!(
        "🔁 Internal Transfers ({} rows, {} paired)",
        transfers.len(),
        paired
    );
    println!(
        "   {:10} │ {:18} │ {:30} │ {:>12} │ Counterpart",
        "Date", "Account", "Description", "Amount"
    );
    println!("   ───────────┼────────────────────┼────────────────────────────────┼──────────────┼────────────");

    for txn in transfers.iter().take(limit) {
        let date = txn
            .date()
            .map(|d| d.to_string())
            .unwrap_or_else(|| "?".to_string());

        let counterpart = match txn.transfer_counterpart.as_deref() {
            Some(id) => match by_id.get(id) {
                Some(other) => match other.date() {
                    Some(d) => format!("{} ({})", other.account, d),
                    None => other.account.clone(),
                },
                // Other side falls outside the listed month
                None => match db.get_transaction(id)? {
                    Some(other) => format!("{} (outside period)", other.account),
                    None => format!("{} (missing)", truncate(id, 12)),
                },
            },
            None => "pattern only".to_string(),
        };

        println!(
            "   {:10} │ {:18} │ {:30} │ {:>12} │ {}",
            date,
            truncate(&txn.account, 18),
            truncate(&txn.description, 30),
            money(txn.amount),
            counterpart
        );
    }

    if transfers.len() > limit {
        println!("   ... and {} more (use --limit)", transfers.len() - limit);
    }

    Ok(())
}
