//! Report command implementations

use anyhow::{anyhow, bail, Context, Result};
use chrono::NaiveDate;
use serde::Serialize;
use sift_core::{
    config::ClassifierConfig,
    db::Database,
    models::{CategoryTotal, Period, RefundPolicy, Summary},
    summary::{category_breakdown, summarize, summarize_months},
};

use super::{money, truncate};

/// Resolve summary flags to a period
///
/// `--from`/`--to` win over `--month`; with neither, the latest month with data.
pub fn resolve_period(
    db: &Database,
    month: Option<&str>,
    custom_from: Option<&str>,
    custom_to: Option<&str>,
) -> Result<Period> {
    match (custom_from, custom_to) {
        (Some(from), Some(to)) => {
            let from_date = NaiveDate::parse_from_str(from, "%Y-%m-%d")
                .context("Invalid --from date format (use YYYY-MM-DD)")?;
            let to_date = NaiveDate::parse_from_str(to, "%Y-%m-%d")
                .context("Invalid --to date format (use YYYY-MM-DD)")?;
            return Ok(Period::new(from_date, to_date)?);
        }
        (Some(_), None) | (None, Some(_)) => bail!("--from and --to must be used together"),
        (None, None) => {}
    }

    if let Some(month) = month {
        return Period::parse_month(month).context("Invalid --month (use YYYY-MM)");
    }

    let latest = db
        .available_months()?
        .into_iter()
        .next()
        .ok_or_else(|| anyhow!("No transactions yet. Run 'sift import' first."))?;
    Ok(Period::parse_month(&latest)?)
}

/// `--refund-policy` if given, else the configured default
pub fn resolve_policy(config: &ClassifierConfig, flag: Option<&str>) -> Result<RefundPolicy> {
    match flag {
        Some(value) => value.parse::<RefundPolicy>().map_err(|e: String| anyhow!(e)),
        None => Ok(config.summary.refund_policy),
    }
}

#[derive(Serialize)]
struct SummaryOutput<'a> {
    refund_policy: &'static str,
    #[serde(flatten)]
    summary: &'a Summary,
    #[serde(skip_serializing_if = "Option::is_none")]
    categories: Option<&'a [CategoryTotal]>,
}

pub fn cmd_summary(
    db: &Database,
    period: Period,
    policy: RefundPolicy,
    categories: bool,
    json: bool,
) -> Result<()> {
    let transactions = db.list_transactions_between(period.from, period.to)?;
    let summary = summarize(&transactions, period, policy);
    let breakdown = categories.then(|| category_breakdown(&transactions, period));

    if json {
        let output = SummaryOutput {
            refund_policy: policy.as_str(),
            summary: &summary,
            categories: breakdown.as_deref(),
        };
        println!("{}", serde_json::to_string_pretty(&output)?);
        return Ok(());
    }

    if summary.transaction_count == 0 {
        println!("No transactions in {}", period);
        return Ok(());
    }

    print_summary(&summary, policy);

    if let Some(breakdown) = breakdown {
        println!();
        println!("🏷️  By Category (real)");
        println!("   {:24} {:>12} {:>6}", "Category", "Total", "Count");
        println!("   ────────────────────────────────────────────");
        for row in &breakdown {
            let name = row.category.as_deref().unwrap_or("Uncategorized");
            println!(
                "   {:24} {:>12} {:>6}",
                truncate(name, 24),
                money(row.total),
                row.count
            );
        }
    }

    Ok(())
}

fn print_summary(summary: &Summary, policy: RefundPolicy) {
    println!();
    println!("📊 Summary: {}", summary.period);
    println!("   {:18} {:>14} {:>14}", "", "Gross", "Real");
    println!("   ─────────────────────────────────────────────────");
    println!(
        "   {:18} {:>14} {:>14}",
        "Income",
        money(summary.gross_income),
        money(summary.real_income)
    );
    println!(
        "   {:18} {:>14} {:>14}",
        "Expenses",
        money(summary.gross_expenses),
        money(summary.real_expenses)
    );
    println!("   {:18} {:>14} {:>14}", "Net", "", money(summary.net));
    println!();
    println!(
        "   🔁 Transfers: {} ({} rows)",
        money(summary.transfer_total),
        summary.transfer_count
    );
    println!(
        "   ↩️  Refunds:   {} ({} rows, {})",
        money(summary.refund_total),
        summary.refund_count,
        policy.as_str()
    );
    println!(
        "   Transactions: {} ({} real)",
        summary.transaction_count, summary.real_transaction_count
    );
}

pub fn cmd_trends(db: &Database, months: usize, policy: RefundPolicy, json: bool) -> Result<()> {
    let transactions = db.list_transactions()?;
    let all = summarize_months(&transactions, policy);
    let recent = &all[all.len().saturating_sub(months)..];

    if json {
        println!("{}", serde_json::to_string_pretty(recent)?);
        return Ok(());
    }

    if recent.is_empty() {
        println!("No transactions yet. Run 'sift import' first.");
        return Ok(());
    }

    println!();
    println!("📈 Monthly Trends ({})", policy.as_str());
    println!(
        "   {:8} │ {:>12} │ {:>12} │ {:>12} │ {:>12} │ {:>12}",
        "Month", "Gross In", "Real In", "Gross Out", "Real Out", "Net"
    );
    println!("   ─────────┼──────────────┼──────────────┼──────────────┼──────────────┼─────────────");
    for summary in recent {
        println!(
            "   {:8} │ {:>12} │ {:>12} │ {:>12} │ {:>12} │ {:>12}",
            summary.period.label(),
            money(summary.gross_income),
            money(summary.real_income),
            money(summary.gross_expenses),
            money(summary.real_expenses),
            money(summary.net)
        );
    }
    Ok(())
}

pub fn cmd_months(db: &Database) -> Result<()> {
    let months = db.available_months()?;
    if months.is_empty() {
        println!("No transactions yet. Run 'sift import' first.");
        return Ok(());
    }

    println!("📅 Months with data ({} transactions):", db.count_transactions()?);
    for month in months {
        println!("   {}", month);
    }
    Ok(())
}
