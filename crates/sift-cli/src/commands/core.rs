//! Core command implementations and shared utilities
//!
//! This module contains:
//! - `open_db` - Shared utility to open the database
//! - `cmd_init` - Initialize the database
//! - `cmd_classify` - Run the classifier over stored transactions
//! - `cmd_runs` - Classification run history

use std::path::Path;

use anyhow::{Context, Result};
use sift_core::{
    classify::{Classifier, Pass, RunReport},
    config::{default_config_path, ClassifierConfig},
    db::Database,
};

/// Open (or create) the database
pub fn open_db(db_path: &Path) -> Result<Database> {
    let path_str = db_path
        .to_str()
        .with_context(|| format!("Database path is not valid UTF-8: {}", db_path.display()))?;
    Database::new(path_str).context("Failed to open database")
}

pub fn cmd_init(db: &Database, config: &ClassifierConfig) -> Result<()> {
    println!("🔧 Initialized database at {}", db.path());
    println!(
        "   Classifier: {} rules, {} category rules, {} sources",
        config.rules.len(),
        config.categories.len(),
        config.sources.len()
    );
    if let Some(path) = default_config_path() {
        println!("   Config override: {}", path.display());
    }

    println!("✅ Ready!");
    println!();
    println!("Next steps:");
    println!("  1. Import transactions: sift import raw/   (one folder per source)");
    println!("  2. Review the month:    sift summary");

    Ok(())
}

/// Classify every stored transaction and persist the flags
pub fn run_classification(db: &Database, config: &ClassifierConfig) -> Result<RunReport> {
    let classifier = Classifier::new(config).context("Invalid classifier configuration")?;

    let transactions = db.list_transactions()?;
    let run = classifier.classify_batch(transactions);

    db.save_labels(&run.transactions)
        .context("Failed to save classification")?;
    db.record_run(&run.report)?;

    Ok(run.report)
}

pub fn cmd_classify(db: &Database, config: &ClassifierConfig, reset: bool, json: bool) -> Result<()> {
    if reset {
        let cleared = db.reset_labels()?;
        if !json {
            println!("🧹 Cleared flags on {} transactions", cleared);
        }
    }

    let report = run_classification(db, config)?;

    if json {
        println!("{}", serde_json::to_string_pretty(&report)?);
        return Ok(());
    }

    print_run_report(&report);
    Ok(())
}

pub fn print_run_report(report: &RunReport) {
    println!();
    println!("🔍 Classification Results");
    println!("   ─────────────────────────────");
    println!("   Transactions examined: {}", report.pattern.examined);
    println!(
        "   🔁 Transfers (pattern): {}",
        report.pattern_transfers
    );
    println!("   🔗 Transfer pairs: {}", report.pairs.len());
    println!("   ↩️  Refunds: {}", report.pattern_refunds);
    println!(
        "   📅 Recurring: {} rows across {} merchants",
        report.recurrence.flagged,
        report.recurring_merchants.len()
    );

    if report.total_skipped() > 0 {
        println!();
        println!("⚠️  Skipped rows");
        for pass in Pass::all() {
            let skipped = report.skipped_for(*pass);
            if skipped > 0 {
                println!("   {:12} {}", pass.as_str(), skipped);
            }
        }
        println!("   Run with --verbose to see each row.");
    }
}

pub fn cmd_runs(db: &Database, limit: i64) -> Result<()> {
    let runs = db.list_runs(limit)?;

    if runs.is_empty() {
        println!("No classification runs yet. Run 'sift classify'.");
        return Ok(());
    }

    println!();
    println!("🗂️  Classification Runs");
    println!(
        "   {:>4} │ {:19} │ {:>8} │ {:>7} │ {:>5} │ {:>9} │ {:>7}",
        "ID", "When", "Examined", "Pattern", "Pairs", "Recurring", "Skipped"
    );
    println!("   ─────┼─────────────────────┼──────────┼─────────┼───────┼───────────┼────────");
    for run in runs {
        println!(
            "   {:>4} │ {:19} │ {:>8} │ {:>7} │ {:>5} │ {:>9} │ {:>7}",
            run.id,
            run.run_at,
            run.examined,
            run.pattern_flagged,
            run.pairs,
            run.recurring,
            run.total_skipped()
        );
    }
    Ok(())
}
