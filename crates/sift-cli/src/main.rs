//! Sift CLI - Personal finance transaction classifier
//!
//! Usage:
//!   sift init                        Initialize database
//!   sift import raw/                 Import CSVs (one folder per source)
//!   sift classify                    Flag transfers, refunds, recurring charges
//!   sift summary --month 2025-03     Gross vs real income and expenses

mod cli;
mod commands;


use anyhow::{Context, Result};
use clap::Parser;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use cli::*;

fn main() -> Result<()> {
    let cli = Cli::parse();

    // Set up logging
    // Priority: RUST_LOG env var > --verbose flag > default (info)
    let filter = if std::env::var("RUST_LOG").is_ok() {
        EnvFilter::from_default_env()
    } else if cli.verbose {
        EnvFilter::new("debug")
    } else {
        EnvFilter::new("info")
    };

    tracing_subscriber::registry()
        .with(filter)
        .with(fmt::layer().with_target(false).compact())
        .init();

    let config = sift_core::load_config(cli.config.as_deref())
        .context("Failed to load classifier config")?;
    let db = commands::open_db(&cli.db)?;

    match cli.command {
        Commands::Init => commands::cmd_init(&db, &config),
        Commands::Import {
            path,
            source,
            archive_dir,
            no_classify,
        } => commands::cmd_import(
            &db,
            &config,
            &path,
            source.as_deref(),
            archive_dir.as_deref(),
            no_classify,
        ),
        Commands::Classify { reset, json } => commands::cmd_classify(&db, &config, reset, json),
        Commands::Summary {
            month,
            from,
            to,
            refund_policy,
            categories,
            json,
        } => {
            let period =
                commands::resolve_period(&db, month.as_deref(), from.as_deref(), to.as_deref())?;
            let policy = commands::resolve_policy(&config, refund_policy.as_deref())?;
            commands::cmd_summary(&db, period, policy, categories, json)
        }
        Commands::Trends {
            months,
            refund_policy,
            json,
        } => {
            let policy = commands::resolve_policy(&config, refund_policy.as_deref())?;
            commands::cmd_trends(&db, months, policy, json)
        }
        Commands::Transfers { month, limit } => {
            commands::cmd_transfers(&db, month.as_deref(), limit)
        }
        Commands::Months => commands::cmd_months(&db),
        Commands::Runs { limit } => commands::cmd_runs(&db, limit),
    }
}
