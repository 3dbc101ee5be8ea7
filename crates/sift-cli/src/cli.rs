//! CLI argument definitions using clap
//!
//! This module contains all the clap structs and enums for parsing CLI arguments.
//! The actual command implementations are in the `commands` module.

use std::path::PathBuf;

use clap::{Parser, Subcommand};

/// Sift - See what you really earn and spend
#[derive(Parser)]
#[command(name = "sift")]
#[command(
    about = "Personal bank CSV classifier: transfers, refunds, recurring charges",
    long_about = None
)]
#[command(version)]
pub struct Cli {
    /// Database path
    #[arg(long, default_value = "sift.db", global = true)]
    pub db: PathBuf,

    /// Classifier config (defaults to the data-dir override, then built-in rules)
    #[arg(long, global = true)]
    pub config: Option<PathBuf>,

    /// Enable verbose logging
    #[arg(short, long, global = true)]
    pub verbose: bool,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Initialize the database
    Init,

    /// Import transactions from CSV
    ///
    /// PATH may be a CSV file or a directory. In a directory, every
    /// subdirectory is a source (e.g. raw/ubank/*.csv) and CSV files directly
    /// inside use --source.
    Import {
        /// CSV file or directory of per-source folders
        path: PathBuf,

        /// Source name (config [sources.<name>]); defaults to the parent folder name
        #[arg(short, long)]
        source: Option<String>,

        /// Move each imported file here as <source>-<filename>
        #[arg(long)]
        archive_dir: Option<PathBuf>,

        /// Skip classification after import
        #[arg(long)]
        no_classify: bool,
    },

    /// Classify every stored transaction (transfers, refunds, recurring)
    Classify {
        /// Clear existing flags first (use after changing rules)
        #[arg(long)]
        reset: bool,

        /// Output the run report as JSON
        #[arg(long)]
        json: bool,
    },

    /// Gross vs real income and expenses for a period
    Summary {
        /// Month (YYYY-MM); defaults to the latest month with data
        #[arg(short, long)]
        month: Option<String>,

        /// Custom start date (YYYY-MM-DD), use with --to
        #[arg(long)]
        from: Option<String>,

        /// Custom end date (YYYY-MM-DD), use with --from
        #[arg(long)]
        to: Option<String>,

        /// Refund handling: offset_expenses, separate (defaults to config)
        #[arg(long)]
        refund_policy: Option<String>,

        /// Show real totals per category
        #[arg(long)]
        categories: bool,

        /// Output as JSON
        #[arg(long)]
        json: bool,
    },

    /// Month-by-month summaries
    Trends {
        /// Number of most recent months to show
        #[arg(short = 'n', long, default_value = "6")]
        months: usize,

        /// Refund handling: offset_expenses, separate (defaults to config)
        #[arg(long)]
        refund_policy: Option<String>,

        /// Output as JSON
        #[arg(long)]
        json: bool,
    },

    /// Review internal transfers and confirmed pairs
    Transfers {
        /// Month (YYYY-MM); defaults to all
        #[arg(short, long)]
        month: Option<String>,

        /// Maximum rows to list
        #[arg(short = 'n', long, default_value = "50")]
        limit: usize,
    },

    /// List months with data
    Months,

    /// Show recent classification runs
    Runs {
        /// Number of runs to show
        #[arg(short = 'n', long, default_value = "10")]
        limit: i64,
    },
}
