//! CLI command implementations
//!
//! Commands are organized by domain:
//! - `core` - Core commands (init, classify, runs) and shared utilities (open_db)
//! - `import` - CSV import and archiving
//! - `reports` - Summary, trends and months
//! - `transfers` - Transfer review

pub mod core;
pub mod import;
pub mod reports;
pub mod transfers;

// Re-export command functions for main.rs
pub use core::*;
pub use import::*;
pub use reports::*;
pub use transfers::*;

/// Truncate a string to a maximum length, adding "..." if truncated
pub fn truncate(s: &str, max: usize) -> String {
    if s.chars().count() <= max {
        s.to_string()
    } else {
        let kept: String = s.chars().take(max.saturating_sub(3)).collect();
        format!("{}...", kept)
    }
}

/// Format a signed amount as currency, e.g. -$1,234.50
pub fn money(amount: f64) -> String {
    let sign = if amount < 0.0 { "-" } else { "" };
    let cents = (amount.abs() * 100.0).round() as u64;
    let dollars = (cents / 100).to_string();

    let mut grouped = String::new();
    for (i, ch) in dollars.chars().enumerate() {
        if i > 0 && (dollars.len() - i) % 3 == 0 {
            grouped.push(',');
        }
        grouped.push(ch);
    }
    format!("{}${}.{:02}", sign, grouped, cents % 100)
}
