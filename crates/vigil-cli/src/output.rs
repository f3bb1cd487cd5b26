//! Output formatting utilities.

use colored::Colorize;
use serde::Serialize;
use tabled::{Table, Tabled};
use vigil_common::Result;

/// Print success message
pub fn print_success(message: &str) {
    println!("{} {}", "✓".green().bold(), message);
}

/// Print error message
pub fn print_error(message: &str) {
    eprintln!("{} {}", "✗".red().bold(), message);
}

/// Print warning message
pub fn print_warning(message: &str) {
    println!("{} {}", "⚠".yellow().bold(), message);
}

/// Print info message
pub fn print_info(message: &str) {
    println!("{} {}", "ℹ".blue().bold(), message);
}

/// Print table
pub fn print_table<T: Tabled>(items: Vec<T>) {
    if items.is_empty() {
        print_info("No items found");
        return;
    }
    let table = Table::new(items);
    println!("{}", table);
}

/// Pretty-printed JSON output
pub fn print_json<T: Serialize>(data: &T) -> Result<()> {
    println!("{}", serde_json::to_string_pretty(data)?);
    Ok(())
}

/// Glyph for a pass/fail column.
pub fn status_glyph(passed: bool) -> String {
    if passed {
        "✓".green().to_string()
    } else {
        "✗".red().to_string()
    }
}
