//! Command-line interface.

pub mod args;
pub mod commands;

/// Prints a grouped issue block (`Errors:` / `Warnings:`), one per line.
pub(crate) fn print_issue_block<T: std::fmt::Display>(header: &str, issues: &[T]) {
    if issues.is_empty() {
        return;
    }
    println!("{header}:");
    for issue in issues {
        println!("  - {issue}");
    }
}
