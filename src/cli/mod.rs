//! CLI command definitions and argument parsing.
//!
//! Uses clap derive macros for ergonomic argument definitions.

pub mod args;

use maskcmp::compare::ComparisonOutcome;

/// One-line cached/computed summary for stderr.
pub fn summary_line(outcome: &ComparisonOutcome) -> String {
    let files = outcome.results.len();
    let cached = outcome.cached.len();
    let computed = outcome.computed.len();
    format!("{files} file(s), {cached} folder(s) from cache, {computed} computed")
}

/// Print the run summary and any cache warnings to stderr.
pub fn print_summary(outcome: &ComparisonOutcome) {
    use colored::Colorize;
    use std::io::Write;
    let stderr = std::io::stderr();
    let mut handle = stderr.lock();
    let _ = writeln!(handle, "  {} {}", "maskcmp".bold(), summary_line(outcome).dimmed());
    for warning in &outcome.warnings {
        let _ = writeln!(handle, "  {} {}", "⚠".yellow().bold(), warning.yellow());
    }
    let _ = handle.flush();
}
