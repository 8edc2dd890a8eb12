//! Output module for crawl summaries and statistics
//!
//! This module handles:
//! - Printing the summary of a finished crawl
//! - Loading and printing statistics from the database

pub mod stats;

pub use stats::{load_statistics, print_statistics, HarvestStatistics};

use crate::crawler::CrawlReport;

/// Renders the end-of-crawl summary
pub fn format_crawl_report(run_id: i64, report: &CrawlReport) -> String {
    let mut lines = vec![
        format!("=== Crawl Run #{} ===", run_id),
        format!("  Persisted: {} / {}", report.persisted, report.target),
        format!("  Pages fetched: {}", report.pages_fetched),
        format!("  Batches: {}", report.batches),
        format!("  Splits: {}", report.splits),
        format!("  Ranges drained: {}", report.drained),
        format!("  Rate limit waits: {}", report.rate_limit_waits),
    ];

    if report.worker_failures > 0 {
        lines.push(format!("  Worker failures: {}", report.worker_failures));
    }
    if report.unvisited > 0 {
        lines.push(format!("  Ranges left unvisited: {}", report.unvisited));
    }

    if !report.abandoned.is_empty() {
        lines.push(format!(
            "  Abandoned ranges ({}), coverage incomplete:",
            report.abandoned.len()
        ));
        for (range, reason) in &report.abandoned {
            lines.push(format!("    - {}: {}", range, reason));
        }
    }

    lines.join("\n")
}

/// Prints the end-of-crawl summary to stdout
pub fn print_crawl_report(run_id: i64, report: &CrawlReport) {
    println!("{}", format_crawl_report(run_id, report));
}
