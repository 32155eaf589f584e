//! Statistics derived from a crawl report
//!
//! This module provides functionality for summarizing a `CrawlReport` and
//! printing the totals to stdout.

use std::collections::BTreeMap;

use crate::crawler::CrawlReport;
use crate::state::{TaskOutcome, TaskState};

/// Crawl statistics summary
#[derive(Debug, Clone, Default)]
pub struct CrawlStatistics {
    /// Number of URLs in the manifest
    pub total_urls: usize,

    pub succeeded: usize,
    pub failed: usize,
    pub skipped: usize,
    pub duplicates: usize,

    /// Succeeded URLs served from the response cache
    pub cache_hits: usize,

    /// Extracted records
    pub records: usize,

    /// Pages whose extraction reported at least one error
    pub extraction_errors: usize,

    /// Scheduled tasks left behind by a cancelled crawl
    pub remaining: usize,

    /// Retries across all URLs
    pub retries: u32,

    /// Settled URLs per depth
    pub depth_breakdown: BTreeMap<u32, usize>,

    /// Failure and skip causes with their counts
    pub causes: BTreeMap<String, usize>,

    pub cancelled: bool,
    pub duration_seconds: f64,
}

impl CrawlStatistics {
    /// Computes statistics for a finished crawl
    pub fn from_report(report: &CrawlReport) -> Self {
        let mut stats = Self {
            total_urls: report.manifest.len(),
            succeeded: report.count(TaskState::Succeeded),
            failed: report.count(TaskState::Failed),
            skipped: report.count(TaskState::Skipped),
            duplicates: report.count(TaskState::Duplicate),
            cache_hits: report.cache_hits(),
            records: report.records.len(),
            extraction_errors: report.extraction_errors(),
            remaining: report.remaining.len(),
            cancelled: report.cancelled,
            duration_seconds: report.duration().num_milliseconds() as f64 / 1000.0,
            ..Self::default()
        };

        for entry in &report.manifest {
            stats.retries += entry.retries;
            *stats.depth_breakdown.entry(entry.depth).or_default() += 1;

            let cause = match &entry.outcome {
                TaskOutcome::Failed(cause) => cause.to_string(),
                TaskOutcome::Skipped(reason) => reason.to_string(),
                TaskOutcome::Succeeded | TaskOutcome::Duplicate => continue,
            };
            *stats.causes.entry(cause).or_default() += 1;
        }

        stats
    }

    /// Percentage of manifest entries that succeeded
    pub fn success_rate(&self) -> f64 {
        if self.total_urls == 0 {
            0.0
        } else {
            (self.succeeded as f64 / self.total_urls as f64) * 100.0
        }
    }
}

/// Prints statistics to stdout in a formatted manner
///
/// # Arguments
///
/// * `stats` - The statistics to display
pub fn print_statistics(stats: &CrawlStatistics) {
    println!("=== Crawl Statistics ===\n");

    println!("Overview:");
    println!("  URLs settled: {}", stats.total_urls);
    println!("  Records extracted: {}", stats.records);
    println!("  Duration: {:.1}s", stats.duration_seconds);
    if stats.cancelled {
        println!("  Cancelled with {} tasks still queued", stats.remaining);
    }
    println!();

    println!("URLs by Outcome:");
    for (label, count) in [
        ("Succeeded", stats.succeeded),
        ("Failed", stats.failed),
        ("Skipped", stats.skipped),
        ("Duplicate", stats.duplicates),
    ] {
        let percentage = if stats.total_urls > 0 {
            (count as f64 / stats.total_urls as f64) * 100.0
        } else {
            0.0
        };
        println!("  {}: {} ({:.1}%)", label, count, percentage);
    }
    println!("  Served from cache: {}", stats.cache_hits);
    println!("  Retries: {}", stats.retries);
    println!();

    if !stats.causes.is_empty() {
        println!("Failures and Skips:");
        let mut causes: Vec<_> = stats.causes.iter().collect();
        causes.sort_by(|a, b| b.1.cmp(a.1));
        for (cause, count) in causes {
            println!("  {}: {}", cause, count);
        }
        println!();
    }

    if stats.extraction_errors > 0 {
        println!("Extraction errors: {}", stats.extraction_errors);
        println!();
    }

    println!(
        "Success Rate: {:.1}% ({} / {} URLs)",
        stats.success_rate(),
        stats.succeeded,
        stats.total_urls
    );
}
