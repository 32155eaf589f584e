//! Markdown summary generation
//!
//! This module generates human-readable markdown summaries of crawl results:
//! totals by outcome, failures with their causes and extraction errors.

use std::fs::File;
use std::io::Write;
use std::path::Path;

use crate::crawler::CrawlReport;
use crate::output::stats::CrawlStatistics;
use crate::output::{OutputError, OutputResult};
use crate::state::TaskOutcome;

/// Writes a markdown summary of `report` to `output_path`
///
/// # Arguments
///
/// * `report` - The finished crawl
/// * `config_hash` - Hash of the configuration file, if known
/// * `output_path` - Path where the markdown file should be written
pub fn generate_markdown_summary(
    report: &CrawlReport,
    config_hash: Option<&str>,
    output_path: &Path,
) -> OutputResult<()> {
    let markdown = format_markdown_summary(report, config_hash);

    let write = || -> std::io::Result<()> {
        let mut file = File::create(output_path)?;
        file.write_all(markdown.as_bytes())
    };
    write().map_err(|source| OutputError::Write {
        path: output_path.display().to_string(),
        source,
    })?;

    tracing::info!("Wrote crawl summary to {}", output_path.display());
    Ok(())
}

/// Formats a crawl report as markdown
pub fn format_markdown_summary(report: &CrawlReport, config_hash: Option<&str>) -> String {
    let stats = CrawlStatistics::from_report(report);
    let mut md = String::new();

    md.push_str("# Sumi-Harvest Crawl Summary\n\n");

    md.push_str("## Run Information\n\n");
    md.push_str(&format!("- **Started**: {}\n", report.started_at.to_rfc3339()));
    md.push_str(&format!("- **Finished**: {}\n", report.finished_at.to_rfc3339()));
    md.push_str(&format!(
        "- **Duration**: {:.1} seconds\n",
        stats.duration_seconds
    ));
    let status = if report.cancelled { "cancelled" } else { "completed" };
    md.push_str(&format!("- **Status**: {}\n", status));
    if let Some(hash) = config_hash {
        md.push_str(&format!("- **Config Hash**: {}\n", hash));
    }
    md.push('\n');

    md.push_str("## Overall Statistics\n\n");
    md.push_str(&format!("- **URLs Settled**: {}\n", stats.total_urls));
    md.push_str(&format!("- **Records Extracted**: {}\n", stats.records));
    md.push_str(&format!("- **Served From Cache**: {}\n", stats.cache_hits));
    md.push_str(&format!("- **Retries**: {}\n", stats.retries));
    md.push_str(&format!(
        "- **Success Rate**: {:.2}%\n",
        stats.success_rate()
    ));
    if report.cancelled {
        md.push_str(&format!("- **Left Queued**: {}\n", stats.remaining));
    }
    md.push('\n');

    md.push_str("## Outcome Breakdown\n\n");
    md.push_str("| Outcome | Count |\n");
    md.push_str("|---------|-------|\n");
    md.push_str(&format!("| Succeeded | {} |\n", stats.succeeded));
    md.push_str(&format!("| Failed | {} |\n", stats.failed));
    md.push_str(&format!("| Skipped | {} |\n", stats.skipped));
    md.push_str(&format!("| Duplicate | {} |\n\n", stats.duplicates));

    if !stats.depth_breakdown.is_empty() {
        md.push_str("## Depth Breakdown\n\n");
        md.push_str("| Depth | URLs |\n");
        md.push_str("|-------|------|\n");
        for (depth, count) in &stats.depth_breakdown {
            md.push_str(&format!("| {} | {} |\n", depth, count));
        }
        md.push('\n');
    }

    let failures: Vec<_> = report
        .manifest
        .iter()
        .filter_map(|e| match &e.outcome {
            TaskOutcome::Failed(cause) => Some((e, cause)),
            _ => None,
        })
        .collect();
    if !failures.is_empty() {
        md.push_str("## Failures\n\n");
        md.push_str("| URL | Cause | Retries |\n");
        md.push_str("|-----|-------|---------|\n");
        for (entry, cause) in failures {
            md.push_str(&format!(
                "| {} | {} | {} |\n",
                entry.url,
                escape_cell(&cause.to_string()),
                entry.retries
            ));
        }
        md.push('\n');
    }

    let skipped: Vec<_> = report
        .manifest
        .iter()
        .filter_map(|e| match &e.outcome {
            TaskOutcome::Skipped(reason) => Some((e, reason)),
            _ => None,
        })
        .collect();
    if !skipped.is_empty() {
        md.push_str("## Skipped URLs\n\n");
        md.push_str(&format!("Total: {}\n\n", skipped.len()));
        for (entry, reason) in skipped.iter().take(50) {
            md.push_str(&format!("- {} ({})\n", entry.url, reason));
        }
        if skipped.len() > 50 {
            md.push_str(&format!("\n... and {} more\n", skipped.len() - 50));
        }
        md.push('\n');
    }

    let extraction: Vec<_> = report
        .manifest
        .iter()
        .flat_map(|e| e.extraction_errors.iter().map(move |err| (e, err)))
        .collect();
    if !extraction.is_empty() {
        md.push_str("## Extraction Errors\n\n");
        md.push_str("| URL | Error |\n");
        md.push_str("|-----|-------|\n");
        for (entry, err) in extraction {
            md.push_str(&format!(
                "| {} | {} |\n",
                entry.url,
                escape_cell(&err.to_string())
            ));
        }
        md.push('\n');
    }

    md
}

fn escape_cell(text: &str) -> String {
    text.replace('|', "\\|").replace('\n', " ")
}
