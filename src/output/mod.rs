//! Output module for exporting records and summarizing crawls
//!
//! This module handles:
//! - Exporting extracted records as CSV or TSV
//! - Generating markdown summaries of crawl results
//! - Printing crawl statistics

mod markdown;
pub mod stats;
mod tabular;

pub use markdown::{format_markdown_summary, generate_markdown_summary};
pub use stats::{print_statistics, CrawlStatistics};
pub use tabular::{to_table, write_export, write_row, write_table, TableFormat};

use thiserror::Error;

/// Errors that can occur during output operations
#[derive(Debug, Error)]
pub enum OutputError {
    #[error("Failed to write {path}: {source}")]
    Write {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Result type for output operations
pub type OutputResult<T> = Result<T, OutputError>;
