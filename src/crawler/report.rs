//! Crawl results: extracted records plus a per-URL manifest

use chrono::{DateTime, Utc};

use crate::crawler::CrawlTask;
use crate::extract::{ExtractError, ExtractedRecord};
use crate::state::{TaskOutcome, TaskState};

/// The recorded fate of one URL
#[derive(Debug, Clone, PartialEq)]
pub struct ManifestEntry {
    pub url: String,
    pub depth: u32,
    /// Page the URL was discovered on; None for seeds
    pub parent: Option<String>,
    pub outcome: TaskOutcome,
    /// Status of the last response, if one was received
    pub status: Option<u16>,
    pub retries: u32,
    /// Served from the response cache without fetching
    pub from_cache: bool,
    /// Records extracted from the page
    pub records: usize,
    /// Extraction failures; they never change the outcome
    pub extraction_errors: Vec<ExtractError>,
}

impl ManifestEntry {
    /// Entry for a URL that ended without being fetched
    pub fn unfetched(url: &str, depth: u32, parent: Option<String>, outcome: TaskOutcome) -> Self {
        Self {
            url: url.to_string(),
            depth,
            parent,
            outcome,
            status: None,
            retries: 0,
            from_cache: false,
            records: 0,
            extraction_errors: Vec::new(),
        }
    }
}

/// Everything a crawl produced
///
/// Returned whether the crawl drained its queue, hit its task limit or was
/// cancelled.
#[derive(Debug, Clone)]
pub struct CrawlReport {
    pub records: Vec<ExtractedRecord>,
    pub manifest: Vec<ManifestEntry>,
    /// Scheduled tasks that never ran because the crawl was cancelled
    pub remaining: Vec<CrawlTask>,
    pub cancelled: bool,
    pub started_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,
}

impl CrawlReport {
    /// Number of manifest entries whose outcome is in `state`
    pub fn count(&self, state: TaskState) -> usize {
        self.manifest
            .iter()
            .filter(|e| e.outcome.state() == state)
            .count()
    }

    pub fn succeeded(&self) -> usize {
        self.count(TaskState::Succeeded)
    }

    pub fn failed(&self) -> usize {
        self.count(TaskState::Failed)
    }

    pub fn skipped(&self) -> usize {
        self.count(TaskState::Skipped)
    }

    pub fn duplicates(&self) -> usize {
        self.count(TaskState::Duplicate)
    }

    /// Entries served from the cache
    pub fn cache_hits(&self) -> usize {
        self.manifest.iter().filter(|e| e.from_cache).count()
    }

    /// Total extraction failures across all pages
    pub fn extraction_errors(&self) -> usize {
        self.manifest
            .iter()
            .map(|e| e.extraction_errors.len())
            .sum()
    }

    /// Finds the manifest entry for a URL
    pub fn entry(&self, url: &str) -> Option<&ManifestEntry> {
        self.manifest.iter().find(|e| e.url == url)
    }

    pub fn duration(&self) -> chrono::Duration {
        self.finished_at - self.started_at
    }
}
