//! Crawler module for web page fetching and processing
//!
//! This module contains the core crawling logic, including:
//! - HTTP fetching with manual redirect handling
//! - Link discovery
//! - Per-host rate limiting and the breadth-first frontier
//! - Overall crawl coordination

mod coordinator;
mod fetcher;
mod http;
mod parser;
mod rate_limiter;
mod report;
mod scheduler;

pub use coordinator::Coordinator;
pub use fetcher::{
    build_http_client, FetchError, HttpFetcher, NetworkErrorKind, DEFAULT_MAX_REDIRECTS,
};
pub use http::{is_transient_status, Headers, Request, Response};
pub use parser::{discover_links, is_html};
pub use rate_limiter::RateLimiter;
pub use report::{CrawlReport, ManifestEntry};
pub use scheduler::{CrawlTask, Frontier};

use crate::config::Config;
use crate::HarvestError;

/// Runs a complete crawl operation
///
/// This is the main entry point for starting a crawl. It will:
/// 1. Validate the configuration
/// 2. Check the seeds against robots.txt and schedule them
/// 3. Fetch pages through the rate limiter and response cache
/// 4. Extract records and follow links up to the depth limit
///
/// # Arguments
///
/// * `config` - The crawler configuration
///
/// # Returns
///
/// * `Ok(CrawlReport)` - Records and the per-URL manifest
/// * `Err(HarvestError)` - The configuration was rejected
pub async fn crawl(config: Config) -> Result<CrawlReport, HarvestError> {
    Coordinator::new(config)?.run().await
}
