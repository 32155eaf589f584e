//! Robots.txt handling module
//!
//! `RobotsPolicy` fetches `/robots.txt` once per host, caches the parsed
//! result for 24 hours and answers allow/deny questions. Concurrent queries
//! for a host that is still being fetched wait for that fetch and share its
//! result. A robots.txt that cannot be fetched, or answers with an error
//! status, allows everything.

mod cache;
mod parser;

pub use cache::{CachedRobots, ROBOTS_TTL_HOURS};
pub use parser::{product_token, ParsedRobots, RobotsRules};

use std::collections::HashMap;
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;

use url::Url;

use crate::crawler::{HttpFetcher, Request};
use crate::url::{host_key, origin_of};

type HostEntry = Arc<tokio::sync::Mutex<Option<CachedRobots>>>;

/// Per-host robots.txt registry
#[derive(Debug)]
pub struct RobotsPolicy {
    fetcher: Arc<HttpFetcher>,
    user_agent: String,
    timeout: Duration,
    hosts: Mutex<HashMap<String, HostEntry>>,
}

impl RobotsPolicy {
    /// Creates a policy
    ///
    /// # Arguments
    ///
    /// * `fetcher` - Fetcher used for `/robots.txt` requests
    /// * `user_agent` - Our User-Agent; its product token selects the default group
    /// * `timeout` - Timeout for each robots.txt fetch
    pub fn new(fetcher: Arc<HttpFetcher>, user_agent: &str, timeout: Duration) -> Self {
        Self {
            fetcher,
            user_agent: user_agent.to_string(),
            timeout,
            hosts: Mutex::new(HashMap::new()),
        }
    }

    fn entry(&self, host: &str) -> HostEntry {
        let mut hosts = self.hosts.lock().unwrap_or_else(PoisonError::into_inner);
        Arc::clone(hosts.entry(host.to_string()).or_default())
    }

    /// Returns the parsed robots.txt for the URL's host, fetching it if needed
    ///
    /// Only one fetch per host is in flight; other callers wait on the host's
    /// lock and then read the stored result.
    pub async fn robots_for(&self, url: &Url) -> ParsedRobots {
        let (Some(host), Some(origin)) = (host_key(url), origin_of(url)) else {
            return ParsedRobots::allow_all();
        };

        let entry = self.entry(&host);
        let mut cached = entry.lock().await;

        if let Some(existing) = cached.as_ref() {
            if !existing.is_stale() {
                return existing.robots.clone();
            }
            tracing::debug!("robots.txt for {} expired, refetching", host);
        }

        let robots = self.fetch_robots(&origin).await;
        *cached = Some(CachedRobots::new(robots.clone()));
        robots
    }

    async fn fetch_robots(&self, origin: &str) -> ParsedRobots {
        let robots_url = match Url::parse(&format!("{}/robots.txt", origin)) {
            Ok(url) => url,
            Err(e) => {
                tracing::warn!("Cannot build robots.txt URL for {}: {}", origin, e);
                return ParsedRobots::allow_all();
            }
        };

        match self
            .fetcher
            .fetch(&Request::get(robots_url.clone()), self.timeout)
            .await
        {
            Ok(response) if (200..300).contains(&response.status) => {
                tracing::debug!("Fetched {}", robots_url);
                ParsedRobots::parse(&response.text())
            }
            Ok(response) => {
                tracing::debug!(
                    "{} returned HTTP {}, allowing all",
                    robots_url,
                    response.status
                );
                ParsedRobots::allow_all()
            }
            Err(e) => {
                tracing::warn!("Failed to fetch {}: {}, allowing all", robots_url, e);
                ParsedRobots::allow_all()
            }
        }
    }

    /// Checks whether `user_agent` may fetch `url`
    pub async fn is_allowed(&self, url: &Url, user_agent: &str) -> bool {
        let robots = self.robots_for(url).await;
        let path = match url.query() {
            Some(query) => format!("{}?{}", url.path(), query),
            None => url.path().to_string(),
        };
        robots.is_allowed(&path, user_agent)
    }

    /// Crawl-delay the URL's host asks of our user agent
    pub async fn crawl_delay(&self, url: &Url) -> Option<Duration> {
        self.robots_for(url).await.crawl_delay(&self.user_agent)
    }

    pub fn user_agent(&self) -> &str {
        &self.user_agent
    }

    /// Number of hosts with a robots entry
    pub fn cached_hosts(&self) -> usize {
        self.hosts
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }
}
