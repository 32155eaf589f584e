use serde::Deserialize;
use std::time::Duration;

use crate::extract::{Cardinality, ValueType};

/// Main configuration structure for Sumi-Harvest
#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    /// URLs the crawl starts from
    pub seeds: Vec<String>,

    #[serde(default)]
    pub crawler: CrawlerConfig,

    #[serde(rename = "user-agent")]
    pub user_agent: UserAgentConfig,

    #[serde(default)]
    pub cache: CacheConfig,

    #[serde(default)]
    pub output: OutputConfig,

    #[serde(default)]
    pub extract: ExtractConfig,
}

/// Crawler behavior configuration
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct CrawlerConfig {
    /// Maximum link depth from the seed URLs (seeds are depth 0)
    #[serde(rename = "max-depth")]
    pub max_depth: u32,

    /// Maximum number of tasks admitted during a crawl
    #[serde(rename = "max-tasks")]
    pub max_tasks: u32,

    /// Number of concurrent workers
    #[serde(rename = "worker-count")]
    pub worker_count: u32,

    /// Starting and minimum delay between requests to one host
    #[serde(rename = "min-delay-seconds")]
    pub min_delay_seconds: f64,

    /// Ceiling for the adaptive backoff delay
    #[serde(rename = "max-delay-seconds")]
    pub max_delay_seconds: f64,

    /// Per-fetch timeout
    #[serde(rename = "fetch-timeout-seconds")]
    pub fetch_timeout_seconds: f64,

    /// Retries allowed for transient failures
    #[serde(rename = "max-retries")]
    pub max_retries: u32,

    /// Redirect hops followed before giving up
    #[serde(rename = "max-redirects")]
    pub max_redirects: u32,

    /// Optional timeout for the whole crawl
    #[serde(rename = "crawl-timeout-seconds")]
    pub crawl_timeout_seconds: Option<f64>,

    /// Whether robots.txt rules are consulted
    #[serde(rename = "respect-robots")]
    pub respect_robots: bool,

    /// Host patterns links may lead to; empty means the seed hosts
    #[serde(rename = "allowed-domains")]
    pub allowed_domains: Vec<String>,
}

impl Default for CrawlerConfig {
    fn default() -> Self {
        Self {
            max_depth: 2,
            max_tasks: 500,
            worker_count: 4,
            min_delay_seconds: 1.0,
            max_delay_seconds: 60.0,
            fetch_timeout_seconds: 10.0,
            max_retries: 3,
            max_redirects: 5,
            crawl_timeout_seconds: None,
            respect_robots: true,
            allowed_domains: Vec::new(),
        }
    }
}

impl CrawlerConfig {
    pub fn min_delay(&self) -> Duration {
        seconds(self.min_delay_seconds)
    }

    pub fn max_delay(&self) -> Duration {
        seconds(self.max_delay_seconds)
    }

    pub fn fetch_timeout(&self) -> Duration {
        seconds(self.fetch_timeout_seconds)
    }

    pub fn crawl_timeout(&self) -> Option<Duration> {
        self.crawl_timeout_seconds.map(seconds)
    }
}

/// Converts fractional seconds, mapping invalid values to zero
fn seconds(value: f64) -> Duration {
    Duration::try_from_secs_f64(value).unwrap_or(Duration::ZERO)
}

/// User agent identification configuration
#[derive(Debug, Clone, Deserialize)]
pub struct UserAgentConfig {
    /// Name of the crawler, also the robots.txt product token
    #[serde(rename = "crawler-name")]
    pub crawler_name: String,

    /// Version of the crawler
    #[serde(rename = "crawler-version")]
    pub crawler_version: String,

    /// URL with information about the crawler
    #[serde(rename = "contact-url")]
    pub contact_url: String,

    /// Email address for crawler-related contact
    #[serde(rename = "contact-email")]
    pub contact_email: String,
}

impl UserAgentConfig {
    /// Formats the User-Agent header: `Name/Version (+ContactURL; ContactEmail)`
    pub fn user_agent_string(&self) -> String {
        format!(
            "{}/{} (+{}; {})",
            self.crawler_name, self.crawler_version, self.contact_url, self.contact_email
        )
    }
}

/// Response cache configuration
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct CacheConfig {
    /// Lifetime of a cached response
    #[serde(rename = "ttl-seconds")]
    pub ttl_seconds: u64,

    /// SQLite file backing the cache; in-memory when absent
    #[serde(rename = "database-path")]
    pub database_path: Option<String>,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            ttl_seconds: 86_400,
            database_path: None,
        }
    }
}

impl CacheConfig {
    pub fn ttl(&self) -> Duration {
        Duration::from_secs(self.ttl_seconds)
    }
}

/// Output configuration
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct OutputConfig {
    /// Path of the tabular record export (.csv or .tsv)
    #[serde(rename = "export-path")]
    pub export_path: String,

    /// Path to the markdown summary file
    #[serde(rename = "summary-path")]
    pub summary_path: String,
}

impl Default for OutputConfig {
    fn default() -> Self {
        Self {
            export_path: "./records.csv".to_string(),
            summary_path: "./summary.md".to_string(),
        }
    }
}

/// Declarative extraction rules
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct ExtractConfig {
    /// When set, each matching element yields its own record
    #[serde(rename = "item-selector")]
    pub item_selector: Option<String>,

    #[serde(rename = "field")]
    pub fields: Vec<FieldConfig>,
}

/// One output field and how to find it
#[derive(Debug, Clone, Deserialize)]
pub struct FieldConfig {
    /// Column name in the output
    pub name: String,

    /// Selector expression, e.g. `class:price_color` or `path:h3 a`
    pub selector: String,

    /// Read this attribute instead of the element text
    #[serde(default)]
    pub attr: Option<String>,

    #[serde(default)]
    pub cardinality: Cardinality,

    #[serde(rename = "type", default)]
    pub value_type: ValueType,
}
