//! Robots.txt cache entries
//!
//! Each host keeps one parsed robots.txt with a fixed lifetime. An expired
//! entry is re-fetched on the next query.

use crate::robots::ParsedRobots;
use chrono::{DateTime, Duration, Utc};

/// Lifetime of a fetched robots.txt
pub const ROBOTS_TTL_HOURS: i64 = 24;

/// Cached robots.txt data for a host
#[derive(Debug, Clone)]
pub struct CachedRobots {
    /// The parsed robots.txt content
    pub robots: ParsedRobots,

    /// When the robots.txt was fetched
    pub fetched_at: DateTime<Utc>,

    /// When the entry stops being used
    pub expires_at: DateTime<Utc>,
}

impl CachedRobots {
    /// Creates an entry fetched now, valid for `ROBOTS_TTL_HOURS`
    pub fn new(robots: ParsedRobots) -> Self {
        let fetched_at = Utc::now();
        Self {
            robots,
            fetched_at,
            expires_at: fetched_at + Duration::hours(ROBOTS_TTL_HOURS),
        }
    }

    /// Checks if the entry has expired
    pub fn is_stale(&self) -> bool {
        Utc::now() >= self.expires_at
    }
}
