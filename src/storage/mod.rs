//! Storage module for persisting cached responses
//!
//! This module provides the backends behind the response cache:
//! - SQLite, for caches that survive between runs
//! - An in-memory map, for single-session crawls and tests

mod memory;
mod schema;
mod sqlite;
mod traits;

pub use memory::MemoryCacheStore;
pub use schema::{get_schema_version, SCHEMA_VERSION};
pub use sqlite::SqliteCacheStore;
pub use traits::{CacheStore, StorageError, StorageResult};

use chrono::{DateTime, Utc};
use std::path::Path;
use std::time::Duration;

use crate::crawler::Response;

/// Opens or creates the SQLite cache database
pub fn open_cache_store(path: &Path) -> StorageResult<SqliteCacheStore> {
    SqliteCacheStore::new(path)
}

/// A cached response and its lifetime
#[derive(Debug, Clone, PartialEq)]
pub struct CacheEntry {
    pub fingerprint: String,
    /// The normalized request URL
    pub url: String,
    pub response: Response,
    pub stored_at: DateTime<Utc>,
    pub ttl: Duration,
}

impl CacheEntry {
    pub fn new(fingerprint: &str, url: &str, response: Response, ttl: Duration) -> Self {
        Self {
            fingerprint: fingerprint.to_string(),
            url: url.to_string(),
            response,
            stored_at: Utc::now(),
            ttl,
        }
    }

    /// Instant after which the entry is a miss
    pub fn expires_at(&self) -> DateTime<Utc> {
        chrono::Duration::from_std(self.ttl)
            .ok()
            .and_then(|ttl| self.stored_at.checked_add_signed(ttl))
            .unwrap_or(DateTime::<Utc>::MAX_UTC)
    }

    pub fn is_expired(&self, now: DateTime<Utc>) -> bool {
        now >= self.expires_at()
    }
}
