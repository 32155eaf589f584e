//! Response cache
//!
//! Maps request fingerprints to previously fetched responses. Entries
//! expire after their TTL and are evicted lazily when read. An entry that
//! cannot be decoded is logged, removed and reported as a miss; the caller
//! never sees the corruption.

mod fingerprint;

pub use fingerprint::Fingerprint;

use std::sync::{Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use chrono::Utc;

use crate::config::CacheConfig;
use crate::crawler::Response;
use crate::storage::{
    open_cache_store, CacheEntry, CacheStore, MemoryCacheStore, StorageError, StorageResult,
};
use crate::HarvestError;

/// Fingerprint-keyed store of fetched responses
pub struct ResponseCache {
    store: Mutex<Box<dyn CacheStore>>,
    default_ttl: Duration,
}

impl std::fmt::Debug for ResponseCache {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ResponseCache")
            .field("default_ttl", &self.default_ttl)
            .finish_non_exhaustive()
    }
}

impl ResponseCache {
    pub fn new(store: Box<dyn CacheStore>, default_ttl: Duration) -> Self {
        Self {
            store: Mutex::new(store),
            default_ttl,
        }
    }

    /// In-memory cache
    pub fn in_memory(default_ttl: Duration) -> Self {
        Self::new(Box::new(MemoryCacheStore::new()), default_ttl)
    }

    /// Builds the cache described by the configuration
    ///
    /// A `database-path` selects SQLite; otherwise the cache lives in memory.
    pub fn from_config(config: &CacheConfig) -> StorageResult<Self> {
        match &config.database_path {
            Some(path) => {
                let store = open_cache_store(std::path::Path::new(path))?;
                tracing::info!("Using response cache at {}", path);
                Ok(Self::new(Box::new(store), config.ttl()))
            }
            None => Ok(Self::in_memory(config.ttl())),
        }
    }

    fn store(&self) -> MutexGuard<'_, Box<dyn CacheStore>> {
        self.store.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn default_ttl(&self) -> Duration {
        self.default_ttl
    }

    /// Looks up a live response
    ///
    /// Returns None on a miss, an expired entry, a corrupt entry or a
    /// storage failure.
    pub fn get(&self, fingerprint: &Fingerprint) -> Option<Response> {
        let mut store = self.store();

        match store.load(fingerprint.as_str()) {
            Ok(Some(entry)) if entry.is_expired(Utc::now()) => {
                tracing::trace!("Cache entry {} expired", fingerprint);
                if let Err(e) = store.remove(fingerprint.as_str()) {
                    tracing::warn!("Failed to evict expired cache entry {}: {}", fingerprint, e);
                }
                None
            }
            Ok(Some(entry)) => Some(entry.response),
            Ok(None) => None,
            Err(StorageError::Corrupt { fingerprint: fp, reason }) => {
                let err = HarvestError::CacheCorruption {
                    fingerprint: fp,
                    reason,
                };
                tracing::warn!("{}; treating as a miss", err);
                if let Err(e) = store.remove(fingerprint.as_str()) {
                    tracing::warn!("Failed to remove corrupt cache entry {}: {}", fingerprint, e);
                }
                None
            }
            Err(e) => {
                tracing::warn!("Cache lookup for {} failed: {}", fingerprint, e);
                None
            }
        }
    }

    /// Stores a response, replacing any entry with the same fingerprint
    ///
    /// # Arguments
    ///
    /// * `fingerprint` - Request identity
    /// * `url` - Normalized request URL, kept for inspection
    /// * `response` - The response to cache
    /// * `ttl` - Lifetime of the entry
    pub fn put(
        &self,
        fingerprint: &Fingerprint,
        url: &str,
        response: &Response,
        ttl: Duration,
    ) -> StorageResult<()> {
        let entry = CacheEntry::new(fingerprint.as_str(), url, response.clone(), ttl);
        self.store().store(&entry)
    }

    /// Removes expired entries
    pub fn purge_expired(&self) -> StorageResult<usize> {
        self.store().purge_expired(Utc::now())
    }

    /// Number of stored entries
    pub fn len(&self) -> StorageResult<usize> {
        self.store().count()
    }

    pub fn is_empty(&self) -> StorageResult<bool> {
        Ok(self.len()? == 0)
    }

    /// Removes every entry
    pub fn clear(&self) -> StorageResult<()> {
        self.store().clear()
    }
}
