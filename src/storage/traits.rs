//! Storage traits and error types
//!
//! Response cache backends implement `CacheStore`. The cache layer above
//! owns TTL policy and corruption handling; stores only persist entries.

use chrono::{DateTime, Utc};
use thiserror::Error;

use crate::storage::CacheEntry;

/// Errors that can occur during storage operations
#[derive(Debug, Error)]
pub enum StorageError {
    #[error("Database error: {0}")]
    Database(String),

    #[error("Corrupt entry {fingerprint}: {reason}")]
    Corrupt { fingerprint: String, reason: String },

    #[error("Serialization error: {0}")]
    Serialization(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("SQLite error: {0}")]
    Sqlite(#[from] rusqlite::Error),
}

/// Result type for storage operations
pub type StorageResult<T> = Result<T, StorageError>;

/// Persistence for cached responses, keyed by request fingerprint
///
/// `store` replaces any entry with the same fingerprint in one step, so a
/// reader never sees a partially written entry.
pub trait CacheStore: Send {
    /// Loads the entry for a fingerprint, expired or not
    ///
    /// Returns `StorageError::Corrupt` when a stored entry cannot be decoded.
    fn load(&self, fingerprint: &str) -> StorageResult<Option<CacheEntry>>;

    /// Inserts or replaces an entry
    fn store(&mut self, entry: &CacheEntry) -> StorageResult<()>;

    /// Removes an entry if present
    fn remove(&mut self, fingerprint: &str) -> StorageResult<()>;

    /// Removes every entry expired at `now`, returning how many were removed
    fn purge_expired(&mut self, now: DateTime<Utc>) -> StorageResult<usize>;

    /// Number of stored entries, including expired ones
    fn count(&self) -> StorageResult<usize>;

    /// Removes every entry
    fn clear(&mut self) -> StorageResult<()>;
}
