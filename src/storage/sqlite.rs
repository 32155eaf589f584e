//! SQLite storage implementation
//!
//! This module provides a SQLite-backed `CacheStore`. Each response is one
//! row; headers are JSON, the body is a BLOB and timestamps are RFC 3339
//! with nanoseconds so that a stored response reads back unchanged.

use std::path::Path;
use std::time::Duration;

use chrono::{DateTime, SecondsFormat, Utc};
use rusqlite::{params, Connection, OptionalExtension};

use crate::crawler::{Headers, Response};
use crate::storage::schema::initialize_schema;
use crate::storage::traits::{CacheStore, StorageError, StorageResult};
use crate::storage::CacheEntry;

/// SQLite cache backend
pub struct SqliteCacheStore {
    conn: Connection,
}

impl std::fmt::Debug for SqliteCacheStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SqliteCacheStore")
            .field("path", &self.conn.path())
            .finish()
    }
}

/// Raw column values of one `responses` row
struct ResponseRow {
    fingerprint: String,
    url: String,
    final_url: String,
    status: i64,
    headers: String,
    body: Vec<u8>,
    fetched_at: String,
    stored_at: String,
    ttl_ms: i64,
}

fn format_timestamp(ts: &DateTime<Utc>) -> String {
    ts.to_rfc3339_opts(SecondsFormat::Nanos, true)
}

/// Expiry as epoch milliseconds, rounded up so a purge never runs early
fn expiry_millis(entry: &CacheEntry) -> i64 {
    let expires_at = entry.expires_at();
    let millis = expires_at.timestamp_millis();
    if expires_at.timestamp_subsec_nanos() % 1_000_000 == 0 {
        millis
    } else {
        millis.saturating_add(1)
    }
}

impl ResponseRow {
    fn decode(self) -> StorageResult<CacheEntry> {
        let fingerprint = self.fingerprint;
        let corrupt = |reason: String| StorageError::Corrupt {
            fingerprint: fingerprint.clone(),
            reason,
        };

        let status = u16::try_from(self.status)
            .map_err(|_| corrupt(format!("status {} out of range", self.status)))?;
        let headers: Headers = serde_json::from_str(&self.headers)
            .map_err(|e| corrupt(format!("headers: {}", e)))?;
        let fetched_at = parse_timestamp(&self.fetched_at)
            .map_err(|e| corrupt(format!("fetched_at: {}", e)))?;
        let stored_at = parse_timestamp(&self.stored_at)
            .map_err(|e| corrupt(format!("stored_at: {}", e)))?;
        let ttl_ms = u64::try_from(self.ttl_ms)
            .map_err(|_| corrupt(format!("negative ttl {}", self.ttl_ms)))?;

        Ok(CacheEntry {
            fingerprint: fingerprint.clone(),
            url: self.url,
            response: Response {
                status,
                headers,
                body: self.body,
                final_url: self.final_url,
                fetched_at,
            },
            stored_at,
            ttl: Duration::from_millis(ttl_ms),
        })
    }
}

fn parse_timestamp(value: &str) -> Result<DateTime<Utc>, chrono::ParseError> {
    DateTime::parse_from_rfc3339(value).map(|ts| ts.with_timezone(&Utc))
}

impl SqliteCacheStore {
    /// Opens or creates a cache database
    ///
    /// # Arguments
    ///
    /// * `path` - Path to the SQLite database file
    pub fn new(path: &Path) -> StorageResult<Self> {
        let conn = Connection::open(path)?;

        conn.execute_batch(
            "
            PRAGMA journal_mode = WAL;
            PRAGMA synchronous = NORMAL;
            PRAGMA temp_store = MEMORY;
        ",
        )?;

        initialize_schema(&conn)?;

        Ok(Self { conn })
    }

    /// Creates an in-memory database (for testing)
    #[cfg(test)]
    pub fn new_in_memory() -> StorageResult<Self> {
        let conn = Connection::open_in_memory()?;
        initialize_schema(&conn)?;
        Ok(Self { conn })
    }

    #[cfg(test)]
    fn connection(&self) -> &Connection {
        &self.conn
    }
}

impl CacheStore for SqliteCacheStore {
    fn load(&self, fingerprint: &str) -> StorageResult<Option<CacheEntry>> {
        let row = self
            .conn
            .query_row(
                "SELECT fingerprint, url, final_url, status, headers, body, fetched_at, stored_at, ttl_ms
                 FROM responses WHERE fingerprint = ?1",
                params![fingerprint],
                |row| {
                    Ok(ResponseRow {
                        fingerprint: row.get(0)?,
                        url: row.get(1)?,
                        final_url: row.get(2)?,
                        status: row.get(3)?,
                        headers: row.get(4)?,
                        body: row.get(5)?,
                        fetched_at: row.get(6)?,
                        stored_at: row.get(7)?,
                        ttl_ms: row.get(8)?,
                    })
                },
            )
            .optional()
            .map_err(|e| match e {
                // a column of the wrong type is a damaged row, not a failed query
                rusqlite::Error::FromSqlConversionFailure(..)
                | rusqlite::Error::InvalidColumnType(..) => StorageError::Corrupt {
                    fingerprint: fingerprint.to_string(),
                    reason: e.to_string(),
                },
                other => StorageError::Sqlite(other),
            })?;

        row.map(ResponseRow::decode).transpose()
    }

    fn store(&mut self, entry: &CacheEntry) -> StorageResult<()> {
        let headers = serde_json::to_string(&entry.response.headers)
            .map_err(|e| StorageError::Serialization(e.to_string()))?;
        let ttl_ms = i64::try_from(entry.ttl.as_millis()).unwrap_or(i64::MAX);

        self.conn.execute(
            "INSERT OR REPLACE INTO responses
                (fingerprint, url, final_url, status, headers, body, fetched_at, stored_at, ttl_ms, expires_at_ms)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10)",
            params![
                entry.fingerprint,
                entry.url,
                entry.response.final_url,
                entry.response.status,
                headers,
                entry.response.body,
                format_timestamp(&entry.response.fetched_at),
                format_timestamp(&entry.stored_at),
                ttl_ms,
                expiry_millis(entry),
            ],
        )?;
        Ok(())
    }

    fn remove(&mut self, fingerprint: &str) -> StorageResult<()> {
        self.conn.execute(
            "DELETE FROM responses WHERE fingerprint = ?1",
            params![fingerprint],
        )?;
        Ok(())
    }

    fn purge_expired(&mut self, now: DateTime<Utc>) -> StorageResult<usize> {
        let removed = self.conn.execute(
            "DELETE FROM responses WHERE expires_at_ms <= ?1",
            params![now.timestamp_millis()],
        )?;
        Ok(removed)
    }

    fn count(&self) -> StorageResult<usize> {
        let count: i64 = self
            .conn
            .query_row("SELECT COUNT(*) FROM responses", [], |row| row.get(0))?;
        Ok(usize::try_from(count).unwrap_or(0))
    }

    fn clear(&mut self) -> StorageResult<()> {
        self.conn.execute("DELETE FROM responses", [])?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::test_support::sample_response;
    use tempfile::TempDir;

    fn entry(fp: &str, body: &str, ttl: Duration) -> CacheEntry {
        CacheEntry::new(fp, "https://example.com/page", sample_response(body), ttl)
    }

    #[test]
    fn test_create_in_memory() {
        let store = SqliteCacheStore::new_in_memory().unwrap();
        assert_eq!(store.count().unwrap(), 0);
    }

    #[test]
    fn test_round_trip_is_exact() {
        let mut store = SqliteCacheStore::new_in_memory().unwrap();
        let original = entry("fp1", "<html>body</html>", Duration::from_secs(3600));

        store.store(&original).unwrap();
        let loaded = store.load("fp1").unwrap().unwrap();

        assert_eq!(loaded, original);
        assert_eq!(loaded.response.headers.get_all("set-cookie").count(), 2);
    }

    #[test]
    fn test_binary_body_round_trip() {
        let mut store = SqliteCacheStore::new_in_memory().unwrap();
        let mut original = entry("bin", "", Duration::from_secs(60));
        original.response.body = vec![0, 159, 146, 150, 255];

        store.store(&original).unwrap();
        assert_eq!(store.load("bin").unwrap().unwrap().response.body, original.response.body);
    }

    #[test]
    fn test_replace_is_last_write_wins() {
        let mut store = SqliteCacheStore::new_in_memory().unwrap();
        store.store(&entry("fp1", "one", Duration::from_secs(60))).unwrap();
        store.store(&entry("fp1", "two", Duration::from_secs(60))).unwrap();

        assert_eq!(store.count().unwrap(), 1);
        assert_eq!(store.load("fp1").unwrap().unwrap().response.body, b"two");
    }

    #[test]
    fn test_corrupt_headers_reported() {
        let mut store = SqliteCacheStore::new_in_memory().unwrap();
        store.store(&entry("fp1", "x", Duration::from_secs(60))).unwrap();
        store
            .connection()
            .execute("UPDATE responses SET headers = 'not json' WHERE fingerprint = 'fp1'", [])
            .unwrap();

        let err = store.load("fp1").unwrap_err();
        assert!(matches!(err, StorageError::Corrupt { ref fingerprint, .. } if fingerprint == "fp1"));
    }

    #[test]
    fn test_corrupt_timestamp_reported() {
        let mut store = SqliteCacheStore::new_in_memory().unwrap();
        store.store(&entry("fp1", "x", Duration::from_secs(60))).unwrap();
        store
            .connection()
            .execute("UPDATE responses SET fetched_at = 'yesterday'", [])
            .unwrap();

        assert!(matches!(store.load("fp1"), Err(StorageError::Corrupt { .. })));
    }

    #[test]
    fn test_purge_expired() {
        let mut store = SqliteCacheStore::new_in_memory().unwrap();
        store.store(&entry("old", "a", Duration::ZERO)).unwrap();
        store.store(&entry("new", "b", Duration::from_secs(600))).unwrap();

        assert_eq!(store.purge_expired(Utc::now()).unwrap(), 1);
        assert!(store.load("old").unwrap().is_none());
        assert!(store.load("new").unwrap().is_some());
    }

    #[test]
    fn test_purge_keeps_entries_that_never_expire() {
        let mut store = SqliteCacheStore::new_in_memory().unwrap();
        let forever = entry("forever", "a", Duration::from_secs(10_000_000_000_000));
        assert_eq!(forever.expires_at(), DateTime::<Utc>::MAX_UTC);
        store.store(&forever).unwrap();

        assert_eq!(store.purge_expired(Utc::now()).unwrap(), 0);
        assert!(store.load("forever").unwrap().is_some());
    }

    #[test]
    fn test_purge_agrees_with_memory_store() {
        use crate::storage::MemoryCacheStore;

        let entries = [
            entry("zero", "a", Duration::ZERO),
            entry("hour", "b", Duration::from_secs(3600)),
            entry("forever", "c", Duration::MAX),
        ];
        let mut sqlite = SqliteCacheStore::new_in_memory().unwrap();
        let mut memory = MemoryCacheStore::new();
        for e in &entries {
            sqlite.store(e).unwrap();
            memory.store(e).unwrap();
        }

        let now = Utc::now() + chrono::Duration::seconds(1);
        assert_eq!(
            sqlite.purge_expired(now).unwrap(),
            memory.purge_expired(now).unwrap()
        );
        assert_eq!(sqlite.count().unwrap(), 2);
        assert_eq!(memory.count().unwrap(), 2);
    }

    #[test]
    fn test_persists_across_connections() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("cache.db");

        {
            let mut store = SqliteCacheStore::new(&path).unwrap();
            store.store(&entry("fp1", "kept", Duration::from_secs(600))).unwrap();
        }

        let store = SqliteCacheStore::new(&path).unwrap();
        assert_eq!(store.load("fp1").unwrap().unwrap().response.body, b"kept");
    }
}
