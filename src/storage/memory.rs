use std::collections::HashMap;

use chrono::{DateTime, Utc};

use crate::storage::traits::{CacheStore, StorageResult};
use crate::storage::CacheEntry;

/// Cache store held entirely in memory
#[derive(Debug, Default)]
pub struct MemoryCacheStore {
    entries: HashMap<String, CacheEntry>,
}

impl MemoryCacheStore {
    pub fn new() -> Self {
        Self::default()
    }
}

impl CacheStore for MemoryCacheStore {
    fn load(&self, fingerprint: &str) -> StorageResult<Option<CacheEntry>> {
        Ok(self.entries.get(fingerprint).cloned())
    }

    fn store(&mut self, entry: &CacheEntry) -> StorageResult<()> {
        self.entries
            .insert(entry.fingerprint.clone(), entry.clone());
        Ok(())
    }

    fn remove(&mut self, fingerprint: &str) -> StorageResult<()> {
        self.entries.remove(fingerprint);
        Ok(())
    }

    fn purge_expired(&mut self, now: DateTime<Utc>) -> StorageResult<usize> {
        let before = self.entries.len();
        self.entries.retain(|_, entry| !entry.is_expired(now));
        Ok(before - self.entries.len())
    }

    fn count(&self) -> StorageResult<usize> {
        Ok(self.entries.len())
    }

    fn clear(&mut self) -> StorageResult<()> {
        self.entries.clear();
        Ok(())
    }
}
