use std::collections::HashSet;
use std::sync::{Mutex, PoisonError};

/// Result of trying to admit a URL into the visited set
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Admission {
    /// The URL was new and is now recorded
    Scheduled,
    /// The URL was already recorded
    Duplicate,
    /// The URL is new but the set is full
    LimitReached,
}

/// Normalized URLs already scheduled during this crawl session
///
/// A URL is recorded the moment it is scheduled. Check and insert happen in
/// one critical section, so two workers racing on the same URL cannot both
/// be admitted.
#[derive(Debug, Default)]
pub struct VisitedSet {
    inner: Mutex<HashSet<String>>,
}

impl VisitedSet {
    pub fn new() -> Self {
        Self::default()
    }

    /// Atomically admits `key` unless it is present or `capacity` is reached
    ///
    /// # Arguments
    ///
    /// * `key` - The normalized URL
    /// * `capacity` - Maximum number of URLs the set may hold
    pub fn try_schedule(&self, key: &str, capacity: usize) -> Admission {
        let mut set = self.inner.lock().unwrap_or_else(PoisonError::into_inner);

        if set.contains(key) {
            Admission::Duplicate
        } else if set.len() >= capacity {
            Admission::LimitReached
        } else {
            set.insert(key.to_string());
            Admission::Scheduled
        }
    }

    pub fn contains(&self, key: &str) -> bool {
        self.inner
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .contains(key)
    }

    pub fn len(&self) -> usize {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner).len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Returns true once `capacity` URLs have been admitted
    pub fn is_full(&self, capacity: usize) -> bool {
        self.len() >= capacity
    }
}
