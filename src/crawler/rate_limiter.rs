//! Per-host request spacing with adaptive backoff
//!
//! Each host gets its own slot: an async gate that serialises `acquire`
//! calls, and a `HostState` holding the current delay. Callers for
//! different hosts never contend on the same gate.

use std::collections::HashMap;
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;

use tokio::time::Instant;

use crate::state::HostState;

#[derive(Debug)]
struct HostSlot {
    gate: tokio::sync::Mutex<()>,
    state: Mutex<HostState>,
}

impl HostSlot {
    fn new(floor: Duration) -> Self {
        Self {
            gate: tokio::sync::Mutex::new(()),
            state: Mutex::new(HostState::new(floor)),
        }
    }

    fn state(&self) -> std::sync::MutexGuard<'_, HostState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

/// Throttles requests per host
#[derive(Debug)]
pub struct RateLimiter {
    min_delay: Duration,
    max_delay: Duration,
    hosts: Mutex<HashMap<String, Arc<HostSlot>>>,
}

impl RateLimiter {
    /// Creates a rate limiter
    ///
    /// # Arguments
    ///
    /// * `min_delay` - Starting delay and floor for every host
    /// * `max_delay` - Ceiling for backoff
    pub fn new(min_delay: Duration, max_delay: Duration) -> Self {
        Self {
            min_delay,
            max_delay,
            hosts: Mutex::new(HashMap::new()),
        }
    }

    fn slot(&self, host: &str) -> Arc<HostSlot> {
        let mut hosts = self.hosts.lock().unwrap_or_else(PoisonError::into_inner);
        Arc::clone(
            hosts
                .entry(host.to_string())
                .or_insert_with(|| Arc::new(HostSlot::new(self.min_delay))),
        )
    }

    fn existing(&self, host: &str) -> Option<Arc<HostSlot>> {
        self.hosts
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .get(host)
            .cloned()
    }

    /// Waits until a request to `host` is permitted and records the grant
    ///
    /// Concurrent callers for one host are granted strictly one after
    /// another, each at least the current delay after the previous grant.
    /// The delay is re-read after every sleep, so a penalty applied while
    /// waiting pushes the grant further out.
    ///
    /// # Returns
    ///
    /// The instant the request was granted
    pub async fn acquire(&self, host: &str) -> Instant {
        let slot = self.slot(host);
        let _gate = slot.gate.lock().await;

        loop {
            let wait = slot.state().time_until_next_request(Instant::now());
            match wait {
                Some(wait) => tokio::time::sleep(wait).await,
                None => break,
            }
        }

        let now = Instant::now();
        slot.state().record_grant(now);
        tracing::trace!("Rate limiter granted {}", host);
        now
    }

    /// Reports a 429/503 or transient failure for `host`
    ///
    /// # Returns
    ///
    /// The host's new delay
    pub fn penalize(&self, host: &str) -> Duration {
        let slot = self.slot(host);
        let delay = slot.state().penalize(self.max_delay);
        tracing::warn!("Backing off {}: delay now {:?}", host, delay);
        delay
    }

    /// Reports a successful response from `host`
    pub fn record_success(&self, host: &str) {
        self.slot(host).state().record_success();
    }

    /// Applies a robots.txt crawl-delay as the host's floor
    pub fn set_crawl_delay(&self, host: &str, delay: Duration) {
        let slot = self.slot(host);
        let mut state = slot.state();
        if delay > state.floor {
            tracing::debug!("Crawl-delay for {} raises floor to {:?}", host, delay);
        }
        state.raise_floor(delay);
    }

    /// Current delay for `host`, or the minimum for unseen hosts
    pub fn current_delay(&self, host: &str) -> Duration {
        self.existing(host)
            .map(|slot| slot.state().current_delay)
            .unwrap_or(self.min_delay)
    }

    /// Number of times `host` was penalized
    pub fn penalty_count(&self, host: &str) -> u32 {
        self.existing(host)
            .map(|slot| slot.state().penalty_count)
            .unwrap_or(0)
    }

    /// Number of grants issued for `host`
    pub fn request_count(&self, host: &str) -> u32 {
        self.existing(host)
            .map(|slot| slot.state().request_count)
            .unwrap_or(0)
    }

    pub fn min_delay(&self) -> Duration {
        self.min_delay
    }

    pub fn max_delay(&self) -> Duration {
        self.max_delay
    }
}
