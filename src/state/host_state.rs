use std::time::Duration;
use tokio::time::Instant;

/// Consecutive successes needed before the delay decays one step
pub const DECAY_AFTER_SUCCESSES: u32 = 3;

/// Smallest delay a penalty can produce when the current delay is zero
const MIN_PENALTY_DELAY: Duration = Duration::from_millis(100);

/// Politeness state for a single host
///
/// Tracks the spacing between requests and the adaptive backoff applied
/// when the host signals overload.
#[derive(Debug, Clone)]
pub struct HostState {
    /// Delay currently enforced between two grants
    pub current_delay: Duration,

    /// Lowest delay the host may decay to (configured minimum or crawl-delay)
    pub floor: Duration,

    /// When the last request was granted
    pub last_grant: Option<Instant>,

    /// Successes observed since the last decay step or penalty
    pub success_streak: u32,

    /// Number of times the host was penalized
    pub penalty_count: u32,

    /// Number of grants issued for this host
    pub request_count: u32,
}

impl HostState {
    /// Creates a new HostState starting at the floor delay
    pub fn new(floor: Duration) -> Self {
        Self {
            current_delay: floor,
            floor,
            last_grant: None,
            success_streak: 0,
            penalty_count: 0,
            request_count: 0,
        }
    }

    /// Calculates the time until the next request can be made
    ///
    /// Returns None if a request can be made now.
    pub fn time_until_next_request(&self, now: Instant) -> Option<Duration> {
        let elapsed = now.saturating_duration_since(self.last_grant?);
        self.current_delay
            .checked_sub(elapsed)
            .filter(|wait| !wait.is_zero())
    }

    /// Records that a request was granted at `now`
    pub fn record_grant(&mut self, now: Instant) {
        self.request_count += 1;
        self.last_grant = Some(now);
    }

    /// Doubles the delay, capped at `max(max_delay, floor)`
    ///
    /// # Returns
    ///
    /// The new current delay
    pub fn penalize(&mut self, max_delay: Duration) -> Duration {
        let ceiling = max_delay.max(self.floor);
        let doubled = self
            .current_delay
            .checked_mul(2)
            .unwrap_or(ceiling)
            .max(MIN_PENALTY_DELAY);

        self.current_delay = doubled.min(ceiling);
        self.success_streak = 0;
        self.penalty_count += 1;
        self.current_delay
    }

    /// Counts a success; every few in a row halve the delay toward the floor
    pub fn record_success(&mut self) {
        self.success_streak += 1;
        if self.success_streak >= DECAY_AFTER_SUCCESSES {
            self.success_streak = 0;
            self.current_delay = (self.current_delay / 2).max(self.floor);
        }
    }

    /// Raises the floor (for example to a robots.txt crawl-delay)
    ///
    /// A floor lower than the current one is ignored.
    pub fn raise_floor(&mut self, floor: Duration) {
        if floor > self.floor {
            self.floor = floor;
        }
        if self.current_delay < self.floor {
            self.current_delay = self.floor;
        }
    }
}
