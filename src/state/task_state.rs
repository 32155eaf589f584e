//! Task lifecycle states and terminal outcomes
use std::fmt;

use crate::crawler::FetchError;

/// Represents the current state of a crawl task
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TaskState {
    // ===== Active States =====
    /// Link has been found but not yet checked against robots rules
    Discovered,

    /// Robots rules allow the URL
    PolicyChecked,

    /// Admitted to the visited set and waiting in the frontier
    Scheduled,

    /// A worker is fetching the URL
    Fetching,

    /// The fetch hit a transient failure and the task will be rescheduled
    Retrying,

    // ===== Terminal States =====
    /// Fetched (or served from cache) and processed
    Succeeded,

    /// Permanent failure or retries exhausted
    Failed,

    /// Intentionally not fetched (robots denial, task limit)
    Skipped,

    /// Already admitted under the same normalized URL
    Duplicate,
}

impl TaskState {
    /// Returns true if no further processing happens in this state
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            Self::Succeeded | Self::Failed | Self::Skipped | Self::Duplicate
        )
    }

    /// Checks whether the lifecycle permits moving from `self` to `next`
    ///
    /// A cache hit moves a task straight from `Scheduled` to `Succeeded`.
    pub fn can_transition_to(&self, next: TaskState) -> bool {
        use TaskState::*;

        matches!(
            (self, next),
            (Discovered, PolicyChecked)
                | (Discovered, Skipped)
                | (PolicyChecked, Scheduled)
                | (PolicyChecked, Duplicate)
                | (PolicyChecked, Skipped)
                | (Scheduled, Fetching)
                | (Scheduled, Succeeded)
                | (Fetching, Succeeded)
                | (Fetching, Failed)
                | (Fetching, Retrying)
                | (Retrying, Scheduled)
        )
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Discovered => "discovered",
            Self::PolicyChecked => "policy_checked",
            Self::Scheduled => "scheduled",
            Self::Fetching => "fetching",
            Self::Retrying => "retrying",
            Self::Succeeded => "succeeded",
            Self::Failed => "failed",
            Self::Skipped => "skipped",
            Self::Duplicate => "duplicate",
        }
    }
}

impl fmt::Display for TaskState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Why a task was skipped without fetching
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SkipReason {
    /// robots.txt disallows the URL for our user agent
    PolicyDenied,
    /// The crawl's maximum task count was already reached
    TaskLimit,
}

impl fmt::Display for SkipReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::PolicyDenied => write!(f, "disallowed by robots.txt"),
            Self::TaskLimit => write!(f, "task limit reached"),
        }
    }
}

/// The recorded cause of a failed task
#[derive(Debug, Clone, PartialEq)]
pub enum FailureCause {
    /// Network failure or redirect loop reported by the fetcher
    Fetch(FetchError),
    /// The server answered with a non-success status
    HttpStatus(u16),
}

impl FailureCause {
    /// Returns true if the cause is worth retrying
    pub fn is_transient(&self) -> bool {
        match self {
            Self::Fetch(err) => err.is_transient(),
            Self::HttpStatus(status) => crate::crawler::is_transient_status(*status),
        }
    }
}

impl fmt::Display for FailureCause {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Fetch(err) => write!(f, "{}", err),
            Self::HttpStatus(status) => write!(f, "HTTP {}", status),
        }
    }
}

/// Terminal outcome of a task, as shown in the crawl manifest
#[derive(Debug, Clone, PartialEq)]
pub enum TaskOutcome {
    Succeeded,
    Skipped(SkipReason),
    Duplicate,
    Failed(FailureCause),
}

impl TaskOutcome {
    /// The terminal lifecycle state this outcome corresponds to
    pub fn state(&self) -> TaskState {
        match self {
            Self::Succeeded => TaskState::Succeeded,
            Self::Skipped(_) => TaskState::Skipped,
            Self::Duplicate => TaskState::Duplicate,
            Self::Failed(_) => TaskState::Failed,
        }
    }

    pub fn is_success(&self) -> bool {
        matches!(self, Self::Succeeded)
    }
}

impl fmt::Display for TaskOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Succeeded => write!(f, "succeeded"),
            Self::Skipped(reason) => write!(f, "skipped ({})", reason),
            Self::Duplicate => write!(f, "duplicate"),
            Self::Failed(cause) => write!(f, "failed ({})", cause),
        }
    }
}
