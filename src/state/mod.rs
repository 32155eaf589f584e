//! State module for tracking crawl progress
//!
//! # Components
//!
//! - `TaskState`: lifecycle of a single crawl task, with its terminal `TaskOutcome`
//! - `HostState`: per-host politeness state used by the rate limiter
//! - `VisitedSet`: normalized URLs admitted during the session

mod host_state;
mod task_state;
mod visited;

pub use host_state::{HostState, DECAY_AFTER_SUCCESSES};
pub use task_state::{FailureCause, SkipReason, TaskOutcome, TaskState};
pub use visited::{Admission, VisitedSet};
