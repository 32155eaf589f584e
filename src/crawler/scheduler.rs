//! Crawl tasks and the frontier queue
//!
//! The frontier is breadth first: shallower tasks are popped before deeper
//! ones, and tasks of equal depth leave in the order they were queued.

use std::cmp::Ordering;
use std::collections::BinaryHeap;

use url::Url;

use crate::state::TaskState;
use crate::HarvestError;

/// One URL moving through the crawl lifecycle
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CrawlTask {
    /// The normalized URL that is fetched
    pub url: Url,

    /// Link distance from a seed (seeds are depth 0)
    pub depth: u32,

    /// Page the link was found on; None for seeds
    pub parent: Option<String>,

    /// Transient failures retried so far
    pub retry_count: u32,

    state: TaskState,
}

impl CrawlTask {
    /// Creates a task in the `Discovered` state
    pub fn discovered(url: Url, depth: u32, parent: Option<String>) -> Self {
        Self {
            url,
            depth,
            parent,
            retry_count: 0,
            state: TaskState::Discovered,
        }
    }

    pub fn state(&self) -> TaskState {
        self.state
    }

    /// Visited-set key of the task
    pub fn key(&self) -> &str {
        self.url.as_str()
    }

    /// Moves the task to `next`
    ///
    /// # Returns
    ///
    /// * `Ok(())` - The lifecycle permits the move
    /// * `Err(HarvestError::InvalidTransition)` - It does not; the state is unchanged
    pub fn transition(&mut self, next: TaskState) -> Result<(), HarvestError> {
        if !self.state.can_transition_to(next) {
            return Err(HarvestError::InvalidTransition {
                from: self.state,
                to: next,
            });
        }
        tracing::trace!("{}: {} -> {}", self.url, self.state, next);
        self.state = next;
        Ok(())
    }
}

#[derive(Debug)]
struct Queued {
    task: CrawlTask,
    seq: u64,
}

// BinaryHeap is a max-heap: reverse the comparison so the lowest
// (depth, seq) pair is popped first
impl Ord for Queued {
    fn cmp(&self, other: &Self) -> Ordering {
        other
            .task
            .depth
            .cmp(&self.task.depth)
            .then_with(|| other.seq.cmp(&self.seq))
    }
}

impl PartialOrd for Queued {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl PartialEq for Queued {
    fn eq(&self, other: &Self) -> bool {
        self.seq == other.seq
    }
}

impl Eq for Queued {}

/// Queue of scheduled tasks
#[derive(Debug, Default)]
pub struct Frontier {
    heap: BinaryHeap<Queued>,
    next_seq: u64,
}

impl Frontier {
    pub fn new() -> Self {
        Self::default()
    }

    /// Queues a task behind every queued task of the same depth
    pub fn push(&mut self, task: CrawlTask) {
        let seq = self.next_seq;
        self.next_seq += 1;
        self.heap.push(Queued { task, seq });
    }

    pub fn pop(&mut self) -> Option<CrawlTask> {
        self.heap.pop().map(|q| q.task)
    }

    pub fn len(&self) -> usize {
        self.heap.len()
    }

    pub fn is_empty(&self) -> bool {
        self.heap.is_empty()
    }

    /// Empties the queue in pop order
    pub fn drain(&mut self) -> Vec<CrawlTask> {
        let mut tasks = Vec::with_capacity(self.heap.len());
        while let Some(task) = self.pop() {
            tasks.push(task);
        }
        tasks
    }
}
