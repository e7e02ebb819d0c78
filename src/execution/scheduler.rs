//! Cell scheduler - decides when matrix cells may start

use std::sync::Arc;
use tokio::sync::{OwnedSemaphorePermit, Semaphore};

/// Strategy for scheduling cell execution
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SchedulingStrategy {
    /// One cell at a time, in matrix order
    Sequential,

    /// Every cell starts at once
    Parallel,

    /// Limited parallelism (max N concurrent cells)
    LimitedParallel(usize),
}

impl Default for SchedulingStrategy {
    fn default() -> Self {
        SchedulingStrategy::Parallel
    }
}

impl SchedulingStrategy {
    /// Combine with a workflow's `max_parallel`; the smaller limit wins
    pub fn with_max_parallel(self, max_parallel: Option<usize>) -> Self {
        match (self, max_parallel) {
            (SchedulingStrategy::Sequential, _) => SchedulingStrategy::Sequential,
            (strategy, None) => strategy,
            (SchedulingStrategy::Parallel, Some(max)) => SchedulingStrategy::LimitedParallel(max),
            (SchedulingStrategy::LimitedParallel(n), Some(max)) => {
                SchedulingStrategy::LimitedParallel(n.min(max))
            }
        }
    }

    /// Concurrency limit, `None` when unbounded
    pub fn limit(&self) -> Option<usize> {
        match self {
            SchedulingStrategy::Sequential => Some(1),
            SchedulingStrategy::Parallel => None,
            SchedulingStrategy::LimitedParallel(max) => Some((*max).max(1)),
        }
    }
}

/// Gate a cell passes through before its task is spawned
///
/// Only start times are throttled; a permit is released when its cell
/// finishes, whatever the outcome.
#[derive(Debug, Clone)]
pub struct CellScheduler {
    strategy: SchedulingStrategy,
    permits: Option<Arc<Semaphore>>,
}

impl CellScheduler {
    pub fn new(strategy: SchedulingStrategy) -> Self {
        Self {
            strategy,
            permits: strategy.limit().map(|n| Arc::new(Semaphore::new(n))),
        }
    }

    pub fn strategy(&self) -> SchedulingStrategy {
        self.strategy
    }

    /// Wait for a slot; `None` means the cell may start immediately
    pub async fn acquire(&self) -> Option<OwnedSemaphorePermit> {
        match &self.permits {
            // The semaphore is never closed, so acquiring only fails if it were.
            Some(permits) => permits.clone().acquire_owned().await.ok(),
            None => None,
        }
    }
}
