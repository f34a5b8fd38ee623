use std::sync::Arc;

use tokio::sync::{OwnedSemaphorePermit, Semaphore};

/// Caps how many steps of one run may be in flight at once.
#[derive(Debug, Clone)]
pub struct ParallelismLimit {
    semaphore: Option<Arc<Semaphore>>,
}

impl ParallelismLimit {
    /// `None` leaves the run bounded only by the graph width. `Some(0)` is
    /// treated as 1 so a run can always make progress.
    pub fn new(limit: Option<usize>) -> Self {
        Self {
            semaphore: limit.map(|n| Arc::new(Semaphore::new(n.max(1)))),
        }
    }

    /// Takes a slot without waiting. The scheduler only calls this between
    /// completions, so a `None` just means "wait for something to settle".
    pub fn try_acquire(&self) -> Option<StepPermit> {
        match &self.semaphore {
            None => Some(StepPermit { _permit: None }),
            Some(sem) => sem
                .clone()
                .try_acquire_owned()
                .ok()
                .map(|p| StepPermit { _permit: Some(p) }),
        }
    }

}

/// Held for as long as a step is in flight.
#[derive(Debug)]
pub struct StepPermit {
    _permit: Option<OwnedSemaphorePermit>,
}
