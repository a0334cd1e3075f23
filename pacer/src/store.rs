use pacer_core::RequestResult;
use std::sync::{Mutex, MutexGuard, PoisonError};

/// Append-only record of every completed request in a run, in completion order.
///
/// Every access goes through one lock. Readers copy what they need and release the lock before
/// doing any work on the copy.
#[derive(Debug, Default)]
pub struct ResultStore {
    results: Mutex<Vec<RequestResult>>,
}

impl ResultStore {
    pub fn push(&self, result: RequestResult) {
        self.lock().push(result);
    }

    /// Copy of all results recorded so far.
    pub fn snapshot(&self) -> Vec<RequestResult> {
        self.lock().clone()
    }

    /// Latencies (ms) of the last `n` completed requests, or fewer if fewer have completed.
    pub fn recent_latencies(&self, n: usize) -> Vec<f64> {
        let results = self.lock();
        let start = results.len().saturating_sub(n);
        results[start..].iter().map(RequestResult::latency_ms).collect()
    }

    pub fn len(&self) -> usize {
        self.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    // A writer panicking mid-push cannot leave a partial element behind, so a poisoned lock still
    // holds a consistent list.
    fn lock(&self) -> MutexGuard<'_, Vec<RequestResult>> {
        self.results.lock().unwrap_or_else(PoisonError::into_inner)
    }
}
