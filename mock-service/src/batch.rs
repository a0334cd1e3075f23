//! Bulkhead batch demo: fast and slow jobs run in separate bounded pools so slow jobs cannot
//! starve fast ones.
use pacer_core::{percentile, BatchSnapshot};
use std::collections::HashMap;
use std::sync::{
    atomic::{AtomicU64, Ordering},
    Arc, Mutex, PoisonError, RwLock,
};
use std::time::Duration;
use thiserror::Error;
use tokio::sync::Semaphore;
use tokio::time::Instant;
use tracing::{debug, error};

#[derive(Debug, Error, PartialEq, Eq)]
pub enum BatchError {
    #[error("must specify fast or slow > 0")]
    Empty,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum JobKind {
    Fast,
    Slow,
}

/// Pool sizes and simulated job durations.
#[derive(Debug, Clone, Copy)]
pub struct BulkheadConfig {
    pub fast_slots: usize,
    pub slow_slots: usize,
    pub fast_job: Duration,
    pub slow_job: Duration,
}

impl Default for BulkheadConfig {
    fn default() -> Self {
        Self {
            fast_slots: 10,
            slow_slots: 5,
            fast_job: Duration::from_millis(10),
            slow_job: Duration::from_secs(1),
        }
    }
}

#[derive(Debug)]
struct Batch {
    total: u64,
    started_at: Instant,
    done: AtomicU64,
    results: Mutex<Vec<(JobKind, Duration)>>,
}

impl Batch {
    fn record(&self, kind: JobKind, elapsed: Duration) {
        self.results
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push((kind, elapsed));
        self.done.fetch_add(1, Ordering::Relaxed);
    }

    fn snapshot(&self) -> BatchSnapshot {
        let done = self.done.load(Ordering::Relaxed);
        let results = self
            .results
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone();

        BatchSnapshot {
            total: self.total,
            done,
            fast_p95: p95_ms(&results, JobKind::Fast),
            slow_p95: p95_ms(&results, JobKind::Slow),
            elapsed: self.started_at.elapsed().as_millis() as f64,
            complete: done >= self.total,
        }
    }
}

fn p95_ms(results: &[(JobKind, Duration)], kind: JobKind) -> f64 {
    let latencies: Vec<f64> = results
        .iter()
        .filter(|(k, _)| *k == kind)
        .map(|(_, d)| d.as_millis() as f64)
        .collect();
    percentile(&latencies, 0.95)
}

/// All submitted batches, owned by the service state.
#[derive(Debug, Default)]
pub struct BatchRegistry {
    config: BulkheadConfig,
    batches: RwLock<HashMap<String, Arc<Batch>>>,
    seq: AtomicU64,
}

impl BatchRegistry {
    pub fn new(config: BulkheadConfig) -> Self {
        Self {
            config,
            batches: RwLock::new(HashMap::new()),
            seq: AtomicU64::new(0),
        }
    }

    /// Register a batch and start running its jobs. Must be called within a tokio runtime.
    pub fn submit(&self, fast: u64, slow: u64) -> Result<String, BatchError> {
        if fast == 0 && slow == 0 {
            return Err(BatchError::Empty);
        }

        let id = (self.seq.fetch_add(1, Ordering::Relaxed) + 1).to_string();
        let batch = Arc::new(Batch {
            total: fast + slow,
            started_at: Instant::now(),
            done: AtomicU64::new(0),
            results: Mutex::new(Vec::new()),
        });
        self.batches
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(id.clone(), batch.clone());

        debug!("Batch {id}: {fast} fast, {slow} slow");
        let fast_pool = Arc::new(Semaphore::new(self.config.fast_slots));
        let slow_pool = Arc::new(Semaphore::new(self.config.slow_slots));
        spawn_jobs(&batch, &fast_pool, JobKind::Fast, fast, self.config.fast_job);
        spawn_jobs(&batch, &slow_pool, JobKind::Slow, slow, self.config.slow_job);

        Ok(id)
    }

    pub fn snapshot(&self, id: &str) -> Option<BatchSnapshot> {
        self.batches
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(id)
            .map(|batch| batch.snapshot())
    }
}

fn spawn_jobs(batch: &Arc<Batch>, pool: &Arc<Semaphore>, kind: JobKind, count: u64, job: Duration) {
    for _ in 0..count {
        let batch = batch.clone();
        let pool = pool.clone();
        tokio::spawn(async move {
            let Ok(_permit) = pool.acquire_owned().await else {
                error!("Bulkhead pool closed.");
                return;
            };
            let start = Instant::now();
            tokio::time::sleep(job).await;
            batch.record(kind, start.elapsed());
        });
    }
}
