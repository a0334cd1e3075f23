use crate::counters::RunCounters;
use crate::executor::Executor;
use crate::store::ResultStore;
use crate::timer::Timer;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{OwnedSemaphorePermit, Semaphore};
use tokio::task::JoinSet;
use tokio::time::{sleep_until, Instant, MissedTickBehavior};
#[allow(unused)]
use tracing::{debug, error, info, trace, warn, Instrument};

/// Launches one request per tick, with at most `concurrency` requests in flight.
///
/// Ticks that arrive while every slot is taken are dropped rather than queued, so the achieved
/// rate can fall below the configured one.
pub(crate) struct Dispatcher<E> {
    executor: Arc<E>,
    store: Arc<ResultStore>,
    counters: Arc<RunCounters>,
    permits: Arc<Semaphore>,
    concurrency: usize,
    tick_interval: Duration,
    tasks: JoinSet<()>,
}

#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub(crate) struct DispatchStats {
    pub dispatched: u64,
    /// Ticks on which launching had to wait for a free slot.
    pub saturated: u64,
}

impl<E: Executor> Dispatcher<E> {
    pub fn new(
        executor: Arc<E>,
        store: Arc<ResultStore>,
        counters: Arc<RunCounters>,
        concurrency: usize,
        tick_interval: Duration,
    ) -> Self {
        Self {
            executor,
            store,
            counters,
            permits: Arc::new(Semaphore::new(concurrency)),
            concurrency,
            tick_interval,
            tasks: JoinSet::new(),
        }
    }

    /// Dispatch until `deadline`, then wait for every in-flight request to land in the store.
    pub async fn run_until(mut self, deadline: Instant) -> DispatchStats {
        let mut stats = DispatchStats::default();
        let mut timer = Timer::new(self.tick_interval, MissedTickBehavior::Skip).await;
        debug!("Dispatching every {timer}");

        let deadline = sleep_until(deadline);
        tokio::pin!(deadline);

        // NOTE: This loop is time-sensitive. Nothing here may block besides the timer and the
        // semaphore.
        loop {
            tokio::select! {
                biased;
                _ = &mut deadline => break,
                _ = timer.tick() => {
                    let permit = match self.permits.clone().try_acquire_owned() {
                        Ok(permit) => Some(permit),
                        Err(_) => {
                            stats.saturated += 1;
                            trace!("All {} slots busy, waiting.", self.concurrency);
                            tokio::select! {
                                biased;
                                _ = &mut deadline => None,
                                permit = self.permits.clone().acquire_owned() => permit.ok(),
                            }
                        }
                    };

                    let Some(permit) = permit else {
                        break;
                    };
                    self.spawn(permit);
                    stats.dispatched += 1;
                    self.reap();
                }
            }
        }

        if stats.saturated > 0 {
            warn!(
                "Concurrency limit stalled dispatch on {} of {} ticks; achieved rate is below target.",
                stats.saturated, stats.dispatched
            );
        }

        debug!(
            "Deadline reached, waiting on {} in-flight requests.",
            self.counters.in_flight()
        );
        while let Some(res) = self.tasks.join_next().await {
            if let Err(err) = res {
                error!("Request task failed: {err}");
            }
        }

        stats
    }

    fn spawn(&mut self, permit: OwnedSemaphorePermit) {
        let executor = self.executor.clone();
        let store = self.store.clone();
        let counters = self.counters.clone();

        self.tasks.spawn(
            async move {
                let _permit = permit;
                counters.begin();
                let result = executor.execute().await;
                counters.record(&result);
                store.push(result);
            }
            .in_current_span(),
        );
    }

    // Drop finished tasks so long runs do not accumulate join handles.
    fn reap(&mut self) {
        while let Some(res) = self.tasks.try_join_next() {
            if let Err(err) = res {
                error!("Request task failed: {err}");
            }
        }
    }
}
