use crate::counters::{CounterSnapshot, RunCounters};
use crate::store::ResultStore;
use crate::timer::Timer;
use pacer_core::{percentile, TimeseriesPoint, RECENT_WINDOW, SAMPLE_INTERVAL};
use std::sync::Arc;
use std::time::Duration;
use tokio::time::{sleep_until, Instant, MissedTickBehavior};
#[allow(unused)]
use tracing::{debug, error, info, trace, warn};

/// Builds the live timeseries of a run on its own clock.
///
/// Each tick turns the change in the run counters since the previous tick into an interval
/// rate and error rate, and pairs it with the p95 over the most recently completed requests.
pub(crate) struct TimeseriesSampler {
    store: Arc<ResultStore>,
    counters: Arc<RunCounters>,
    interval: Duration,
    window: usize,
    start: Instant,
    last: CounterSnapshot,
    points: Vec<TimeseriesPoint>,
}

impl TimeseriesSampler {
    pub fn new(store: Arc<ResultStore>, counters: Arc<RunCounters>, start: Instant) -> Self {
        Self {
            store,
            counters,
            interval: SAMPLE_INTERVAL,
            window: RECENT_WINDOW,
            start,
            last: CounterSnapshot::default(),
            points: vec![],
        }
    }

    #[cfg(test)]
    fn with_interval(mut self, interval: Duration) -> Self {
        self.interval = interval;
        self
    }

    /// Sample once per interval until `deadline` and return the points collected.
    pub async fn run_until(mut self, deadline: Instant) -> Vec<TimeseriesPoint> {
        let mut timer = Timer::new(self.interval, MissedTickBehavior::Delay).await;
        let deadline = sleep_until(deadline);
        tokio::pin!(deadline);

        loop {
            tokio::select! {
                biased;
                _ = &mut deadline => break,
                _ = timer.tick() => {
                    let point = self.sample();
                    debug!(
                        "t={:.1}s rps={} p95={}ms error_rate={:.2}",
                        point.elapsed, point.rps, point.latency_p95, point.error_rate
                    );
                }
            }
        }

        self.points
    }

    /// Take one point from the current counters and recent results.
    pub fn sample(&mut self) -> TimeseriesPoint {
        let current = self.counters.snapshot();
        let interval_requests = current.sent.saturating_sub(self.last.sent);
        let interval_errors = current.errors.saturating_sub(self.last.errors);
        self.last = current;

        let error_rate = if interval_requests > 0 {
            interval_errors as f64 / interval_requests as f64
        } else {
            0.
        };

        let recent = self.store.recent_latencies(self.window);
        let point = TimeseriesPoint {
            elapsed: self.start.elapsed().as_secs_f64(),
            rps: interval_requests as f64,
            latency_p95: percentile(&recent, 0.95),
            error_rate,
        };
        self.points.push(point);
        point
    }
}
