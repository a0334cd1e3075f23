use pacer_core::RequestResult;
use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};

/// Lock-free totals for one run.
///
/// Workers bump these when a request completes, before its result lands in the
/// [`ResultStore`](crate::store::ResultStore), so a reader may briefly see a count whose
/// result is not yet stored.
#[derive(Debug, Default)]
pub(crate) struct RunCounters {
    sent: AtomicU64,
    errors: AtomicU64,
    in_flight: AtomicUsize,
}

#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub(crate) struct CounterSnapshot {
    pub sent: u64,
    pub errors: u64,
}

impl RunCounters {
    pub fn begin(&self) {
        let _in_flight = self.in_flight.fetch_add(1, Ordering::Relaxed) + 1;

        #[cfg(feature = "metrics")]
        metrics::gauge!("pacer_in_flight").set(_in_flight as f64);
    }

    pub fn record(&self, result: &RequestResult) {
        self.sent.fetch_add(1, Ordering::Relaxed);
        if result.is_failure() {
            self.errors.fetch_add(1, Ordering::Relaxed);
        }
        let _in_flight = self.in_flight.fetch_sub(1, Ordering::Relaxed) - 1;

        #[cfg(feature = "metrics")]
        {
            metrics::counter!("pacer_requests_total").increment(1);
            metrics::histogram!("pacer_request_latency").record(result.latency_ms());
            metrics::gauge!("pacer_in_flight").set(_in_flight as f64);
            if result.is_failure() {
                metrics::counter!(
                    "pacer_request_errors_total",
                    "status" => result.status_key().to_string()
                )
                .increment(1);
            }
        }
    }

    pub fn snapshot(&self) -> CounterSnapshot {
        CounterSnapshot {
            sent: self.sent.load(Ordering::Relaxed),
            errors: self.errors.load(Ordering::Relaxed),
        }
    }

    pub fn in_flight(&self) -> usize {
        self.in_flight.load(Ordering::Relaxed)
    }
}

#[cfg(feature = "metrics")]
pub(crate) fn describe_metrics() {
    metrics::describe_counter!("pacer_requests_total", "Completed requests");
    metrics::describe_counter!(
        "pacer_request_errors_total",
        "Failed requests by status, 0 for transport errors"
    );
    metrics::describe_histogram!(
        "pacer_request_latency",
        metrics::Unit::Milliseconds,
        "Request round trip latency"
    );
    metrics::describe_gauge!("pacer_in_flight", "Requests currently in flight");
}
