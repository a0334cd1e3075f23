use pacer_core::{LatencyStats, RequestResult, RunConfig, RunData, TimeseriesPoint};
use std::collections::BTreeMap;
use std::time::Duration;
use time::OffsetDateTime;

/// Identity and timing of a finished run.
pub(crate) struct RunHeader {
    pub run_id: String,
    pub started_at: OffsetDateTime,
    pub duration: Duration,
    pub config: RunConfig,
}

/// Reduce the full result set of a finished run into its report.
///
/// Must only be called once every worker has been joined, with a copy taken from the store.
pub(crate) fn aggregate(
    header: RunHeader,
    results: &[RequestResult],
    timeseries: Vec<TimeseriesPoint>,
) -> RunData {
    let mut status_dist = BTreeMap::new();
    let mut successes = 0;
    let mut failures = 0;

    for result in results {
        if result.is_failure() {
            failures += 1;
        } else {
            successes += 1;
        }
        *status_dist.entry(result.status_key()).or_insert(0) += 1;
    }

    let latencies: Vec<f64> = results.iter().map(RequestResult::latency_ms).collect();

    RunData {
        run_id: header.run_id,
        scenario: header.config.scenario.clone(),
        started_at: header.started_at,
        duration: header.duration,
        config: header.config.resolved(),
        requests: results.len() as u64,
        successes,
        failures,
        latencies: LatencyStats::from_latencies(&latencies),
        status_dist,
        timeseries,
        score: 0,
        score_line: String::new(),
        db_stats: None,
        hpa_stats: None,
        batch_stats: None,
    }
}
