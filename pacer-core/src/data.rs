use crate::{LatencyStats, RunConfig, TRANSPORT_FAILURE_STATUS};
use rand::Rng;
use serde::{Deserialize, Serialize};
use serde_with::{serde_as, DurationSecondsWithFrac};
use std::collections::BTreeMap;
use std::fmt;
use std::time::Duration;
use thiserror::Error;
use time::{macros::format_description, OffsetDateTime};

/// Reason a request never produced a status code.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum TransportError {
    #[error("request timed out")]
    Timeout,

    #[error("connection failed: {0}")]
    Connect(String),

    #[error("request failed: {0}")]
    Request(String),
}

/// Outcome of one dispatched request.
#[derive(Debug, Clone)]
pub struct RequestResult {
    /// Response status, or `0` when the request failed before a status was received.
    pub status: u16,
    pub latency: Duration,
    pub error: Option<TransportError>,
    /// When the request was dispatched.
    pub started_at: OffsetDateTime,
}

impl RequestResult {
    pub fn response(status: u16, latency: Duration, started_at: OffsetDateTime) -> Self {
        Self {
            status,
            latency,
            error: None,
            started_at,
        }
    }

    pub fn transport_error(
        error: TransportError,
        latency: Duration,
        started_at: OffsetDateTime,
    ) -> Self {
        Self {
            status: TRANSPORT_FAILURE_STATUS,
            latency,
            error: Some(error),
            started_at,
        }
    }

    /// Transport errors and any status >= 400 count as failures.
    pub fn is_failure(&self) -> bool {
        self.error.is_some() || self.status >= 400
    }

    /// Key used in the status distribution.
    pub fn status_key(&self) -> u16 {
        if self.error.is_some() {
            TRANSPORT_FAILURE_STATUS
        } else {
            self.status
        }
    }

    /// Latency in whole milliseconds, as used by every reported statistic.
    pub fn latency_ms(&self) -> f64 {
        self.latency.as_millis() as f64
    }
}

/// One row of the live timeseries.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct TimeseriesPoint {
    #[serde(rename = "elapsed_s")]
    pub elapsed: f64,
    /// Requests completed during this interval (not cumulative).
    pub rps: f64,
    #[serde(rename = "latency_p95_ms")]
    pub latency_p95: f64,
    pub error_rate: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DbPoolSnapshot {
    pub max_open: u32,
    pub open: u32,
    pub in_use: u32,
    pub idle: u32,
    pub wait_count: u64,
    pub wait_duration: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AutoscalerSnapshot {
    pub desired_replicas: u32,
    pub current_replicas: u32,
    pub min_replicas: u32,
    pub max_replicas: u32,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BatchSnapshot {
    pub total: u64,
    pub done: u64,
    #[serde(rename = "fast_p95_ms")]
    pub fast_p95: f64,
    #[serde(rename = "slow_p95_ms")]
    pub slow_p95: f64,
    #[serde(rename = "elapsed_ms")]
    pub elapsed: f64,
    pub complete: bool,
}

/// Final output of a run.
///
/// Produced once by the aggregator and never mutated by the engine afterwards. The optional
/// snapshots are filled by collaborators through the `with_*` methods.
#[serde_as]
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RunData {
    pub run_id: String,
    pub scenario: String,
    #[serde(with = "time::serde::rfc3339")]
    pub started_at: OffsetDateTime,
    #[serde_as(as = "DurationSecondsWithFrac<f64>")]
    pub duration: Duration,
    pub config: RunConfig,
    pub requests: u64,
    pub successes: u64,
    pub failures: u64,
    pub latencies: LatencyStats,
    pub status_dist: BTreeMap<u16, u64>,
    pub timeseries: Vec<TimeseriesPoint>,
    /// Grade out of 100 assigned by whoever presents the run. The engine leaves it at 0.
    #[serde(default)]
    pub score: u32,
    #[serde(default)]
    pub score_line: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub db_stats: Option<DbPoolSnapshot>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub hpa_stats: Option<AutoscalerSnapshot>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub batch_stats: Option<BatchSnapshot>,
}

impl RunData {
    pub fn with_db_stats(mut self, snapshot: DbPoolSnapshot) -> Self {
        self.db_stats = Some(snapshot);
        self
    }

    pub fn with_hpa_stats(mut self, snapshot: AutoscalerSnapshot) -> Self {
        self.hpa_stats = Some(snapshot);
        self
    }

    pub fn with_batch_stats(mut self, snapshot: BatchSnapshot) -> Self {
        self.batch_stats = Some(snapshot);
        self
    }

    pub fn with_score(mut self, score: u32, line: &str) -> Self {
        self.score = score;
        self.score_line = line.to_string();
        self
    }

    /// Failed share of all requests, 0 when nothing completed.
    pub fn error_rate(&self) -> f64 {
        if self.requests == 0 {
            0.
        } else {
            self.failures as f64 / self.requests as f64
        }
    }

    /// Completed requests per second over the whole run, 0 for an empty run.
    pub fn throughput(&self) -> f64 {
        let secs = self.duration.as_secs_f64();
        if secs > 0. {
            self.requests as f64 / secs
        } else {
            0.
        }
    }
}

impl fmt::Display for RunData {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(
            f,
            "run {} against {} {} ({} rps for {}, concurrency {})",
            self.run_id,
            self.config.method(),
            self.config.target_url,
            self.config.rps,
            humantime::format_duration(self.config.duration),
            self.config.effective_concurrency(),
        )?;
        writeln!(
            f,
            "requests={} successes={} failures={} error_rate={:.2} throughput={:.2}/s",
            self.requests,
            self.successes,
            self.failures,
            self.error_rate(),
            self.throughput(),
        )?;
        if self.requests > 0 {
            writeln!(
                f,
                "latency p50={}ms p95={}ms p99={}ms max={}ms avg={:.2}ms",
                self.latencies.p50,
                self.latencies.p95,
                self.latencies.p99,
                self.latencies.max,
                self.latencies.avg,
            )?;
        }
        let dist: Vec<String> = self
            .status_dist
            .iter()
            .map(|(status, count)| format!("{status}={count}"))
            .collect();
        write!(f, "status {}", dist.join(" "))
    }
}

/// Run identifier: start time as `YYYYMMDD-HHMMSS` plus a random suffix in `0..1000`.
pub fn run_id(started_at: OffsetDateTime) -> String {
    let format = format_description!("[year][month][day]-[hour][minute][second]");
    // Infallible for a format made only of date and time components.
    let stamp = started_at
        .format(&format)
        .unwrap_or_else(|_| started_at.unix_timestamp().to_string());
    let suffix: u16 = rand::thread_rng().gen_range(0..1000);
    format!("{stamp}-{suffix}")
}
