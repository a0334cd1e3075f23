use serde::{Deserialize, Serialize};

/// Latency summary of a set of samples, in milliseconds.
///
/// Percentiles use the nearest-rank method: the value at rank `ceil(pct * n) - 1` of the sorted
/// samples, clamped to `[0, n - 1]`. No interpolation is done, so every reported percentile is an
/// observed sample.
#[derive(Debug, Default, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct LatencyStats {
    pub p50: f64,
    pub p95: f64,
    pub p99: f64,
    pub max: f64,
    pub avg: f64,
}

impl LatencyStats {
    /// Reduce latency samples into percentile stats.
    ///
    /// An empty input yields all-zero stats. Callers should check the sample count before
    /// reporting a zero as a real latency.
    pub fn from_latencies(latencies: &[f64]) -> Self {
        if latencies.is_empty() {
            return Self::default();
        }

        let sorted = sorted(latencies);
        let n = sorted.len();
        Self {
            p50: sorted[percentile_index(n, 0.50)],
            p95: sorted[percentile_index(n, 0.95)],
            p99: sorted[percentile_index(n, 0.99)],
            max: sorted[n - 1],
            avg: statistical::mean(&sorted),
        }
    }
}

/// Single nearest-rank percentile over unsorted samples. Returns 0 for an empty input.
pub fn percentile(latencies: &[f64], pct: f64) -> f64 {
    if latencies.is_empty() {
        return 0.;
    }

    let sorted = sorted(latencies);
    sorted[percentile_index(sorted.len(), pct)]
}

/// Nearest-rank index into `n` ascending samples. `n` must be non-zero.
pub fn percentile_index(n: usize, pct: f64) -> usize {
    let idx = (pct * n as f64).ceil() as isize - 1;
    idx.clamp(0, n as isize - 1) as usize
}

fn sorted(latencies: &[f64]) -> Vec<f64> {
    let mut sorted = latencies.to_vec();
    sorted.sort_by(f64::total_cmp);
    sorted
}
