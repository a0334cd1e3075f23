use std::time::Duration;

/// Cadence of the live timeseries sampler, independent of the dispatch tick rate.
pub const SAMPLE_INTERVAL: Duration = Duration::from_secs(1);

/// Number of most recently completed requests used for the live p95.
pub const RECENT_WINDOW: usize = 50;

/// Client-level timeout on every request. A safety net, not a precision deadline.
pub const CLIENT_TIMEOUT: Duration = Duration::from_secs(30);

/// HTTP method used when none is configured.
pub const DEFAULT_METHOD: &str = "GET";

/// Status recorded for requests that failed before a response arrived.
pub const TRANSPORT_FAILURE_STATUS: u16 = 0;
