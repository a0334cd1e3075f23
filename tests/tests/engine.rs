mod utils;
use utils::*;

use pacer::prelude::*;
use pacer::report;
use std::collections::BTreeMap;
use std::time::Duration;
use tracing_test::traced_test;

#[traced_test]
#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
#[ntest::timeout(20_000)]
async fn steady_load_against_fast_endpoint() {
    let base = init().await;

    let data = Run::new(&format!("{base}/delay/ms/5"))
        .scenario("steady")
        .rps(10)
        .duration(Duration::from_secs(2))
        .concurrency(5)
        .await
        .unwrap();

    assert!((17..=22).contains(&data.requests), "{}", data.requests);
    assert_eq!(data.failures, 0);
    assert_eq!(data.status_dist, BTreeMap::from([(200, data.requests)]));
    assert!(data.latencies.p50 >= 5.);
    assert!(data.latencies.p50 <= data.latencies.p95);
    assert!(data.latencies.p95 <= data.latencies.p99);
    assert!(data.latencies.p99 <= data.latencies.max);
    assert_eq!(data.config.method, "GET");
    assert_eq!(data.config.concurrency, Some(5));
}

#[traced_test]
#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
#[ntest::timeout(20_000)]
async fn error_statuses_are_counted_not_raised() {
    let base = init().await;

    let data = Run::new(&format!("{base}/status/503"))
        .rps(20)
        .duration(Duration::from_secs(1))
        .await
        .unwrap();

    assert!(data.requests > 0);
    assert_eq!(data.successes, 0);
    assert_eq!(data.failures, data.requests);
    assert_eq!(data.status_dist, BTreeMap::from([(503, data.requests)]));
    assert_eq!(data.error_rate(), 1.);
}

#[traced_test]
#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
#[ntest::timeout(20_000)]
async fn simulated_dependency_failures() {
    let base = init().await;

    let data = Run::new(&format!("{base}/work?sleep=2ms&fail=1.0"))
        .rps(20)
        .duration(Duration::from_secs(1))
        .await
        .unwrap();

    assert!(data.requests > 0);
    assert_eq!(data.status_dist, BTreeMap::from([(500, data.requests)]));

    let data = Run::new(&format!("{base}/work?fail=0.0"))
        .rps(20)
        .duration(Duration::from_secs(1))
        .await
        .unwrap();

    assert_eq!(data.failures, 0);
    assert_eq!(data.status_dist, BTreeMap::from([(200, data.requests)]));
}

#[traced_test]
#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
#[ntest::timeout(20_000)]
async fn refused_connections_are_status_zero() {
    init().await;
    let addr = closed_addr().await;

    let data = Run::new(&format!("http://{addr}/"))
        .rps(10)
        .duration(Duration::from_secs(1))
        .await
        .unwrap();

    assert!(data.requests > 0);
    assert_eq!(data.failures, data.requests);
    assert_eq!(data.status_dist, BTreeMap::from([(0, data.requests)]));
}

#[traced_test]
#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
#[ntest::timeout(20_000)]
async fn saturated_target_is_bounded_by_concurrency() {
    let base = init().await;

    let data = Run::new(&format!("{base}/delay/ms/200"))
        .rps(50)
        .duration(Duration::from_secs(1))
        .concurrency(2)
        .await
        .unwrap();

    // Two slots of 200ms each over one second, plus the requests joined after the deadline.
    assert!(data.requests <= 12, "{}", data.requests);
    assert!(data.requests < data.config.max_requests());
    assert_eq!(data.failures, 0);
}

#[traced_test]
#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
#[ntest::timeout(20_000)]
async fn timeseries_and_report() {
    let base = init().await;
    let reports = tempfile::tempdir().unwrap();

    let data = Run::new(&format!("{base}/delay/ms/1"))
        .scenario("timeseries")
        .rps(20)
        .duration(Duration::from_secs(3))
        .await
        .unwrap();

    assert!((2..=4).contains(&data.timeseries.len()));
    for pair in data.timeseries.windows(2) {
        assert!(pair[0].elapsed < pair[1].elapsed);
    }
    assert!(data.timeseries.iter().all(|p| p.error_rate == 0.));

    let path = report::write(&data, reports.path()).unwrap();
    assert!(path.starts_with(reports.path().join("timeseries").join(&data.run_id)));

    let json: serde_json::Value =
        serde_json::from_str(&std::fs::read_to_string(path).unwrap()).unwrap();
    assert_eq!(json["scenario"], "timeseries");
    assert_eq!(json["requests"], data.requests);
    assert!(json["timeseries"][0]["latency_p95_ms"].is_number());
    assert!(json.get("batch_stats").is_none());
}

#[tokio::test]
async fn rejects_bad_configuration() {
    let res = Run::new("ftp://localhost/file")
        .rps(1)
        .duration(Duration::from_secs(1))
        .await;
    assert!(matches!(
        res,
        Err(RunError::Config(ConfigError::UnsupportedScheme(_)))
    ));

    let res = Run::new("http://localhost/")
        .method("NOT A METHOD")
        .rps(1)
        .duration(Duration::from_secs(1))
        .await;
    assert!(matches!(
        res,
        Err(RunError::Config(ConfigError::InvalidMethod(_)))
    ));
}
