mod utils;
use utils::*;

use mock_service::{BatchAccepted, BatchStatus};
use pacer::prelude::*;
use reqwest::Client;
use std::time::Duration;
use tracing_test::traced_test;

#[traced_test]
#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
#[ntest::timeout(30_000)]
async fn batch_submissions_under_load() {
    let base = init().await;

    let data = Run::new(&format!("{base}/batches"))
        .scenario("bulkhead")
        .method("POST")
        .body(r#"{"fast": 5, "slow": 0}"#)
        .rps(10)
        .duration(Duration::from_secs(1))
        .await
        .unwrap();

    assert!(data.requests > 0);
    assert_eq!(data.status_dist, std::collections::BTreeMap::from([(202, data.requests)]));

    let client = Client::new();
    let accepted: BatchAccepted = client
        .post(format!("{base}/batches"))
        .json(&serde_json::json!({ "fast": 20, "slow": 2 }))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();

    // Slow jobs take a second each, the fast pool drains in a fraction of that.
    tokio::time::sleep(Duration::from_millis(1_500)).await;
    let status: BatchStatus = client
        .get(format!("{base}/batches/{}", accepted.batch_id))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();

    assert!(status.snapshot.complete);
    assert_eq!(status.snapshot.done, 22);
    assert!(status.snapshot.fast_p95 < status.snapshot.slow_p95);

    let data = data.with_batch_stats(status.snapshot.clone());
    let json = serde_json::to_value(&data).unwrap();
    assert_eq!(json["batch_stats"]["total"], 22);
    assert_eq!(json["batch_stats"]["complete"], true);
}

#[traced_test]
#[tokio::test]
#[ntest::timeout(10_000)]
async fn malformed_body_is_a_client_error() {
    let base = init().await;

    let data = Run::new(&format!("{base}/batches"))
        .method("POST")
        .body("not json")
        .rps(5)
        .duration(Duration::from_secs(1))
        .await
        .unwrap();

    assert!(data.requests > 0);
    assert_eq!(data.status_dist, std::collections::BTreeMap::from([(400, data.requests)]));
}
