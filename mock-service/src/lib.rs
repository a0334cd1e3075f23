//! Load targets for exercising pacer: a configurable slow/failing dependency, fixed delays and
//! statuses, a rate-limited endpoint, and a bulkhead batch worker.
pub mod batch;

use axum::{
    debug_handler,
    extract::{rejection::JsonRejection, Path, Query, State},
    http::StatusCode,
    routing::{get, post},
    Json, Router,
};
use batch::{BatchError, BatchRegistry};
use governor::{DefaultDirectRateLimiter, Quota, RateLimiter};
use metrics::counter;
use pacer_core::BatchSnapshot;
use rand_distr::{Bernoulli, Distribution};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::net::SocketAddr;
use std::{
    num::NonZeroU32,
    sync::{
        atomic::{AtomicU64, Ordering},
        Arc, PoisonError, RwLock,
    },
    time::Duration,
};
use tokio::net::TcpListener;
use tower_http::trace::TraceLayer;
use tracing::{debug, info};

/// Shared state of the service. Each registry owns its own lock.
#[derive(Clone, Default)]
pub struct AppState {
    limiters: Arc<LimiterRegistry>,
    batches: Arc<BatchRegistry>,
    served: Arc<AtomicU64>,
}

impl AppState {
    pub fn new(batches: BatchRegistry) -> Self {
        Self {
            batches: Arc::new(batches),
            ..Default::default()
        }
    }
}

pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/healthz", get(healthz))
        .route("/work", get(work))
        .route("/delay/ms/:delay_ms", get(delay))
        .route("/status/:code", get(status))
        .route(
            "/max/:max_tps/delay/ms/:delay_ms/scenario/:scenario_name",
            get(max),
        )
        .route("/batches", post(submit_batch))
        .route("/batches/:id", get(batch_status))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

pub async fn run(addr: SocketAddr) -> std::io::Result<()> {
    let listener = TcpListener::bind(&addr).await?;
    serve(listener, AppState::default()).await
}

pub async fn serve(listener: TcpListener, state: AppState) -> std::io::Result<()> {
    info!("Mock service listening on {}", listener.local_addr()?);
    axum::serve(listener, router(state)).await
}

async fn healthz() -> &'static str {
    "ok"
}

#[derive(Debug, Deserialize)]
pub struct WorkParams {
    sleep: Option<String>,
    fail: Option<String>,
}

#[derive(Debug, Serialize)]
struct WorkResponse {
    status: &'static str,
}

/// Dependency simulator: sleep for `sleep`, then fail with probability `fail`.
#[debug_handler]
async fn work(
    State(state): State<AppState>,
    Query(params): Query<WorkParams>,
) -> Result<Json<WorkResponse>, (StatusCode, String)> {
    tally(&state, "work");

    if let Some(sleep) = params.sleep.as_deref().filter(|s| !s.is_empty()) {
        let dur = humantime::parse_duration(sleep)
            .map_err(|err| (StatusCode::BAD_REQUEST, format!("bad sleep param: {err}")))?;
        tokio::time::sleep(dur).await;
    }

    if let Some(fail) = params.fail.as_deref().filter(|f| !f.is_empty()) {
        let failure = fail
            .parse::<f64>()
            .map_err(|err| err.to_string())
            .and_then(|p| Bernoulli::new(p).map_err(|err| err.to_string()))
            .map_err(|err| (StatusCode::BAD_REQUEST, format!("bad fail param: {err}")))?;

        if failure.sample(&mut rand::thread_rng()) {
            return Err((
                StatusCode::INTERNAL_SERVER_ERROR,
                "simulated failure".to_string(),
            ));
        }
    }

    Ok(Json(WorkResponse { status: "ok" }))
}

#[debug_handler]
async fn delay(State(state): State<AppState>, Path(delay_ms): Path<u64>) {
    tally(&state, "delay");
    tokio::time::sleep(Duration::from_millis(delay_ms)).await;
}

#[debug_handler]
async fn status(State(state): State<AppState>, Path(code): Path<u16>) -> StatusCode {
    tally(&state, "status");
    StatusCode::from_u16(code).unwrap_or(StatusCode::BAD_REQUEST)
}

/// Per-scenario rate limiters for the `/max` endpoint.
#[derive(Default)]
pub struct LimiterRegistry {
    limiters: RwLock<HashMap<String, Arc<DefaultDirectRateLimiter>>>,
}

impl LimiterRegistry {
    pub fn get_or_insert(&self, name: &str, max_tps: NonZeroU32) -> Arc<DefaultDirectRateLimiter> {
        let existing = self
            .limiters
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(name)
            .cloned();

        match existing {
            Some(limiter) => limiter,
            None => self
                .limiters
                .write()
                .unwrap_or_else(PoisonError::into_inner)
                .entry(name.to_string())
                .or_insert_with(|| Arc::new(rate_limiter(max_tps)))
                .clone(),
        }
    }
}

#[debug_handler]
async fn max(
    State(state): State<AppState>,
    Path((max_tps, delay_ms, scenario_name)): Path<(u32, u64, String)>,
) -> Result<(), StatusCode> {
    tally(&state, "max");
    let max_tps = NonZeroU32::new(max_tps).ok_or(StatusCode::BAD_REQUEST)?;
    tokio::time::sleep(Duration::from_millis(delay_ms)).await;

    let limiter = state.limiters.get_or_insert(&scenario_name, max_tps);
    match limiter.check() {
        Ok(_) => Ok(()),
        Err(_) => {
            debug!("Scenario {scenario_name} over {max_tps} TPS");
            Err(StatusCode::INTERNAL_SERVER_ERROR)
        }
    }
}

#[derive(Debug, Deserialize)]
pub struct SubmitBatch {
    #[serde(default)]
    fast: i64,
    #[serde(default)]
    slow: i64,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct BatchAccepted {
    pub batch_id: String,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct BatchStatus {
    pub batch_id: String,
    #[serde(flatten)]
    pub snapshot: BatchSnapshot,
}

#[debug_handler]
async fn submit_batch(
    State(state): State<AppState>,
    req: Result<Json<SubmitBatch>, JsonRejection>,
) -> Result<(StatusCode, Json<BatchAccepted>), (StatusCode, String)> {
    tally(&state, "batches");
    let Json(req) = req.map_err(|err| (StatusCode::BAD_REQUEST, format!("bad request: {err}")))?;

    let batch_id = state
        .batches
        .submit(req.fast.max(0) as u64, req.slow.max(0) as u64)
        .map_err(|err: BatchError| (StatusCode::BAD_REQUEST, err.to_string()))?;

    Ok((StatusCode::ACCEPTED, Json(BatchAccepted { batch_id })))
}

#[debug_handler]
async fn batch_status(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<BatchStatus>, (StatusCode, String)> {
    let snapshot = state
        .batches
        .snapshot(&id)
        .ok_or_else(|| (StatusCode::NOT_FOUND, "batch not found".to_string()))?;

    Ok(Json(BatchStatus {
        batch_id: id,
        snapshot,
    }))
}

/** Utils **/

pub fn rate_limiter(tps: NonZeroU32) -> DefaultDirectRateLimiter {
    RateLimiter::direct(Quota::per_second(tps))
}

fn tally(state: &AppState, route: &'static str) {
    counter!("mock_service_requests_total", "route" => route).increment(1);
    state.served.fetch_add(1, Ordering::Relaxed);
}

/** TPS Printer **/

/// Log the number of requests served each second, forever.
pub async fn tps_measure_task(state: AppState) {
    let mut interval = tokio::time::interval(Duration::from_secs(1));
    loop {
        interval.tick().await;
        let transactions = state.served.swap(0, Ordering::Relaxed);
        if transactions > 0 {
            info!("{transactions} TPS");
        }
    }
}
