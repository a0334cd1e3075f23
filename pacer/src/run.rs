//! Run builder and the orchestration of a single run
use crate::aggregate::{aggregate, RunHeader};
use crate::counters::RunCounters;
use crate::dispatcher::Dispatcher;
use crate::error::RunError;
use crate::executor::{Executor, HttpExecutor};
use crate::sampler::TimeseriesSampler;
use crate::store::ResultStore;
use pacer_core::{run_id, ConfigError, RunConfig, RunData};
use std::{
    future::Future,
    pin::Pin,
    sync::Arc,
    task::{Context, Poll},
    time::Duration,
};
use time::OffsetDateTime;
use tokio::time::Instant;
#[allow(unused_imports)]
use tracing::{debug, error, info, instrument, trace, warn, Instrument};

type ExecutorFactory<E> = Box<dyn FnOnce(&RunConfig) -> Result<Arc<E>, RunError> + Send>;
type RunFuture = Pin<Box<dyn Future<Output = Result<RunData, RunError>> + Send>>;

/// A single load test run.
///
/// Configure with the builder methods, then `.await` it. Configuration problems are returned
/// before any request is sent; failures of individual requests only show up in the [`RunData`].
///
/// # Example
/// ```no_run
/// use pacer::prelude::*;
/// use std::time::Duration;
///
/// #[tokio::main]
/// async fn main() -> Result<(), RunError> {
///     let data = Run::new("http://localhost:8080/cases/timeouts")
///         .rps(50)
///         .duration(Duration::from_secs(30))
///         .await?;
///
///     println!("{data}");
///     Ok(())
/// }
/// ```
#[pin_project::pin_project]
pub struct Run<E = HttpExecutor> {
    config: RunConfig,
    executor: Option<ExecutorFactory<E>>,
    runner_fut: Option<RunFuture>,
}

impl Run<HttpExecutor> {
    pub fn new(target_url: &str) -> Self {
        Self {
            config: RunConfig::new(target_url),
            executor: Some(Box::new(|config| Ok(Arc::new(HttpExecutor::new(config)?)))),
            runner_fut: None,
        }
    }
}

impl<E: Executor> Run<E> {
    /// Run `config` with a custom [`Executor`] instead of plain HTTP.
    pub fn with_executor(config: RunConfig, executor: Arc<E>) -> Self {
        Self {
            config,
            executor: Some(Box::new(move |_| Ok(executor))),
            runner_fut: None,
        }
    }
}

impl<E> Run<E> {
    /// Name under which the run is reported.
    pub fn scenario(mut self, name: &str) -> Self {
        self.config.scenario = name.to_string();
        self
    }

    /// HTTP method, `GET` by default.
    pub fn method(mut self, method: &str) -> Self {
        self.config.method = method.to_string();
        self
    }

    /// Request body. A non-empty body is sent as `application/json`.
    pub fn body(mut self, body: &str) -> Self {
        self.config.body = Some(body.to_string());
        self
    }

    /// Requests dispatched per second. Required.
    pub fn rps(mut self, rps: u32) -> Self {
        self.config.rps = rps;
        self
    }

    /// How long to keep dispatching. Required.
    pub fn duration(mut self, duration: Duration) -> Self {
        self.config.duration = duration;
        self
    }

    /// Maximum requests in flight. Defaults to the RPS.
    pub fn concurrency(mut self, concurrency: usize) -> Self {
        self.config.concurrency = Some(concurrency);
        self
    }

    pub fn config(&self) -> &RunConfig {
        &self.config
    }
}

impl<E: Executor> Future for Run<E> {
    type Output = Result<RunData, RunError>;

    fn poll(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Self::Output> {
        let this = self.project();

        if this.runner_fut.is_none() {
            let config = this.config.clone();
            let factory = this.executor.take();
            *this.runner_fut = Some(Box::pin(async move {
                config.validate()?;
                let Some(factory) = factory else {
                    unreachable!("executor factory is only taken once");
                };
                let executor = factory(&config)?;
                run_load(config, executor).await
            }));
        }

        match this.runner_fut {
            Some(runner) => runner.as_mut().poll(cx),
            None => unreachable!(),
        }
    }
}

/// Drive one validated run to completion.
///
/// The dispatcher and the sampler share one deadline. Once it passes, the dispatcher stops
/// launching and joins every in-flight request, and only then is the store reduced.
#[instrument(name = "run", skip_all, fields(scenario = %config.scenario, rps = config.rps))]
pub(crate) async fn run_load<E: Executor>(
    config: RunConfig,
    executor: Arc<E>,
) -> Result<RunData, RunError> {
    let started_at = OffsetDateTime::now_utc();
    let run_id = run_id(started_at);
    info!(
        "Starting run {run_id}: {} {} at {} rps for {}, concurrency {}",
        config.method(),
        config.target_url,
        config.rps,
        humantime::format_duration(config.duration),
        config.effective_concurrency(),
    );

    #[cfg(feature = "metrics")]
    crate::counters::describe_metrics();

    let start = Instant::now();
    let deadline = start
        .checked_add(config.duration)
        .ok_or(ConfigError::DurationTooLong(config.duration))?;
    let store = Arc::new(ResultStore::default());
    let counters = Arc::new(RunCounters::default());

    let sampler = TimeseriesSampler::new(store.clone(), counters.clone(), start);
    let sampler = tokio::spawn(sampler.run_until(deadline).in_current_span());

    let dispatcher = Dispatcher::new(
        executor,
        store.clone(),
        counters.clone(),
        config.effective_concurrency(),
        config.tick_interval(),
    );
    let stats = dispatcher.run_until(deadline).await;
    debug!("Dispatch finished: {stats:?}");

    let timeseries = match sampler.await {
        Ok(timeseries) => timeseries,
        Err(err) => {
            error!("Timeseries sampler failed: {err}");
            vec![]
        }
    };

    let header = RunHeader {
        run_id,
        started_at,
        duration: start.elapsed(),
        config,
    };
    let data = aggregate(header, &store.snapshot(), timeseries);

    info!(
        "Run {} complete: {} requests, {} failures, p95={}ms",
        data.run_id, data.requests, data.failures, data.latencies.p95
    );
    Ok(data)
}
