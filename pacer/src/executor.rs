//! Issuing a single request against the target
use crate::error::RunError;
use pacer_core::{ConfigError, RequestResult, RunConfig, TransportError, CLIENT_TIMEOUT};
use reqwest::header::CONTENT_TYPE;
use reqwest::{Client, Method, Url};
use std::future::Future;
use std::time::Instant;
use time::OffsetDateTime;
#[allow(unused)]
use tracing::{debug, error, trace, warn};

/// Performs one request per call and reports how it went.
///
/// Implementations must not fail: every outcome, including transport errors, is expressed as a
/// [`RequestResult`].
pub trait Executor: Send + Sync + 'static {
    fn execute(&self) -> impl Future<Output = RequestResult> + Send;
}

/// [`Executor`] issuing plain HTTP requests with a pooled client.
#[derive(Debug, Clone)]
pub struct HttpExecutor {
    client: Client,
    method: Method,
    url: Url,
    body: Option<String>,
}

impl HttpExecutor {
    pub fn new(config: &RunConfig) -> Result<Self, RunError> {
        let url = config.validate()?;
        let method = Method::from_bytes(config.method().as_bytes())
            .map_err(|_| ConfigError::InvalidMethod(config.method.clone()))?;
        let client = Client::builder().timeout(CLIENT_TIMEOUT).build()?;

        Ok(Self {
            client,
            method,
            url,
            body: config.body().map(str::to_string),
        })
    }
}

impl Executor for HttpExecutor {
    async fn execute(&self) -> RequestResult {
        let started_at = OffsetDateTime::now_utc();
        let start = Instant::now();

        let mut request = self.client.request(self.method.clone(), self.url.clone());
        if let Some(body) = &self.body {
            request = request
                .header(CONTENT_TYPE, "application/json")
                .body(body.clone());
        }

        match request.send().await {
            Ok(response) => {
                let latency = start.elapsed();
                let status = response.status().as_u16();
                // Drain the body so the connection goes back to the pool.
                if let Err(err) = response.bytes().await {
                    trace!("Failed to drain response body: {err}");
                }
                RequestResult::response(status, latency, started_at)
            }
            Err(err) => {
                let latency = start.elapsed();
                trace!("Transport error: {err}");
                RequestResult::transport_error(classify(&err), latency, started_at)
            }
        }
    }
}

fn classify(err: &reqwest::Error) -> TransportError {
    if err.is_timeout() {
        TransportError::Timeout
    } else if err.is_connect() {
        TransportError::Connect(err.to_string())
    } else {
        TransportError::Request(err.to_string())
    }
}


#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    fn config(url: &str) -> RunConfig {
        let mut config = RunConfig::new(url);
        config.rps = 1;
        config.duration = Duration::from_secs(1);
        config
    }

    #[test]
    fn rejects_invalid_config() {
        let res = HttpExecutor::new(&config("localhost"));
        assert!(matches!(
            res,
            Err(RunError::Config(ConfigError::MalformedUrl { .. }))
        ));
    }

    #[test]
    fn builds_with_body() {
        let mut config = config("http://127.0.0.1:9/submit");
        config.method = "POST".to_string();
        config.body = Some(r#"{"fast":1}"#.to_string());

        let executor = HttpExecutor::new(&config).unwrap();
        assert_eq!(executor.method, Method::POST);
        assert_eq!(executor.body.as_deref(), Some(r#"{"fast":1}"#));
    }

    #[tokio::test]
    #[ntest::timeout(10_000)]
    async fn refused_connection_is_transport_error() {
        // Bind then drop a listener to get a port with nothing behind it.
        let port = {
            let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
            listener.local_addr().unwrap().port()
        };
        let executor = HttpExecutor::new(&config(&format!("http://127.0.0.1:{port}/"))).unwrap();

        let result = executor.execute().await;
        assert_eq!(result.status, 0);
        assert!(result.is_failure());
        assert!(matches!(result.error, Some(TransportError::Connect(_))));
    }
}
