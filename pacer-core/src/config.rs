use crate::DEFAULT_METHOD;
use serde::{Deserialize, Serialize};
use serde_with::{serde_as, DurationSecondsWithFrac};
use std::time::{Duration, Instant};
use thiserror::Error;
use url::Url;

/// Errors raised while validating a [`RunConfig`]. A run never starts when one of these occurs.
#[derive(Debug, Error, PartialEq)]
pub enum ConfigError {
    #[error("requests per second must be greater than zero")]
    ZeroRps,

    #[error("run duration must be greater than zero")]
    ZeroDuration,

    #[error("{0} requests per second is finer than the timer resolution")]
    UnresolvableRps(u32),

    #[error("run duration {0:?} does not fit the clock")]
    DurationTooLong(Duration),

    #[error("malformed target url `{url}`: {source}")]
    MalformedUrl {
        url: String,
        #[source]
        source: url::ParseError,
    },

    #[error("unsupported url scheme `{0}`, expected http or https")]
    UnsupportedScheme(String),

    #[error("invalid http method `{0}`")]
    InvalidMethod(String),
}

/// Input of a single run.
///
/// Immutable once a run starts. Use [`RunConfig::validate`] before dispatching anything.
#[serde_as]
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct RunConfig {
    #[serde(default)]
    pub scenario: String,
    pub target_url: String,
    #[serde(default = "default_method")]
    pub method: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub body: Option<String>,
    pub rps: u32,
    #[serde_as(as = "DurationSecondsWithFrac<f64>")]
    pub duration: Duration,
    #[serde(default)]
    pub concurrency: Option<usize>,
}

fn default_method() -> String {
    DEFAULT_METHOD.to_string()
}

impl RunConfig {
    pub fn new(target_url: &str) -> Self {
        Self {
            scenario: String::new(),
            target_url: target_url.to_string(),
            method: default_method(),
            body: None,
            rps: 0,
            duration: Duration::ZERO,
            concurrency: None,
        }
    }

    /// Method to issue, falling back to `GET` when left empty.
    pub fn method(&self) -> &str {
        if self.method.is_empty() {
            DEFAULT_METHOD
        } else {
            &self.method
        }
    }

    /// Body to send, if any. An empty string counts as no body.
    pub fn body(&self) -> Option<&str> {
        self.body.as_deref().filter(|b| !b.is_empty())
    }

    /// Concurrency bound for in-flight requests. Unset (or zero) means one slot per RPS.
    pub fn effective_concurrency(&self) -> usize {
        match self.concurrency {
            Some(c) if c > 0 => c,
            _ => self.rps as usize,
        }
    }

    /// Spacing between two dispatch ticks. Only meaningful once validated.
    pub fn tick_interval(&self) -> Duration {
        Duration::from_secs(1) / self.rps.max(1)
    }

    /// Upper bound on the number of ticks a run can produce.
    pub fn max_requests(&self) -> u64 {
        (self.rps as f64 * self.duration.as_secs_f64()).ceil() as u64
    }

    /// Copy of this config with defaults filled in, as echoed in the run output.
    pub fn resolved(&self) -> Self {
        Self {
            method: self.method().to_string(),
            concurrency: Some(self.effective_concurrency()),
            ..self.clone()
        }
    }

    /// Check the config and return the parsed target.
    pub fn validate(&self) -> Result<Url, ConfigError> {
        if self.rps == 0 {
            return Err(ConfigError::ZeroRps);
        }

        if self.duration.is_zero() {
            return Err(ConfigError::ZeroDuration);
        }

        if self.tick_interval().is_zero() {
            return Err(ConfigError::UnresolvableRps(self.rps));
        }

        if Instant::now().checked_add(self.duration).is_none() {
            return Err(ConfigError::DurationTooLong(self.duration));
        }

        if !is_token(self.method()) {
            return Err(ConfigError::InvalidMethod(self.method.clone()));
        }

        let url = Url::parse(&self.target_url).map_err(|source| ConfigError::MalformedUrl {
            url: self.target_url.clone(),
            source,
        })?;

        match url.scheme() {
            "http" | "https" => {}
            other => return Err(ConfigError::UnsupportedScheme(other.to_string())),
        }

        if !url.has_host() {
            return Err(ConfigError::MalformedUrl {
                url: self.target_url.clone(),
                source: url::ParseError::EmptyHost,
            });
        }

        Ok(url)
    }
}

// RFC 9110 token characters.
fn is_token(s: &str) -> bool {
    !s.is_empty()
        && s.bytes()
            .all(|b| b.is_ascii_alphanumeric() || b"!#$%&'*+-.^_`|~".contains(&b))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn config() -> RunConfig {
        let mut config = RunConfig::new("http://127.0.0.1:8080/cases/timeouts");
        config.rps = 10;
        config.duration = Duration::from_secs(2);
        config
    }

    #[test]
    fn valid_config() {
        let url = config().validate().unwrap();
        assert_eq!(url.path(), "/cases/timeouts");
    }

    #[test]
    fn zero_rps() {
        let mut config = config();
        config.rps = 0;
        assert_eq!(config.validate(), Err(ConfigError::ZeroRps));
    }

    #[test]
    fn zero_duration() {
        let mut config = config();
        config.duration = Duration::ZERO;
        assert_eq!(config.validate(), Err(ConfigError::ZeroDuration));
    }

    #[test]
    fn rps_beyond_timer_resolution() {
        let mut config = config();
        config.rps = 1_000_000_000;
        assert!(config.validate().is_ok());

        config.rps = 2_000_000_000;
        assert_eq!(config.tick_interval(), Duration::ZERO);
        assert_eq!(
            config.validate(),
            Err(ConfigError::UnresolvableRps(2_000_000_000))
        );
    }

    #[test]
    fn duration_beyond_clock() {
        let mut config = config();
        config.duration = Duration::MAX;
        assert_eq!(
            config.validate(),
            Err(ConfigError::DurationTooLong(Duration::MAX))
        );
    }

    #[test]
    fn malformed_url() {
        let mut config = config();
        config.target_url = "not a url".to_string();
        assert!(matches!(
            config.validate(),
            Err(ConfigError::MalformedUrl { .. })
        ));

        config.target_url = "ftp://example.com/file".to_string();
        assert_eq!(
            config.validate(),
            Err(ConfigError::UnsupportedScheme("ftp".to_string()))
        );
    }

    #[test]
    fn invalid_method() {
        let mut config = config();
        config.method = "GE T".to_string();
        assert_eq!(
            config.validate(),
            Err(ConfigError::InvalidMethod("GE T".to_string()))
        );

        config.method = String::new();
        assert_eq!(config.method(), "GET");
        assert!(config.validate().is_ok());
    }

    #[test]
    fn concurrency_defaults_to_rps() {
        let mut config = config();
        assert_eq!(config.effective_concurrency(), 10);

        config.concurrency = Some(0);
        assert_eq!(config.effective_concurrency(), 10);

        config.concurrency = Some(3);
        assert_eq!(config.effective_concurrency(), 3);
        assert_eq!(config.resolved().concurrency, Some(3));
    }

    #[test]
    fn tick_interval() {
        let mut config = config();
        assert_eq!(config.tick_interval(), Duration::from_millis(100));

        config.rps = 3;
        assert_eq!(config.tick_interval(), Duration::from_nanos(333_333_333));
        assert_eq!(config.max_requests(), 6);
    }

    #[test]
    fn empty_body_is_no_body() {
        let mut config = config();
        config.body = Some(String::new());
        assert_eq!(config.body(), None);

        config.body = Some(r#"{"a":1}"#.to_string());
        assert_eq!(config.body(), Some(r#"{"a":1}"#));
    }
}
