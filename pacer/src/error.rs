use pacer_core::ConfigError;
use thiserror::Error;

/// Failures that stop a run before it starts. Per-request failures never surface here.
#[derive(Debug, Error)]
pub enum RunError {
    #[error("invalid run configuration: {0}")]
    Config(#[from] ConfigError),

    #[error("could not build http client: {0}")]
    Client(#[from] reqwest::Error),
}

#[derive(Debug, Error)]
pub enum ReportError {
    #[error("could not write report: {0}")]
    Io(#[from] std::io::Error),

    #[error("could not serialize run data: {0}")]
    Json(#[from] serde_json::Error),
}
