#![cfg_attr(docsrs, feature(doc_cfg))]
#![doc = include_str!("../README.md")]

pub mod executor;
pub mod report;
pub mod run;
pub mod store;

mod aggregate;
mod counters;
mod dispatcher;
mod error;
mod sampler;
mod timer;

pub use error::{ReportError, RunError};
pub use executor::{Executor, HttpExecutor};
pub use run::Run;

pub use pacer_core as data;

pub mod prelude {
    pub use crate::error::{ReportError, RunError};
    pub use crate::executor::{Executor, HttpExecutor};
    pub use crate::run::Run;
    pub use pacer_core::{
        ConfigError, LatencyStats, RequestResult, RunConfig, RunData, TimeseriesPoint,
    };
}
