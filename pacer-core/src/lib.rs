#![doc = include_str!("../README.md")]

mod config;
mod constants;
mod data;
mod stats;

pub use config::*;
pub use constants::*;
pub use data::*;
pub use stats::*;
