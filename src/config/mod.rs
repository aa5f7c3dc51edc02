//! Configuration module
//!
//! Settings for the backend connection, grid display and drop behaviour.

#[allow(clippy::module_inception)]
pub mod config;

pub use config::{ApiConfig, BehaviorConfig, Config, DisplayConfig};
