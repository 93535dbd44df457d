/// Configuration file loading, command-line overrides and validation
#[allow(clippy::module_inception)]
pub mod config;

pub use config::{Config, EventsConfig, NetworkConfig, OutputConfig, Overrides, PerformanceConfig};
