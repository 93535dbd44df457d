/// Error types for the metrics agent
pub mod error;

/// Sample types written to the logs
pub mod samples;

/// Append-only CSV logs
pub mod output;

/// Event watermark tracking
pub mod watermark;

/// Data collectors for counters, drives, events and network traffic
pub mod collectors;

/// Threshold evaluation and alert notifications
pub mod alerts;

/// Cycle runner driving the collectors
pub mod runner;

/// Run statistics of the agent itself
pub mod monitoring;

/// Configuration management
pub mod config;

/// Runner assembly from configuration
pub mod agent;

#[cfg(test)]
mod test_logging;

// Re-export commonly used types
pub use error::{AlertError, CollectorError, ConfigError, StartupError};
