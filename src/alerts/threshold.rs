//! Threshold evaluation for percentage metrics
//!
//! A limit is either configured or absent. Absence disables alerting for that
//! metric; a configured limit of 0 alerts on every reading. The two are never
//! conflated: the limit is an `Option<Percent>` all the way from the config file
//! to [`evaluate`].

use crate::error::ConfigError;
use crate::samples::{format_timestamp, Timestamp};
use serde::{Deserialize, Serialize};
use std::fmt;

/// A percentage limit, validated to lie within 0-100 inclusive
#[derive(Debug, Clone, Copy, PartialEq, PartialOrd, Serialize, Deserialize)]
#[serde(try_from = "f64", into = "f64")]
pub struct Percent(f64);

impl Percent {
    pub fn new(value: f64) -> Result<Self, ConfigError> {
        Self::try_from(value)
    }

    pub fn value(&self) -> f64 {
        self.0
    }
}

impl TryFrom<f64> for Percent {
    type Error = ConfigError;

    fn try_from(value: f64) -> Result<Self, Self::Error> {
        if value.is_finite() && (0.0..=100.0).contains(&value) {
            Ok(Percent(value))
        } else {
            Err(ConfigError::ValidationError(format!(
                "threshold must be between 0 and 100 inclusive, got {}",
                value
            )))
        }
    }
}

impl From<Percent> for f64 {
    fn from(percent: Percent) -> Self {
        percent.0
    }
}

impl fmt::Display for Percent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}%", self.0)
    }
}

/// Optional alert limits per collector kind
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ThresholdConfig {
    /// Limit for total processor utilisation
    pub cpu_percent: Option<Percent>,
    /// Limit for per-drive used space
    pub disk_used_percent: Option<Percent>,
}

/// The metric an alert is raised for
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Metric {
    CpuUsage,
    DiskUsage,
}

impl fmt::Display for Metric {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Metric::CpuUsage => f.write_str("CPU usage"),
            Metric::DiskUsage => f.write_str("Disk usage"),
        }
    }
}

/// A threshold crossing, ready to be dispatched
#[derive(Debug, Clone, PartialEq)]
pub struct Alert {
    pub metric: Metric,
    /// Counter or drive the value was read from
    pub source: String,
    pub value: f64,
    pub limit: Percent,
    pub timestamp: Timestamp,
}

impl Alert {
    pub fn subject(&self, host: &str) -> String {
        format!("[hostlog] {} threshold reached on {}", self.metric, host)
    }

    pub fn body(&self) -> String {
        format!(
            "{metric} on {source} is {value:.2}%, at or above the configured threshold of {limit}.\nTime: {time} UTC",
            metric = self.metric,
            source = self.source,
            value = self.value,
            limit = self.limit,
            time = format_timestamp(&self.timestamp),
        )
    }
}

/// Decide whether `value` trips the configured `limit`
///
/// Returns an alert iff a limit is configured and `value >= limit`.
pub fn evaluate(
    metric: Metric,
    source: &str,
    value: f64,
    limit: Option<Percent>,
    timestamp: Timestamp,
) -> Option<Alert> {
    let limit = limit?;
    if value >= limit.value() {
        Some(Alert {
            metric,
            source: source.to_string(),
            value,
            limit,
            timestamp,
        })
    } else {
        None
    }
}
