use crate::alerts::{Percent, SmtpSettings, ThresholdConfig};
use crate::error::ConfigError;
use crate::samples::Counter;
use log::{info, warn};
use serde::Deserialize;
use std::collections::HashSet;
use std::num::NonZeroU32;
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Longest accepted interval between two cycles
pub const MAX_INTERVAL_SECONDS: u64 = u32::MAX as u64;

/// Longest accepted event look-back window, ten years
pub const MAX_LOOKBACK_HOURS: u32 = 87_600;

/// Agent configuration, loaded from TOML and overridden from the command line
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Seconds between two cycles
    pub interval_seconds: u64,
    /// Number of cycles to run; absent runs until stopped
    pub iterations: Option<u32>,
    pub output: OutputConfig,
    pub thresholds: ThresholdConfig,
    pub performance: PerformanceConfig,
    pub events: EventsConfig,
    pub network: NetworkConfig,
    /// Alert mail endpoint; absent keeps alerts in the diagnostic log only
    pub smtp: Option<SmtpSettings>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            interval_seconds: 60,
            iterations: None,
            output: OutputConfig::default(),
            thresholds: ThresholdConfig::default(),
            performance: PerformanceConfig::default(),
            events: EventsConfig::default(),
            network: NetworkConfig::default(),
            smtp: None,
        }
    }
}

/// Where each log kind is written
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default)]
pub struct OutputConfig {
    pub directory: PathBuf,
    pub performance: Option<PathBuf>,
    pub disk: Option<PathBuf>,
    pub events: Option<PathBuf>,
    pub network: Option<PathBuf>,
}

impl Default for OutputConfig {
    fn default() -> Self {
        Self {
            directory: PathBuf::from("logs"),
            performance: None,
            disk: None,
            events: None,
            network: None,
        }
    }
}

impl OutputConfig {
    fn resolve(&self, explicit: &Option<PathBuf>, file_name: &str) -> PathBuf {
        explicit
            .clone()
            .unwrap_or_else(|| self.directory.join(file_name))
    }

    pub fn performance_path(&self) -> PathBuf {
        self.resolve(&self.performance, "performance.csv")
    }

    pub fn disk_path(&self) -> PathBuf {
        self.resolve(&self.disk, "disk.csv")
    }

    pub fn events_path(&self) -> PathBuf {
        self.resolve(&self.events, "events.csv")
    }

    pub fn network_path(&self) -> PathBuf {
        self.resolve(&self.network, "network.csv")
    }
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default)]
pub struct PerformanceConfig {
    /// Counters sampled each cycle, in column order
    pub counters: Vec<Counter>,
}

impl Default for PerformanceConfig {
    fn default() -> Self {
        Self {
            counters: Counter::ALL.to_vec(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default)]
pub struct EventsConfig {
    /// Monitored event logs: `system`, `user`, `kernel` or a unit name
    pub logs: Vec<String>,
    /// How far back the first event query reaches
    pub lookback_hours: u32,
}

impl Default for EventsConfig {
    fn default() -> Self {
        Self {
            logs: vec!["system".to_string()],
            lookback_hours: 24,
        }
    }
}

impl EventsConfig {
    pub fn lookback(&self) -> chrono::Duration {
        chrono::Duration::hours(i64::from(self.lookback_hours))
    }
}

#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(default)]
pub struct NetworkConfig {
    /// Adapter names or indices to log; absent logs every adapter
    pub adapters: Option<Vec<String>>,
}

/// Values given on the command line, applied on top of the file
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Overrides {
    pub interval_seconds: Option<u64>,
    pub iterations: Option<u32>,
    pub cpu_threshold: Option<f64>,
    pub disk_threshold: Option<f64>,
    pub output_dir: Option<PathBuf>,
    pub adapters: Vec<String>,
    pub event_logs: Vec<String>,
}

impl Config {
    /// Load configuration from a TOML file
    ///
    /// # Errors
    ///
    /// Returns `ConfigError::ReadError` if the file cannot be read and
    /// `ConfigError::ParseError` if it is not valid configuration.
    pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path)
            .map_err(|e| ConfigError::ReadError(format!("{}: {}", path.display(), e)))?;

        toml::from_str(&content)
            .map_err(|e| ConfigError::ParseError(format!("{}: {}", path.display(), e)))
    }

    /// Load and validate the configuration for a run
    ///
    /// A missing file falls back to defaults with a warning. A file that exists but
    /// cannot be read or parsed is an error, as is any invalid value.
    pub fn load(path: Option<&Path>) -> Result<Self, ConfigError> {
        let config = match path {
            Some(path) if path.exists() => {
                info!("Loading configuration from: {}", path.display());
                Self::from_file(path)?
            }
            Some(path) => {
                warn!(
                    "Configuration file '{}' not found, using defaults",
                    path.display()
                );
                Self::default()
            }
            None => {
                info!("Using default configuration");
                Self::default()
            }
        };

        config.validate()?;
        Ok(config)
    }

    /// Apply command-line values over the loaded configuration
    ///
    /// # Errors
    ///
    /// Returns `ConfigError::ValidationError` for a threshold outside 0-100.
    pub fn apply(&mut self, overrides: Overrides) -> Result<(), ConfigError> {
        if let Some(interval) = overrides.interval_seconds {
            self.interval_seconds = interval;
        }
        if let Some(iterations) = overrides.iterations {
            self.iterations = Some(iterations);
        }
        if let Some(cpu) = overrides.cpu_threshold {
            self.thresholds.cpu_percent = Some(Percent::new(cpu)?);
        }
        if let Some(disk) = overrides.disk_threshold {
            self.thresholds.disk_used_percent = Some(Percent::new(disk)?);
        }
        if let Some(directory) = overrides.output_dir {
            self.output.directory = directory;
        }
        if !overrides.adapters.is_empty() {
            self.network.adapters = Some(overrides.adapters);
        }
        if !overrides.event_logs.is_empty() {
            self.events.logs = overrides.event_logs;
        }
        Ok(())
    }

    /// Check every value the loop depends on
    ///
    /// Thresholds are range-checked when they are parsed into `Percent`.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.interval_seconds == 0 || self.interval_seconds > MAX_INTERVAL_SECONDS {
            return Err(ConfigError::ValidationError(format!(
                "interval_seconds must be between 1 and {} seconds, got {}",
                MAX_INTERVAL_SECONDS, self.interval_seconds
            )));
        }
        if self.iterations == Some(0) {
            return Err(ConfigError::ValidationError(
                "iterations must be at least 1; omit it to run until stopped".to_string(),
            ));
        }
        if self.performance.counters.is_empty() {
            return Err(ConfigError::ValidationError(
                "performance.counters must name at least one counter".to_string(),
            ));
        }
        if self.events.logs.is_empty() {
            return Err(ConfigError::ValidationError(
                "events.logs must name at least one log".to_string(),
            ));
        }
        if self.events.logs.iter().any(|l| l.trim().is_empty()) {
            return Err(ConfigError::ValidationError(
                "events.logs entries must not be empty".to_string(),
            ));
        }
        let mut seen = HashSet::new();
        if let Some(duplicate) = self.events.logs.iter().find(|l| !seen.insert(l.trim())) {
            return Err(ConfigError::ValidationError(format!(
                "events.logs lists '{}' more than once",
                duplicate.trim()
            )));
        }
        if self.events.lookback_hours == 0 || self.events.lookback_hours > MAX_LOOKBACK_HOURS {
            return Err(ConfigError::ValidationError(format!(
                "events.lookback_hours must be between 1 and {}, got {}",
                MAX_LOOKBACK_HOURS, self.events.lookback_hours
            )));
        }
        if let Some(adapters) = &self.network.adapters {
            if adapters.iter().any(|a| a.trim().is_empty()) {
                return Err(ConfigError::ValidationError(
                    "network.adapters entries must not be empty".to_string(),
                ));
            }
        }
        if let Some(smtp) = &self.smtp {
            smtp.validate()?;
        }
        Ok(())
    }

    pub fn interval(&self) -> Duration {
        Duration::from_secs(self.interval_seconds)
    }

    /// Cycle bound; `None` runs until stopped
    pub fn iteration_bound(&self) -> Option<NonZeroU32> {
        self.iterations.and_then(NonZeroU32::new)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::NamedTempFile;

    fn write_config(content: &str) -> NamedTempFile {
        let mut file = NamedTempFile::new().unwrap();
        file.write_all(content.as_bytes()).unwrap();
        file
    }

    #[test]
    fn test_defaults() {
        let config = Config::default();

        assert_eq!(config.interval(), Duration::from_secs(60));
        assert_eq!(config.iteration_bound(), None);
        assert_eq!(config.thresholds.cpu_percent, None);
        assert_eq!(config.thresholds.disk_used_percent, None);
        assert_eq!(config.events.logs, vec!["system"]);
        assert_eq!(config.events.lookback(), chrono::Duration::hours(24));
        assert_eq!(config.output.disk_path(), PathBuf::from("logs/disk.csv"));
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_full_file() {
        let file = write_config(
            r#"
interval_seconds = 30
iterations = 5

[output]
directory = "/var/log/hostlog"
events = "/tmp/events.csv"

[thresholds]
cpu_percent = 0
disk_used_percent = 92.5

[performance]
counters = ["ProcessorTimePercent", "MemoryUsedPercent"]

[events]
logs = ["system", "sshd.service"]
lookback_hours = 2

[network]
adapters = ["eth0", "3"]

[smtp]
server = "mail.example.com"
from = "agent@example.com"
to = "ops@example.com"
use_tls = true
"#,
        );

        let config = Config::load(Some(file.path())).unwrap();

        assert_eq!(config.interval_seconds, 30);
        assert_eq!(config.iteration_bound(), NonZeroU32::new(5));
        assert_eq!(config.thresholds.cpu_percent, Some(Percent::new(0.0).unwrap()));
        assert_eq!(
            config.thresholds.disk_used_percent,
            Some(Percent::new(92.5).unwrap())
        );
        assert_eq!(
            config.performance.counters,
            vec![Counter::ProcessorTime, Counter::MemoryUsed]
        );
        assert_eq!(config.output.events_path(), PathBuf::from("/tmp/events.csv"));
        assert_eq!(
            config.output.network_path(),
            PathBuf::from("/var/log/hostlog/network.csv")
        );
        assert_eq!(
            config.network.adapters,
            Some(vec!["eth0".to_string(), "3".to_string()])
        );
        let smtp = config.smtp.unwrap();
        assert_eq!(smtp.port, 25);
        assert_eq!(smtp.use_tls, Some(true));
        assert_eq!(smtp.username, None);
    }

    #[test]
    fn test_missing_file_uses_defaults() {
        let config = Config::load(Some(Path::new("/nonexistent/hostlog.toml"))).unwrap();
        assert_eq!(config, Config::default());
    }

    #[test]
    fn test_invalid_toml_is_fatal() {
        let file = write_config("interval_seconds = [");
        assert!(matches!(
            Config::load(Some(file.path())),
            Err(ConfigError::ParseError(_))
        ));
    }

    #[test]
    fn test_out_of_range_threshold_is_fatal() {
        let file = write_config("[thresholds]\ncpu_percent = 101\n");
        assert!(Config::load(Some(file.path())).is_err());

        let file = write_config("[thresholds]\ndisk_used_percent = -1\n");
        assert!(Config::load(Some(file.path())).is_err());
    }

    #[test]
    fn test_zero_interval_and_iterations_rejected() {
        let file = write_config("interval_seconds = 0\n");
        assert!(matches!(
            Config::load(Some(file.path())),
            Err(ConfigError::ValidationError(_))
        ));

        let file = write_config("iterations = 0\n");
        assert!(matches!(
            Config::load(Some(file.path())),
            Err(ConfigError::ValidationError(_))
        ));
    }

    #[test]
    fn test_negative_interval_rejected() {
        let file = write_config("interval_seconds = -5\n");
        assert!(Config::load(Some(file.path())).is_err());
    }

    #[test]
    fn test_interval_upper_bound() {
        let mut config = Config::default();
        config.interval_seconds = MAX_INTERVAL_SECONDS;
        assert!(config.validate().is_ok());

        let file = write_config(&format!("interval_seconds = {}\n", i64::MAX));
        assert!(matches!(
            Config::load(Some(file.path())),
            Err(ConfigError::ValidationError(_))
        ));

        config.interval_seconds = u64::MAX;
        assert!(matches!(
            config.validate(),
            Err(ConfigError::ValidationError(_))
        ));
    }

    #[test]
    fn test_lookback_upper_bound() {
        let mut config = Config::default();
        config.events.lookback_hours = MAX_LOOKBACK_HOURS;
        assert!(config.validate().is_ok());
        let now = chrono::Utc::now();
        let watermark = crate::watermark::Watermark::looking_back(now, config.events.lookback());
        assert_eq!(watermark.current(), now - chrono::Duration::hours(87_600));

        let file = write_config("[events]\nlookback_hours = 4294967295\n");
        assert!(matches!(
            Config::load(Some(file.path())),
            Err(ConfigError::ValidationError(_))
        ));
    }

    #[test]
    fn test_duplicate_event_logs_rejected() {
        let file = write_config("[events]\nlogs = [\"system\", \"kernel\", \" system\"]\n");
        assert!(matches!(
            Config::load(Some(file.path())),
            Err(ConfigError::ValidationError(_))
        ));

        let mut config = Config::default();
        config.events.logs = vec!["system".to_string(), "kernel".to_string()];
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_empty_adapter_filter_rejected() {
        let mut config = Config::default();
        config.network.adapters = Some(vec!["eth0".to_string(), "  ".to_string()]);
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_smtp_section_validated() {
        let file = write_config(
            "[smtp]\nserver = \"mail.example.com\"\nfrom = \"not an address\"\nto = \"ops@example.com\"\n",
        );
        assert!(Config::load(Some(file.path())).is_err());
    }

    #[test]
    fn test_overrides() {
        let mut config = Config::default();

        config
            .apply(Overrides {
                interval_seconds: Some(1),
                iterations: Some(3),
                cpu_threshold: Some(0.0),
                disk_threshold: None,
                output_dir: Some(PathBuf::from("/tmp/out")),
                adapters: vec!["2".to_string()],
                event_logs: vec!["kernel".to_string()],
            })
            .unwrap();

        assert_eq!(config.interval(), Duration::from_secs(1));
        assert_eq!(config.iteration_bound(), NonZeroU32::new(3));
        assert_eq!(config.thresholds.cpu_percent, Some(Percent::new(0.0).unwrap()));
        assert_eq!(config.thresholds.disk_used_percent, None);
        assert_eq!(
            config.output.performance_path(),
            PathBuf::from("/tmp/out/performance.csv")
        );
        assert_eq!(config.network.adapters, Some(vec!["2".to_string()]));
        assert_eq!(config.events.logs, vec!["kernel"]);
    }

    #[test]
    fn test_empty_overrides_keep_file_values() {
        let mut config = Config::default();
        config.thresholds.disk_used_percent = Some(Percent::new(80.0).unwrap());

        config.apply(Overrides::default()).unwrap();

        assert_eq!(config.interval_seconds, 60);
        assert_eq!(
            config.thresholds.disk_used_percent,
            Some(Percent::new(80.0).unwrap())
        );
        assert_eq!(config.network.adapters, None);
    }

    #[test]
    fn test_override_threshold_out_of_range() {
        let mut config = Config::default();
        let result = config.apply(Overrides {
            disk_threshold: Some(100.5),
            ..Default::default()
        });
        assert!(matches!(result, Err(ConfigError::ValidationError(_))));
    }
}
