use crate::collectors::{CollectionReport, Collector};
use crate::error::CollectorError;
use crate::output::CsvLog;
use crate::samples::{EventLevel, EventRecord, Timestamp, EVENT_HEADER};
use crate::watermark::Watermark;
use chrono::{TimeZone, Utc};
use log::{debug, info};
use serde::Deserialize;
use serde_json::Value;
use std::path::PathBuf;
use std::process::Command;

/// Supplier of operating-system events
#[cfg_attr(test, mockall::automock)]
pub trait EventSource {
    /// Check that the event store can be queried on this host
    fn check_available(&self) -> Result<(), CollectorError>;

    /// Events of `log_name` created at or after `since` with level at or above `min_level`
    ///
    /// Sources may round `since` down; callers filter the result again.
    fn read_events(
        &self,
        log_name: &str,
        since: Timestamp,
        min_level: EventLevel,
    ) -> Result<Vec<EventRecord>, CollectorError>;
}

/// Event source backed by the systemd journal via `journalctl`
///
/// Log names map onto journal selectors: `system`, `user` and `kernel` select the
/// system journal, the user journal and kernel messages; anything else is taken
/// as a unit name.
pub struct JournalReader {
    program: String,
}

impl Default for JournalReader {
    fn default() -> Self {
        Self::new()
    }
}

/// One line of `journalctl --output=json`
#[derive(Debug, Deserialize)]
struct JournalEntry {
    #[serde(rename = "__REALTIME_TIMESTAMP")]
    realtime_usec: String,
    #[serde(rename = "PRIORITY", default)]
    priority: Option<String>,
    #[serde(rename = "MESSAGE", default)]
    message: Value,
    #[serde(rename = "MESSAGE_ID", default)]
    message_id: Option<String>,
    #[serde(rename = "SYSLOG_IDENTIFIER", default)]
    identifier: Option<String>,
}

impl JournalReader {
    pub fn new() -> Self {
        Self::with_program("journalctl")
    }

    /// Use a different `journalctl` binary
    pub fn with_program(program: impl Into<String>) -> Self {
        Self {
            program: program.into(),
        }
    }

    fn selector(log_name: &str) -> String {
        match log_name {
            "system" => "--system".to_string(),
            "user" => "--user".to_string(),
            "kernel" => "--dmesg".to_string(),
            unit => format!("--unit={}", unit),
        }
    }

    /// Parse one JSON line into an event record
    fn parse_line(log_name: &str, line: &str) -> Result<EventRecord, CollectorError> {
        let entry: JournalEntry =
            serde_json::from_str(line).map_err(|e| CollectorError::Parse(e.to_string()))?;

        let usec: i64 = entry.realtime_usec.parse().map_err(|_| {
            CollectorError::Parse(format!("invalid timestamp '{}'", entry.realtime_usec))
        })?;
        let time_created = Utc
            .timestamp_opt(
                usec.div_euclid(1_000_000),
                (usec.rem_euclid(1_000_000) * 1_000) as u32,
            )
            .single()
            .ok_or_else(|| CollectorError::Parse(format!("timestamp out of range: {}", usec)))?;

        let level = entry
            .priority
            .as_deref()
            .and_then(|p| p.parse::<u8>().ok())
            .map(EventLevel::from_syslog_priority)
            .unwrap_or(EventLevel::Information);

        let message = match entry.message {
            Value::String(s) => s,
            // Non-UTF-8 messages are emitted as byte arrays
            Value::Array(bytes) => {
                let raw: Vec<u8> = bytes
                    .iter()
                    .filter_map(|b| b.as_u64().map(|b| b as u8))
                    .collect();
                String::from_utf8_lossy(&raw).into_owned()
            }
            Value::Null => String::new(),
            other => other.to_string(),
        };

        Ok(EventRecord {
            time_created,
            log_name: log_name.to_string(),
            event_id: entry.message_id.or(entry.identifier).unwrap_or_default(),
            level,
            message,
        })
    }

    fn parse_output(log_name: &str, output: &str) -> Vec<EventRecord> {
        output
            .lines()
            .filter(|line| !line.trim().is_empty())
            .filter_map(|line| match Self::parse_line(log_name, line) {
                Ok(event) => Some(event),
                Err(e) => {
                    debug!("Failed to parse journal entry '{}': {}", line, e);
                    None
                }
            })
            .collect()
    }
}

impl EventSource for JournalReader {
    fn check_available(&self) -> Result<(), CollectorError> {
        let output = Command::new(&self.program)
            .arg("--version")
            .output()
            .map_err(|e| CollectorError::Unavailable(format!("{}: {}", self.program, e)))?;

        if output.status.success() {
            Ok(())
        } else {
            Err(CollectorError::Unavailable(format!(
                "{} --version exited with {}",
                self.program, output.status
            )))
        }
    }

    fn read_events(
        &self,
        log_name: &str,
        since: Timestamp,
        min_level: EventLevel,
    ) -> Result<Vec<EventRecord>, CollectorError> {
        debug!("Querying journal '{}' since {}", log_name, since);

        let output = Command::new(&self.program)
            .args([
                "--output=json".to_string(),
                "--no-pager".to_string(),
                "--quiet".to_string(),
                format!("--priority=0..{}", min_level.max_syslog_priority()),
                format!("--since=@{}", since.timestamp()),
                Self::selector(log_name),
            ])
            .output()
            .map_err(|e| CollectorError::Query(format!("{}: {}", self.program, e)))?;

        let stdout = String::from_utf8_lossy(&output.stdout);
        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            if stderr.contains("No entries") {
                return Ok(Vec::new());
            }
            return Err(CollectorError::Query(format!(
                "{} exited with {}: {}",
                self.program,
                output.status,
                stderr.trim()
            )));
        }

        Ok(Self::parse_output(log_name, &stdout))
    }
}

/// Appends new error-level events from every monitored log to the event log
///
/// Owns the [`Watermark`]. Each cycle reads the query bound once, queries every
/// log with it, writes the admitted events and only then advances the watermark.
/// If any log fails, the whole step fails: nothing is written and the watermark
/// stays where it was, so the events are picked up on a later cycle.
pub struct EventCollector {
    source: Box<dyn EventSource>,
    log_names: Vec<String>,
    min_level: EventLevel,
    watermark: Watermark,
    log: CsvLog,
}

impl EventCollector {
    pub fn new(
        source: Box<dyn EventSource>,
        log_names: Vec<String>,
        watermark: Watermark,
        path: impl Into<PathBuf>,
    ) -> Self {
        Self {
            source,
            log_names,
            min_level: EventLevel::Error,
            watermark,
            log: CsvLog::new(path, EVENT_HEADER),
        }
    }

    pub fn watermark(&self) -> &Watermark {
        &self.watermark
    }

    pub fn log(&self) -> &CsvLog {
        &self.log
    }
}

impl Collector for EventCollector {
    fn name(&self) -> &str {
        "event"
    }

    fn collect(&mut self) -> Result<CollectionReport, CollectorError> {
        let query_start = self.watermark.query_start();

        let mut events = Vec::new();
        for log_name in &self.log_names {
            let batch = self
                .source
                .read_events(log_name, query_start, self.min_level)
                .map_err(|e| CollectorError::Query(format!("log '{}': {}", log_name, e)))?;
            debug!("Log '{}' returned {} event(s)", log_name, batch.len());
            events.extend(batch);
        }

        let returned = events.len();
        events.retain(|e| e.level >= self.min_level && self.watermark.admits(e.time_created));
        if events.len() < returned {
            debug!(
                "Dropped {} event(s) already recorded or below {}",
                returned - events.len(),
                self.min_level
            );
        }
        events.sort_by_key(|e| e.time_created);

        let rows = self.log.append(&events)?;
        if self.watermark.advance(events.iter().map(|e| e.time_created)) {
            info!(
                "Recorded {} new event(s); watermark now {}",
                rows,
                self.watermark.current()
            );
        }

        Ok(CollectionReport {
            rows,
            ..Default::default()
        })
    }
}
