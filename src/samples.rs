//! Core sample types for the host metrics agent
//!
//! This module defines the records produced by the collectors and appended to the
//! CSV logs, together with the raw shapes (drives, adapters) read from the host.
//! Samples are immutable once built: collectors construct them, the output layer
//! serialises them, nothing edits them in between.

use crate::output::LogRecord;
use chrono::{DateTime, SubsecRound, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Timestamp type for consistent time handling across the application
pub type Timestamp = DateTime<Utc>;

/// Rendering used for every timestamp column
pub const TIMESTAMP_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

pub const DISK_HEADER: &[&str] = &["Timestamp", "Drive", "UsedPercentage"];

pub const EVENT_HEADER: &[&str] = &["Timestamp", "LogName", "EventID", "Level", "Message"];

pub const NETWORK_HEADER: &[&str] = &[
    "Timestamp",
    "InterfaceName",
    "InterfaceIndex",
    "BytesReceived",
    "BytesSent",
    "PacketsReceived",
    "PacketsSent",
];

/// Current instant truncated to whole seconds, the precision of every sample
pub fn collection_time() -> Timestamp {
    Utc::now().trunc_subsecs(0)
}

pub fn format_timestamp(timestamp: &Timestamp) -> String {
    timestamp.format(TIMESTAMP_FORMAT).to_string()
}

/// A host performance counter sampled by the performance collector
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
pub enum Counter {
    /// Total processor utilisation across all cores, 0-100
    #[serde(rename = "ProcessorTimePercent")]
    ProcessorTime,
    /// Memory available to new processes, in mebibytes
    #[serde(rename = "AvailableMemoryMB")]
    AvailableMemory,
    /// Share of physical memory in use, 0-100
    #[serde(rename = "MemoryUsedPercent")]
    MemoryUsed,
    /// Share of swap in use, 0-100
    #[serde(rename = "SwapUsedPercent")]
    SwapUsed,
}

impl Counter {
    pub const ALL: [Counter; 4] = [
        Counter::ProcessorTime,
        Counter::AvailableMemory,
        Counter::MemoryUsed,
        Counter::SwapUsed,
    ];

    /// Column name used in the performance log header
    pub fn column(&self) -> &'static str {
        match self {
            Counter::ProcessorTime => "ProcessorTimePercent",
            Counter::AvailableMemory => "AvailableMemoryMB",
            Counter::MemoryUsed => "MemoryUsedPercent",
            Counter::SwapUsed => "SwapUsedPercent",
        }
    }

    /// Header row for a performance log carrying the given counters
    pub fn header(counters: &[Counter]) -> Vec<String> {
        std::iter::once("Timestamp".to_string())
            .chain(counters.iter().map(|c| c.column().to_string()))
            .collect()
    }
}

impl fmt::Display for Counter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.column())
    }
}

/// One row of the performance log: every configured counter for one cycle
#[derive(Debug, Clone, PartialEq)]
pub struct PerformanceSample {
    pub timestamp: Timestamp,
    /// Counter readings in configured column order
    pub values: Vec<(Counter, f64)>,
}

impl PerformanceSample {
    pub fn value(&self, counter: Counter) -> Option<f64> {
        self.values
            .iter()
            .find(|(c, _)| *c == counter)
            .map(|(_, v)| *v)
    }
}

impl LogRecord for PerformanceSample {
    fn fields(&self) -> Vec<String> {
        std::iter::once(format_timestamp(&self.timestamp))
            .chain(self.values.iter().map(|(_, v)| v.to_string()))
            .collect()
    }
}

/// A mounted volume as reported by the host
#[derive(Debug, Clone, PartialEq)]
pub struct Drive {
    pub name: String,
    /// Total capacity in bytes, when the host reports one
    pub capacity: Option<u64>,
    /// Free bytes, when the host reports them
    pub free: Option<u64>,
    /// Used bytes, only present when the host reports usage directly
    pub used: Option<u64>,
}

/// Why a drive cannot produce a usage sample
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DriveSkip {
    MissingCapacity,
    ZeroCapacity,
    MissingFreeSpace,
}

impl fmt::Display for DriveSkip {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DriveSkip::MissingCapacity => f.write_str("capacity not reported"),
            DriveSkip::ZeroCapacity => f.write_str("capacity is zero"),
            DriveSkip::MissingFreeSpace => f.write_str("neither used nor free space reported"),
        }
    }
}

impl Drive {
    /// Used space in bytes, derived as `capacity - free` when not reported directly
    pub fn used_bytes(&self) -> Result<u64, DriveSkip> {
        let capacity = self.usable_capacity()?;
        match (self.used, self.free) {
            (Some(used), _) => Ok(used),
            (None, Some(free)) => Ok(capacity.saturating_sub(free)),
            (None, None) => Err(DriveSkip::MissingFreeSpace),
        }
    }

    /// Used space as a percentage of capacity
    pub fn used_percentage(&self) -> Result<f64, DriveSkip> {
        let capacity = self.usable_capacity()?;
        let used = self.used_bytes()?;
        Ok(used as f64 / capacity as f64 * 100.0)
    }

    fn usable_capacity(&self) -> Result<u64, DriveSkip> {
        match self.capacity {
            None => Err(DriveSkip::MissingCapacity),
            Some(0) => Err(DriveSkip::ZeroCapacity),
            Some(capacity) => Ok(capacity),
        }
    }
}

/// One row of the disk log
#[derive(Debug, Clone, PartialEq)]
pub struct DiskSample {
    pub timestamp: Timestamp,
    pub drive: String,
    pub used_percentage: f64,
}

impl LogRecord for DiskSample {
    fn fields(&self) -> Vec<String> {
        vec![
            format_timestamp(&self.timestamp),
            self.drive.clone(),
            self.used_percentage.to_string(),
        ]
    }
}

/// Severity of an operating-system event, ordered from least to most severe
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum EventLevel {
    Verbose,
    Information,
    Warning,
    Error,
    Critical,
}

impl EventLevel {
    /// Map a syslog priority (0 = emerg .. 7 = debug) onto an event level
    pub fn from_syslog_priority(priority: u8) -> Self {
        match priority {
            0..=2 => EventLevel::Critical,
            3 => EventLevel::Error,
            4 => EventLevel::Warning,
            5 | 6 => EventLevel::Information,
            _ => EventLevel::Verbose,
        }
    }

    /// Highest syslog priority number still at or above this level
    pub fn max_syslog_priority(&self) -> u8 {
        match self {
            EventLevel::Critical => 2,
            EventLevel::Error => 3,
            EventLevel::Warning => 4,
            EventLevel::Information => 6,
            EventLevel::Verbose => 7,
        }
    }
}

impl fmt::Display for EventLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            EventLevel::Verbose => "Verbose",
            EventLevel::Information => "Information",
            EventLevel::Warning => "Warning",
            EventLevel::Error => "Error",
            EventLevel::Critical => "Critical",
        };
        f.write_str(name)
    }
}

/// An operating-system event read from one monitored log
#[derive(Debug, Clone, PartialEq)]
pub struct EventRecord {
    /// When the event was created, at full source precision
    pub time_created: Timestamp,
    pub log_name: String,
    pub event_id: String,
    pub level: EventLevel,
    pub message: String,
}

impl LogRecord for EventRecord {
    fn fields(&self) -> Vec<String> {
        vec![
            format_timestamp(&self.time_created),
            self.log_name.clone(),
            self.event_id.clone(),
            self.level.to_string(),
            self.message.clone(),
        ]
    }
}

/// A network interface identified by name and numeric index
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Adapter {
    pub name: String,
    pub index: u32,
}

impl Adapter {
    /// True when `filter` names this adapter or equals its index
    pub fn matches(&self, filter: &str) -> bool {
        let filter = filter.trim();
        self.name == filter || self.index.to_string() == filter
    }
}

/// Cumulative traffic counters of one adapter
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct TrafficCounters {
    pub bytes_received: u64,
    pub bytes_sent: u64,
    pub packets_received: u64,
    pub packets_sent: u64,
}

/// One row of the network log
#[derive(Debug, Clone, PartialEq)]
pub struct NetworkSample {
    pub timestamp: Timestamp,
    pub adapter: Adapter,
    pub counters: TrafficCounters,
}

impl LogRecord for NetworkSample {
    fn fields(&self) -> Vec<String> {
        vec![
            format_timestamp(&self.timestamp),
            self.adapter.name.clone(),
            self.adapter.index.to_string(),
            self.counters.bytes_received.to_string(),
            self.counters.bytes_sent.to_string(),
            self.counters.packets_received.to_string(),
            self.counters.packets_sent.to_string(),
        ]
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn drive(capacity: Option<u64>, free: Option<u64>, used: Option<u64>) -> Drive {
        Drive {
            name: "/data".to_string(),
            capacity,
            free,
            used,
        }
    }

    #[test]
    fn test_event_level_ordering() {
        assert!(EventLevel::Verbose < EventLevel::Information);
        assert!(EventLevel::Information < EventLevel::Warning);
        assert!(EventLevel::Warning < EventLevel::Error);
        assert!(EventLevel::Error < EventLevel::Critical);
    }

    #[test]
    fn test_syslog_priority_mapping() {
        assert_eq!(EventLevel::from_syslog_priority(0), EventLevel::Critical);
        assert_eq!(EventLevel::from_syslog_priority(2), EventLevel::Critical);
        assert_eq!(EventLevel::from_syslog_priority(3), EventLevel::Error);
        assert_eq!(EventLevel::from_syslog_priority(4), EventLevel::Warning);
        assert_eq!(EventLevel::from_syslog_priority(6), EventLevel::Information);
        assert_eq!(EventLevel::from_syslog_priority(7), EventLevel::Verbose);
        assert_eq!(EventLevel::Error.max_syslog_priority(), 3);
    }

    #[test]
    fn test_counter_serialization_uses_column_names() {
        for counter in Counter::ALL {
            let json = serde_json::to_string(&counter).unwrap();
            assert_eq!(json, format!("\"{}\"", counter.column()));
        }
    }

    #[test]
    fn test_performance_header() {
        let header = Counter::header(&[Counter::ProcessorTime, Counter::SwapUsed]);
        assert_eq!(
            header,
            vec!["Timestamp", "ProcessorTimePercent", "SwapUsedPercent"]
        );
    }

    #[test]
    fn test_drive_used_percentage_from_free_space() {
        let d = drive(Some(200), Some(50), None);
        assert_eq!(d.used_bytes(), Ok(150));
        assert!((d.used_percentage().unwrap() - 75.0).abs() < 1e-9);
    }

    #[test]
    fn test_drive_used_percentage_prefers_reported_used() {
        let d = drive(Some(200), Some(50), Some(20));
        assert!((d.used_percentage().unwrap() - 10.0).abs() < 1e-9);
    }

    #[test]
    fn test_drive_without_usable_capacity() {
        assert_eq!(
            drive(Some(0), Some(0), None).used_percentage(),
            Err(DriveSkip::ZeroCapacity)
        );
        assert_eq!(
            drive(None, Some(10), None).used_percentage(),
            Err(DriveSkip::MissingCapacity)
        );
        assert_eq!(
            drive(Some(10), None, None).used_percentage(),
            Err(DriveSkip::MissingFreeSpace)
        );
    }

    #[test]
    fn test_adapter_matches_name_or_index() {
        let adapter = Adapter {
            name: "eth0".to_string(),
            index: 2,
        };
        assert!(adapter.matches("eth0"));
        assert!(adapter.matches("2"));
        assert!(adapter.matches(" 2 "));
        assert!(!adapter.matches("eth1"));
        assert!(!adapter.matches("20"));
    }

    #[test]
    fn test_record_fields() {
        let timestamp = Utc.with_ymd_and_hms(2024, 12, 9, 18, 30, 45).unwrap();
        let sample = NetworkSample {
            timestamp,
            adapter: Adapter {
                name: "wlan0".to_string(),
                index: 3,
            },
            counters: TrafficCounters {
                bytes_received: 10,
                bytes_sent: 20,
                packets_received: 1,
                packets_sent: 2,
            },
        };
        assert_eq!(
            sample.fields(),
            vec!["2024-12-09 18:30:45", "wlan0", "3", "10", "20", "1", "2"]
        );
    }
}
