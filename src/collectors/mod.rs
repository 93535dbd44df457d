/// Performance counter collector
pub mod performance_collector;

/// Drive usage collector
pub mod disk_collector;

/// Operating-system event log collector
pub mod event_collector;

/// Network adapter traffic collector
pub mod network_collector;

pub use disk_collector::{DiskCollector, DriveSource, SystemDrives};
pub use event_collector::{EventCollector, EventSource, JournalReader};
pub use network_collector::{AdapterSelection, AdapterSource, NetworkCollector, SystemAdapters};
pub use performance_collector::{CounterSource, PerformanceCollector, SystemCounters};

use crate::alerts::{Alert, AlertDispatcher, Delivery};
use crate::error::CollectorError;

/// A component that queries one external source per invocation and appends
/// the resulting samples to its log
///
/// Failures are returned, never panicked or swallowed; the cycle runner decides
/// what to do with them.
pub trait Collector {
    /// Short name used in diagnostics and run statistics
    fn name(&self) -> &str;

    /// Query the source once and append whatever it produced
    ///
    /// # Errors
    ///
    /// Returns a `CollectorError` if the source query or the log append fails.
    /// Individual items that cannot be processed are skipped and counted in the
    /// report instead.
    fn collect(&mut self) -> Result<CollectionReport, CollectorError>;
}

/// What one collector invocation did
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CollectionReport {
    /// Rows appended to the log
    pub rows: usize,
    /// Items skipped individually (zero-capacity drives, unresolvable adapters)
    pub skipped: usize,
    pub alerts_raised: usize,
    pub alerts_delivered: usize,
    pub alerts_failed: usize,
}

impl CollectionReport {
    /// Dispatch an alert and account for its outcome
    pub(crate) fn raise(&mut self, dispatcher: &AlertDispatcher, alert: &Alert) {
        self.alerts_raised += 1;
        match dispatcher.dispatch(alert) {
            Delivery::Delivered => self.alerts_delivered += 1,
            Delivery::Failed => self.alerts_failed += 1,
            Delivery::LogOnly => {}
        }
    }
}
