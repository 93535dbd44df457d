//! Self-monitoring of the agent's own run
//!
//! The cycle runner records the outcome of every collector invocation here, so
//! that a run can report how much it wrote, how often each source failed and
//! whether alerts actually went out.

use crate::collectors::CollectionReport;
use crate::error::CollectorError;
use crate::samples::Timestamp;
use chrono::Utc;
use log::{debug, info};
use std::collections::BTreeMap;

/// Accumulated outcomes of one collector
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CollectorStatistics {
    pub invocations: u64,
    pub failures: u64,
    pub rows: u64,
    pub skipped: u64,
    pub alerts_raised: u64,
    pub alerts_delivered: u64,
    pub alerts_failed: u64,
}

impl CollectorStatistics {
    /// Share of invocations that succeeded, as a percentage
    pub fn success_rate(&self) -> f64 {
        if self.invocations == 0 {
            return 100.0;
        }
        (self.invocations - self.failures) as f64 / self.invocations as f64 * 100.0
    }
}

/// Per-collector counters plus the number of completed cycles
#[derive(Debug, Clone)]
pub struct RunStatistics {
    started_at: Timestamp,
    cycles: u64,
    collectors: BTreeMap<String, CollectorStatistics>,
}

impl Default for RunStatistics {
    fn default() -> Self {
        Self::new()
    }
}

impl RunStatistics {
    pub fn new() -> Self {
        Self {
            started_at: Utc::now(),
            cycles: 0,
            collectors: BTreeMap::new(),
        }
    }

    /// Record one collector invocation
    pub fn record(&mut self, collector: &str, outcome: &Result<CollectionReport, CollectorError>) {
        let stats = self.collectors.entry(collector.to_string()).or_default();
        stats.invocations += 1;

        match outcome {
            Ok(report) => {
                stats.rows += report.rows as u64;
                stats.skipped += report.skipped as u64;
                stats.alerts_raised += report.alerts_raised as u64;
                stats.alerts_delivered += report.alerts_delivered as u64;
                stats.alerts_failed += report.alerts_failed as u64;
            }
            Err(_) => stats.failures += 1,
        }

        debug!("Collector {} statistics: {:?}", collector, stats);
    }

    /// Record that a full cycle completed
    pub fn complete_cycle(&mut self) {
        self.cycles += 1;
    }

    pub fn cycles(&self) -> u64 {
        self.cycles
    }

    pub fn collector(&self, name: &str) -> Option<&CollectorStatistics> {
        self.collectors.get(name)
    }

    /// Write a summary of the run to the diagnostic log
    pub fn log_summary(&self) {
        let elapsed = Utc::now() - self.started_at;
        info!(
            "Run summary: {} cycle(s) in {}s",
            self.cycles,
            elapsed.num_seconds()
        );

        for (name, stats) in &self.collectors {
            info!(
                "  {}: {} invocation(s), {} failed ({:.1}% success), {} row(s), {} skipped, {} alert(s) ({} delivered, {} failed)",
                name,
                stats.invocations,
                stats.failures,
                stats.success_rate(),
                stats.rows,
                stats.skipped,
                stats.alerts_raised,
                stats.alerts_delivered,
                stats.alerts_failed
            );
        }
    }
}
