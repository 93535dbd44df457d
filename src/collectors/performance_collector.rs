use crate::alerts::{evaluate, AlertDispatcher, Metric, Percent};
use crate::collectors::{CollectionReport, Collector};
use crate::error::CollectorError;
use crate::output::CsvLog;
use crate::samples::{collection_time, Counter, PerformanceSample};
use log::debug;
use std::path::PathBuf;
use std::rc::Rc;
use std::thread;
use std::time::Instant;
use sysinfo::System;

/// Supplier of host performance counter readings
#[cfg_attr(test, mockall::automock)]
pub trait CounterSource {
    /// Check that counters can be read on this host at all
    fn check_available(&self) -> Result<(), CollectorError>;

    /// Read every requested counter once, in the order given
    fn sample(&mut self, counters: &[Counter]) -> Result<Vec<f64>, CollectorError>;
}

/// Counter source backed by `sysinfo`
pub struct SystemCounters {
    system: System,
    /// When CPU usage was last refreshed; usage is measured between refreshes
    cpu_refreshed_at: Instant,
}

impl Default for SystemCounters {
    fn default() -> Self {
        Self::new()
    }
}

impl SystemCounters {
    pub fn new() -> Self {
        let mut system = System::new();
        system.refresh_cpu_usage();
        Self {
            system,
            cpu_refreshed_at: Instant::now(),
        }
    }

    fn refresh(&mut self) {
        // CPU usage is a delta between two refreshes; too short a gap reads as 0
        let elapsed = self.cpu_refreshed_at.elapsed();
        if elapsed < sysinfo::MINIMUM_CPU_UPDATE_INTERVAL {
            thread::sleep(sysinfo::MINIMUM_CPU_UPDATE_INTERVAL - elapsed);
        }
        self.system.refresh_cpu_usage();
        self.cpu_refreshed_at = Instant::now();
        self.system.refresh_memory();
    }

    fn read(&self, counter: Counter) -> Result<f64, CollectorError> {
        match counter {
            Counter::ProcessorTime => Ok(self.system.global_cpu_usage() as f64),
            Counter::AvailableMemory => {
                Ok(self.system.available_memory() as f64 / (1024.0 * 1024.0))
            }
            Counter::MemoryUsed => {
                let total = self.system.total_memory();
                if total == 0 {
                    return Err(CollectorError::Query(
                        "total memory reported as zero".to_string(),
                    ));
                }
                Ok(self.system.used_memory() as f64 / total as f64 * 100.0)
            }
            Counter::SwapUsed => {
                let total = self.system.total_swap();
                if total == 0 {
                    // No swap configured
                    return Ok(0.0);
                }
                Ok(self.system.used_swap() as f64 / total as f64 * 100.0)
            }
        }
    }
}

impl CounterSource for SystemCounters {
    fn check_available(&self) -> Result<(), CollectorError> {
        if sysinfo::IS_SUPPORTED_SYSTEM {
            Ok(())
        } else {
            Err(CollectorError::Unavailable(
                "performance counters are not supported on this platform".to_string(),
            ))
        }
    }

    fn sample(&mut self, counters: &[Counter]) -> Result<Vec<f64>, CollectorError> {
        self.refresh();
        counters.iter().map(|c| self.read(*c)).collect()
    }
}

/// Samples the configured counters once per cycle into the performance log
///
/// Evaluates the CPU threshold against `ProcessorTimePercent` when that counter
/// is part of the configured set.
pub struct PerformanceCollector {
    source: Box<dyn CounterSource>,
    counters: Vec<Counter>,
    log: CsvLog,
    cpu_limit: Option<Percent>,
    dispatcher: Rc<AlertDispatcher>,
}

impl PerformanceCollector {
    pub fn new(
        source: Box<dyn CounterSource>,
        counters: Vec<Counter>,
        path: impl Into<PathBuf>,
        cpu_limit: Option<Percent>,
        dispatcher: Rc<AlertDispatcher>,
    ) -> Self {
        let log = CsvLog::new(path, &Counter::header(&counters));
        Self {
            source,
            counters,
            log,
            cpu_limit,
            dispatcher,
        }
    }

    pub fn log(&self) -> &CsvLog {
        &self.log
    }
}

impl Collector for PerformanceCollector {
    fn name(&self) -> &str {
        "performance"
    }

    fn collect(&mut self) -> Result<CollectionReport, CollectorError> {
        let timestamp = collection_time();
        let readings = self.source.sample(&self.counters)?;
        if readings.len() != self.counters.len() {
            return Err(CollectorError::Parse(format!(
                "expected {} counter values, got {}",
                self.counters.len(),
                readings.len()
            )));
        }

        let sample = PerformanceSample {
            timestamp,
            values: self.counters.iter().copied().zip(readings).collect(),
        };
        debug!("Sampled performance counters: {:?}", sample.values);

        let mut report = CollectionReport::default();
        if let Some(cpu) = sample.value(Counter::ProcessorTime) {
            let source = Counter::ProcessorTime.column();
            if let Some(alert) = evaluate(Metric::CpuUsage, source, cpu, self.cpu_limit, timestamp) {
                report.raise(&self.dispatcher, &alert);
            }
        }

        report.rows = self.log.append(&[sample])?;
        Ok(report)
    }
}
