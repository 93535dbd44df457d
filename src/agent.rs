//! Assembly of the two runnables from configuration
//!
//! `system` runs performance -> disk -> event; `network` runs interfaces -> traffic.
//! Both check their external dependencies first and fail before any log file is
//! touched if one is missing.

use crate::alerts::{dispatcher::local_hostname, AlertDispatcher, SmtpMailer};
use crate::collectors::{
    AdapterSelection, AdapterSource, Collector, CounterSource, DiskCollector, DriveSource,
    EventCollector, EventSource, JournalReader, NetworkCollector, PerformanceCollector,
    SystemAdapters, SystemCounters, SystemDrives,
};
use crate::config::Config;
use crate::error::StartupError;
use crate::runner::{CycleRunner, Sleeper};
use crate::watermark::Watermark;
use chrono::Utc;
use log::info;
use std::rc::Rc;
use std::sync::atomic::AtomicBool;
use std::sync::Arc;

/// External sources used by the `system` runner
pub struct SystemSources {
    pub counters: Box<dyn CounterSource>,
    pub drives: Box<dyn DriveSource>,
    pub events: Box<dyn EventSource>,
}

impl SystemSources {
    /// Sources backed by this host
    pub fn host() -> Self {
        Self {
            counters: Box::new(SystemCounters::new()),
            drives: Box::new(SystemDrives::new()),
            events: Box::new(JournalReader::new()),
        }
    }
}

/// Build the alert dispatcher, with mail delivery when `[smtp]` is configured
pub fn alert_dispatcher(config: &Config) -> Result<AlertDispatcher, StartupError> {
    let host = local_hostname();
    match &config.smtp {
        Some(settings) => {
            let mailer = SmtpMailer::new(settings)
                .map_err(|e| StartupError::dependency("smtp", e.to_string()))?;
            info!(
                "Alerts will be mailed to {} via {}:{}",
                settings.to, settings.server, settings.port
            );
            Ok(AlertDispatcher::with_transport(host, Box::new(mailer)))
        }
        None => Ok(AlertDispatcher::log_only(host)),
    }
}

/// Build the performance -> disk -> event runner
///
/// # Errors
///
/// Returns `StartupError` if the configuration is invalid or a source is unavailable.
pub fn system_runner(
    config: &Config,
    sources: SystemSources,
    dispatcher: Rc<AlertDispatcher>,
    sleeper: Box<dyn Sleeper>,
    stop: Arc<AtomicBool>,
) -> Result<CycleRunner, StartupError> {
    config.validate()?;

    sources
        .counters
        .check_available()
        .map_err(|e| StartupError::dependency("performance counters", e.to_string()))?;
    sources
        .events
        .check_available()
        .map_err(|e| StartupError::dependency("event log", e.to_string()))?;

    let watermark = Watermark::looking_back(Utc::now(), config.events.lookback());
    info!(
        "Collecting events from {} since {}",
        config.events.logs.join(", "),
        watermark.current()
    );

    let collectors: Vec<Box<dyn Collector>> = vec![
        Box::new(PerformanceCollector::new(
            sources.counters,
            config.performance.counters.clone(),
            config.output.performance_path(),
            config.thresholds.cpu_percent,
            Rc::clone(&dispatcher),
        )),
        Box::new(DiskCollector::new(
            sources.drives,
            config.output.disk_path(),
            config.thresholds.disk_used_percent,
            Rc::clone(&dispatcher),
        )),
        Box::new(EventCollector::new(
            sources.events,
            config.events.logs.clone(),
            watermark,
            config.output.events_path(),
        )),
    ];

    Ok(CycleRunner::new(
        collectors,
        config.interval(),
        config.iteration_bound(),
        sleeper,
        stop,
    ))
}

/// Build the interfaces -> traffic runner
///
/// # Errors
///
/// Returns `StartupError` if the configuration is invalid or adapters cannot be enumerated.
pub fn network_runner(
    config: &Config,
    source: Box<dyn AdapterSource>,
    sleeper: Box<dyn Sleeper>,
    stop: Arc<AtomicBool>,
) -> Result<CycleRunner, StartupError> {
    config.validate()?;

    source
        .check_available()
        .map_err(|e| StartupError::dependency("network statistics", e.to_string()))?;

    let selection = AdapterSelection::from_filters(config.network.adapters.clone());
    let collectors: Vec<Box<dyn Collector>> = vec![Box::new(NetworkCollector::new(
        source,
        selection,
        config.output.network_path(),
    ))];

    Ok(CycleRunner::new(
        collectors,
        config.interval(),
        config.iteration_bound(),
        sleeper,
        stop,
    ))
}

/// Host-backed adapter source for the `network` runner
pub fn host_adapters() -> Box<dyn AdapterSource> {
    Box::new(SystemAdapters::new())
}
