use crate::collectors::{CollectionReport, Collector};
use crate::error::CollectorError;
use crate::output::CsvLog;
use crate::samples::{collection_time, Adapter, NetworkSample, TrafficCounters, NETWORK_HEADER};
use log::{debug, warn};
use std::ffi::CString;
use std::path::PathBuf;
use sysinfo::Networks;

/// Supplier of network adapters and their traffic counters
#[cfg_attr(test, mockall::automock)]
pub trait AdapterSource {
    /// Check that adapters can be enumerated on this host at all
    fn check_available(&self) -> Result<(), CollectorError>;

    /// Enumerate the adapters currently present
    fn adapters(&mut self) -> Result<Vec<Adapter>, CollectorError>;

    /// Refresh traffic counters of every adapter
    fn refresh(&mut self) -> Result<(), CollectorError>;

    /// Cumulative counters of one adapter as of the last refresh
    fn traffic(&self, adapter: &Adapter) -> Result<TrafficCounters, CollectorError>;
}

/// Adapter source backed by `sysinfo`, with interface indices from `if_nametoindex`
pub struct SystemAdapters {
    networks: Networks,
}

impl Default for SystemAdapters {
    fn default() -> Self {
        Self::new()
    }
}

impl SystemAdapters {
    pub fn new() -> Self {
        Self {
            networks: Networks::new(),
        }
    }

    fn interface_index(name: &str) -> Option<u32> {
        let c_name = CString::new(name).ok()?;
        // SAFETY: c_name is a valid NUL-terminated string for the duration of the call
        let index = unsafe { libc::if_nametoindex(c_name.as_ptr()) };
        if index == 0 {
            None
        } else {
            Some(index)
        }
    }
}

impl AdapterSource for SystemAdapters {
    fn check_available(&self) -> Result<(), CollectorError> {
        if sysinfo::IS_SUPPORTED_SYSTEM {
            Ok(())
        } else {
            Err(CollectorError::Unavailable(
                "network statistics are not supported on this platform".to_string(),
            ))
        }
    }

    fn adapters(&mut self) -> Result<Vec<Adapter>, CollectorError> {
        self.networks.refresh_list();

        let mut adapters: Vec<Adapter> = self
            .networks
            .list()
            .keys()
            .filter_map(|name| match Self::interface_index(name) {
                Some(index) => Some(Adapter {
                    name: name.clone(),
                    index,
                }),
                None => {
                    warn!("Skipping adapter {}: no interface index", name);
                    None
                }
            })
            .collect();
        adapters.sort_by_key(|a| a.index);

        Ok(adapters)
    }

    fn refresh(&mut self) -> Result<(), CollectorError> {
        self.networks.refresh();
        Ok(())
    }

    fn traffic(&self, adapter: &Adapter) -> Result<TrafficCounters, CollectorError> {
        let data = self.networks.list().get(&adapter.name).ok_or_else(|| {
            CollectorError::Query(format!("adapter {} disappeared", adapter.name))
        })?;

        Ok(TrafficCounters {
            bytes_received: data.total_received(),
            bytes_sent: data.total_transmitted(),
            packets_received: data.total_packets_received(),
            packets_sent: data.total_packets_transmitted(),
        })
    }
}

/// Which adapters the network collector logs
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AdapterSelection {
    /// Every adapter the source enumerates
    All,
    /// Adapters whose name or index equals one of the entries
    Filter(Vec<String>),
    /// An already-resolved set of adapters
    Resolved(Vec<Adapter>),
}

impl AdapterSelection {
    /// Build a selection from an optional filter list
    pub fn from_filters(filters: Option<Vec<String>>) -> Self {
        match filters {
            Some(filters) => AdapterSelection::Filter(filters),
            None => AdapterSelection::All,
        }
    }
}

/// Logs cumulative traffic counters per selected adapter
///
/// Each invocation runs the interfaces step (resolve the selection against the
/// adapters present now) followed by the traffic step (read counters of every
/// resolved adapter). Adapters are re-resolved every cycle so that renamed or
/// hot-plugged interfaces are picked up.
pub struct NetworkCollector {
    source: Box<dyn AdapterSource>,
    selection: AdapterSelection,
    log: CsvLog,
}

impl NetworkCollector {
    pub fn new(
        source: Box<dyn AdapterSource>,
        selection: AdapterSelection,
        path: impl Into<PathBuf>,
    ) -> Self {
        Self {
            source,
            selection,
            log: CsvLog::new(path, NETWORK_HEADER),
        }
    }

    pub fn log(&self) -> &CsvLog {
        &self.log
    }

    /// Interfaces step: the adapters to read this cycle
    fn resolve(&mut self) -> Result<Vec<Adapter>, CollectorError> {
        match &self.selection {
            AdapterSelection::Resolved(adapters) => Ok(adapters.clone()),
            AdapterSelection::All => self.source.adapters(),
            AdapterSelection::Filter(filters) => {
                let present = self.source.adapters()?;
                let selected: Vec<Adapter> = present
                    .into_iter()
                    .filter(|a| filters.iter().any(|f| a.matches(f)))
                    .collect();

                if selected.is_empty() {
                    warn!(
                        "No network adapter matches filter [{}]",
                        filters.join(", ")
                    );
                    return Ok(selected);
                }
                for filter in filters {
                    if !selected.iter().any(|a| a.matches(filter)) {
                        warn!("Adapter filter '{}' matches no adapter", filter);
                    }
                }
                Ok(selected)
            }
        }
    }
}

impl Collector for NetworkCollector {
    fn name(&self) -> &str {
        "network"
    }

    fn collect(&mut self) -> Result<CollectionReport, CollectorError> {
        let adapters = self.resolve()?;
        let mut report = CollectionReport::default();
        if adapters.is_empty() {
            return Ok(report);
        }

        let timestamp = collection_time();
        self.source.refresh()?;

        let mut samples = Vec::with_capacity(adapters.len());
        for adapter in adapters {
            match self.source.traffic(&adapter) {
                Ok(counters) => {
                    debug!("Adapter {} ({}): {:?}", adapter.name, adapter.index, counters);
                    samples.push(NetworkSample {
                        timestamp,
                        adapter,
                        counters,
                    });
                }
                Err(e) => {
                    warn!("Skipping adapter {}: {}", adapter.name, e);
                    report.skipped += 1;
                }
            }
        }

        report.rows = self.log.append(&samples)?;
        Ok(report)
    }
}
