use crate::alerts::{evaluate, AlertDispatcher, Metric, Percent};
use crate::collectors::{CollectionReport, Collector};
use crate::error::CollectorError;
use crate::output::CsvLog;
use crate::samples::{collection_time, DiskSample, Drive, DISK_HEADER};
use log::{debug, warn};
use std::collections::HashSet;
use std::path::PathBuf;
use std::rc::Rc;
use sysinfo::Disks;

/// Supplier of mounted drive capacity figures
#[cfg_attr(test, mockall::automock)]
pub trait DriveSource {
    /// List the mounted drives with their current capacity and free space
    fn drives(&mut self) -> Result<Vec<Drive>, CollectorError>;
}

/// Drive source backed by `sysinfo`
///
/// Drives are named by mount point. Used space is never reported directly, so
/// the collector derives it from capacity and free space.
pub struct SystemDrives {
    disks: Disks,
}

impl Default for SystemDrives {
    fn default() -> Self {
        Self::new()
    }
}

impl SystemDrives {
    pub fn new() -> Self {
        Self {
            disks: Disks::new(),
        }
    }
}

impl DriveSource for SystemDrives {
    fn drives(&mut self) -> Result<Vec<Drive>, CollectorError> {
        self.disks.refresh_list();

        let mut seen = HashSet::new();
        let drives = self
            .disks
            .iter()
            .filter_map(|disk| {
                let name = disk.mount_point().to_string_lossy().to_string();
                if !seen.insert(name.clone()) {
                    return None;
                }
                Some(Drive {
                    name,
                    capacity: Some(disk.total_space()),
                    free: Some(disk.available_space()),
                    used: None,
                })
            })
            .collect();

        Ok(drives)
    }
}

/// Logs used-space percentage per drive and alerts on the disk threshold
///
/// Drives without a usable capacity are skipped individually with a warning;
/// they never produce a usage row or an alert.
pub struct DiskCollector {
    source: Box<dyn DriveSource>,
    log: CsvLog,
    usage_limit: Option<Percent>,
    dispatcher: Rc<AlertDispatcher>,
}

impl DiskCollector {
    pub fn new(
        source: Box<dyn DriveSource>,
        path: impl Into<PathBuf>,
        usage_limit: Option<Percent>,
        dispatcher: Rc<AlertDispatcher>,
    ) -> Self {
        Self {
            source,
            log: CsvLog::new(path, DISK_HEADER),
            usage_limit,
            dispatcher,
        }
    }

    pub fn log(&self) -> &CsvLog {
        &self.log
    }
}

impl Collector for DiskCollector {
    fn name(&self) -> &str {
        "disk"
    }

    fn collect(&mut self) -> Result<CollectionReport, CollectorError> {
        let timestamp = collection_time();
        let drives = self.source.drives()?;
        let mut report = CollectionReport::default();
        let mut samples = Vec::with_capacity(drives.len());

        for drive in drives {
            let used_percentage = match drive.used_percentage() {
                Ok(pct) => pct,
                Err(reason) => {
                    warn!("Skipping drive {}: {}", drive.name, reason);
                    report.skipped += 1;
                    continue;
                }
            };
            debug!("Drive {} at {:.2}% used", drive.name, used_percentage);

            if let Some(alert) = evaluate(
                Metric::DiskUsage,
                &drive.name,
                used_percentage,
                self.usage_limit,
                timestamp,
            ) {
                report.raise(&self.dispatcher, &alert);
            }

            samples.push(DiskSample {
                timestamp,
                drive: drive.name,
                used_percentage,
            });
        }

        report.rows = self.log.append(&samples)?;
        Ok(report)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::alerts::dispatcher::MockAlertTransport;
    use tempfile::TempDir;

    fn drive(name: &str, capacity: Option<u64>, free: Option<u64>, used: Option<u64>) -> Drive {
        Drive {
            name: name.to_string(),
            capacity,
            free,
            used,
        }
    }

    fn source_with(drives: Vec<Drive>) -> Box<dyn DriveSource> {
        let mut source = MockDriveSource::new();
        source.expect_drives().returning(move || Ok(drives.clone()));
        Box::new(source)
    }

    fn dispatcher_expecting(alerts: usize) -> Rc<AlertDispatcher> {
        let mut transport = MockAlertTransport::new();
        transport
            .expect_deliver()
            .times(alerts)
            .returning(|_, _| Ok(()));
        Rc::new(AlertDispatcher::with_transport("test-host", Box::new(transport)))
    }

    fn logged_percentages(path: &std::path::Path) -> Vec<(String, f64)> {
        let mut reader = csv::Reader::from_path(path).unwrap();
        reader
            .records()
            .map(|r| {
                let r = r.unwrap();
                (r[1].to_string(), r[2].parse().unwrap())
            })
            .collect()
    }

    #[test]
    fn test_used_percentage_derived_or_reported() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("disk.csv");
        let mut collector = DiskCollector::new(
            source_with(vec![
                drive("/", Some(1000), Some(250), None),
                drive("/data", Some(400), Some(0), Some(100)),
            ]),
            &path,
            None,
            dispatcher_expecting(0),
        );

        let report = collector.collect().unwrap();

        assert_eq!(report.rows, 2);
        let rows = logged_percentages(&path);
        assert_eq!(rows[0].0, "/");
        assert!((rows[0].1 - 75.0).abs() < 1e-9);
        assert_eq!(rows[1].0, "/data");
        assert!((rows[1].1 - 25.0).abs() < 1e-9);
    }

    #[test]
    fn test_zero_capacity_drive_is_skipped() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("disk.csv");
        let mut collector = DiskCollector::new(
            source_with(vec![drive("/proc", Some(0), Some(0), None)]),
            &path,
            Some(Percent::new(0.0).unwrap()),
            dispatcher_expecting(0),
        );

        let report = collector.collect().unwrap();

        assert_eq!(report.rows, 0);
        assert_eq!(report.skipped, 1);
        assert_eq!(report.alerts_raised, 0);
        assert!(!path.exists());
    }

    #[test]
    fn test_bad_drive_does_not_abort_siblings() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("disk.csv");
        let mut collector = DiskCollector::new(
            source_with(vec![
                drive("/a", None, Some(1), None),
                drive("/b", Some(100), Some(10), None),
                drive("/c", Some(0), None, None),
            ]),
            &path,
            None,
            dispatcher_expecting(0),
        );

        let report = collector.collect().unwrap();

        assert_eq!(report.rows, 1);
        assert_eq!(report.skipped, 2);
        assert_eq!(logged_percentages(&path)[0].0, "/b");
    }

    #[test]
    fn test_threshold_evaluated_per_drive() {
        let dir = TempDir::new().unwrap();
        let mut collector = DiskCollector::new(
            source_with(vec![
                drive("/", Some(100), Some(5), None),
                drive("/home", Some(100), Some(60), None),
                drive("/var", Some(100), Some(10), None),
            ]),
            dir.path().join("disk.csv"),
            Some(Percent::new(90.0).unwrap()),
            dispatcher_expecting(2),
        );

        let report = collector.collect().unwrap();

        assert_eq!(report.alerts_raised, 2);
        assert_eq!(report.rows, 3);
    }

    #[test]
    fn test_source_failure_is_returned() {
        let dir = TempDir::new().unwrap();
        let mut source = MockDriveSource::new();
        source
            .expect_drives()
            .returning(|| Err(CollectorError::Query("volume enumeration failed".to_string())));
        let mut collector = DiskCollector::new(
            Box::new(source),
            dir.path().join("disk.csv"),
            None,
            dispatcher_expecting(0),
        );

        assert!(collector.collect().is_err());
    }
}
