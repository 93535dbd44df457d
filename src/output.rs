//! Append-only CSV logs
//!
//! Each collector owns one [`CsvLog`]. The file and its containing directory are
//! created on the first non-empty append of a run; the header row is written only
//! when the file is new or empty, so restarting the agent keeps appending below
//! the existing rows.

use crate::error::CollectorError;
use log::{debug, info};
use std::fs::{self, OpenOptions};
use std::path::{Path, PathBuf};

/// A record that can be appended to a [`CsvLog`] as one row
pub trait LogRecord {
    /// Column values in header order
    fn fields(&self) -> Vec<String>;
}

/// An append-only delimited record file with a fixed header
#[derive(Debug)]
pub struct CsvLog {
    path: PathBuf,
    header: Vec<String>,
    /// Set once the containing directory has been checked this run
    directory_ready: bool,
}

impl CsvLog {
    pub fn new<S: AsRef<str>>(path: impl Into<PathBuf>, header: &[S]) -> Self {
        Self {
            path: path.into(),
            header: header.iter().map(|h| h.as_ref().to_string()).collect(),
            directory_ready: false,
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn header(&self) -> &[String] {
        &self.header
    }

    /// Append `records` as rows, returning the number of rows written
    ///
    /// An empty slice is a no-op: nothing is created or touched on disk.
    ///
    /// # Errors
    ///
    /// Returns `CollectorError::Io` if the directory or file cannot be created or
    /// written, and `CollectorError::Csv` if a row cannot be encoded.
    pub fn append<R: LogRecord>(&mut self, records: &[R]) -> Result<usize, CollectorError> {
        if records.is_empty() {
            return Ok(0);
        }

        self.ensure_directory()?;

        let needs_header = match fs::metadata(&self.path) {
            Ok(meta) => meta.len() == 0,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => true,
            Err(e) => return Err(CollectorError::Io(e)),
        };

        let file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.path)?;
        let mut writer = csv::WriterBuilder::new()
            .has_headers(false)
            .from_writer(file);

        if needs_header {
            debug!("Writing header to new log {}", self.path.display());
            writer.write_record(&self.header)?;
        }

        for record in records {
            writer.write_record(record.fields())?;
        }
        writer.flush()?;

        debug!(
            "Appended {} row(s) to {}",
            records.len(),
            self.path.display()
        );
        Ok(records.len())
    }

    fn ensure_directory(&mut self) -> Result<(), CollectorError> {
        if self.directory_ready {
            return Ok(());
        }

        if let Some(parent) = self.path.parent() {
            if !parent.as_os_str().is_empty() && !parent.exists() {
                info!("Creating log directory {}", parent.display());
                fs::create_dir_all(parent)?;
            }
        }

        self.directory_ready = true;
        Ok(())
    }
}
