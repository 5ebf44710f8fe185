//! CSV Latency Log
//!
//! Append-only file of completed turn latencies, shared between the agent
//! (writer) and the API (reader/resetter).

use crate::metrics::{LatencyRow, MetricsSink};
use std::fs::{File, OpenOptions};
use std::io;
use std::path::{Path, PathBuf};
use std::sync::Mutex;
use thiserror::Error;
use tracing::debug;

/// Column names written as the first row of every fresh log file.
pub const CSV_HEADER: [&str; 6] = [
    "Timestamp",
    "Speech ID",
    "EOU Delay",
    "TTFT",
    "TTFB",
    "Total Latency",
];

/// Default on-disk location, relative to the working directory.
pub const DEFAULT_METRICS_LOG_PATH: &str = "metrics_log.csv";

#[derive(Debug, Error)]
pub enum MetricsLogError {
    #[error("{0} not found")]
    NotFound(String),
    #[error("I/O error on metrics log: {0}")]
    Io(#[from] io::Error),
    #[error("CSV error on metrics log: {0}")]
    Csv(#[from] csv::Error),
}

/// A latency log backed by a CSV file.
///
/// Calls on one instance are serialized; separate processes touching the same
/// file are not coordinated.
#[derive(Debug)]
pub struct CsvMetricsLog {
    path: PathBuf,
    lock: Mutex<()>,
}

impl CsvMetricsLog {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            lock: Mutex::new(()),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// File name used in user-facing messages, e.g. `metrics_log.csv`.
    pub fn display_name(&self) -> String {
        self.path
            .file_name()
            .map(|name| name.to_string_lossy().into_owned())
            .unwrap_or_else(|| self.path.display().to_string())
    }

    /// Truncates the log to zero bytes, creating it if needed.
    pub fn reset(&self) -> Result<(), MetricsLogError> {
        let _guard = self.lock.lock().unwrap_or_else(|e| e.into_inner());
        File::create(&self.path)?;
        debug!(path = %self.path.display(), "Metrics log cleared");
        Ok(())
    }

    /// Reads every row, header included.
    pub fn read_rows(&self) -> Result<Vec<Vec<String>>, MetricsLogError> {
        let _guard = self.lock.lock().unwrap_or_else(|e| e.into_inner());
        let file = match File::open(&self.path) {
            Ok(file) => file,
            Err(e) if e.kind() == io::ErrorKind::NotFound => {
                return Err(MetricsLogError::NotFound(self.display_name()));
            }
            Err(e) => return Err(e.into()),
        };

        let mut reader = csv::ReaderBuilder::new()
            .has_headers(false)
            .flexible(true)
            .from_reader(file);

        let mut rows = Vec::new();
        for record in reader.records() {
            rows.push(record?.iter().map(str::to_string).collect());
        }
        Ok(rows)
    }

    /// Appends one row, writing the header first when the file is new or empty.
    pub fn append_row(&self, row: &LatencyRow) -> Result<(), MetricsLogError> {
        let _guard = self.lock.lock().unwrap_or_else(|e| e.into_inner());
        let file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.path)?;
        let needs_header = file.metadata()?.len() == 0;

        let mut writer = csv::WriterBuilder::new()
            .has_headers(false)
            .from_writer(file);
        if needs_header {
            writer.write_record(CSV_HEADER)?;
        }
        writer.write_record(row.to_record())?;
        writer.flush()?;
        Ok(())
    }
}

impl MetricsSink for CsvMetricsLog {
    fn append(&self, row: &LatencyRow) -> Result<(), MetricsLogError> {
        self.append_row(row)
    }
}
