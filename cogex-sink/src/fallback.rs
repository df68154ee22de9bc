use std::fs::{self, OpenOptions};
use std::io::Write;
use std::path::{Path, PathBuf};

use cogex_core::TrialRecord;

use crate::csv;
use crate::error::SinkError;
use crate::sink::{Persisted, ResultSink};

pub const DEFAULT_FALLBACK_PATH: &str = "data/results.csv";

/// Local append-only CSV store.
///
/// The header is written only when the file is missing or empty, so a
/// restarted process keeps appending to the same table.
#[derive(Debug, Clone)]
pub struct FallbackSink {
    path: PathBuf,
}

impl FallbackSink {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn io_error(&self, source: std::io::Error) -> SinkError {
        SinkError::Io {
            path: self.path.clone(),
            source,
        }
    }

    fn write(&self, record: &TrialRecord) -> std::io::Result<()> {
        if let Some(parent) = self.path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent)?;
        }
        let needs_header = fs::metadata(&self.path)
            .map(|m| m.len() == 0)
            .unwrap_or(true);

        let mut chunk = String::new();
        if needs_header {
            chunk.push_str(&csv::line(&TrialRecord::header()));
        }
        chunk.push_str(&csv::line(&record.cells()));

        let mut file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.path)?;
        file.write_all(chunk.as_bytes())?;
        file.sync_data()
    }
}

impl Default for FallbackSink {
    fn default() -> Self {
        Self::new(DEFAULT_FALLBACK_PATH)
    }
}

impl ResultSink for FallbackSink {
    fn append(&mut self, record: &TrialRecord) -> Result<Persisted, SinkError> {
        self.write(record).map_err(|e| self.io_error(e))?;
        tracing::debug!(
            path = %self.path.display(),
            sequence_index = record.sequence_index,
            "record appended to fallback store"
        );
        Ok(Persisted::Fallback)
    }
}
