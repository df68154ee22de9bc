use std::fs;
use std::path::Path;

use cogex_core::TrialRecord;

use crate::csv;

/// Session table as CSV: header row, then records in completion order.
pub fn to_csv(records: &[TrialRecord]) -> String {
    let mut out = csv::line(&TrialRecord::header());
    for record in records {
        out.push_str(&csv::line(&record.cells()));
    }
    out
}

pub fn write_csv(path: &Path, records: &[TrialRecord]) -> std::io::Result<()> {
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        fs::create_dir_all(parent)?;
    }
    fs::write(path, to_csv(records))
}
