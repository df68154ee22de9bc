use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use cogex_core::Cell;
use serde_json::Value;

use crate::error::SheetError;
use crate::primary::SheetClient;

/// File-backed [`SheetClient`].
///
/// Each destination is `<dir>/<destination>.json`, a JSON array of rows. The
/// file has to exist before the first write (an operator creates it with
/// `[]`); rewrites go through a temp file and a rename.
#[derive(Debug, Clone)]
pub struct JsonWorkbook {
    dir: PathBuf,
    sheet: Option<PathBuf>,
}

impl JsonWorkbook {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self {
            dir: dir.into(),
            sheet: None,
        }
    }

    /// Path a destination name maps to.
    pub fn sheet_path(&self, destination: &str) -> PathBuf {
        self.dir.join(format!("{destination}.json"))
    }

    /// Reads every row of a sheet file.
    pub fn read_rows(path: &Path) -> Result<Vec<Vec<Value>>, SheetError> {
        let text = fs::read_to_string(path).map_err(|e| io_to_sheet(path, e))?;
        if text.trim().is_empty() {
            return Ok(Vec::new());
        }
        serde_json::from_str(&text)
            .map_err(|e| SheetError::Transport(format!("{}: {e}", path.display())))
    }

    fn opened(&self) -> Result<&Path, SheetError> {
        self.sheet
            .as_deref()
            .ok_or_else(|| SheetError::Transport("no destination opened".into()))
    }
}

impl SheetClient for JsonWorkbook {
    fn open(&mut self, destination: &str) -> Result<(), SheetError> {
        let path = self.sheet_path(destination);
        match fs::metadata(&path) {
            Ok(meta) if meta.is_file() => {
                if meta.permissions().readonly() {
                    return Err(SheetError::PermissionDenied(destination.to_string()));
                }
                self.sheet = Some(path);
                Ok(())
            }
            Ok(_) => Err(SheetError::DestinationNotFound(destination.to_string())),
            Err(e) if e.kind() == io::ErrorKind::NotFound => {
                Err(SheetError::DestinationNotFound(destination.to_string()))
            }
            Err(e) => Err(io_to_sheet(&path, e)),
        }
    }

    fn is_empty(&mut self) -> Result<bool, SheetError> {
        let path = self.opened()?;
        Ok(Self::read_rows(path)?.is_empty())
    }

    fn append_row(&mut self, row: &[Cell]) -> Result<(), SheetError> {
        let path = self.opened()?.to_path_buf();
        let mut rows = Self::read_rows(&path)?;
        let cells = row
            .iter()
            .map(serde_json::to_value)
            .collect::<Result<Vec<_>, _>>()
            .map_err(|e| SheetError::Transport(e.to_string()))?;
        rows.push(cells);

        let body = serde_json::to_string_pretty(&rows)
            .map_err(|e| SheetError::Transport(e.to_string()))?;
        let tmp = path.with_extension("json.tmp");
        fs::write(&tmp, body).map_err(|e| io_to_sheet(&tmp, e))?;
        fs::rename(&tmp, &path).map_err(|e| io_to_sheet(&path, e))
    }
}

fn io_to_sheet(path: &Path, e: io::Error) -> SheetError {
    match e.kind() {
        io::ErrorKind::PermissionDenied => SheetError::PermissionDenied(path.display().to_string()),
        _ => SheetError::Transport(format!("{}: {e}", path.display())),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn missing_sheet_is_not_found() {
        let dir = tempfile::tempdir().unwrap();
        let mut book = JsonWorkbook::new(dir.path());
        assert_eq!(
            book.open("Number Recognition Results"),
            Err(SheetError::DestinationNotFound(
                "Number Recognition Results".into()
            ))
        );
    }

    #[test]
    fn appends_rows_to_provisioned_sheet() {
        let dir = tempfile::tempdir().unwrap();
        let mut book = JsonWorkbook::new(dir.path());
        let path = book.sheet_path("results");
        fs::write(&path, "[]").unwrap();

        book.open("results").unwrap();
        assert!(book.is_empty().unwrap());
        book.append_row(&[Cell::Text("a".into()), Cell::Integer(1)])
            .unwrap();
        book.append_row(&[Cell::Bool(true), Cell::Decimal(2.5)])
            .unwrap();
        assert!(!book.is_empty().unwrap());

        let rows = JsonWorkbook::read_rows(&path).unwrap();
        assert_eq!(rows.len(), 2);
        assert_eq!(rows[0][0], Value::from("a"));
        assert_eq!(rows[1][0], Value::from(true));
    }

    #[test]
    fn append_before_open_fails() {
        let dir = tempfile::tempdir().unwrap();
        let mut book = JsonWorkbook::new(dir.path());
        assert!(matches!(
            book.append_row(&[Cell::Integer(1)]),
            Err(SheetError::Transport(_))
        ));
    }
}
