use std::path::PathBuf;
use std::time::Duration;

use thiserror::Error;

/// Failure reported by a spreadsheet client.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SheetError {
    #[error("destination '{0}' not found; create it and share it with the configured identity")]
    DestinationNotFound(String),
    #[error("destination '{0}' is not writable by the configured identity")]
    PermissionDenied(String),
    #[error("authentication failed: {0}")]
    Unauthorized(String),
    #[error("transport failure: {0}")]
    Transport(String),
}

impl SheetError {
    /// Provisioning problems an operator must fix. Never retried.
    pub fn is_configuration(&self) -> bool {
        matches!(
            self,
            SheetError::DestinationNotFound(_) | SheetError::PermissionDenied(_)
        )
    }
}

#[derive(Debug, Error)]
pub enum SinkError {
    #[error("primary sink: {0}")]
    Primary(#[from] SheetError),
    #[error("primary sink did not answer within {0:?}")]
    Timeout(Duration),
    #[error("primary sink still busy with write #{0}")]
    Busy(u64),
    #[error("primary sink writer thread stopped")]
    WriterStopped,
    #[error("primary sink disabled after a configuration error")]
    Disabled,
    #[error("fallback store {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("record not persisted (primary: {primary}; fallback: {fallback})")]
    Exhausted {
        primary: Box<SinkError>,
        fallback: Box<SinkError>,
    },
}

impl SinkError {
    pub fn is_configuration(&self) -> bool {
        match self {
            SinkError::Primary(e) => e.is_configuration(),
            SinkError::Disabled => true,
            _ => false,
        }
    }
}
