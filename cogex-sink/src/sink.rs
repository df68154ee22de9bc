use cogex_core::TrialRecord;

use crate::error::{SheetError, SinkError};

/// Which store accepted a record.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Persisted {
    Primary,
    Fallback,
    Memory,
}

/// Durable, append-only destination for completed trial records.
pub trait ResultSink {
    fn append(&mut self, record: &TrialRecord) -> Result<Persisted, SinkError>;

    /// A provisioning error the operator should hear about, if one occurred.
    fn operator_alert(&self) -> Option<&SheetError> {
        None
    }
}

impl<S: ResultSink + ?Sized> ResultSink for Box<S> {
    fn append(&mut self, record: &TrialRecord) -> Result<Persisted, SinkError> {
        (**self).append(record)
    }

    fn operator_alert(&self) -> Option<&SheetError> {
        (**self).operator_alert()
    }
}
