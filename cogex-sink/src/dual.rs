use cogex_core::TrialRecord;

use crate::error::{SheetError, SinkError};
use crate::sink::{Persisted, ResultSink};

/// Primary-then-fallback composite.
///
/// Each record gets one primary attempt and, if that fails, one fallback
/// attempt. A configuration error from the primary is logged once and kept
/// as the operator alert; transient failures are logged per record.
pub struct DualSink<P, F> {
    primary: Option<P>,
    fallback: F,
    alert: Option<SheetError>,
}

impl<P: ResultSink, F: ResultSink> DualSink<P, F> {
    pub fn new(primary: P, fallback: F) -> Self {
        Self {
            primary: Some(primary),
            fallback,
            alert: None,
        }
    }

    /// No primary configured; every record goes straight to the fallback.
    pub fn fallback_only(fallback: F) -> Self {
        Self {
            primary: None,
            fallback,
            alert: None,
        }
    }

    pub fn primary(&self) -> Option<&P> {
        self.primary.as_ref()
    }

    pub fn fallback(&self) -> &F {
        &self.fallback
    }

    fn note_primary_failure(&mut self, record: &TrialRecord, err: &SinkError) {
        match err {
            SinkError::Primary(e) if e.is_configuration() => {
                if self.alert.is_none() {
                    tracing::error!(error = %e, "primary sink misconfigured; using fallback for the rest of the session");
                    self.alert = Some(e.clone());
                }
            }
            SinkError::Disabled => {}
            SinkError::Busy(ticket) => tracing::debug!(
                sequence_index = record.sequence_index,
                ticket,
                "primary writer still busy; falling back"
            ),
            other => tracing::warn!(
                sequence_index = record.sequence_index,
                error = %other,
                "primary sink failed; falling back"
            ),
        }
    }
}

impl<P: ResultSink, F: ResultSink> ResultSink for DualSink<P, F> {
    fn append(&mut self, record: &TrialRecord) -> Result<Persisted, SinkError> {
        let primary_err = match self.primary.as_mut().map(|p| p.append(record)) {
            Some(Ok(persisted)) => return Ok(persisted),
            Some(Err(e)) => {
                self.note_primary_failure(record, &e);
                Some(e)
            }
            None => None,
        };

        match self.fallback.append(record) {
            Ok(persisted) => Ok(persisted),
            Err(fallback) => {
                tracing::error!(
                    sequence_index = record.sequence_index,
                    error = %fallback,
                    "record kept in memory only"
                );
                match primary_err {
                    Some(primary) => Err(SinkError::Exhausted {
                        primary: Box::new(primary),
                        fallback: Box::new(fallback),
                    }),
                    None => Err(fallback),
                }
            }
        }
    }

    fn operator_alert(&self) -> Option<&SheetError> {
        self.alert
            .as_ref()
            .or_else(|| self.primary.as_ref().and_then(|p| p.operator_alert()))
    }
}
