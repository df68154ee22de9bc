use std::sync::mpsc::{self, Receiver, RecvTimeoutError, Sender, TryRecvError};
use std::thread;
use std::time::{Duration, Instant};

use cogex_core::{Cell, TrialRecord};

use crate::error::{SheetError, SinkError};
use crate::sink::{Persisted, ResultSink};

pub const DEFAULT_PRIMARY_TIMEOUT: Duration = Duration::from_millis(2000);

/// Remote spreadsheet the primary sink writes rows to.
///
/// Implementations own their credentials and transport. The destination must
/// be provisioned out of band; `open` never creates it.
pub trait SheetClient: Send + 'static {
    fn open(&mut self, destination: &str) -> Result<(), SheetError>;

    /// True when the opened destination holds no rows yet.
    fn is_empty(&mut self) -> Result<bool, SheetError>;

    fn append_row(&mut self, row: &[Cell]) -> Result<(), SheetError>;
}

struct WriteRequest {
    ticket: u64,
    row: Vec<Cell>,
}

struct WriteReply {
    ticket: u64,
    result: Result<(), SheetError>,
}

/// Spreadsheet-backed sink with a bounded wait per record.
///
/// The client runs on its own writer thread. `append` waits at most
/// `timeout` for the reply; replies that arrive later are discarded by
/// ticket. While a timed-out write is still unanswered, further appends fail
/// at once with [`SinkError::Busy`] instead of queueing behind it. A
/// configuration error disables the sink for the rest of its life and is
/// kept as the operator alert, even when it arrives late.
pub struct PrimarySink {
    destination: String,
    timeout: Duration,
    requests: Sender<WriteRequest>,
    replies: Receiver<WriteReply>,
    next_ticket: u64,
    outstanding: Option<u64>,
    disabled: bool,
    alert: Option<SheetError>,
}

impl PrimarySink {
    pub fn spawn(
        client: impl SheetClient,
        destination: impl Into<String>,
        timeout: Duration,
    ) -> std::io::Result<Self> {
        let destination = destination.into();
        let (request_tx, request_rx) = mpsc::channel();
        let (reply_tx, reply_rx) = mpsc::channel();

        let writer_destination = destination.clone();
        thread::Builder::new()
            .name("primary-sink".into())
            .spawn(move || run_writer(client, writer_destination, request_rx, reply_tx))?;

        Ok(Self {
            destination,
            timeout,
            requests: request_tx,
            replies: reply_rx,
            next_ticket: 0,
            outstanding: None,
            disabled: false,
            alert: None,
        })
    }

    pub fn destination(&self) -> &str {
        &self.destination
    }

    pub fn is_disabled(&self) -> bool {
        self.disabled
    }

    /// Ticket of a timed-out write the writer has not answered yet.
    pub fn outstanding(&self) -> Option<u64> {
        self.outstanding
    }

    fn note_configuration(&mut self, err: &SheetError) {
        if !err.is_configuration() {
            return;
        }
        self.disabled = true;
        if self.alert.is_none() {
            self.alert = Some(err.clone());
        }
    }

    fn settle(&mut self, result: Result<(), SheetError>) -> Result<Persisted, SinkError> {
        match result {
            Ok(()) => Ok(Persisted::Primary),
            Err(e) => {
                self.note_configuration(&e);
                Err(SinkError::Primary(e))
            }
        }
    }

    /// A reply for an earlier ticket. Only its configuration errors matter.
    fn absorb_late(&mut self, late: WriteReply) {
        if self.outstanding == Some(late.ticket) {
            self.outstanding = None;
        }
        tracing::debug!(ticket = late.ticket, ok = late.result.is_ok(), "late primary reply");
        if let Err(e) = late.result {
            if e.is_configuration() && self.alert.is_none() {
                tracing::error!(destination = %self.destination, error = %e, "primary sink misconfigured; reported after its timeout");
            }
            self.note_configuration(&e);
        }
    }

    fn drain_late(&mut self) -> Result<(), SinkError> {
        loop {
            match self.replies.try_recv() {
                Ok(late) => self.absorb_late(late),
                Err(TryRecvError::Empty) => return Ok(()),
                Err(TryRecvError::Disconnected) => {
                    self.disabled = true;
                    return Err(SinkError::WriterStopped);
                }
            }
        }
    }
}

impl ResultSink for PrimarySink {
    fn append(&mut self, record: &TrialRecord) -> Result<Persisted, SinkError> {
        if self.disabled {
            return Err(SinkError::Disabled);
        }
        self.drain_late()?;
        if self.disabled {
            return Err(SinkError::Disabled);
        }
        if let Some(ticket) = self.outstanding {
            return Err(SinkError::Busy(ticket));
        }

        self.next_ticket += 1;
        let ticket = self.next_ticket;
        let request = WriteRequest {
            ticket,
            row: record.cells(),
        };
        if self.requests.send(request).is_err() {
            self.disabled = true;
            return Err(SinkError::WriterStopped);
        }

        let deadline = Instant::now() + self.timeout;
        loop {
            let remaining = deadline.saturating_duration_since(Instant::now());
            match self.replies.recv_timeout(remaining) {
                Ok(reply) if reply.ticket == ticket => return self.settle(reply.result),
                Ok(late) => self.absorb_late(late),
                Err(RecvTimeoutError::Timeout) => {
                    self.outstanding = Some(ticket);
                    return Err(SinkError::Timeout(self.timeout));
                }
                Err(RecvTimeoutError::Disconnected) => {
                    self.disabled = true;
                    return Err(SinkError::WriterStopped);
                }
            }
        }
    }

    fn operator_alert(&self) -> Option<&SheetError> {
        self.alert.as_ref()
    }
}

fn run_writer(
    mut client: impl SheetClient,
    destination: String,
    requests: Receiver<WriteRequest>,
    replies: Sender<WriteReply>,
) {
    let mut opened = false;
    let mut has_rows = false;
    for request in requests {
        let result = write_row(&mut client, &destination, &mut opened, &mut has_rows, &request.row);
        let reply = WriteReply {
            ticket: request.ticket,
            result,
        };
        if replies.send(reply).is_err() {
            break;
        }
    }
    tracing::debug!(destination = %destination, "primary sink writer exiting");
}

fn write_row(
    client: &mut impl SheetClient,
    destination: &str,
    opened: &mut bool,
    has_rows: &mut bool,
    row: &[Cell],
) -> Result<(), SheetError> {
    if !*opened {
        client.open(destination)?;
        *opened = true;
    }
    if !*has_rows && client.is_empty()? {
        client.append_row(&TrialRecord::header())?;
    }
    *has_rows = true;
    client.append_row(row)
}

#[cfg(test)]
mod tests {
    use std::sync::{Arc, Mutex};

    use chrono::Local;
    use cogex_core::{Color, Digit, Participant, Trial};

    use super::*;
    use crate::dual::DualSink;
    use crate::memory::MemorySink;

    #[derive(Clone, Default)]
    struct Sheet {
        rows: Arc<Mutex<Vec<Vec<Cell>>>>,
        exists: bool,
        fail_rows_after: Option<usize>,
        delay: Duration,
        /// Only rows written while fewer than this many exist are slow.
        slow_rows: Option<usize>,
        open_delay: Duration,
    }

    impl SheetClient for Sheet {
        fn open(&mut self, destination: &str) -> Result<(), SheetError> {
            thread::sleep(self.open_delay);
            if self.exists {
                Ok(())
            } else {
                Err(SheetError::DestinationNotFound(destination.to_string()))
            }
        }

        fn is_empty(&mut self) -> Result<bool, SheetError> {
            Ok(self.rows.lock().unwrap().is_empty())
        }

        fn append_row(&mut self, row: &[Cell]) -> Result<(), SheetError> {
            let written = self.rows.lock().unwrap().len();
            if self.slow_rows.is_none_or(|n| written < n) {
                thread::sleep(self.delay);
            }
            let mut rows = self.rows.lock().unwrap();
            if self.fail_rows_after.is_some_and(|n| rows.len() >= n) {
                return Err(SheetError::Transport("connection reset".into()));
            }
            rows.push(row.to_vec());
            Ok(())
        }
    }

    fn record(index: usize) -> TrialRecord {
        let p = Participant::new("Ada", 34).unwrap();
        let t = Trial::new(Digit::new(3).unwrap(), Color::Blue);
        TrialRecord::new(index, Local::now(), &p, t, '3', Duration::from_millis(300))
    }

    #[test]
    fn header_written_once_before_first_row() {
        let sheet = Sheet {
            exists: true,
            ..Default::default()
        };
        let rows = sheet.rows.clone();
        let mut sink = PrimarySink::spawn(sheet, "results", Duration::from_secs(5)).unwrap();
        assert_eq!(sink.append(&record(0)).unwrap(), Persisted::Primary);
        assert_eq!(sink.append(&record(1)).unwrap(), Persisted::Primary);

        let rows = rows.lock().unwrap();
        assert_eq!(rows.len(), 3);
        assert_eq!(rows[0], TrialRecord::header());
        assert_eq!(rows[1][0], Cell::Integer(0));
        assert_eq!(rows[2][0], Cell::Integer(1));
    }

    #[test]
    fn missing_destination_disables_sink() {
        let mut sink =
            PrimarySink::spawn(Sheet::default(), "nowhere", Duration::from_secs(5)).unwrap();
        let err = sink.append(&record(0)).unwrap_err();
        assert!(matches!(err, SinkError::Primary(SheetError::DestinationNotFound(_))));
        assert!(sink.is_disabled());
        assert!(matches!(sink.append(&record(1)), Err(SinkError::Disabled)));
    }

    #[test]
    fn header_without_row_is_an_error() {
        let sheet = Sheet {
            exists: true,
            fail_rows_after: Some(1),
            ..Default::default()
        };
        let mut sink = PrimarySink::spawn(sheet, "results", Duration::from_secs(5)).unwrap();
        assert!(matches!(
            sink.append(&record(0)),
            Err(SinkError::Primary(SheetError::Transport(_)))
        ));
        assert!(!sink.is_disabled());
    }

    #[test]
    fn slow_client_times_out() {
        let sheet = Sheet {
            exists: true,
            delay: Duration::from_millis(300),
            ..Default::default()
        };
        let mut sink = PrimarySink::spawn(sheet, "results", Duration::from_millis(20)).unwrap();
        let started = Instant::now();
        assert!(matches!(sink.append(&record(0)), Err(SinkError::Timeout(_))));
        assert!(started.elapsed() < Duration::from_millis(250));
    }

    #[test]
    fn hung_writer_fails_fast_until_it_answers() {
        let sheet = Sheet {
            exists: true,
            delay: Duration::from_secs(30),
            ..Default::default()
        };
        let mut sink = PrimarySink::spawn(sheet, "results", Duration::from_millis(50)).unwrap();
        assert!(matches!(sink.append(&record(0)), Err(SinkError::Timeout(_))));
        assert_eq!(sink.outstanding(), Some(1));

        let started = Instant::now();
        for i in 1..5 {
            assert!(matches!(sink.append(&record(i)), Err(SinkError::Busy(1))));
        }
        assert!(started.elapsed() < Duration::from_millis(40));
        assert!(!sink.is_disabled());
    }

    #[test]
    fn writer_is_used_again_once_the_late_reply_lands() {
        let sheet = Sheet {
            exists: true,
            delay: Duration::from_millis(150),
            slow_rows: Some(2),
            ..Default::default()
        };
        let rows = sheet.rows.clone();
        let mut sink = PrimarySink::spawn(sheet, "results", Duration::from_millis(30)).unwrap();
        assert!(matches!(sink.append(&record(0)), Err(SinkError::Timeout(_))));
        assert!(matches!(sink.append(&record(1)), Err(SinkError::Busy(1))));

        thread::sleep(Duration::from_millis(800));
        assert_eq!(sink.append(&record(2)).unwrap(), Persisted::Primary);
        assert_eq!(sink.outstanding(), None);

        let rows = rows.lock().unwrap();
        assert_eq!(rows.len(), 3);
        assert_eq!(rows[1][0], Cell::Integer(0));
        assert_eq!(rows[2][0], Cell::Integer(2));
    }

    #[test]
    fn late_configuration_error_still_alerts() {
        let sheet = Sheet {
            open_delay: Duration::from_millis(150),
            ..Default::default()
        };
        let sink = PrimarySink::spawn(sheet, "nowhere", Duration::from_millis(30)).unwrap();
        let fallback = MemorySink::new();
        let mut dual = DualSink::new(sink, fallback.clone());

        dual.append(&record(0)).unwrap();
        assert!(dual.operator_alert().is_none());

        thread::sleep(Duration::from_millis(500));
        dual.append(&record(1)).unwrap();
        let expected = SheetError::DestinationNotFound("nowhere".into());
        assert_eq!(dual.operator_alert(), Some(&expected));
        let primary = dual.primary().unwrap();
        assert!(primary.is_disabled());
        assert_eq!(primary.operator_alert(), Some(&expected));
        assert_eq!(fallback.len(), 2);
    }

    #[test]
    fn synchronous_configuration_error_is_kept() {
        let mut sink =
            PrimarySink::spawn(Sheet::default(), "nowhere", Duration::from_secs(5)).unwrap();
        assert!(sink.operator_alert().is_none());
        sink.append(&record(0)).unwrap_err();
        assert_eq!(
            sink.operator_alert(),
            Some(&SheetError::DestinationNotFound("nowhere".into()))
        );
    }
}
