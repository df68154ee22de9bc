//! Durable destinations for trial records.
//!
//! [`DualSink`] is what a running experiment writes through: a spreadsheet
//! [`PrimarySink`] with a bounded wait, backed by a local CSV
//! [`FallbackSink`]. [`export`] renders the in-memory session as the CSV
//! handed to the participant at the end.

pub mod csv;
pub mod dual;
pub mod error;
pub mod export;
pub mod fallback;
pub mod memory;
pub mod primary;
pub mod sink;
pub mod workbook;

pub use dual::DualSink;
pub use error::{SheetError, SinkError};
pub use fallback::{DEFAULT_FALLBACK_PATH, FallbackSink};
pub use memory::MemorySink;
pub use primary::{DEFAULT_PRIMARY_TIMEOUT, PrimarySink, SheetClient};
pub use sink::{Persisted, ResultSink};
pub use workbook::JsonWorkbook;
