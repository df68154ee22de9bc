pub mod clock;

pub use clock::{Clock, ClockCalibration, ManualClock, MonotonicClock};
