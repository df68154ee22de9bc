pub mod participant;
pub mod stimulus;
pub mod trial;

pub use participant::{MAX_AGE, MIN_AGE, Participant, ValidationError};
pub use stimulus::{Color, Digit, Palette, PaletteError, Trial};
pub use trial::{Cell, TIMESTAMP_FORMAT, TrialRecord};
