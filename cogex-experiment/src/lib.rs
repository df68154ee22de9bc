pub mod config;
pub mod sequence;
pub mod session;
pub mod state;
pub mod trial;
pub use config::{ConfigError, DEFAULT_TRIAL_LIMIT, ExperimentConfig};
pub use sequence::{NoRepeatGenerator, SequenceError, SequenceGenerator, SequencePolicy};
pub use session::Session;
pub use state::{
    Acceptance, EngineError, EngineState, IgnoreReason, Response, Snapshot, TrialEngine,
};
pub use trial::PendingTrial;
