use cogex_core::Palette;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::sequence::{SequenceError, SequencePolicy, check_balance};

pub const DEFAULT_TRIAL_LIMIT: usize = 30;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ConfigError {
    #[error("trial limit must be at least 1")]
    NoTrials,
    #[error("max_draw_retries must be at least 1")]
    NoRetries,
    #[error(transparent)]
    Sequence(#[from] SequenceError),
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ExperimentConfig {
    pub trial_limit: usize,
    pub palette: Palette,
    pub sequence_policy: SequencePolicy,
    /// Rejection-sampling cap for the no-repeat policy.
    pub max_draw_retries: u32,
}

impl Default for ExperimentConfig {
    fn default() -> Self {
        Self {
            trial_limit: DEFAULT_TRIAL_LIMIT,
            palette: Palette::default(),
            sequence_policy: SequencePolicy::Balanced,
            max_draw_retries: 64,
        }
    }
}

impl ExperimentConfig {
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.trial_limit == 0 {
            return Err(ConfigError::NoTrials);
        }
        if self.max_draw_retries == 0 {
            return Err(ConfigError::NoRetries);
        }
        if self.sequence_policy == SequencePolicy::Balanced {
            check_balance(self.trial_limit, &self.palette)?;
        }
        Ok(())
    }
}
