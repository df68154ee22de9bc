use cogex_core::{Digit, Palette, Trial};
use rand::Rng;
use rand::seq::SliceRandom;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::config::ExperimentConfig;

pub const DIGIT_COUNT: usize = Digit::MAX as usize + 1;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SequenceError {
    #[error("balanced plan needs a trial limit of {pairs} (digits x palette), got {trial_limit}")]
    Unbalanced { trial_limit: usize, pairs: usize },
    #[error("no digit other than {previous:?} after {attempts} draws")]
    RetriesExhausted {
        previous: Option<Digit>,
        attempts: u32,
    },
    #[error("planned sequence has no trial at index {index} (length {len})")]
    Exhausted { index: usize, len: usize },
}

/// How a session's trials are chosen.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum SequencePolicy {
    /// Every (digit, color) pair exactly once, shuffled. Needs
    /// `trial_limit == 10 * palette.len()`.
    #[default]
    Balanced,
    /// Drawn one at a time; a digit never repeats on the next trial.
    NoRepeat,
}

/// Every digit paired with every palette color, digit-major.
pub fn cross_product(palette: &Palette) -> Vec<Trial> {
    Digit::all()
        .flat_map(|d| palette.colors().iter().map(move |&c| Trial::new(d, c)))
        .collect()
}

pub fn check_balance(trial_limit: usize, palette: &Palette) -> Result<(), SequenceError> {
    let pairs = DIGIT_COUNT * palette.len();
    if pairs == trial_limit {
        Ok(())
    } else {
        Err(SequenceError::Unbalanced { trial_limit, pairs })
    }
}

/// Uniformly shuffled cross product.
pub fn plan_balanced<R: Rng + ?Sized>(
    trial_limit: usize,
    palette: &Palette,
    rng: &mut R,
) -> Result<Vec<Trial>, SequenceError> {
    check_balance(trial_limit, palette)?;
    let mut trials = cross_product(palette);
    trials.shuffle(rng);
    Ok(trials)
}

/// Lazy generator with the no-immediate-repeat constraint.
#[derive(Debug, Clone)]
pub struct NoRepeatGenerator {
    palette: Palette,
    max_retries: u32,
}

impl NoRepeatGenerator {
    pub fn new(palette: Palette, max_retries: u32) -> Self {
        Self {
            palette,
            max_retries: max_retries.max(1),
        }
    }

    /// Draws a trial whose digit differs from `previous`. Color is uniform
    /// over the palette and independent of both.
    pub fn next<R: Rng + ?Sized>(
        &self,
        previous: Option<Digit>,
        rng: &mut R,
    ) -> Result<Trial, SequenceError> {
        let digit = self.draw_digit(previous, rng)?;
        let colors = self.palette.colors();
        let color = colors[rng.random_range(0..colors.len())];
        Ok(Trial::new(digit, color))
    }

    fn draw_digit<R: Rng + ?Sized>(
        &self,
        previous: Option<Digit>,
        rng: &mut R,
    ) -> Result<Digit, SequenceError> {
        for _ in 0..self.max_retries {
            let Some(digit) = Digit::new(rng.random_range(0..=Digit::MAX)) else {
                continue;
            };
            if Some(digit) != previous {
                return Ok(digit);
            }
        }
        Err(SequenceError::RetriesExhausted {
            previous,
            attempts: self.max_retries,
        })
    }
}

/// Source of trials for one session.
#[derive(Debug, Clone)]
pub enum SequenceGenerator {
    Planned(Vec<Trial>),
    Streaming {
        generator: NoRepeatGenerator,
        previous: Option<Digit>,
    },
}

impl SequenceGenerator {
    pub fn plan<R: Rng + ?Sized>(
        config: &ExperimentConfig,
        rng: &mut R,
    ) -> Result<Self, SequenceError> {
        Ok(match config.sequence_policy {
            SequencePolicy::Balanced => {
                Self::Planned(plan_balanced(config.trial_limit, &config.palette, rng)?)
            }
            SequencePolicy::NoRepeat => Self::Streaming {
                generator: NoRepeatGenerator::new(config.palette.clone(), config.max_draw_retries),
                previous: None,
            },
        })
    }

    /// Trial for `index`. Streaming sources must be asked in index order.
    pub fn next_trial<R: Rng + ?Sized>(
        &mut self,
        index: usize,
        rng: &mut R,
    ) -> Result<Trial, SequenceError> {
        match self {
            Self::Planned(trials) => trials.get(index).copied().ok_or(SequenceError::Exhausted {
                index,
                len: trials.len(),
            }),
            Self::Streaming {
                generator,
                previous,
            } => {
                let trial = generator.next(*previous, rng)?;
                *previous = Some(trial.digit);
                Ok(trial)
            }
        }
    }

    pub fn planned(&self) -> Option<&[Trial]> {
        match self {
            Self::Planned(trials) => Some(trials),
            Self::Streaming { .. } => None,
        }
    }
}
