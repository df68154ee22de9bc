use std::time::Duration;

use chrono::Local;
use cogex_core::{Digit, Participant, Trial, TrialRecord, ValidationError};
use cogex_sink::{Persisted, ResultSink, export};
use cogex_timing::Clock;
use rand::Rng;
use thiserror::Error;

use super::config::{ConfigError, ExperimentConfig};
use super::sequence::{SequenceError, SequenceGenerator};
use super::session::Session;
use super::trial::PendingTrial;

/// Resting states of the engine between driver calls.
///
/// A drawn trial rests in `Presenting` until the view calls
/// [`TrialEngine::presented`]; only then does its clock start and input
/// count. Recording happens inside [`TrialEngine::respond`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EngineState {
    AwaitingConsent,
    AwaitingStart,
    Presenting,
    AwaitingResponse,
    Complete,
}

#[derive(Debug, Error)]
pub enum EngineError {
    #[error(transparent)]
    Validation(#[from] ValidationError),
    #[error("trial sequence failed: {0}")]
    Sequence(#[from] SequenceError),
    #[error("record for trial {got} arrived while trial {expected} was current")]
    RecordOutOfOrder { expected: usize, got: usize },
}

impl EngineError {
    /// Broken engine invariants, as opposed to bad participant input.
    pub fn is_internal(&self) -> bool {
        !matches!(self, EngineError::Validation(_))
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IgnoreReason {
    NotAwaitingResponse,
    InvalidInput,
}

/// Result of an accepted response.
#[derive(Debug, Clone, PartialEq)]
pub struct Acceptance {
    pub sequence_index: usize,
    pub is_correct: bool,
    pub reaction_time: Duration,
    /// `None` when no sink accepted the record; it is still kept in memory.
    pub persisted: Option<Persisted>,
    pub complete: bool,
}

#[derive(Debug, Clone, PartialEq)]
pub enum Response {
    Ignored(IgnoreReason),
    Accepted(Acceptance),
}

/// What the view needs after every transition.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Snapshot {
    pub state: EngineState,
    pub current_trial: Option<Trial>,
    pub trial_index: usize,
    pub trial_limit: usize,
}

/// Reactive state machine for one experiment station.
///
/// The driver serializes calls into it: `submit`, `begin`, `respond` once
/// per keystroke, and `restart`. Nothing here polls or spawns.
pub struct TrialEngine<C, R, S>
where
    C: Clock,
    R: Rng,
    S: ResultSink,
{
    config: ExperimentConfig,
    clock: C,
    rng: R,
    sink: S,
    state: EngineState,
    session: Option<Session<C::Instant>>,
}

impl<C, R, S> TrialEngine<C, R, S>
where
    C: Clock,
    R: Rng,
    S: ResultSink,
{
    pub fn new(config: ExperimentConfig, clock: C, rng: R, sink: S) -> Result<Self, ConfigError> {
        config.validate()?;
        Ok(Self {
            config,
            clock,
            rng,
            sink,
            state: EngineState::AwaitingConsent,
            session: None,
        })
    }

    /// Consent form submission. Invalid input leaves the engine waiting.
    pub fn submit(&mut self, name: &str, age: u32) -> Result<(), EngineError> {
        if self.state != EngineState::AwaitingConsent {
            tracing::debug!(state = ?self.state, "consent submitted outside consent phase; ignored");
            return Ok(());
        }
        let participant = match Participant::new(name, age) {
            Ok(p) => p,
            Err(e) => {
                tracing::info!(error = %e, "consent rejected");
                return Err(e.into());
            }
        };
        let sequence = SequenceGenerator::plan(&self.config, &mut self.rng)?;
        tracing::info!(
            participant = participant.name(),
            age = participant.age(),
            policy = ?self.config.sequence_policy,
            trials = self.config.trial_limit,
            "session created"
        );
        self.session = Some(Session::new(participant, sequence, self.config.trial_limit));
        self.state = EngineState::AwaitingStart;
        Ok(())
    }

    /// Draws the first trial.
    pub fn begin(&mut self) -> Result<(), EngineError> {
        if self.state != EngineState::AwaitingStart {
            tracing::debug!(state = ?self.state, "begin outside start phase; ignored");
            return Ok(());
        }
        self.present()
    }

    /// The view has the drawn trial on screen: start its clock.
    ///
    /// Returns false outside `Presenting`.
    pub fn presented(&mut self) -> bool {
        if self.state != EngineState::Presenting {
            return false;
        }
        let onset = self.clock.start();
        let Some(session) = self.session.as_mut() else {
            return false;
        };
        if !session.mark_onset(onset) {
            return false;
        }
        self.state = EngineState::AwaitingResponse;
        tracing::trace!(trial = session.current_index() + 1, "stimulus onset");
        true
    }

    /// One raw keystroke from the input binding.
    ///
    /// Only a single ASCII digit while a trial awaits its response is
    /// accepted; anything else is a no-op and does not stop the clock.
    /// After an acceptance the next trial is only drawn, so further keys of
    /// the same burst are ignored until [`TrialEngine::presented`].
    pub fn respond(&mut self, raw: &str) -> Result<Response, EngineError> {
        if self.state != EngineState::AwaitingResponse {
            return Ok(Response::Ignored(IgnoreReason::NotAwaitingResponse));
        }
        let Some(response) = single_digit(raw) else {
            tracing::trace!(input = raw, "ignored non-digit input");
            return Ok(Response::Ignored(IgnoreReason::InvalidInput));
        };
        let Some(session) = self.session.as_mut() else {
            return Ok(Response::Ignored(IgnoreReason::NotAwaitingResponse));
        };
        let Some((pending, onset)) = session.take_pending() else {
            return Ok(Response::Ignored(IgnoreReason::NotAwaitingResponse));
        };

        let reaction_time = self.clock.elapsed(onset);
        let record = TrialRecord::new(
            pending.index,
            Local::now(),
            session.participant(),
            pending.trial,
            response,
            reaction_time,
        );
        let expected = session.current_index();
        let record = session.push_record(record).map_err(|r| EngineError::RecordOutOfOrder {
            expected,
            got: r.sequence_index,
        })?;

        let persisted = match self.sink.append(record) {
            Ok(p) => Some(p),
            Err(e) => {
                tracing::error!(sequence_index = record.sequence_index, error = %e, "record not persisted");
                None
            }
        };
        tracing::info!(
            trial = record.sequence_index + 1,
            digit = %record.stimulus_digit,
            response = %record.response,
            correct = record.is_correct,
            rt_ms = record.reaction_time_ms(),
            "response recorded"
        );
        let (sequence_index, is_correct) = (record.sequence_index, record.is_correct);
        let acceptance = Acceptance {
            sequence_index,
            is_correct,
            reaction_time,
            persisted,
            complete: session.is_complete(),
        };

        if acceptance.complete {
            self.state = EngineState::Complete;
            tracing::info!(trials = acceptance.sequence_index + 1, "experiment complete");
        } else {
            self.present()?;
        }
        Ok(Response::Accepted(acceptance))
    }

    /// Drops the session unconditionally and waits for new consent.
    pub fn restart(&mut self) {
        if let Some(session) = self.session.take() {
            tracing::info!(
                participant = session.participant().name(),
                recorded = session.records().len(),
                "session discarded"
            );
        }
        self.state = EngineState::AwaitingConsent;
    }

    /// Draws the trial for the current index. Its clock starts in `presented`.
    fn present(&mut self) -> Result<(), EngineError> {
        let Some(session) = self.session.as_mut() else {
            return Ok(());
        };
        let index = session.current_index();
        let trial = session.sequence_mut().next_trial(index, &mut self.rng)?;
        session.present(PendingTrial {
            index,
            trial,
            onset: None,
        });
        self.state = EngineState::Presenting;
        tracing::debug!(trial = index + 1, digit = %trial.digit, color = %trial.color, "trial drawn");
        Ok(())
    }

    pub fn state(&self) -> EngineState {
        self.state
    }

    pub fn snapshot(&self) -> Snapshot {
        Snapshot {
            state: self.state,
            current_trial: self.current_trial(),
            trial_index: self.session.as_ref().map_or(0, Session::current_index),
            trial_limit: self.config.trial_limit,
        }
    }

    pub fn current_trial(&self) -> Option<Trial> {
        self.session
            .as_ref()
            .and_then(Session::pending)
            .map(|p| p.trial)
    }

    pub fn session(&self) -> Option<&Session<C::Instant>> {
        self.session.as_ref()
    }

    pub fn records(&self) -> &[TrialRecord] {
        self.session
            .as_ref()
            .map(Session::records)
            .unwrap_or_default()
    }

    pub fn is_complete(&self) -> bool {
        self.state == EngineState::Complete
    }

    /// Session table for the participant download.
    pub fn export_csv(&self) -> String {
        export::to_csv(self.records())
    }

    pub fn config(&self) -> &ExperimentConfig {
        &self.config
    }

    pub fn sink(&self) -> &S {
        &self.sink
    }
}

fn single_digit(raw: &str) -> Option<char> {
    let mut chars = raw.chars();
    match (chars.next(), chars.next()) {
        (Some(c), None) if Digit::from_char(c).is_some() => Some(c),
        _ => None,
    }
}
