use cogex_core::{Participant, TrialRecord};

use crate::sequence::SequenceGenerator;
use crate::trial::PendingTrial;

/// Mutable state of one participant's run.
///
/// Only the engine mutates a session. `records.len() == current_index`
/// holds whenever no trial is pending a response.
#[derive(Debug, Clone)]
pub struct Session<I> {
    participant: Participant,
    sequence: SequenceGenerator,
    records: Vec<TrialRecord>,
    current_index: usize,
    trial_limit: usize,
    pending: Option<PendingTrial<I>>,
}

impl<I: Copy> Session<I> {
    pub(crate) fn new(participant: Participant, sequence: SequenceGenerator, trial_limit: usize) -> Self {
        Self {
            participant,
            sequence,
            records: Vec::with_capacity(trial_limit),
            current_index: 0,
            trial_limit,
            pending: None,
        }
    }

    pub fn participant(&self) -> &Participant {
        &self.participant
    }

    pub fn records(&self) -> &[TrialRecord] {
        &self.records
    }

    pub fn current_index(&self) -> usize {
        self.current_index
    }

    pub fn trial_limit(&self) -> usize {
        self.trial_limit
    }

    pub fn pending(&self) -> Option<&PendingTrial<I>> {
        self.pending.as_ref()
    }

    pub fn sequence(&self) -> &SequenceGenerator {
        &self.sequence
    }

    pub fn is_complete(&self) -> bool {
        self.current_index == self.trial_limit
    }

    pub(crate) fn sequence_mut(&mut self) -> &mut SequenceGenerator {
        &mut self.sequence
    }

    pub(crate) fn present(&mut self, pending: PendingTrial<I>) {
        self.pending = Some(pending);
    }

    /// Stamps the onset of the drawn trial. False if nothing is drawn or
    /// the onset was already taken.
    pub(crate) fn mark_onset(&mut self, onset: I) -> bool {
        match self.pending.as_mut() {
            Some(p) if p.onset.is_none() => {
                p.onset = Some(onset);
                true
            }
            _ => false,
        }
    }

    /// Takes the pending trial, but only once its onset is known.
    pub(crate) fn take_pending(&mut self) -> Option<(PendingTrial<I>, I)> {
        let onset = self.pending.as_ref()?.onset?;
        self.pending.take().map(|p| (p, onset))
    }

    /// Appends the record for the current index and advances it.
    ///
    /// Returns the rejected record if its index is not the next one.
    pub(crate) fn push_record(&mut self, record: TrialRecord) -> Result<&TrialRecord, TrialRecord> {
        if record.sequence_index != self.current_index
            || self.records.len() != self.current_index
            || self.is_complete()
        {
            return Err(record);
        }
        self.records.push(record);
        self.current_index += 1;
        Ok(&self.records[self.records.len() - 1])
    }
}
