use std::fmt;
use std::time::Duration;

use chrono::{DateTime, Local};
use serde::Serialize;

use crate::participant::Participant;
use crate::stimulus::{Color, Digit, Trial};

pub const TIMESTAMP_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

/// One scalar in an exported row.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum Cell {
    Text(String),
    Integer(i64),
    /// Rendered with three decimals.
    Decimal(f64),
    Bool(bool),
}

impl fmt::Display for Cell {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Cell::Text(s) => f.write_str(s),
            Cell::Integer(i) => write!(f, "{i}"),
            Cell::Decimal(x) => write!(f, "{x:.3}"),
            Cell::Bool(b) => f.write_str(if *b { "True" } else { "False" }),
        }
    }
}

/// Recorded result of one completed trial. Built once, never mutated.
#[derive(Debug, Clone, PartialEq)]
pub struct TrialRecord {
    pub sequence_index: usize,
    pub timestamp: DateTime<Local>,
    pub participant_name: String,
    pub participant_age: u32,
    pub stimulus_digit: Digit,
    pub stimulus_color: Color,
    pub response: char,
    pub is_correct: bool,
    pub reaction_time: Duration,
}

impl TrialRecord {
    /// Column header, in export order.
    pub const COLUMNS: [&'static str; 9] = [
        "sequence_index",
        "timestamp",
        "name",
        "age",
        "displayed_number",
        "displayed_color",
        "user_input",
        "is_correct",
        "reaction_time_ms",
    ];

    pub fn new(
        sequence_index: usize,
        timestamp: DateTime<Local>,
        participant: &Participant,
        trial: Trial,
        response: char,
        reaction_time: Duration,
    ) -> Self {
        let is_correct = response.to_string() == trial.digit.to_string();
        Self {
            sequence_index,
            timestamp,
            participant_name: participant.name().to_string(),
            participant_age: participant.age(),
            stimulus_digit: trial.digit,
            stimulus_color: trial.color,
            response,
            is_correct,
            reaction_time,
        }
    }

    pub fn reaction_time_ms(&self) -> f64 {
        self.reaction_time.as_nanos() as f64 / 1_000_000.0
    }

    /// The record as a row matching [`TrialRecord::COLUMNS`].
    pub fn cells(&self) -> Vec<Cell> {
        vec![
            Cell::Integer(self.sequence_index as i64),
            Cell::Text(self.timestamp.format(TIMESTAMP_FORMAT).to_string()),
            Cell::Text(self.participant_name.clone()),
            Cell::Integer(i64::from(self.participant_age)),
            Cell::Integer(i64::from(self.stimulus_digit.value())),
            Cell::Text(self.stimulus_color.name().to_string()),
            Cell::Text(self.response.to_string()),
            Cell::Bool(self.is_correct),
            Cell::Decimal(self.reaction_time_ms()),
        ]
    }

    pub fn header() -> Vec<Cell> {
        Self::COLUMNS
            .iter()
            .map(|c| Cell::Text((*c).to_string()))
            .collect()
    }
}
