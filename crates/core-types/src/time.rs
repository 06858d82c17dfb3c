//! Scheduling intent resolved from natural-language time phrases.

use chrono::{DateTime, Local};
use serde::{Deserialize, Serialize};

/// When a command should run.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ScheduleMode {
    /// Run synchronously, no persistence needed.
    Immediate,
    /// Run at this instant; the task is persisted and a timer armed.
    Scheduled(DateTime<Local>),
}

/// A resolved time phrase. Phrases without a recognizable time resolve
/// to `Immediate`.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct TimeSpec {
    pub mode: ScheduleMode,
    /// The fragment of the input the time was extracted from.
    pub original_phrase: String,
}

impl TimeSpec {
    pub fn immediate(phrase: impl Into<String>) -> Self {
        Self {
            mode: ScheduleMode::Immediate,
            original_phrase: phrase.into(),
        }
    }

    pub fn scheduled(at: DateTime<Local>, phrase: impl Into<String>) -> Self {
        Self {
            mode: ScheduleMode::Scheduled(at),
            original_phrase: phrase.into(),
        }
    }

    pub fn is_immediate(&self) -> bool {
        matches!(self.mode, ScheduleMode::Immediate)
    }

    pub fn scheduled_at(&self) -> Option<DateTime<Local>> {
        match self.mode {
            ScheduleMode::Scheduled(at) => Some(at),
            ScheduleMode::Immediate => None,
        }
    }
}
