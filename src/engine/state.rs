//! Per-event trigger lifecycle.
//!
//! ```text
//! Scheduled ──> Armed ──> Fired ──> Completed
//!     │                               (terminal)
//!     ├──> Skipped      (elapsed at boot, missed on a late wake, already fired)
//!     └──> Superseded   (calendar rebuilt before the event fired)
//! ```

use chrono::{DateTime, Utc};
use std::fmt;

use crate::calendar::Event;

/// Why an event was never triggered.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SkipReason {
    /// Already in the past when the calendar was built.
    Elapsed,
    /// The engine woke up too late (suspend, clock jump).
    Missed,
    /// The fire journal shows it was triggered before.
    AlreadyFired,
}

/// Result of a fired event.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Outcome {
    pub attempts: u32,
    /// Last error when every attempt failed.
    pub error: Option<String>,
    pub cancelled: bool,
}

impl Outcome {
    pub fn succeeded(&self) -> bool {
        self.error.is_none()
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TriggerState {
    Scheduled,
    Armed,
    Fired,
    Completed(Outcome),
    Skipped(SkipReason),
    Superseded,
}

impl TriggerState {
    pub fn is_pending(&self) -> bool {
        matches!(self, TriggerState::Scheduled | TriggerState::Armed)
    }

    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            TriggerState::Completed(_) | TriggerState::Skipped(_) | TriggerState::Superseded
        )
    }
}

impl fmt::Display for TriggerState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TriggerState::Scheduled => write!(f, "scheduled"),
            TriggerState::Armed => write!(f, "armed"),
            TriggerState::Fired => write!(f, "playing"),
            TriggerState::Completed(outcome) if outcome.cancelled => write!(f, "cancelled"),
            TriggerState::Completed(outcome) => match &outcome.error {
                Some(error) => write!(f, "failed after {} attempt(s): {error}", outcome.attempts),
                None => write!(f, "done"),
            },
            TriggerState::Skipped(SkipReason::Elapsed) => write!(f, "passed"),
            TriggerState::Skipped(SkipReason::Missed) => write!(f, "missed"),
            TriggerState::Skipped(SkipReason::AlreadyFired) => write!(f, "done earlier"),
            TriggerState::Superseded => write!(f, "superseded"),
        }
    }
}

/// An event together with its current state.
#[derive(Debug, Clone, PartialEq)]
pub struct TriggerRecord {
    pub event: Event,
    pub state: TriggerState,
    /// When the record reached its current state.
    pub since: DateTime<Utc>,
}
