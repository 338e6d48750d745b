//! Snapshot of engine state for status reporting.

use chrono::{DateTime, Duration, Utc};

use super::state::{TriggerRecord, TriggerState};
use crate::calendar::Event;
use crate::common::utils::format_countdown;
use crate::geo::DailyTimes;

/// The upcoming event and how long until it fires.
#[derive(Debug, Clone, PartialEq)]
pub struct NextEvent {
    pub event: Event,
    pub countdown: Duration,
}

/// Coarse health classification shown to operators.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Health {
    /// No calendar or nothing left to trigger.
    Idle,
    Pending,
    LastSucceeded,
    LastFailed,
    /// The latest settings were refused; the previous calendar is in use.
    SettingsRejected,
}

#[derive(Debug, Clone)]
pub struct EngineStatus {
    pub now: DateTime<Utc>,
    pub location: String,
    pub player: &'static str,
    pub times: Option<DailyTimes>,
    pub events: Vec<TriggerRecord>,
    pub next: Option<NextEvent>,
    pub last_trigger: Option<TriggerRecord>,
    pub settings_rejected: Option<String>,
}

impl EngineStatus {
    pub fn health(&self) -> Health {
        if self.settings_rejected.is_some() {
            return Health::SettingsRejected;
        }
        if let Some(TriggerRecord {
            state: TriggerState::Completed(outcome),
            ..
        }) = &self.last_trigger
        {
            return if outcome.succeeded() {
                Health::LastSucceeded
            } else {
                Health::LastFailed
            };
        }
        if self.next.is_some() {
            Health::Pending
        } else {
            Health::Idle
        }
    }

    /// Print the status with the project logger.
    pub fn log(&self) {
        log_block_start!("Location: {}", self.location);
        log_indented!("Player: {}", self.player);

        let Some(times) = &self.times else {
            log_pipe!();
            log_warning!("No prayer calendar is active");
            if let Some(reason) = &self.settings_rejected {
                log_indented!("{reason}");
            }
            return;
        };

        log_block_start!("Prayer times for {}", times.date().format("%A, %d %B %Y"));
        for (prayer, at) in times.iter() {
            log_indented!(
                "{:<8} {:<7} {}",
                prayer.to_string(),
                prayer.local_name(),
                at.format("%H:%M")
            );
        }

        if !self.events.is_empty() {
            log_block_start!("Events");
            for record in &self.events {
                log_indented!("{:<24} {}", record.event.describe(), record.state);
            }
        }

        match &self.next {
            Some(next) => log_block_start!(
                "Next: {} (in {})",
                next.event.describe(),
                format_countdown(next.countdown)
            ),
            None => log_block_start!("Nothing left to trigger today"),
        }

        if let Some(last) = &self.last_trigger {
            log_decorated!("Last: {} ({})", last.event.describe(), last.state);
        }
        if let Some(reason) = &self.settings_rejected {
            log_pipe!();
            log_warning!("Settings rejected, using previous configuration: {reason}");
        }
    }
}
