//! Immutable settings snapshot consumed by the engine.

use anyhow::Result;
use std::time::Duration;

use crate::calendar::PrayerSettings;
use crate::common::constants::*;
use crate::error::SettingsError;
use crate::geo::{CalculationSettings, Location};

/// Playback timeout and retry budget.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PlaybackPolicy {
    /// Hard limit for one attempt.
    pub timeout: Duration,
    /// Additional attempts after a transient failure.
    pub retries: u32,
    /// Linear backoff unit: attempt `n` waits `n * backoff` before retrying.
    pub backoff: Duration,
}

impl Default for PlaybackPolicy {
    fn default() -> Self {
        Self {
            timeout: Duration::from_secs(DEFAULT_PLAYBACK_TIMEOUT_SECS),
            retries: DEFAULT_PLAYBACK_RETRIES,
            backoff: Duration::from_millis(DEFAULT_RETRY_BACKOFF_MS),
        }
    }
}

impl PlaybackPolicy {
    /// Upper bound on how long one event can keep the engine busy.
    pub fn worst_case(&self) -> Duration {
        let attempts = self.retries + 1;
        let backoff_units = self.retries * (self.retries + 1) / 2;
        self.timeout * attempts + self.backoff * backoff_units
    }
}

/// Everything the engine needs to build and trigger a calendar.
#[derive(Debug, Clone, PartialEq)]
pub struct ScheduleSettings {
    pub location: Location,
    pub calculation: CalculationSettings,
    pub prayers: PrayerSettings,
    pub playback: PlaybackPolicy,
}

impl ScheduleSettings {
    pub fn new(location: Location) -> Self {
        Self {
            location,
            calculation: CalculationSettings::default(),
            prayers: PrayerSettings::default(),
            playback: PlaybackPolicy::default(),
        }
    }

    pub fn validate(&self) -> Result<(), SettingsError> {
        self.calculation.validate()?;
        self.prayers.validate()?;
        if self.playback.timeout.is_zero() {
            return Err(SettingsError::Rejected(
                "playback timeout must be greater than zero".into(),
            ));
        }
        Ok(())
    }

    /// Whether switching to `other` changes the prayer times themselves.
    pub fn changes_times(&self, other: &ScheduleSettings) -> bool {
        self.location != other.location || self.calculation != other.calculation
    }
}

/// Provider of settings snapshots.
pub trait SettingsSource: Send {
    fn load(&self) -> Result<ScheduleSettings>;

    /// Short description for logs (e.g. the file path).
    fn describe(&self) -> String;
}
