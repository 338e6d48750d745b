//! Error taxonomy for the calculation, settings and playback paths.
//!
//! Application plumbing (config files, CLI, lock files, monitors) uses
//! `anyhow` like the rest of the crate. The enums below are the errors the
//! trigger engine has to tell apart: a failed rebuild keeps the previous
//! calendar, and a failed playback is classified as retryable or not.

use chrono::NaiveDate;
use std::time::Duration;
use thiserror::Error;

use crate::prayer::PrayerKind;

/// Why a day's prayer times could not be produced.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum CalculationError {
    #[error("invalid location: {0}")]
    InvalidLocation(String),

    #[error("invalid calculation settings: {0}")]
    InvalidSettings(String),

    #[error("{prayer} could not be resolved on {date} even after high-latitude fallbacks")]
    UnresolvableAngle { prayer: PrayerKind, date: NaiveDate },
}

/// A settings snapshot the engine refused to apply.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum SettingsError {
    #[error("settings rejected: {0}")]
    Rejected(String),

    #[error(transparent)]
    Calculation(#[from] CalculationError),
}

/// Outcome classes of a playback or notification attempt.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum PlaybackError {
    /// Worth retrying: busy device, player crashed, missing socket.
    #[error("transient playback failure: {0}")]
    Transient(String),

    #[error("playback did not finish within {0:?}")]
    TimedOut(Duration),

    /// Retrying cannot help: missing file, no player installed.
    #[error("playback failed: {0}")]
    Fatal(String),
}

impl PlaybackError {
    pub fn is_transient(&self) -> bool {
        matches!(self, PlaybackError::Transient(_) | PlaybackError::TimedOut(_))
    }
}
