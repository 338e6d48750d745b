//! Output ports: adhan playback and pre-alert notifications.
//!
//! The engine talks to audio and notifications only through the two traits
//! defined here, so the scheduling logic can be exercised with mocks and the
//! simulator can run without making a sound.
//!
//! ## Players
//!
//! [`CommandPlayer`] drives one of the common command-line players, picked with
//! `player = "auto"` (first one found on `PATH`) or named explicitly:
//!
//! - `mpg123` (volume via `--scale`)
//! - `ffplay` (volume via `-volume`)
//! - `paplay` (volume via `--volume`)
//! - `aplay` (no volume control)
//!
//! `player = "none"` selects [`DryRunPlayer`], which only logs.
//!
//! Calls into a [`PlaybackPort`] may block for the whole recording; the
//! [`PlaybackWorker`] runs them on a dedicated thread and enforces a hard
//! timeout on the engine's behalf.

use anyhow::Result;
use chrono::{DateTime, Utc};
use std::path::PathBuf;
use std::sync::Arc;

use crate::error::PlaybackError;
use crate::prayer::{PrayerKind, TrackSelector};

pub mod notifier;
pub mod player;
pub mod worker;

pub use notifier::LogNotifier;
pub use player::{CommandPlayer, DryRunPlayer};
pub use worker::{PlayOutcome, PlaybackWorker, StopHandle};

/// Audio output for adhan recordings.
#[cfg_attr(test, mockall::automock)]
pub trait PlaybackPort: Send + Sync {
    /// Play the recording to completion (or until `stop` is called).
    fn play(&self, track: TrackSelector, volume: u8) -> Result<(), PlaybackError>;

    /// Interrupt the current playback, if any. Safe to call from any thread.
    fn stop(&self);

    fn name(&self) -> &'static str;
}

/// Pre-alert notification sink.
#[cfg_attr(test, mockall::automock)]
pub trait NotificationPort: Send {
    fn notify(&self, prayer: PrayerKind, prayer_time: DateTime<Utc>) -> Result<(), PlaybackError>;
}

/// Supported command-line players.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PlayerType {
    Mpg123,
    Ffplay,
    Paplay,
    Aplay,
    DryRun,
}

impl PlayerType {
    /// Detection order for `player = "auto"`.
    pub const DETECTION_ORDER: [PlayerType; 4] = [
        PlayerType::Mpg123,
        PlayerType::Ffplay,
        PlayerType::Paplay,
        PlayerType::Aplay,
    ];

    pub fn binary(self) -> &'static str {
        match self {
            PlayerType::Mpg123 => "mpg123",
            PlayerType::Ffplay => "ffplay",
            PlayerType::Paplay => "paplay",
            PlayerType::Aplay => "aplay",
            PlayerType::DryRun => "none",
        }
    }

    fn from_name(name: &str) -> Option<Self> {
        match name.trim().to_lowercase().as_str() {
            "mpg123" => Some(PlayerType::Mpg123),
            "ffplay" => Some(PlayerType::Ffplay),
            "paplay" => Some(PlayerType::Paplay),
            "aplay" => Some(PlayerType::Aplay),
            "none" | "dry-run" | "dryrun" => Some(PlayerType::DryRun),
            _ => None,
        }
    }
}

/// Find an executable on `PATH`.
pub fn find_in_path(binary: &str) -> Option<PathBuf> {
    let path = std::env::var_os("PATH")?;
    std::env::split_paths(&path)
        .map(|dir| dir.join(binary))
        .find(|candidate| candidate.is_file())
}

/// Resolve the configured player name to a concrete player.
pub fn detect_player(preference: &str) -> Result<PlayerType> {
    if preference.trim().eq_ignore_ascii_case("auto") {
        return PlayerType::DETECTION_ORDER
            .into_iter()
            .find(|p| find_in_path(p.binary()).is_some())
            .ok_or_else(|| {
                anyhow::anyhow!(
                    "No audio player found on PATH (looked for mpg123, ffplay, paplay, aplay)"
                )
            });
    }

    let Some(player) = PlayerType::from_name(preference) else {
        anyhow::bail!(
            "Unknown player '{preference}' (expected auto, mpg123, ffplay, paplay, aplay or none)"
        );
    };
    if player != PlayerType::DryRun && find_in_path(player.binary()).is_none() {
        anyhow::bail!("Configured player '{}' is not installed", player.binary());
    }
    Ok(player)
}

/// Build the playback port for a detected player.
pub fn create_player(player: PlayerType, audio_dir: PathBuf) -> Arc<dyn PlaybackPort> {
    match player {
        PlayerType::DryRun => Arc::new(DryRunPlayer::new(audio_dir)),
        other => Arc::new(CommandPlayer::new(other, audio_dir)),
    }
}
