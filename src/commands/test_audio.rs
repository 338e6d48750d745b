//! `vakitd test-audio`: play a short adhan preview to check the speaker.
//!
//! The preview goes through a one-shot engine, so it takes exactly the path a
//! scheduled adhan takes: player detection, track lookup under `audio_dir`,
//! the playback worker and its hard timeout. The engine is started with every
//! prayer disabled; it serves the single request and shuts down.

use anyhow::{Context, Result};
use std::sync::Arc;
use std::time::Duration;

use crate::backend::{LogNotifier, PlayOutcome, create_player, detect_player};
use crate::common::constants::{MAXIMUM_PLAYBACK_TIMEOUT_SECS, MAXIMUM_VOLUME};
use crate::common::logger::Log;
use crate::config;
use crate::engine::{EngineParams, TriggerEngine};
use crate::prayer::{PrayerKind, TrackSelector};
use crate::time::source::{self, RealClock};

/// Seconds of audio played when `--duration` is not given.
pub const DEFAULT_PREVIEW_SECS: u64 = 10;

/// Options accepted by the test-audio command.
#[derive(Debug, Clone, PartialEq)]
pub struct TestAudioOptions {
    /// Overrides the configured volume for the chosen prayer.
    pub volume: Option<u8>,
    pub duration_secs: u64,
    /// Which prayer's recording to try; Dhuhr when unset.
    pub prayer: Option<PrayerKind>,
}

impl Default for TestAudioOptions {
    fn default() -> Self {
        Self {
            volume: None,
            duration_secs: DEFAULT_PREVIEW_SECS,
            prayer: None,
        }
    }
}

impl TestAudioOptions {
    pub fn validate(&self) -> Result<()> {
        if let Some(volume) = self.volume
            && volume > MAXIMUM_VOLUME
        {
            anyhow::bail!("volume ({volume}) must be between 0 and {MAXIMUM_VOLUME}");
        }
        if !(1..=MAXIMUM_PLAYBACK_TIMEOUT_SECS).contains(&self.duration_secs) {
            anyhow::bail!(
                "duration ({}) must be between 1 and {MAXIMUM_PLAYBACK_TIMEOUT_SECS} seconds",
                self.duration_secs
            );
        }
        if self.prayer == Some(PrayerKind::Sunrise) {
            anyhow::bail!("sunrise has no adhan recording");
        }
        Ok(())
    }
}

pub fn run_test_audio_command(options: TestAudioOptions, debug_enabled: bool) -> Result<()> {
    options.validate()?;
    log_version!();

    let config = config::load().context("Failed to load configuration")?;
    let mut settings = config.to_schedule_settings()?;
    let tz = settings.location.timezone();
    Log::set_location_timezone(tz);

    let prayer = options.prayer.unwrap_or(PrayerKind::Dhuhr);
    let track = TrackSelector::new(settings.prayers.voice, prayer);
    let volume = options
        .volume
        .unwrap_or_else(|| settings.prayers.volume.volume_for(prayer));
    let length = Duration::from_secs(options.duration_secs);

    let player = create_player(detect_player(config.player())?, config.audio_dir()?);
    log_block_start!("Audio player: {}", player.name());
    log_indented!("Track: {track}");
    log_indented!("Volume: {volume}%, at most {}s", options.duration_secs);

    // Nothing on the calendar can fire while the preview runs
    settings.prayers.enabled.clear();

    source::init_clock(Arc::new(RealClock));
    let (engine, handle) = TriggerEngine::new(EngineParams {
        clock: source::clock(),
        player,
        notifier: Box::new(LogNotifier::new(tz)),
        settings,
        source: None,
        journal: None,
        debug_enabled,
    });
    let runner = std::thread::spawn(move || engine.run());

    let outcome = handle.test_playback(track, volume, Some(length));
    handle.shutdown()?;
    if runner.join().is_err() {
        anyhow::bail!("Prayer time engine panicked during the test playback");
    }

    match outcome? {
        PlayOutcome::Finished => log_block_start!("Playback finished"),
        PlayOutcome::Truncated => {
            log_block_start!("Playback stopped after {}s", options.duration_secs)
        }
        PlayOutcome::Cancelled => log_block_start!("Playback cancelled"),
    }
    log_end!();
    Ok(())
}

/// Display detailed help for the test-audio command.
pub fn display_help() {
    log_version!();
    log_block_start!("test-audio - Play a short adhan preview");
    log_block_start!("Usage: vakitd test-audio [OPTIONS]");
    log_block_start!("Options:");
    log_indented!("--volume <0-100>       Volume (default: configured volume)");
    log_indented!("--duration <seconds>   Stop after this long (default: {DEFAULT_PREVIEW_SECS})");
    log_indented!("--prayer <name>        Which prayer's recording to play (default: dhuhr)");
    log_block_start!("Notes:");
    log_indented!("Uses the configured player, voice and audio directory");
    log_indented!("A running daemon is not involved; both may play at once");
    log_end!();
}
