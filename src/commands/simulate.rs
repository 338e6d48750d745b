//! `vakitd simulate`: replay a time window against the real engine.
//!
//! The engine runs exactly as the daemon would, but on a [`SimulatedClock`]
//! and with the dry-run player, so a whole day of adhans and pre-alerts can be
//! checked in a second. Nothing is played and the fire journal is not touched.

use anyhow::{Context, Result};
use std::sync::Arc;

use crate::backend::{DryRunPlayer, LogNotifier};
use crate::common::logger::Log;
use crate::common::utils::format_countdown;
use crate::config::{self, StaticSettings};
use crate::engine::{EngineParams, Flow, TriggerEngine, TriggerState};
use crate::time::source::{self, SimulatedClock, parse_datetime_in_tz};

/// Simulated seconds per real second when no multiplier is given.
pub const DEFAULT_MULTIPLIER: f64 = 0.0;

/// Run the engine from `start_time` to `end_time` (wall times at the configured location).
///
/// `multiplier == 0` fast-forwards; any positive value runs that many times
/// faster than real time.
pub fn run_simulate_command(
    start_time: &str,
    end_time: &str,
    multiplier: f64,
    debug_enabled: bool,
) -> Result<()> {
    if !multiplier.is_finite() || multiplier < 0.0 {
        anyhow::bail!("multiplier ({multiplier}) must be 0 (fast-forward) or a positive number");
    }

    let config = config::load().context("Failed to load configuration")?;
    let settings = config.to_schedule_settings()?;
    let tz = settings.location.timezone();

    let start = parse_datetime_in_tz(start_time, tz)
        .map_err(|e| anyhow::anyhow!("Invalid start time: {e}"))?;
    let end =
        parse_datetime_in_tz(end_time, tz).map_err(|e| anyhow::anyhow!("Invalid end time: {e}"))?;
    if end <= start {
        anyhow::bail!("End time must be after start time");
    }

    log_version!();
    log_block_start!("Simulation Mode");
    log_indented!("From: {} ({tz})", start.with_timezone(&tz).format("%Y-%m-%d %H:%M:%S"));
    log_indented!("To:   {}", end.with_timezone(&tz).format("%Y-%m-%d %H:%M:%S"));
    if multiplier == 0.0 {
        log_indented!("Speed: fast-forward");
    } else {
        log_indented!("Speed: {multiplier}x");
    }

    let clock = Arc::new(SimulatedClock::new(start, end, multiplier));
    source::init_clock(clock.clone());
    Log::set_location_timezone(tz);

    let (mut engine, _handle) = TriggerEngine::new(EngineParams {
        clock,
        player: Arc::new(DryRunPlayer::new(config.audio_dir()?)),
        notifier: Box::new(LogNotifier::new(tz)),
        settings: settings.clone(),
        source: Some(Box::new(StaticSettings::new(settings))),
        journal: None,
        debug_enabled,
    });

    engine.start();
    while engine.step() == Flow::Continue {}

    let fired: Vec<_> = engine
        .history()
        .filter(|record| matches!(record.state, TriggerState::Completed(_)))
        .collect();
    log_block_start!("Simulation complete: {} event(s) fired", fired.len());
    for record in fired {
        log_indented!(
            "{} {:<24} {}",
            record.event.at.format("%m-%d %H:%M"),
            record.event.describe(),
            record.state
        );
    }
    if let Some(next) = engine.status().next {
        log_indented!(
            "Next after the window: {} (in {})",
            next.event.describe(),
            format_countdown(next.countdown)
        );
    }
    log_end!();
    Ok(())
}

pub fn display_help() {
    log_version!();
    log_block_start!("simulate - Replay a time window without playing audio");
    log_block_start!("Usage: vakitd simulate <START> <END> [MULTIPLIER]");
    log_block_start!("Arguments:");
    log_indented!("START, END   Wall times at the configured location (YYYY-MM-DD HH:MM:SS)");
    log_indented!("MULTIPLIER   0 = fast-forward (default), otherwise N times real speed");
    log_block_start!("Examples:");
    log_indented!("vakitd simulate \"2024-06-21 00:00:00\" \"2024-06-22 00:00:00\"");
    log_indented!("vakitd simulate \"2024-03-10 11:00:00\" \"2024-03-10 14:00:00\" 600");
    log_end!();
}
