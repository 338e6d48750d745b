//! `vakitd times`: print prayer times without starting the daemon.

use anyhow::{Context, Result};
use chrono::{NaiveDate, Utc};
use serde::Serialize;

use crate::common::constants::DEFAULT_TIMEZONE;
use crate::common::logger::Log;
use crate::config::{self, Config};
use crate::geo::{self, DailyTimes};

/// Longest range `times` will print in one go.
pub const MAXIMUM_DAYS: u32 = 366;

/// Options accepted by the times command.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct TimesOptions {
    /// First date; today at the configured location when unset.
    pub date: Option<NaiveDate>,
    pub days: u32,
    /// Overrides the configured coordinates (timezone resolved from them).
    pub coordinates: Option<(f64, f64)>,
    pub json: bool,
}

#[derive(Serialize)]
struct DayOutput {
    date: NaiveDate,
    timezone: String,
    times: Vec<PrayerOutput>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    adjustments: Vec<&'static str>,
}

#[derive(Serialize)]
struct PrayerOutput {
    prayer: &'static str,
    local_name: &'static str,
    time: String,
}

pub fn run_times_command(options: TimesOptions) -> Result<()> {
    if !(1..=MAXIMUM_DAYS).contains(&options.days) {
        anyhow::bail!("days ({}) must be between 1 and {}", options.days, MAXIMUM_DAYS);
    }

    // Keep stdout parseable: only the JSON document is printed
    if options.json {
        Log::set_enabled(false);
    }

    let mut config = config::load().context("Failed to load configuration")?;
    if let Some((latitude, longitude)) = options.coordinates {
        apply_coordinates(&mut config, latitude, longitude);
    }
    let settings = config.to_schedule_settings()?;
    let location = &settings.location;

    let start = options
        .date
        .unwrap_or_else(|| Utc::now().with_timezone(&location.timezone()).date_naive());
    let days = geo::times_for(start, options.days, location, &settings.calculation)?;

    if options.json {
        println!("{}", render_json(&days)?);
        return Ok(());
    }

    log_version!();
    log_block_start!("Prayer times for {}", location.describe());
    log_indented!("Timezone: {}", location.timezone());
    log_indented!("Offsets: {}", settings.calculation.offsets);
    for day in &days {
        log_times(day);
    }
    log_end!();
    Ok(())
}

/// Replace the configured location with bare coordinates.
fn apply_coordinates(config: &mut Config, latitude: f64, longitude: f64) {
    config.location.latitude = Some(latitude);
    config.location.longitude = Some(longitude);
    config.location.timezone = Some(DEFAULT_TIMEZONE.to_string());
    config.location.city = None;
    config.location.elevation = None;
}

fn log_times(day: &DailyTimes) {
    log_block_start!("{}", day.date().format("%A, %d %B %Y"));
    for (prayer, at) in day.iter() {
        log_indented!(
            "{:<8} {:<7} {}",
            prayer.to_string(),
            prayer.local_name(),
            at.format("%H:%M")
        );
    }
    for note in adjustment_notes(day) {
        log_decorated!("Note: {note}");
    }
}

fn adjustment_notes(day: &DailyTimes) -> Vec<&'static str> {
    let adjustments = day.adjustments();
    let mut notes = Vec::new();
    if !adjustments.any() {
        return notes;
    }
    if adjustments.clamped_latitude.is_some() {
        notes.push("latitude clamped for sunrise/sunset");
    }
    if adjustments.elevation_ignored {
        notes.push("elevation ignored for sunrise/sunset");
    }
    if adjustments.fajr_from_night_portion {
        notes.push("fajr from high-latitude rule");
    }
    if adjustments.isha_from_night_portion {
        notes.push("isha from high-latitude rule");
    }
    if adjustments.ordering_guard {
        notes.push("times spaced to keep their order");
    }
    notes
}

/// Machine-readable output: one object per day, times as `HH:MM`.
pub fn render_json(days: &[DailyTimes]) -> Result<String> {
    let output: Vec<DayOutput> = days
        .iter()
        .map(|day| DayOutput {
            date: day.date(),
            timezone: day.timezone().name().to_string(),
            times: day
                .iter()
                .map(|(prayer, at)| PrayerOutput {
                    prayer: prayer.as_str(),
                    local_name: prayer.local_name(),
                    time: at.format("%H:%M").to_string(),
                })
                .collect(),
            adjustments: adjustment_notes(day),
        })
        .collect();
    serde_json::to_string_pretty(&output).context("Failed to serialize prayer times")
}

pub fn display_help() {
    log_version!();
    log_block_start!("times - Print prayer times");
    log_block_start!("Usage: vakitd times [OPTIONS]");
    log_block_start!("Options:");
    log_indented!("--date YYYY-MM-DD      First day (default: today)");
    log_indented!("--days N               Number of days (1-{MAXIMUM_DAYS}, default: 1)");
    log_indented!("--lat LAT --lng LNG    Use these coordinates instead of the config");
    log_indented!("--json                 Print JSON instead of a table");
    log_block_start!("Examples:");
    log_indented!("vakitd times --days 7");
    log_indented!("vakitd times --lat 21.4225 --lng 39.8262 --json");
    log_end!();
}
