//! Default configuration file creation.
//!
//! Writes a commented `vakit.toml` with every setting spelled out, aligned so
//! the comments line up like a hand-written file.

use anyhow::{Context, Result};
use std::fs;
use std::path::Path;

use crate::common::constants::*;

/// Create the default config file at `path`, creating parent directories.
pub fn create_default_config(path: &Path) -> Result<()> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent).context("Failed to create config directory")?;
    }

    fs::write(path, default_config_content()).context("Failed to write default config file")?;
    log_indented!("Location: {DEFAULT_CITY} (edit [location] to change)");
    Ok(())
}

/// Contents of a freshly created `vakit.toml`.
pub fn default_config_content() -> String {
    ConfigBuilder::new()
        .add_section("location")
        .add_setting(
            "latitude",
            &format!("{DEFAULT_LATITUDE:.6}"),
            "Geographic latitude (-90 to +90)",
        )
        .add_setting(
            "longitude",
            &format!("{DEFAULT_LONGITUDE:.6}"),
            "Geographic longitude (-180 to +180)",
        )
        .add_setting(
            "elevation",
            "0.0",
            &format!("Meters above sea level (0-{MAXIMUM_ELEVATION_METERS})"),
        )
        .add_setting(
            "timezone",
            &format!("\"{DEFAULT_TIMEZONE}\""),
            "\"auto\" (from coordinates) or an IANA name like \"Europe/Istanbul\"",
        )
        .add_setting("city", &format!("\"{DEFAULT_CITY}\""), "Display name only")
        .add_section("calculation")
        .add_setting(
            "fajr_angle",
            &format!("{DEFAULT_FAJR_ANGLE:.1}"),
            &format!("Sun depression for Fajr ({MINIMUM_TWILIGHT_ANGLE}-{MAXIMUM_TWILIGHT_ANGLE}] degrees"),
        )
        .add_setting(
            "isha_angle",
            &format!("{DEFAULT_ISHA_ANGLE:.1}"),
            &format!("Sun depression for Isha ({MINIMUM_TWILIGHT_ANGLE}-{MAXIMUM_TWILIGHT_ANGLE}] degrees"),
        )
        .add_setting("asr_method", "\"standard\"", "\"standard\" or \"hanafi\"")
        .add_setting(
            "high_latitude_rule",
            "\"angle_based\"",
            "\"angle_based\", \"one_seventh\" or \"middle_of_night\"",
        )
        .add_setting(
            "offsets",
            &format!("\"{DEFAULT_OFFSETS_PRESET}\""),
            "\"auto\", \"none\", \"diyanet\" or { dhuhr = 5, ... } in minutes",
        )
        .add_section("prayers")
        .add_setting(
            "enabled",
            "[\"fajr\", \"dhuhr\", \"asr\", \"maghrib\", \"isha\"]",
            "Prayers that play the adhan",
        )
        .add_setting(
            "voice",
            "\"makkah\"",
            "\"makkah\", \"madinah\" or \"istanbul\"",
        )
        .add_setting(
            "volume",
            &DEFAULT_VOLUME.to_string(),
            &format!("Adhan volume (0-{MAXIMUM_VOLUME})"),
        )
        .add_setting(
            "pre_alert_minutes",
            &DEFAULT_PRE_ALERT_MINUTES.to_string(),
            &format!("Notify before each prayer (0-{MAXIMUM_PRE_ALERT_MINUTES} | 0 = off)"),
        )
        .add_setting(
            "pre_alert_overlap",
            "\"clamp\"",
            "\"clamp\" or \"suppress\" when a pre-alert precedes the previous adhan",
        )
        .add_section("playback")
        .add_setting(
            "player",
            &format!("\"{DEFAULT_PLAYER}\""),
            "\"auto\", \"mpg123\", \"ffplay\", \"paplay\", \"aplay\" or \"none\"",
        )
        .add_setting(
            "timeout_secs",
            &DEFAULT_PLAYBACK_TIMEOUT_SECS.to_string(),
            &format!(
                "Hard limit for one playback ({MINIMUM_PLAYBACK_TIMEOUT_SECS}-{MAXIMUM_PLAYBACK_TIMEOUT_SECS}) seconds"
            ),
        )
        .add_setting(
            "retries",
            &DEFAULT_PLAYBACK_RETRIES.to_string(),
            &format!("Extra attempts after a transient failure (0-{MAXIMUM_PLAYBACK_RETRIES})"),
        )
        .add_setting(
            "retry_backoff_ms",
            &DEFAULT_RETRY_BACKOFF_MS.to_string(),
            &format!("Linear backoff between attempts (0-{MAXIMUM_RETRY_BACKOFF_MS}) ms"),
        )
        .build()
}

struct ConfigBuilder {
    entries: Vec<ConfigEntry>,
}

enum ConfigEntry {
    Section(String),
    Setting { line: String, comment: String },
}

impl ConfigBuilder {
    fn new() -> Self {
        Self {
            entries: Vec::new(),
        }
    }

    fn add_section(mut self, title: &str) -> Self {
        self.entries.push(ConfigEntry::Section(format!("[{title}]")));
        self
    }

    fn add_setting(mut self, key: &str, value: &str, comment: &str) -> Self {
        self.entries.push(ConfigEntry::Setting {
            line: format!("{key} = {value}"),
            comment: format!("# {comment}"),
        });
        self
    }

    fn build(self) -> String {
        // Align all comments to the longest setting line
        let max_width = self
            .entries
            .iter()
            .filter_map(|entry| match entry {
                ConfigEntry::Setting { line, .. } => Some(line.chars().count()),
                ConfigEntry::Section(_) => None,
            })
            .max()
            .unwrap_or(0)
            + 1;

        let mut result = Vec::new();
        for entry in self.entries {
            match entry {
                ConfigEntry::Section(title) => {
                    if !result.is_empty() {
                        result.push(String::new());
                    }
                    result.push(title);
                }
                ConfigEntry::Setting { line, comment } => {
                    let padding = " ".repeat(max_width - line.chars().count());
                    result.push(format!("{line}{padding}{comment}"));
                }
            }
        }

        let mut content = result.join("\n");
        content.push('\n');
        content
    }
}
