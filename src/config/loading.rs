//! Configuration loading functionality.
//!
//! Handles locating `vakit.toml`, creating it on first start, parsing,
//! validating and applying defaults.

use anyhow::{Context, Result};
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::OnceLock;

use super::validation::validate_config;
use super::{Config, OffsetsConfig, builder};
use crate::common::constants::*;
use crate::common::utils::private_path;
use crate::prayer::PrayerKind;

/// Global configuration directory, set once at startup
static CONFIG_DIR: OnceLock<Option<PathBuf>> = OnceLock::new();

/// Set the configuration directory for the current process.
/// This can only be called once, typically at startup.
/// Returns an error if already set.
pub fn set_config_dir(dir: Option<String>) -> Result<()> {
    CONFIG_DIR
        .set(dir.map(PathBuf::from))
        .map_err(|_| anyhow::anyhow!("Configuration directory already set"))
}

/// Get the custom configuration directory if one was set.
/// Returns None if using the default directory.
pub fn get_custom_config_dir() -> Option<PathBuf> {
    CONFIG_DIR.get().and_then(|d| d.clone())
}

/// Get the directory containing `vakit.toml`.
pub fn get_config_base_dir() -> Result<PathBuf> {
    let config_path = get_config_path()?;
    config_path
        .parent()
        .map(|p| p.to_path_buf())
        .ok_or_else(|| anyhow::anyhow!("Could not determine config directory"))
}

/// Load configuration using automatic path detection.
///
/// This function will create a default configuration file if none exists.
pub fn load() -> Result<Config> {
    let config_path = get_config_path()?;

    if !config_path.exists() {
        log_block_start!(
            "Creating default configuration at {}",
            private_path(&config_path)
        );
        builder::create_default_config(&config_path)?;
    }

    load_from_path(&config_path)
}

/// Load configuration from a specific path.
///
/// Unlike [`load`], a missing file is an error.
pub fn load_from_path(path: &Path) -> Result<Config> {
    if !path.exists() {
        anyhow::bail!(
            "Configuration file not found at {}",
            private_path(path)
        );
    }

    let content = fs::read_to_string(path)
        .with_context(|| format!("Failed to read config from {}", private_path(path)))?;

    let mut config: Config = toml::from_str(&content).with_context(|| {
        format!(
            "Failed to parse config from {}. Check the TOML syntax and value types",
            private_path(path)
        )
    })?;

    validate_config(&config)
        .with_context(|| format!("Invalid configuration in {}", private_path(path)))?;
    apply_defaults(&mut config);

    Ok(config)
}

/// Fill every unset field with its default.
pub(crate) fn apply_defaults(config: &mut Config) {
    let location = &mut config.location;
    if location.latitude.is_none() && location.longitude.is_none() {
        location.latitude = Some(DEFAULT_LATITUDE);
        location.longitude = Some(DEFAULT_LONGITUDE);
        if location.city.is_none() {
            location.city = Some(DEFAULT_CITY.to_string());
        }
    }
    if location.timezone.is_none() {
        location.timezone = Some(DEFAULT_TIMEZONE.to_string());
    }

    let calculation = &mut config.calculation;
    if calculation.fajr_angle.is_none() {
        calculation.fajr_angle = Some(DEFAULT_FAJR_ANGLE);
    }
    if calculation.isha_angle.is_none() {
        calculation.isha_angle = Some(DEFAULT_ISHA_ANGLE);
    }
    if calculation.asr_method.is_none() {
        calculation.asr_method = Some(Default::default());
    }
    if calculation.high_latitude_rule.is_none() {
        calculation.high_latitude_rule = Some(Default::default());
    }
    if calculation.offsets.is_none() {
        calculation.offsets = Some(OffsetsConfig::Preset(DEFAULT_OFFSETS_PRESET.to_string()));
    }

    let prayers = &mut config.prayers;
    if prayers.enabled.is_none() {
        prayers.enabled = Some(PrayerKind::USER_FACING.to_vec());
    }
    if prayers.voice.is_none() {
        prayers.voice = Some(Default::default());
    }
    if prayers.volume.is_none() {
        prayers.volume = Some(DEFAULT_VOLUME);
    }
    if prayers.pre_alert_minutes.is_none() {
        prayers.pre_alert_minutes = Some(DEFAULT_PRE_ALERT_MINUTES);
    }
    if prayers.pre_alert_overlap.is_none() {
        prayers.pre_alert_overlap = Some(Default::default());
    }

    let playback = &mut config.playback;
    if playback.player.is_none() {
        playback.player = Some(DEFAULT_PLAYER.to_string());
    }
    if playback.timeout_secs.is_none() {
        playback.timeout_secs = Some(DEFAULT_PLAYBACK_TIMEOUT_SECS);
    }
    if playback.retries.is_none() {
        playback.retries = Some(DEFAULT_PLAYBACK_RETRIES);
    }
    if playback.retry_backoff_ms.is_none() {
        playback.retry_backoff_ms = Some(DEFAULT_RETRY_BACKOFF_MS);
    }
}

/// Path of `vakit.toml`: `--config DIR` if given, otherwise the XDG config dir.
pub fn get_config_path() -> Result<PathBuf> {
    if let Some(custom_dir) = get_custom_config_dir() {
        return Ok(custom_dir.join(CONFIG_FILE_NAME));
    }

    let config_dir = dirs::config_dir().context("Could not determine config directory")?;
    Ok(config_dir.join(APP_DIR_NAME).join(CONFIG_FILE_NAME))
}
