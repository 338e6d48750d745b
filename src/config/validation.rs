//! Configuration validation functionality.
//!
//! Range checks on the raw file contents, run before defaults are applied so
//! the messages name the value the user actually wrote.

use anyhow::Result;

use super::{Config, OffsetsConfig};
use crate::common::constants::*;
use crate::geo::resolve_timezone;

/// Reject values the calculator, calendar or player cannot work with.
pub fn validate_config(config: &Config) -> Result<()> {
    validate_location(config)?;
    validate_calculation(config)?;
    validate_prayers(config)?;
    validate_playback(config)?;
    Ok(())
}

fn validate_location(config: &Config) -> Result<()> {
    let location = &config.location;

    match (location.latitude, location.longitude) {
        (Some(_), None) | (None, Some(_)) => {
            anyhow::bail!("latitude and longitude must be set together")
        }
        _ => {}
    }

    if let Some(lat) = location.latitude
        && !(-90.0..=90.0).contains(&lat)
    {
        anyhow::bail!("latitude must be between -90 and 90 degrees (got {})", lat);
    }

    if let Some(lon) = location.longitude
        && !(-180.0..=180.0).contains(&lon)
    {
        anyhow::bail!(
            "longitude must be between -180 and 180 degrees (got {})",
            lon
        );
    }

    if let Some(elevation) = location.elevation
        && !(0.0..=MAXIMUM_ELEVATION_METERS).contains(&elevation)
    {
        anyhow::bail!(
            "elevation ({}) must be between 0 and {} meters",
            elevation,
            MAXIMUM_ELEVATION_METERS
        );
    }

    if let Some(timezone) = &location.timezone {
        resolve_timezone(
            timezone,
            location.latitude.unwrap_or(DEFAULT_LATITUDE),
            location.longitude.unwrap_or(DEFAULT_LONGITUDE),
        )?;
    }

    Ok(())
}

fn validate_calculation(config: &Config) -> Result<()> {
    let calculation = &config.calculation;

    for (name, angle) in [
        ("fajr_angle", calculation.fajr_angle),
        ("isha_angle", calculation.isha_angle),
    ] {
        if let Some(angle) = angle
            && !(angle > MINIMUM_TWILIGHT_ANGLE && angle <= MAXIMUM_TWILIGHT_ANGLE)
        {
            anyhow::bail!(
                "{} ({}) must be greater than {} and at most {} degrees",
                name,
                angle,
                MINIMUM_TWILIGHT_ANGLE,
                MAXIMUM_TWILIGHT_ANGLE
            );
        }
    }

    match &calculation.offsets {
        Some(OffsetsConfig::Preset(name)) => {
            if !matches!(
                name.trim().to_lowercase().as_str(),
                "auto" | "none" | "diyanet"
            ) {
                anyhow::bail!(
                    "offsets ({}) must be \"auto\", \"none\", \"diyanet\" or a table of minutes",
                    name
                );
            }
        }
        Some(OffsetsConfig::Minutes(table)) => {
            for (prayer, minutes) in table {
                if minutes.abs() > MAXIMUM_OFFSET_MINUTES {
                    anyhow::bail!(
                        "offsets.{} ({} min) must be between -{} and {} minutes",
                        prayer.as_str(),
                        minutes,
                        MAXIMUM_OFFSET_MINUTES,
                        MAXIMUM_OFFSET_MINUTES
                    );
                }
            }
        }
        None => {}
    }

    Ok(())
}

fn validate_prayers(config: &Config) -> Result<()> {
    let prayers = &config.prayers;

    if let Some(enabled) = &prayers.enabled
        && enabled.iter().any(|p| !p.is_user_facing())
    {
        anyhow::bail!("enabled cannot contain \"sunrise\"; it is not a prayer");
    }

    if let Some(volume) = prayers.volume
        && volume > MAXIMUM_VOLUME
    {
        anyhow::bail!("volume ({}) must be between 0 and {}", volume, MAXIMUM_VOLUME);
    }

    if let Some(volumes) = &prayers.volumes {
        for (prayer, volume) in volumes {
            if *volume > MAXIMUM_VOLUME {
                anyhow::bail!(
                    "volumes.{} ({}) must be between 0 and {}",
                    prayer.as_str(),
                    volume,
                    MAXIMUM_VOLUME
                );
            }
        }
    }

    if let Some(minutes) = prayers.pre_alert_minutes
        && minutes > MAXIMUM_PRE_ALERT_MINUTES
    {
        anyhow::bail!(
            "pre_alert_minutes ({}) must be between 0 and {}",
            minutes,
            MAXIMUM_PRE_ALERT_MINUTES
        );
    }

    Ok(())
}

fn validate_playback(config: &Config) -> Result<()> {
    let playback = &config.playback;

    if let Some(timeout) = playback.timeout_secs
        && !(MINIMUM_PLAYBACK_TIMEOUT_SECS..=MAXIMUM_PLAYBACK_TIMEOUT_SECS).contains(&timeout)
    {
        anyhow::bail!(
            "timeout_secs ({}) must be between {} and {} seconds",
            timeout,
            MINIMUM_PLAYBACK_TIMEOUT_SECS,
            MAXIMUM_PLAYBACK_TIMEOUT_SECS
        );
    }

    if let Some(retries) = playback.retries
        && retries > MAXIMUM_PLAYBACK_RETRIES
    {
        anyhow::bail!(
            "retries ({}) must be between 0 and {}",
            retries,
            MAXIMUM_PLAYBACK_RETRIES
        );
    }

    if let Some(backoff) = playback.retry_backoff_ms
        && backoff > MAXIMUM_RETRY_BACKOFF_MS
    {
        anyhow::bail!(
            "retry_backoff_ms ({}) must be between 0 and {} milliseconds",
            backoff,
            MAXIMUM_RETRY_BACKOFF_MS
        );
    }

    if let Some(player) = &playback.player
        && player.trim().is_empty()
    {
        anyhow::bail!("player cannot be empty (use \"auto\" or \"none\")");
    }

    Ok(())
}
