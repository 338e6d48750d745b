//! Calculation method parameters.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::common::constants::*;
use crate::error::CalculationError;
use crate::prayer::PrayerKind;

/// Juristic convention for the start of Asr.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AsrMethod {
    /// Shadow equals object height plus noon shadow (Shafi'i, Maliki, Hanbali).
    #[default]
    Standard,
    /// Shadow equals twice the object height plus noon shadow.
    Hanafi,
}

impl AsrMethod {
    pub fn shadow_factor(self) -> f64 {
        match self {
            AsrMethod::Standard => 1.0,
            AsrMethod::Hanafi => 2.0,
        }
    }
}

impl FromStr for AsrMethod {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "standard" | "shafii" => Ok(AsrMethod::Standard),
            "hanafi" => Ok(AsrMethod::Hanafi),
            other => anyhow::bail!("unknown asr_method '{other}' (expected standard or hanafi)"),
        }
    }
}

/// How Fajr and Isha are bounded when twilight lasts most of the night
/// (or all of it).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum HighLatitudeRule {
    /// Night portion proportional to the twilight angle (angle / 60).
    #[default]
    AngleBased,
    /// One seventh of the night.
    OneSeventh,
    /// Half of the night.
    MiddleOfNight,
}

impl HighLatitudeRule {
    /// Longest allowed gap between sunrise and Fajr (or Maghrib and Isha), in hours.
    pub fn night_portion(self, twilight_angle: f64, night_hours: f64) -> f64 {
        let fraction = match self {
            HighLatitudeRule::AngleBased => twilight_angle / 60.0,
            HighLatitudeRule::OneSeventh => 1.0 / 7.0,
            HighLatitudeRule::MiddleOfNight => 0.5,
        };
        night_hours * fraction
    }

    pub fn as_str(self) -> &'static str {
        match self {
            HighLatitudeRule::AngleBased => "angle_based",
            HighLatitudeRule::OneSeventh => "one_seventh",
            HighLatitudeRule::MiddleOfNight => "middle_of_night",
        }
    }
}

impl FromStr for HighLatitudeRule {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().replace('-', "_").as_str() {
            "angle_based" | "angle" => Ok(HighLatitudeRule::AngleBased),
            "one_seventh" | "seventh" => Ok(HighLatitudeRule::OneSeventh),
            "middle_of_night" | "middle" => Ok(HighLatitudeRule::MiddleOfNight),
            other => anyhow::bail!(
                "unknown high_latitude_rule '{other}' (expected angle_based, one_seventh or middle_of_night)"
            ),
        }
    }
}

/// Per-prayer adjustments in whole minutes ("temkin").
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct PrayerOffsets([i64; 6]);

impl PrayerOffsets {
    pub fn none() -> Self {
        Self([0; 6])
    }

    /// Safety margins published by the Turkish Presidency of Religious Affairs.
    pub fn diyanet() -> Self {
        Self([0, -7, 5, 4, 7, 0])
    }

    pub fn get(&self, prayer: PrayerKind) -> i64 {
        self.0[prayer.index()]
    }

    pub fn with(mut self, prayer: PrayerKind, minutes: i64) -> Self {
        self.0[prayer.index()] = minutes;
        self
    }

    pub fn is_zero(&self) -> bool {
        self.0.iter().all(|m| *m == 0)
    }
}

impl fmt::Display for PrayerOffsets {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.is_zero() {
            return f.write_str("none");
        }
        let parts: Vec<String> = PrayerKind::ALL
            .iter()
            .filter(|p| self.get(**p) != 0)
            .map(|p| format!("{} {:+}m", p.as_str(), self.get(*p)))
            .collect();
        f.write_str(&parts.join(", "))
    }
}

/// Everything besides the location that changes the computed times.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CalculationSettings {
    pub fajr_angle: f64,
    pub isha_angle: f64,
    pub asr_method: AsrMethod,
    pub high_latitude_rule: HighLatitudeRule,
    pub offsets: PrayerOffsets,
}

impl Default for CalculationSettings {
    fn default() -> Self {
        Self {
            fajr_angle: DEFAULT_FAJR_ANGLE,
            isha_angle: DEFAULT_ISHA_ANGLE,
            asr_method: AsrMethod::Standard,
            high_latitude_rule: HighLatitudeRule::AngleBased,
            offsets: PrayerOffsets::none(),
        }
    }
}

impl CalculationSettings {
    pub fn validate(&self) -> Result<(), CalculationError> {
        for (name, angle) in [("fajr_angle", self.fajr_angle), ("isha_angle", self.isha_angle)] {
            if !angle.is_finite() || angle <= MINIMUM_TWILIGHT_ANGLE || angle > MAXIMUM_TWILIGHT_ANGLE
            {
                return Err(CalculationError::InvalidSettings(format!(
                    "{name} ({angle}) must be greater than {MINIMUM_TWILIGHT_ANGLE} and at most {MAXIMUM_TWILIGHT_ANGLE} degrees"
                )));
            }
        }
        for prayer in PrayerKind::ALL {
            let minutes = self.offsets.get(prayer);
            if minutes.abs() > MAXIMUM_OFFSET_MINUTES {
                return Err(CalculationError::InvalidSettings(format!(
                    "{} offset ({minutes} min) must be within ±{MAXIMUM_OFFSET_MINUTES} minutes",
                    prayer.as_str()
                )));
            }
        }
        Ok(())
    }
}
