//! Configuration system for vakitd.
//!
//! Settings live in a single TOML file, `vakit.toml`, looked up in
//! `$XDG_CONFIG_HOME/vakit/` or in the directory passed with `--config`.
//! A commented default file is written on first start.
//!
//! ## Configuration Structure
//!
//! ```toml
//! [location]
//! latitude = 41.008200       # Geographic latitude (-90 to +90)
//! longitude = 28.978400      # Geographic longitude (-180 to +180)
//! elevation = 0              # Meters above sea level (0-9000)
//! timezone = "auto"          # "auto" (from coordinates) or an IANA name
//! city = "İstanbul"          # Display name only
//!
//! [calculation]
//! fajr_angle = 18.0          # Sun depression angle for Fajr (0-30]
//! isha_angle = 17.0          # Sun depression angle for Isha (0-30]
//! asr_method = "standard"    # "standard" or "hanafi"
//! high_latitude_rule = "angle_based"
//! offsets = "auto"           # "auto", "none", "diyanet" or a table of minutes
//!
//! [prayers]
//! enabled = ["fajr", "dhuhr", "asr", "maghrib", "isha"]
//! voice = "makkah"           # "makkah", "madinah" or "istanbul"
//! volume = 80                # Adhan volume (0-100)
//! pre_alert_minutes = 0      # Notify this many minutes before each prayer (0 = off)
//! pre_alert_overlap = "clamp"
//!
//! [playback]
//! player = "auto"            # "auto", "mpg123", "ffplay", "paplay", "aplay" or "none"
//! timeout_secs = 600         # Hard limit for one playback attempt (5-1800)
//! retries = 2                # Additional attempts after a transient failure (0-10)
//! retry_backoff_ms = 2000    # Linear backoff unit between attempts (0-60000)
//! ```
//!
//! ## Loading pipeline
//!
//! Every field is optional in the file. [`load_from_path`] parses, validates the
//! ranges with [`validation::validate_config`], then fills the gaps with the
//! defaults from [`crate::common::constants`]. [`Config::to_schedule_settings`]
//! resolves the timezone and the offset preset into the snapshot the engine
//! consumes.

pub mod builder;
pub mod loading;
pub mod validation;
pub mod watcher;

use anyhow::{Context, Result};
use serde::Deserialize;
use std::collections::{BTreeMap, BTreeSet};
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::calendar::{OverlapPolicy, PrayerSettings, VolumeSettings};
use crate::common::constants::*;
use crate::common::utils::private_path;
use crate::engine::{PlaybackPolicy, ScheduleSettings, SettingsSource};
use crate::geo::timezone::is_turkish_timezone;
use crate::geo::{
    AsrMethod, CalculationSettings, HighLatitudeRule, Location, PrayerOffsets, resolve_timezone,
};
use crate::prayer::{AdhanVoice, PrayerKind};

// Re-export public API
pub use builder::create_default_config;
pub use loading::{
    get_config_base_dir, get_config_path, get_custom_config_dir, load, load_from_path,
    set_config_dir,
};
pub use watcher::ConfigWatcher;

/// `[location]` section.
#[derive(Debug, Clone, Default, Deserialize, PartialEq)]
#[serde(default)]
pub struct LocationConfig {
    pub latitude: Option<f64>,
    pub longitude: Option<f64>,
    /// Meters above sea level.
    pub elevation: Option<f64>,
    /// `"auto"` or an IANA timezone name.
    pub timezone: Option<String>,
    pub city: Option<String>,
}

/// Per-prayer offsets: a preset name or an explicit table of minutes.
#[derive(Debug, Clone, Deserialize, PartialEq)]
#[serde(untagged)]
pub enum OffsetsConfig {
    Preset(String),
    Minutes(BTreeMap<PrayerKind, i64>),
}

impl OffsetsConfig {
    /// Resolve against the location's timezone (`auto` depends on it).
    pub fn resolve(&self, timezone: chrono_tz::Tz) -> Result<PrayerOffsets> {
        match self {
            OffsetsConfig::Preset(name) => match name.trim().to_lowercase().as_str() {
                "auto" if is_turkish_timezone(timezone) => Ok(PrayerOffsets::diyanet()),
                "auto" | "none" => Ok(PrayerOffsets::none()),
                "diyanet" => Ok(PrayerOffsets::diyanet()),
                other => anyhow::bail!(
                    "Unknown offsets preset '{other}' (expected \"auto\", \"none\", \"diyanet\" or a table of minutes)"
                ),
            },
            OffsetsConfig::Minutes(table) => Ok(table
                .iter()
                .fold(PrayerOffsets::none(), |offsets, (prayer, minutes)| {
                    offsets.with(*prayer, *minutes)
                })),
        }
    }
}

/// `[calculation]` section.
#[derive(Debug, Clone, Default, Deserialize, PartialEq)]
#[serde(default)]
pub struct CalculationConfig {
    pub fajr_angle: Option<f64>,
    pub isha_angle: Option<f64>,
    pub asr_method: Option<AsrMethod>,
    pub high_latitude_rule: Option<HighLatitudeRule>,
    pub offsets: Option<OffsetsConfig>,
}

/// `[prayers]` section.
#[derive(Debug, Clone, Default, Deserialize, PartialEq)]
#[serde(default)]
pub struct PrayersConfig {
    pub enabled: Option<Vec<PrayerKind>>,
    pub voice: Option<AdhanVoice>,
    pub volume: Option<u8>,
    /// Per-prayer volume overrides.
    pub volumes: Option<BTreeMap<PrayerKind, u8>>,
    pub pre_alert_minutes: Option<u32>,
    pub pre_alert_overlap: Option<OverlapPolicy>,
}

/// `[playback]` section.
#[derive(Debug, Clone, Default, Deserialize, PartialEq)]
#[serde(default)]
pub struct PlaybackConfig {
    /// Directory holding the `adhan_*.mp3` recordings.
    pub audio_dir: Option<PathBuf>,
    pub player: Option<String>,
    pub timeout_secs: Option<u64>,
    pub retries: Option<u32>,
    pub retry_backoff_ms: Option<u64>,
}

/// Parsed contents of `vakit.toml`.
#[derive(Debug, Clone, Default, Deserialize, PartialEq)]
#[serde(default)]
pub struct Config {
    pub location: LocationConfig,
    pub calculation: CalculationConfig,
    pub prayers: PrayersConfig,
    pub playback: PlaybackConfig,
}

impl Config {
    /// Build the engine's settings snapshot.
    ///
    /// Expects a config that went through [`load_from_path`] (or at least
    /// [`loading::apply_defaults`]); missing values fall back to the defaults
    /// again so a partially filled struct is still usable.
    pub fn to_schedule_settings(&self) -> Result<ScheduleSettings> {
        let latitude = self.location.latitude.unwrap_or(DEFAULT_LATITUDE);
        let longitude = self.location.longitude.unwrap_or(DEFAULT_LONGITUDE);
        let timezone = resolve_timezone(
            self.location.timezone.as_deref().unwrap_or(DEFAULT_TIMEZONE),
            latitude,
            longitude,
        )?;

        let mut location = Location::new(latitude, longitude, timezone)?;
        if let Some(elevation) = self.location.elevation {
            location = location.with_elevation(elevation)?;
        }
        if let Some(city) = &self.location.city {
            location = location.with_city(city.clone());
        }

        let offsets = match &self.calculation.offsets {
            Some(offsets) => offsets.resolve(timezone)?,
            None => OffsetsConfig::Preset(DEFAULT_OFFSETS_PRESET.to_string()).resolve(timezone)?,
        };
        let calculation = CalculationSettings {
            fajr_angle: self.calculation.fajr_angle.unwrap_or(DEFAULT_FAJR_ANGLE),
            isha_angle: self.calculation.isha_angle.unwrap_or(DEFAULT_ISHA_ANGLE),
            asr_method: self.calculation.asr_method.unwrap_or_default(),
            high_latitude_rule: self.calculation.high_latitude_rule.unwrap_or_default(),
            offsets,
        };

        let enabled: BTreeSet<PrayerKind> = match &self.prayers.enabled {
            Some(list) => list.iter().copied().collect(),
            None => PrayerKind::USER_FACING.into_iter().collect(),
        };
        let prayers = PrayerSettings {
            enabled,
            volume: VolumeSettings {
                default: self.prayers.volume.unwrap_or(DEFAULT_VOLUME),
                per_prayer: self.prayers.volumes.clone().unwrap_or_default(),
            },
            pre_alert_minutes: self
                .prayers
                .pre_alert_minutes
                .unwrap_or(DEFAULT_PRE_ALERT_MINUTES),
            pre_alert_overlap: self.prayers.pre_alert_overlap.unwrap_or_default(),
            voice: self.prayers.voice.unwrap_or_default(),
        };

        let playback = PlaybackPolicy {
            timeout: Duration::from_secs(
                self.playback
                    .timeout_secs
                    .unwrap_or(DEFAULT_PLAYBACK_TIMEOUT_SECS),
            ),
            retries: self.playback.retries.unwrap_or(DEFAULT_PLAYBACK_RETRIES),
            backoff: Duration::from_millis(
                self.playback
                    .retry_backoff_ms
                    .unwrap_or(DEFAULT_RETRY_BACKOFF_MS),
            ),
        };

        let settings = ScheduleSettings {
            location,
            calculation,
            prayers,
            playback,
        };
        settings.validate()?;
        Ok(settings)
    }

    /// Configured player name (`"auto"` when unset).
    pub fn player(&self) -> &str {
        self.playback.player.as_deref().unwrap_or(DEFAULT_PLAYER)
    }

    /// Directory of adhan recordings, `$XDG_DATA_HOME/vakit/audio` by default.
    pub fn audio_dir(&self) -> Result<PathBuf> {
        if let Some(dir) = &self.playback.audio_dir {
            return Ok(expand_home(dir));
        }
        let data_dir = dirs::data_dir().context("Could not determine the data directory")?;
        Ok(data_dir.join(APP_DIR_NAME).join("audio"))
    }

    /// Print the loaded configuration.
    pub fn log_config(&self, settings: &ScheduleSettings, source: Option<&Path>) {
        match source {
            Some(path) => log_block_start!("Loaded configuration from {}", private_path(path)),
            None => log_block_start!("Using built-in configuration"),
        }

        let location = &settings.location;
        log_indented!("Location: {}", location.describe());
        log_indented!("Timezone: {}", location.timezone());
        if location.elevation() > 0.0 {
            log_indented!("Elevation: {:.0} m", location.elevation());
        }

        let calculation = &settings.calculation;
        log_indented!(
            "Angles: Fajr {}°, Isha {}°",
            calculation.fajr_angle,
            calculation.isha_angle
        );
        log_indented!(
            "Asr method: {}",
            match calculation.asr_method {
                AsrMethod::Standard => "standard",
                AsrMethod::Hanafi => "hanafi",
            }
        );
        log_indented!(
            "High latitude rule: {}",
            calculation.high_latitude_rule.as_str()
        );
        log_indented!("Offsets: {}", calculation.offsets);

        let prayers = &settings.prayers;
        let enabled: Vec<&str> = prayers.enabled.iter().map(|p| p.as_str()).collect();
        log_indented!("Enabled: {}", enabled.join(", "));
        log_indented!("Voice: {}", prayers.voice.as_str());
        log_indented!("Volume: {}%", prayers.volume.default);
        for (prayer, volume) in &prayers.volume.per_prayer {
            log_indented!("  {}: {volume}%", prayer.as_str());
        }
        if prayers.pre_alert_minutes > 0 {
            log_indented!(
                "Pre-alert: {} min before each prayer ({})",
                prayers.pre_alert_minutes,
                match prayers.pre_alert_overlap {
                    OverlapPolicy::Clamp => "clamped to the previous adhan",
                    OverlapPolicy::Suppress => "dropped when overlapping",
                }
            );
        }

        log_indented!("Player: {}", self.player());
        log_indented!(
            "Playback timeout: {}s, retries: {} (at most {}s per event)",
            settings.playback.timeout.as_secs(),
            settings.playback.retries,
            settings.playback.worst_case().as_secs()
        );
    }
}

/// Expand a leading `~/` to the home directory.
fn expand_home(path: &Path) -> PathBuf {
    if let Ok(rest) = path.strip_prefix("~")
        && let Some(home) = dirs::home_dir()
    {
        return home.join(rest);
    }
    path.to_path_buf()
}

/// Settings read from `vakit.toml` on every load.
pub struct FileSettings {
    path: PathBuf,
}

impl FileSettings {
    pub fn new(path: PathBuf) -> Self {
        Self { path }
    }

    /// The file at the configured location (`--config` or XDG).
    pub fn from_config_dir() -> Result<Self> {
        Ok(Self::new(get_config_path()?))
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl SettingsSource for FileSettings {
    fn load(&self) -> Result<ScheduleSettings> {
        load_from_path(&self.path)?.to_schedule_settings()
    }

    fn describe(&self) -> String {
        private_path(&self.path)
    }
}

/// A fixed snapshot, used by the simulator and by tests.
pub struct StaticSettings {
    settings: ScheduleSettings,
}

impl StaticSettings {
    pub fn new(settings: ScheduleSettings) -> Self {
        Self { settings }
    }
}

impl SettingsSource for StaticSettings {
    fn load(&self) -> Result<ScheduleSettings> {
        Ok(self.settings.clone())
    }

    fn describe(&self) -> String {
        format!("built-in settings for {}", self.settings.location.describe())
    }
}
