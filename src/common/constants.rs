//! Application-wide defaults and validation limits.

// # Location defaults

/// Used when the config file names no coordinates (Istanbul, Fatih).
pub const DEFAULT_LATITUDE: f64 = 41.0082;
pub const DEFAULT_LONGITUDE: f64 = 28.9784;
pub const DEFAULT_CITY: &str = "İstanbul";
/// `"auto"` resolves the zone from the coordinates.
pub const DEFAULT_TIMEZONE: &str = "auto";
pub const MAXIMUM_ELEVATION_METERS: f64 = 9_000.0;

// # Calculation defaults

/// Sun depression angle for Fajr in degrees.
pub const DEFAULT_FAJR_ANGLE: f64 = 18.0;
/// Sun depression angle for Isha in degrees.
pub const DEFAULT_ISHA_ANGLE: f64 = 17.0;
/// Accepted range for depression angles (exclusive lower bound).
pub const MINIMUM_TWILIGHT_ANGLE: f64 = 0.0;
pub const MAXIMUM_TWILIGHT_ANGLE: f64 = 30.0;

/// Apparent sun altitude at sunrise/sunset: refraction plus semi-diameter.
pub const HORIZON_DEPRESSION: f64 = 0.833;
/// Horizon dip per square root of observer elevation in meters.
pub const ELEVATION_DIP_FACTOR: f64 = 0.0347;

/// Latitude used when the sun never rises or never sets at the real one.
pub const POLAR_FALLBACK_LATITUDE: f64 = 65.0;

/// Degrees the fallback latitude moves toward the equator per retry.
pub const POLAR_FALLBACK_STEP: f64 = 1.0;

/// Per-prayer offsets can move an event by at most this many minutes.
pub const MAXIMUM_OFFSET_MINUTES: i64 = 120;

/// `"auto"` applies the Diyanet margins for Turkish timezones only.
pub const DEFAULT_OFFSETS_PRESET: &str = "auto";

/// Minimum gap enforced between consecutive prayer times.
pub const ORDERING_GUARD_MINUTES: i64 = 1;

// # Calendar defaults

pub const DEFAULT_VOLUME: u8 = 80;
pub const MAXIMUM_VOLUME: u8 = 100;
pub const DEFAULT_PRE_ALERT_MINUTES: u32 = 0;
pub const MAXIMUM_PRE_ALERT_MINUTES: u32 = 180;

// # Engine timing

/// The engine stops listening for commands this close to an event.
pub const ARM_WINDOW_MS: u64 = 2_000;
/// A late wake still fires an event that is at most this old.
pub const MISFIRE_GRACE_SECS: i64 = 60;
/// Backward clock movement tolerated before a full rebuild.
pub const CLOCK_REGRESSION_TOLERANCE_MS: i64 = 1_000;
/// Longest single real-time sleep; keeps the loop responsive to wall-clock drift.
pub const MAXIMUM_SLEEP_CHUNK_SECS: u64 = 300;
/// Terminal records kept for status queries.
pub const HISTORY_CAPACITY: usize = 200;

// # Playback defaults

pub const DEFAULT_PLAYBACK_TIMEOUT_SECS: u64 = 600;
pub const MINIMUM_PLAYBACK_TIMEOUT_SECS: u64 = 5;
pub const MAXIMUM_PLAYBACK_TIMEOUT_SECS: u64 = 1_800;
pub const DEFAULT_PLAYBACK_RETRIES: u32 = 2;
pub const MAXIMUM_PLAYBACK_RETRIES: u32 = 10;
pub const DEFAULT_RETRY_BACKOFF_MS: u64 = 2_000;
pub const MAXIMUM_RETRY_BACKOFF_MS: u64 = 60_000;
pub const DEFAULT_PLAYER: &str = "auto";

// # Files

pub const CONFIG_FILE_NAME: &str = "vakit.toml";
pub const APP_DIR_NAME: &str = "vakit";
pub const LOCK_FILE_NAME: &str = "vakitd.lock";
pub const JOURNAL_FILE_NAME: &str = "journal.json";
/// Fire marks older than this many days are pruned from the journal.
pub const JOURNAL_RETENTION_DAYS: u64 = 2;

// # Config watcher

pub const CONFIG_RELOAD_DEBOUNCE_MS: u64 = 500;

// # Exit codes

pub const EXIT_SUCCESS: i32 = 0;
pub const EXIT_FAILURE: i32 = 1;
