//! Astronomical prayer-time calculation.
//!
//! ## Module Structure
//!
//! - [`solar`]: sun declination, equation of time and hour angles
//! - [`location`]: validated observer position with timezone
//! - [`method`]: twilight angles, Asr convention, high-latitude rule, offsets
//! - [`times`]: the calculator producing [`DailyTimes`] for a civil date
//! - [`timezone`]: coordinate-based timezone lookup for `timezone = "auto"`
//!
//! The calculator is a pure function of its inputs; the engine caches its
//! output per date and only recomputes when the date, the location or a
//! calculation parameter changes.

pub mod location;
pub mod method;
pub mod solar;
pub mod times;
pub mod timezone;

pub use location::Location;
pub use method::{AsrMethod, CalculationSettings, HighLatitudeRule, PrayerOffsets};
pub use times::{Adjustments, DailyTimes, compute, times_for};
pub use timezone::{determine_timezone_from_coordinates, resolve_timezone};

#[cfg(test)]
mod tests;
