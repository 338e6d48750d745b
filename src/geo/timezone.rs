//! Timezone resolution for the configured location.
//!
//! `timezone = "auto"` looks the zone up from the coordinates with an offline
//! boundary database, so a location is self-contained and does not depend on
//! the timezone of the machine the daemon runs on.

use anyhow::{Context, Result};
use chrono_tz::Tz;
use std::sync::OnceLock;
use tzf_rs::DefaultFinder;

static FINDER: OnceLock<DefaultFinder> = OnceLock::new();

/// Look up the IANA timezone containing the coordinates.
///
/// Open-sea coordinates resolve to the nautical `Etc/GMT±N` zones; anything
/// chrono-tz does not know falls back to UTC with a warning.
pub fn determine_timezone_from_coordinates(latitude: f64, longitude: f64) -> Tz {
    let finder = FINDER.get_or_init(DefaultFinder::new);
    let name = finder.get_tz_name(longitude, latitude);

    match name.parse::<Tz>() {
        Ok(tz) => tz,
        Err(_) => {
            log_warning!("Unknown timezone '{name}' for {latitude:.4}, {longitude:.4}, using UTC");
            Tz::UTC
        }
    }
}

/// Resolve a configured timezone value: `"auto"` or an IANA name.
pub fn resolve_timezone(value: &str, latitude: f64, longitude: f64) -> Result<Tz> {
    if value.trim().eq_ignore_ascii_case("auto") {
        return Ok(determine_timezone_from_coordinates(latitude, longitude));
    }
    value
        .trim()
        .parse::<Tz>()
        .map_err(|e| anyhow::anyhow!("{e}"))
        .with_context(|| format!("Invalid timezone '{value}' (expected \"auto\" or an IANA name)"))
}

/// True for the zones where Diyanet offsets apply by default.
pub fn is_turkish_timezone(tz: Tz) -> bool {
    matches!(tz, Tz::Europe__Istanbul | Tz::Asia__Istanbul)
}
