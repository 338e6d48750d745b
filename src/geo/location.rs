//! The observer location all calculations are made for.

use chrono_tz::Tz;

use crate::common::utils::format_coordinates;
use crate::error::CalculationError;

/// A validated observer position.
///
/// Construction goes through [`Location::new`], so a `Location` in hand always
/// has finite, in-range coordinates.
#[derive(Debug, Clone, PartialEq)]
pub struct Location {
    latitude: f64,
    longitude: f64,
    elevation: Option<f64>,
    timezone: Tz,
    city: Option<String>,
}

impl Location {
    pub fn new(latitude: f64, longitude: f64, timezone: Tz) -> Result<Self, CalculationError> {
        if !latitude.is_finite() || !(-90.0..=90.0).contains(&latitude) {
            return Err(CalculationError::InvalidLocation(format!(
                "latitude must be between -90 and 90 degrees (got {latitude})"
            )));
        }
        if !longitude.is_finite() || !(-180.0..=180.0).contains(&longitude) {
            return Err(CalculationError::InvalidLocation(format!(
                "longitude must be between -180 and 180 degrees (got {longitude})"
            )));
        }
        Ok(Self {
            latitude,
            longitude,
            elevation: None,
            timezone,
            city: None,
        })
    }

    /// Observer height above sea level in meters; lowers the apparent horizon.
    pub fn with_elevation(mut self, meters: f64) -> Result<Self, CalculationError> {
        if !meters.is_finite() || meters < 0.0 {
            return Err(CalculationError::InvalidLocation(format!(
                "elevation must be a non-negative number of meters (got {meters})"
            )));
        }
        self.elevation = Some(meters);
        Ok(self)
    }

    pub fn with_city(mut self, city: impl Into<String>) -> Self {
        let city = city.into();
        self.city = (!city.trim().is_empty()).then_some(city);
        self
    }

    pub fn latitude(&self) -> f64 {
        self.latitude
    }

    pub fn longitude(&self) -> f64 {
        self.longitude
    }

    pub fn elevation(&self) -> f64 {
        self.elevation.unwrap_or(0.0)
    }

    pub fn timezone(&self) -> Tz {
        self.timezone
    }

    pub fn city(&self) -> Option<&str> {
        self.city.as_deref()
    }

    /// `Istanbul (41.0082°N, 28.9784°E)` or just the coordinates.
    pub fn describe(&self) -> String {
        let coords = format_coordinates(self.latitude, self.longitude);
        match &self.city {
            Some(city) => format!("{city} ({coords})"),
            None => coords,
        }
    }
}
