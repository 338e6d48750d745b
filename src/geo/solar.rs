//! Low-precision solar coordinates for prayer-time calculations.
//!
//! Uses the almanac approximation published by the US Naval Observatory
//! (accurate to about one arc-minute between 1950 and 2050), which is the
//! same model most prayer-time tools are built on. Everything here is pure:
//! angles are in degrees, times of day in fractional hours.

use chrono::{Datelike, NaiveDate};

/// Julian day of J2000.0.
const J2000: f64 = 2_451_545.0;

fn sin_deg(d: f64) -> f64 {
    d.to_radians().sin()
}

fn cos_deg(d: f64) -> f64 {
    d.to_radians().cos()
}

fn tan_deg(d: f64) -> f64 {
    d.to_radians().tan()
}

/// Reduce `a` into `[0, b)`.
pub fn fix(a: f64, b: f64) -> f64 {
    let r = a - b * (a / b).floor();
    if r < 0.0 { r + b } else { r }
}

/// Julian day number at 00:00 UT of the civil date (Meeus, chapter 7).
pub fn julian_day(date: NaiveDate) -> f64 {
    let (mut year, mut month) = (date.year() as f64, date.month() as f64);
    let day = date.day() as f64;
    if month <= 2.0 {
        year -= 1.0;
        month += 12.0;
    }
    let a = (year / 100.0).floor();
    let b = 2.0 - a + (a / 4.0).floor();
    (365.25 * (year + 4716.0)).floor() + (30.6001 * (month + 1.0)).floor() + day + b - 1524.5
}

/// Sun declination and equation of time for one instant.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SolarPosition {
    /// Declination in degrees.
    pub declination: f64,
    /// Equation of time in hours (apparent minus mean solar time).
    pub equation_of_time: f64,
}

/// Solar position at Julian day `jd`.
pub fn sun_position(jd: f64) -> SolarPosition {
    let d = jd - J2000;

    let mean_anomaly = fix(357.529 + 0.985_600_28 * d, 360.0);
    let mean_longitude = fix(280.459 + 0.985_647_36 * d, 360.0);
    let ecliptic_longitude = fix(
        mean_longitude + 1.915 * sin_deg(mean_anomaly) + 0.020 * sin_deg(2.0 * mean_anomaly),
        360.0,
    );
    let obliquity = 23.439 - 0.000_000_36 * d;

    let right_ascension = (cos_deg(obliquity) * sin_deg(ecliptic_longitude))
        .atan2(cos_deg(ecliptic_longitude))
        .to_degrees()
        / 15.0;

    SolarPosition {
        declination: (sin_deg(obliquity) * sin_deg(ecliptic_longitude))
            .asin()
            .to_degrees(),
        equation_of_time: mean_longitude / 15.0 - fix(right_ascension, 24.0),
    }
}

/// Hours between solar noon and the moment the sun is `depression` degrees
/// below the horizon. `None` when the sun never gets that low or that high.
pub fn hour_angle(depression: f64, latitude: f64, declination: f64) -> Option<f64> {
    let cos_h = (-sin_deg(depression) - sin_deg(declination) * sin_deg(latitude))
        / (cos_deg(declination) * cos_deg(latitude));
    if !cos_h.is_finite() || cos_h.abs() > 1.0 {
        return None;
    }
    Some(cos_h.acos().to_degrees() / 15.0)
}

/// Sun altitude (as a depression angle) at which an object's shadow equals
/// `shadow_factor` times its height plus its noon shadow.
pub fn asr_depression(shadow_factor: f64, latitude: f64, declination: f64) -> f64 {
    let noon_shadow = tan_deg((latitude - declination).abs());
    -(1.0 / (shadow_factor + noon_shadow)).atan().to_degrees()
}

/// Which side of solar noon an angle time lies on.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Side {
    Morning,
    Evening,
}

/// One civil date at one place, shifted so `t` in the helpers is the local
/// mean time as a day fraction.
#[derive(Debug, Clone, Copy)]
pub struct SolarDay {
    jd: f64,
    latitude: f64,
}

impl SolarDay {
    pub fn new(date: NaiveDate, latitude: f64, longitude: f64) -> Self {
        Self {
            jd: julian_day(date) - longitude / (15.0 * 24.0),
            latitude,
        }
    }

    /// Solar noon in local mean hours, evaluated near day fraction `t`.
    pub fn midday(&self, t: f64) -> f64 {
        let eqt = sun_position(self.jd + t).equation_of_time;
        fix(12.0 - eqt, 24.0)
    }

    /// Time the sun reaches `depression` degrees below the horizon.
    pub fn angle_time(&self, depression: f64, t: f64, side: Side) -> Option<f64> {
        let declination = sun_position(self.jd + t).declination;
        let noon = self.midday(t);
        let offset = hour_angle(depression, self.latitude, declination)?;
        Some(match side {
            Side::Morning => noon - offset,
            Side::Evening => noon + offset,
        })
    }

    /// Afternoon time at which the shadow ratio reaches `shadow_factor`.
    pub fn asr_time(&self, shadow_factor: f64, t: f64) -> Option<f64> {
        let declination = sun_position(self.jd + t).declination;
        let depression = asr_depression(shadow_factor, self.latitude, declination);
        self.angle_time(depression, t, Side::Evening)
    }
}
