//! Daily prayer times with full timezone context.
//!
//! [`compute`] turns a civil date, a [`Location`] and [`CalculationSettings`]
//! into a [`DailyTimes`]: six instants in the location's timezone, strictly
//! increasing in [`PrayerKind`] order. Storing `DateTime<Tz>` rather than wall
//! clock times keeps an Isha that falls after local midnight on the correct
//! day and makes countdowns plain subtraction.
//!
//! ## Fallbacks
//!
//! Near the poles the sun may never cross the angles the method asks for.
//! The calculator handles this in fixed, documented steps and records each
//! one in [`Adjustments`]:
//!
//! 1. If sunrise, sunset or Asr cannot be resolved, the day is recomputed at
//!    the latitude clamped to ±65°. Should that still leave them unresolved
//!    (a high elevation widens the horizon), the elevation dip is dropped,
//!    then the latitude moves toward the equator one degree at a time.
//! 2. Fajr and Isha are bounded by the configured [`HighLatitudeRule`]: never
//!    further from sunrise/sunset than the rule's portion of the night.
//! 3. After offsets and rounding, each time is pushed to at least one minute
//!    after the previous one.

use chrono::{DateTime, Duration, NaiveDate, Utc};
use chrono_tz::Tz;

use super::location::Location;
use super::method::CalculationSettings;
use super::solar::{Side, SolarDay};
use crate::common::constants::*;
use crate::error::CalculationError;
use crate::prayer::PrayerKind;

/// Two passes refine the initial guesses to well under a second.
const REFINEMENT_PASSES: usize = 2;

/// Initial estimates in local mean hours, in `PrayerKind::ALL` order.
const INITIAL_ESTIMATES: [f64; 6] = [5.0, 6.0, 12.0, 13.0, 18.0, 18.0];

/// Which documented fallbacks shaped a day's times.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct Adjustments {
    /// Latitude actually used when the real one has no sunrise or sunset.
    pub clamped_latitude: Option<f64>,
    /// The horizon was computed without the elevation dip.
    pub elevation_ignored: bool,
    /// Fajr was set from the night portion instead of the twilight angle.
    pub fajr_from_night_portion: bool,
    /// Isha was set from the night portion instead of the twilight angle.
    pub isha_from_night_portion: bool,
    /// At least one time was nudged to keep strict ordering.
    pub ordering_guard: bool,
}

impl Adjustments {
    pub fn any(&self) -> bool {
        self.clamped_latitude.is_some()
            || self.elevation_ignored
            || self.fajr_from_night_portion
            || self.isha_from_night_portion
            || self.ordering_guard
    }
}

/// The six moments of one civil date. Immutable once built.
#[derive(Debug, Clone, PartialEq)]
pub struct DailyTimes {
    date: NaiveDate,
    timezone: Tz,
    times: [DateTime<Tz>; 6],
    adjustments: Adjustments,
}

impl DailyTimes {
    /// Assemble a day from already-known instants, in `PrayerKind::ALL` order.
    ///
    /// Rejects sequences that are not strictly increasing.
    pub fn from_parts(
        date: NaiveDate,
        timezone: Tz,
        times: [DateTime<Tz>; 6],
    ) -> Result<Self, CalculationError> {
        for pair in PrayerKind::ALL.windows(2) {
            if times[pair[1].index()] <= times[pair[0].index()] {
                return Err(CalculationError::UnresolvableAngle {
                    prayer: pair[1],
                    date,
                });
            }
        }
        Ok(Self {
            date,
            timezone,
            times,
            adjustments: Adjustments::default(),
        })
    }

    pub fn date(&self) -> NaiveDate {
        self.date
    }

    pub fn timezone(&self) -> Tz {
        self.timezone
    }

    pub fn get(&self, prayer: PrayerKind) -> DateTime<Tz> {
        self.times[prayer.index()]
    }

    pub fn adjustments(&self) -> &Adjustments {
        &self.adjustments
    }

    /// All six moments in chronological order.
    pub fn iter(&self) -> impl Iterator<Item = (PrayerKind, DateTime<Tz>)> + '_ {
        PrayerKind::ALL.iter().map(move |p| (*p, self.times[p.index()]))
    }
}

/// Raw solution for one latitude, in local mean hours.
fn solve(day: &SolarDay, settings: &CalculationSettings, horizon: f64) -> [Option<f64>; 6] {
    let mut estimates = INITIAL_ESTIMATES;
    let mut solved = [None; 6];

    for _ in 0..REFINEMENT_PASSES {
        let at = |prayer: PrayerKind| estimates[prayer.index()] / 24.0;
        solved = [
            day.angle_time(settings.fajr_angle, at(PrayerKind::Fajr), Side::Morning),
            day.angle_time(horizon, at(PrayerKind::Sunrise), Side::Morning),
            Some(day.midday(at(PrayerKind::Dhuhr))),
            day.asr_time(settings.asr_method.shadow_factor(), at(PrayerKind::Asr)),
            day.angle_time(horizon, at(PrayerKind::Maghrib), Side::Evening),
            day.angle_time(settings.isha_angle, at(PrayerKind::Isha), Side::Evening),
        ];
        // An unresolved value keeps its previous estimate as the next seed
        for (estimate, value) in estimates.iter_mut().zip(solved.iter()) {
            if let Some(v) = value {
                *estimate = *v;
            }
        }
    }

    solved
}

fn needs_polar_fallback(solved: &[Option<f64>; 6]) -> bool {
    [PrayerKind::Sunrise, PrayerKind::Asr, PrayerKind::Maghrib]
        .iter()
        .any(|p| solved[p.index()].is_none())
}

/// Walk the fallbacks until sunrise, sunset and Asr all resolve.
///
/// Terminates at the equator at the latest, where every one of them does.
fn solve_with_fallback(
    date: NaiveDate,
    location: &Location,
    settings: &CalculationSettings,
    mut horizon: f64,
    adjustments: &mut Adjustments,
) -> [Option<f64>; 6] {
    let mut latitude = location
        .latitude()
        .clamp(-POLAR_FALLBACK_LATITUDE, POLAR_FALLBACK_LATITUDE);

    loop {
        let solved = solve(
            &SolarDay::new(date, latitude, location.longitude()),
            settings,
            horizon,
        );
        if !needs_polar_fallback(&solved) || latitude == 0.0 {
            if latitude != location.latitude() {
                adjustments.clamped_latitude = Some(latitude);
            }
            return solved;
        }
        if horizon > HORIZON_DEPRESSION {
            horizon = HORIZON_DEPRESSION;
            adjustments.elevation_ignored = true;
        } else {
            latitude -= POLAR_FALLBACK_STEP.min(latitude.abs()) * latitude.signum();
        }
    }
}

fn round_to_minute(instant: DateTime<Utc>) -> Option<DateTime<Utc>> {
    let millis = instant.timestamp_millis();
    DateTime::from_timestamp_millis((millis + 30_000).div_euclid(60_000) * 60_000)
}

/// Compute the prayer times of `date` at `location`.
pub fn compute(
    date: NaiveDate,
    location: &Location,
    settings: &CalculationSettings,
) -> Result<DailyTimes, CalculationError> {
    settings.validate()?;

    let horizon = HORIZON_DEPRESSION + ELEVATION_DIP_FACTOR * location.elevation().sqrt();
    let mut adjustments = Adjustments::default();

    let mut solved = solve(
        &SolarDay::new(date, location.latitude(), location.longitude()),
        settings,
        horizon,
    );
    if needs_polar_fallback(&solved) {
        solved = solve_with_fallback(date, location, settings, horizon, &mut adjustments);
    }

    let unresolved = |prayer: PrayerKind| CalculationError::UnresolvableAngle { prayer, date };
    let sunrise = solved[PrayerKind::Sunrise.index()].ok_or(unresolved(PrayerKind::Sunrise))?;
    let maghrib = solved[PrayerKind::Maghrib.index()].ok_or(unresolved(PrayerKind::Maghrib))?;
    let night = 24.0 - (maghrib - sunrise);

    let fajr_portion = settings
        .high_latitude_rule
        .night_portion(settings.fajr_angle, night);
    match solved[PrayerKind::Fajr.index()] {
        Some(fajr) if sunrise - fajr <= fajr_portion => {}
        _ => {
            solved[PrayerKind::Fajr.index()] = Some(sunrise - fajr_portion);
            adjustments.fajr_from_night_portion = true;
        }
    }

    let isha_portion = settings
        .high_latitude_rule
        .night_portion(settings.isha_angle, night);
    match solved[PrayerKind::Isha.index()] {
        Some(isha) if isha - maghrib <= isha_portion => {}
        _ => {
            solved[PrayerKind::Isha.index()] = Some(maghrib + isha_portion);
            adjustments.isha_from_night_portion = true;
        }
    }

    let midnight_utc = date
        .and_hms_opt(0, 0, 0)
        .map(|naive| naive.and_utc())
        .ok_or(unresolved(PrayerKind::Fajr))?;

    let mut instants = Vec::with_capacity(PrayerKind::ALL.len());
    for prayer in PrayerKind::ALL {
        let hours = solved[prayer.index()]
            .filter(|h| h.is_finite())
            .ok_or(unresolved(prayer))?;
        let utc_hours = hours - location.longitude() / 15.0;
        let offset = Duration::milliseconds((utc_hours * 3_600_000.0).round() as i64)
            + Duration::minutes(settings.offsets.get(prayer));
        let instant = round_to_minute(midnight_utc + offset).ok_or(unresolved(prayer))?;
        instants.push(instant);
    }

    for i in 1..instants.len() {
        let floor = instants[i - 1] + Duration::minutes(ORDERING_GUARD_MINUTES);
        if instants[i] < floor {
            instants[i] = floor;
            adjustments.ordering_guard = true;
        }
    }

    let tz = location.timezone();
    let times: [DateTime<Tz>; 6] = std::array::from_fn(|i| instants[i].with_timezone(&tz));

    Ok(DailyTimes {
        date,
        timezone: tz,
        times,
        adjustments,
    })
}

/// Times for `days` consecutive dates starting at `start`.
pub fn times_for(
    start: NaiveDate,
    days: u32,
    location: &Location,
    settings: &CalculationSettings,
) -> Result<Vec<DailyTimes>, CalculationError> {
    start
        .iter_days()
        .take(days as usize)
        .map(|date| compute(date, location, settings))
        .collect()
}
