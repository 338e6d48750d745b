use chrono::{Duration, NaiveDate, Timelike};
use chrono_tz::Tz;
use proptest::prelude::*;
use std::collections::{BTreeSet, HashSet};

use vakit::calendar::{self, OverlapPolicy, PrayerSettings};
use vakit::geo::{self, AsrMethod, CalculationSettings, HighLatitudeRule, Location};
use vakit::prayer::{EventKind, PrayerKind};

/// Latitudes where sunrise, sunset and Asr always resolve without the polar fallback.
fn temperate_latitude_strategy() -> impl Strategy<Value = f64> {
    -60.0..=60.0
}

fn longitude_strategy() -> impl Strategy<Value = f64> {
    -180.0..=180.0
}

fn date_strategy() -> impl Strategy<Value = NaiveDate> {
    (1990i32..=2060, 1u32..=365).prop_map(|(year, ordinal)| {
        NaiveDate::from_yo_opt(year, ordinal).expect("ordinal 1..=365 exists in every year")
    })
}

fn calculation_strategy() -> impl Strategy<Value = CalculationSettings> {
    (
        10.0f64..=20.0,
        10.0f64..=20.0,
        prop_oneof![Just(AsrMethod::Standard), Just(AsrMethod::Hanafi)],
        prop_oneof![
            Just(HighLatitudeRule::AngleBased),
            Just(HighLatitudeRule::OneSeventh),
            Just(HighLatitudeRule::MiddleOfNight),
        ],
    )
        .prop_map(|(fajr_angle, isha_angle, asr_method, high_latitude_rule)| {
            CalculationSettings {
                fajr_angle,
                isha_angle,
                asr_method,
                high_latitude_rule,
                ..CalculationSettings::default()
            }
        })
}

fn enabled_strategy() -> impl Strategy<Value = BTreeSet<PrayerKind>> {
    proptest::sample::subsequence(PrayerKind::USER_FACING.to_vec(), 0..=5)
        .prop_map(|prayers| prayers.into_iter().collect())
}

fn prayer_settings_strategy() -> impl Strategy<Value = PrayerSettings> {
    (
        enabled_strategy(),
        0u32..=180,
        prop_oneof![Just(OverlapPolicy::Clamp), Just(OverlapPolicy::Suppress)],
    )
        .prop_map(|(enabled, pre_alert_minutes, pre_alert_overlap)| PrayerSettings {
            enabled,
            pre_alert_minutes,
            pre_alert_overlap,
            ..PrayerSettings::default()
        })
}

/// Property tests for the prayer-time calculator
mod calculator_properties {
    use super::*;

    proptest! {
        #[test]
        fn test_times_are_strictly_increasing(
            lat in temperate_latitude_strategy(),
            lon in longitude_strategy(),
            date in date_strategy(),
            settings in calculation_strategy(),
        ) {
            let location = Location::new(lat, lon, Tz::UTC).unwrap();
            let times = geo::compute(date, &location, &settings).unwrap();

            for pair in PrayerKind::ALL.windows(2) {
                prop_assert!(
                    times.get(pair[0]) < times.get(pair[1]),
                    "{} !< {} at ({lat}, {lon}) on {date}",
                    pair[0],
                    pair[1]
                );
            }
        }

        #[test]
        fn test_times_are_whole_minutes(
            lat in temperate_latitude_strategy(),
            lon in longitude_strategy(),
            date in date_strategy(),
        ) {
            let location = Location::new(lat, lon, Tz::UTC).unwrap();
            let times = geo::compute(date, &location, &CalculationSettings::default()).unwrap();
            for (_, at) in times.iter() {
                prop_assert_eq!(at.second(), 0);
                prop_assert_eq!(at.nanosecond(), 0);
            }
        }

        /// Polar days fall back to a clamped latitude instead of failing.
        #[test]
        fn test_polar_latitudes_still_produce_ordered_days(
            lat in prop_oneof![66.0f64..=89.9, -89.9f64..=-66.0],
            lon in longitude_strategy(),
            elevation in 0.0f64..=3_000.0,
            date in date_strategy(),
            settings in calculation_strategy(),
        ) {
            let location = Location::new(lat, lon, Tz::UTC)
                .unwrap()
                .with_elevation(elevation)
                .unwrap();
            let times = geo::compute(date, &location, &settings).unwrap();
            for pair in PrayerKind::ALL.windows(2) {
                prop_assert!(times.get(pair[0]) < times.get(pair[1]));
            }
        }

        #[test]
        fn test_offsets_shift_by_exact_minutes(
            lat in temperate_latitude_strategy(),
            lon in longitude_strategy(),
            date in date_strategy(),
            minutes in -10i64..=10,
        ) {
            let location = Location::new(lat, lon, Tz::UTC).unwrap();
            let base = CalculationSettings::default();
            let shifted = CalculationSettings {
                offsets: base.offsets.with(PrayerKind::Dhuhr, minutes),
                ..base
            };

            let plain = geo::compute(date, &location, &base).unwrap();
            let moved = geo::compute(date, &location, &shifted).unwrap();
            // Dhuhr sits hours away from its neighbours, so the guard never interferes
            prop_assert_eq!(
                moved.get(PrayerKind::Dhuhr) - plain.get(PrayerKind::Dhuhr),
                Duration::minutes(minutes)
            );
        }
    }

    #[test]
    fn test_times_for_matches_daily_compute() {
        let location = Location::new(41.0082, 28.9784, Tz::Europe__Istanbul).unwrap();
        let settings = CalculationSettings::default();
        // Crosses a month boundary
        let start = NaiveDate::from_ymd_opt(2024, 10, 27).unwrap();

        let days = geo::times_for(start, 10, &location, &settings).unwrap();
        assert_eq!(days.len(), 10);
        for (offset, day) in days.iter().enumerate() {
            let date = start + Duration::days(offset as i64);
            assert_eq!(day.date(), date);
            assert_eq!(day, &geo::compute(date, &location, &settings).unwrap());
        }
    }
}

/// Property tests for the calendar builder
mod calendar_properties {
    use super::*;

    fn istanbul_times(date: NaiveDate) -> geo::DailyTimes {
        let location = Location::new(41.0082, 28.9784, Tz::Europe__Istanbul).unwrap();
        geo::compute(date, &location, &CalculationSettings::default()).unwrap()
    }

    proptest! {
        #[test]
        fn test_build_is_deterministic_with_unique_keys(
            date in date_strategy(),
            settings in prayer_settings_strategy(),
        ) {
            let times = istanbul_times(date);
            let first = calendar::build(&times, &settings);
            let second = calendar::build(&times, &settings);
            prop_assert_eq!(&first, &second);

            let keys: HashSet<_> = first.iter().map(|e| e.key()).collect();
            prop_assert_eq!(keys.len(), first.len());

            for pair in first.windows(2) {
                prop_assert!(pair[0].at <= pair[1].at);
            }
        }

        #[test]
        fn test_one_adhan_per_enabled_prayer(
            date in date_strategy(),
            settings in prayer_settings_strategy(),
        ) {
            let events = calendar::build(&istanbul_times(date), &settings);
            let mains: BTreeSet<_> = events
                .iter()
                .filter(|e| e.kind == EventKind::Main)
                .map(|e| e.prayer)
                .collect();
            prop_assert_eq!(mains, settings.enabled.clone());
            prop_assert!(events.iter().all(|e| e.prayer != PrayerKind::Sunrise));
        }

        /// A pre-alert never precedes the previous enabled prayer's adhan.
        #[test]
        fn test_pre_alerts_stay_between_adhans(
            date in date_strategy(),
            settings in prayer_settings_strategy(),
        ) {
            let times = istanbul_times(date);
            let events = calendar::build(&times, &settings);

            let mut previous_main = None;
            for prayer in PrayerKind::USER_FACING {
                if !settings.enabled.contains(&prayer) {
                    continue;
                }
                let main = times.get(prayer);
                let alert = events
                    .iter()
                    .find(|e| e.prayer == prayer && e.kind == EventKind::PreAlert);

                match (settings.pre_alert_minutes, alert) {
                    (0, alert) => prop_assert!(alert.is_none()),
                    (_, Some(alert)) => {
                        prop_assert!(alert.at <= main);
                        if let Some(previous) = previous_main {
                            prop_assert!(alert.at >= previous);
                        }
                    }
                    (minutes, None) => {
                        // Only the suppress policy drops a pre-alert, and only on overlap
                        prop_assert_eq!(settings.pre_alert_overlap, OverlapPolicy::Suppress);
                        let previous = previous_main.expect("first prayer always gets its pre-alert");
                        prop_assert!(main - Duration::minutes(i64::from(minutes)) < previous);
                    }
                }
                previous_main = Some(main);
            }
        }
    }
}
