#[cfg(test)]
mod prayer_time_tests {
    use crate::error::CalculationError;
    use crate::geo::*;
    use crate::prayer::PrayerKind;
    use chrono::{DateTime, NaiveDate, TimeZone};
    use chrono_tz::Tz;

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    fn istanbul() -> Location {
        Location::new(41.0082, 28.9784, Tz::Europe__Istanbul)
            .unwrap()
            .with_city("Istanbul")
    }

    fn local(tz: Tz, y: i32, m: u32, d: u32, h: u32, min: u32) -> DateTime<Tz> {
        tz.with_ymd_and_hms(y, m, d, h, min, 0).unwrap()
    }

    fn assert_close(actual: DateTime<Tz>, expected: DateTime<Tz>, prayer: PrayerKind) {
        let diff = (actual - expected).num_seconds().abs();
        assert!(
            diff <= 60,
            "{prayer}: expected {expected}, got {actual} ({diff}s off)"
        );
    }

    fn assert_strictly_increasing(times: &DailyTimes) {
        for pair in PrayerKind::ALL.windows(2) {
            assert!(
                times.get(pair[0]) < times.get(pair[1]),
                "{} ({}) is not before {} ({}) on {}",
                pair[0],
                times.get(pair[0]),
                pair[1],
                times.get(pair[1]),
                times.date()
            );
        }
    }

    /// Istanbul at the June solstice, 18°/17°, standard Asr, no offsets.
    #[test]
    fn test_istanbul_golden_fixture() {
        let tz = Tz::Europe__Istanbul;
        let times = compute(date(2024, 6, 21), &istanbul(), &CalculationSettings::default())
            .unwrap();

        let expected = [
            (PrayerKind::Fajr, local(tz, 2024, 6, 21, 3, 24)),
            (PrayerKind::Sunrise, local(tz, 2024, 6, 21, 5, 32)),
            (PrayerKind::Dhuhr, local(tz, 2024, 6, 21, 13, 6)),
            (PrayerKind::Asr, local(tz, 2024, 6, 21, 17, 7)),
            (PrayerKind::Maghrib, local(tz, 2024, 6, 21, 20, 40)),
            (PrayerKind::Isha, local(tz, 2024, 6, 21, 22, 38)),
        ];
        for (prayer, when) in expected {
            assert_close(times.get(prayer), when, prayer);
        }
        assert!(!times.adjustments().any());
    }

    #[test]
    fn test_winter_and_equinox_istanbul() {
        let tz = Tz::Europe__Istanbul;
        let settings = CalculationSettings::default();

        let winter = compute(date(2024, 12, 21), &istanbul(), &settings).unwrap();
        assert_close(winter.get(PrayerKind::Fajr), local(tz, 2024, 12, 21, 6, 46), PrayerKind::Fajr);
        assert_close(winter.get(PrayerKind::Asr), local(tz, 2024, 12, 21, 15, 21), PrayerKind::Asr);
        assert_close(winter.get(PrayerKind::Isha), local(tz, 2024, 12, 21, 19, 13), PrayerKind::Isha);

        let equinox = compute(date(2024, 3, 20), &istanbul(), &settings).unwrap();
        assert_close(equinox.get(PrayerKind::Sunrise), local(tz, 2024, 3, 20, 7, 7), PrayerKind::Sunrise);
        assert_close(equinox.get(PrayerKind::Maghrib), local(tz, 2024, 3, 20, 19, 17), PrayerKind::Maghrib);
    }

    #[test]
    fn test_times_are_whole_minutes_in_location_timezone() {
        let times = compute(date(2024, 6, 21), &istanbul(), &CalculationSettings::default())
            .unwrap();
        for (_, when) in times.iter() {
            assert_eq!(when.timezone(), Tz::Europe__Istanbul);
            assert_eq!(when.timestamp() % 60, 0);
        }
    }

    #[test]
    fn test_diyanet_offsets_shift_times() {
        let tz = Tz::Europe__Istanbul;
        let settings = CalculationSettings {
            offsets: PrayerOffsets::diyanet(),
            ..CalculationSettings::default()
        };
        let times = compute(date(2024, 6, 21), &istanbul(), &settings).unwrap();

        assert_close(times.get(PrayerKind::Sunrise), local(tz, 2024, 6, 21, 5, 25), PrayerKind::Sunrise);
        assert_close(times.get(PrayerKind::Dhuhr), local(tz, 2024, 6, 21, 13, 11), PrayerKind::Dhuhr);
        assert_close(times.get(PrayerKind::Asr), local(tz, 2024, 6, 21, 17, 11), PrayerKind::Asr);
        assert_close(times.get(PrayerKind::Maghrib), local(tz, 2024, 6, 21, 20, 47), PrayerKind::Maghrib);
    }

    #[test]
    fn test_hanafi_asr_is_later() {
        let standard = compute(date(2024, 6, 21), &istanbul(), &CalculationSettings::default())
            .unwrap();
        let hanafi = compute(
            date(2024, 6, 21),
            &istanbul(),
            &CalculationSettings {
                asr_method: AsrMethod::Hanafi,
                ..CalculationSettings::default()
            },
        )
        .unwrap();

        let gap = hanafi.get(PrayerKind::Asr) - standard.get(PrayerKind::Asr);
        assert!(gap.num_minutes() > 30, "Hanafi Asr only {gap} later");
        assert_eq!(hanafi.get(PrayerKind::Dhuhr), standard.get(PrayerKind::Dhuhr));
    }

    #[test]
    fn test_elevation_widens_the_day() {
        let settings = CalculationSettings::default();
        let sea_level = compute(date(2024, 6, 21), &istanbul(), &settings).unwrap();
        let mountain = compute(
            date(2024, 6, 21),
            &istanbul().with_elevation(2500.0).unwrap(),
            &settings,
        )
        .unwrap();

        assert!(mountain.get(PrayerKind::Sunrise) < sea_level.get(PrayerKind::Sunrise));
        assert!(mountain.get(PrayerKind::Maghrib) > sea_level.get(PrayerKind::Maghrib));
    }

    #[test]
    fn test_one_seventh_rule_bounds_twilight() {
        let tz = Tz::Europe__Istanbul;
        let settings = CalculationSettings {
            high_latitude_rule: HighLatitudeRule::OneSeventh,
            ..CalculationSettings::default()
        };
        let times = compute(date(2024, 6, 21), &istanbul(), &settings).unwrap();

        assert_close(times.get(PrayerKind::Fajr), local(tz, 2024, 6, 21, 4, 16), PrayerKind::Fajr);
        assert_close(times.get(PrayerKind::Isha), local(tz, 2024, 6, 21, 21, 56), PrayerKind::Isha);
        assert!(times.adjustments().fajr_from_night_portion);
        assert!(times.adjustments().isha_from_night_portion);
        assert_eq!(times.adjustments().clamped_latitude, None);
    }

    /// Oslo in June: twilight never ends, Isha lands after local midnight.
    #[test]
    fn test_oslo_isha_crosses_midnight() {
        let tz = Tz::Europe__Oslo;
        let oslo = Location::new(59.91, 10.75, tz).unwrap();
        let times = compute(date(2024, 6, 21), &oslo, &CalculationSettings::default()).unwrap();

        assert_strictly_increasing(&times);
        assert!(times.adjustments().isha_from_night_portion);
        assert_close(times.get(PrayerKind::Isha), local(tz, 2024, 6, 22, 0, 12), PrayerKind::Isha);
        assert_eq!(times.date(), date(2024, 6, 21));
    }

    /// Tromsø has midnight sun in June and polar night in December.
    #[test]
    fn test_polar_latitudes_fall_back_to_clamped_latitude() {
        let tromso = Location::new(69.6492, 18.9553, Tz::Europe__Oslo).unwrap();
        for day in [date(2024, 6, 21), date(2024, 12, 21)] {
            for rule in [
                HighLatitudeRule::AngleBased,
                HighLatitudeRule::OneSeventh,
                HighLatitudeRule::MiddleOfNight,
            ] {
                let settings = CalculationSettings {
                    high_latitude_rule: rule,
                    ..CalculationSettings::default()
                };
                let times = compute(day, &tromso, &settings).unwrap();
                assert_eq!(times.adjustments().clamped_latitude, Some(65.0));
                assert_strictly_increasing(&times);
            }
        }
    }

    /// A high site widens the horizon enough that ±65° alone does not resolve.
    #[test]
    fn test_high_polar_site_still_resolves() {
        let tromso = Location::new(69.6492, 18.9553, Tz::Europe__Oslo)
            .unwrap()
            .with_elevation(700.0)
            .unwrap();
        let times = compute(date(2024, 6, 21), &tromso, &CalculationSettings::default()).unwrap();
        assert!(times.adjustments().elevation_ignored);
        assert_eq!(times.adjustments().clamped_latitude, Some(65.0));
        assert_strictly_increasing(&times);

        // The year round, never an unresolved day
        for day in date(2024, 1, 1).iter_days().take(366) {
            let times = compute(day, &tromso, &CalculationSettings::default()).unwrap();
            assert_strictly_increasing(&times);
        }
    }

    #[test]
    fn test_south_pole_uses_negative_clamp() {
        let pole = Location::new(-89.9, 0.0, Tz::UTC).unwrap();
        let times = compute(date(2024, 6, 21), &pole, &CalculationSettings::default()).unwrap();
        assert_eq!(times.adjustments().clamped_latitude, Some(-65.0));
        assert_strictly_increasing(&times);
    }

    #[test]
    fn test_invalid_settings_are_reported() {
        let settings = CalculationSettings {
            isha_angle: 45.0,
            ..CalculationSettings::default()
        };
        assert!(matches!(
            compute(date(2024, 6, 21), &istanbul(), &settings),
            Err(CalculationError::InvalidSettings(_))
        ));
    }

    #[test]
    fn test_times_for_covers_consecutive_days() {
        let days = times_for(date(2024, 2, 27), 4, &istanbul(), &CalculationSettings::default())
            .unwrap();
        let dates: Vec<NaiveDate> = days.iter().map(|d| d.date()).collect();
        assert_eq!(
            dates,
            vec![date(2024, 2, 27), date(2024, 2, 28), date(2024, 2, 29), date(2024, 3, 1)]
        );
        assert!(times_for(date(2024, 1, 1), 0, &istanbul(), &CalculationSettings::default())
            .unwrap()
            .is_empty());
    }

    #[test]
    fn test_from_parts_rejects_unordered_times() {
        let tz = Tz::UTC;
        let mut times: [DateTime<Tz>; 6] =
            std::array::from_fn(|i| local(tz, 2024, 1, 1, 5 + 2 * i as u32, 0));
        assert!(DailyTimes::from_parts(date(2024, 1, 1), tz, times).is_ok());

        times[3] = times[2];
        assert!(matches!(
            DailyTimes::from_parts(date(2024, 1, 1), tz, times),
            Err(CalculationError::UnresolvableAngle { prayer: PrayerKind::Asr, .. })
        ));
    }
}
