use super::*;
use crate::backend::{MockNotificationPort, MockPlaybackPort};
use crate::geo::Location;
use crate::prayer::PrayerKind;
use crate::time::SimulatedClock;
use std::sync::Mutex;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::{Duration as StdDuration, Instant};

const ISTANBUL: Tz = Tz::Europe__Istanbul;
const OSLO: Tz = Tz::Europe__Oslo;

fn june_21() -> NaiveDate {
    NaiveDate::from_ymd_opt(2024, 6, 21).unwrap()
}

fn istanbul() -> ScheduleSettings {
    let location = Location::new(41.0082, 28.9784, ISTANBUL)
        .unwrap()
        .with_city("Istanbul");
    let mut settings = ScheduleSettings::new(location);
    settings.playback = PlaybackPolicy {
        timeout: StdDuration::from_secs(5),
        retries: 2,
        backoff: StdDuration::from_millis(10),
    };
    settings
}

fn oslo() -> ScheduleSettings {
    let location = Location::new(59.91, 10.75, OSLO).unwrap().with_city("Oslo");
    ScheduleSettings {
        location,
        ..istanbul()
    }
}

fn local(tz: Tz, day: u32, h: u32, m: u32, s: u32) -> DateTime<Utc> {
    tz.with_ymd_and_hms(2024, 6, day, h, m, s)
        .unwrap()
        .with_timezone(&Utc)
}

fn prayer_at(settings: &ScheduleSettings, prayer: PrayerKind) -> DateTime<Utc> {
    geo::compute(june_21(), &settings.location, &settings.calculation)
        .unwrap()
        .get(prayer)
        .with_timezone(&Utc)
}

fn counting_player(plays: Arc<AtomicUsize>) -> MockPlaybackPort {
    let mut player = MockPlaybackPort::new();
    player.expect_play().returning(move |_, _| {
        plays.fetch_add(1, Ordering::SeqCst);
        Ok(())
    });
    player.expect_stop().return_const(());
    player.expect_name().return_const("mock");
    player
}

fn quiet_notifier() -> MockNotificationPort {
    let mut notifier = MockNotificationPort::new();
    notifier.expect_notify().returning(|_, _| Ok(()));
    notifier
}

fn params(
    start: DateTime<Utc>,
    settings: ScheduleSettings,
    player: MockPlaybackPort,
    notifier: MockNotificationPort,
) -> (EngineParams, Arc<SimulatedClock>) {
    let clock = Arc::new(SimulatedClock::fast_forward(start));
    let params = EngineParams {
        clock: clock.clone(),
        player: Arc::new(player),
        notifier: Box::new(notifier),
        settings,
        source: None,
        journal: None,
        debug_enabled: false,
    };
    (params, clock)
}

fn started(
    start: DateTime<Utc>,
    settings: ScheduleSettings,
    player: MockPlaybackPort,
) -> (TriggerEngine, EngineHandle, Arc<SimulatedClock>) {
    let (params, clock) = params(start, settings, player, quiet_notifier());
    let (mut engine, handle) = TriggerEngine::new(params);
    engine.start();
    (engine, handle, clock)
}

fn record_of(engine: &TriggerEngine, prayer: PrayerKind, kind: EventKind) -> TriggerRecord {
    engine
        .status()
        .events
        .into_iter()
        .find(|r| r.event.prayer == prayer && r.event.kind == kind)
        .unwrap_or_else(|| panic!("no {prayer} {kind} in the calendar"))
}

fn state_of(engine: &TriggerEngine, prayer: PrayerKind) -> TriggerState {
    record_of(engine, prayer, EventKind::Main).state
}

fn step_until(engine: &mut TriggerEngine, mut done: impl FnMut(&TriggerEngine) -> bool) {
    for _ in 0..50 {
        if done(engine) {
            return;
        }
        assert_eq!(engine.step(), Flow::Continue);
    }
    panic!("condition not reached within 50 steps");
}

fn is_completed(state: &TriggerState) -> bool {
    matches!(state, TriggerState::Completed(_))
}

fn scheduled_keys(engine: &TriggerEngine) -> Vec<EventKey> {
    engine
        .status()
        .events
        .iter()
        .filter(|r| r.state == TriggerState::Scheduled)
        .map(|r| r.event.key())
        .collect()
}

#[test]
fn test_boot_recovery_skips_elapsed_events() {
    let plays = Arc::new(AtomicUsize::new(0));
    let (engine, _handle, _clock) =
        started(local(ISTANBUL, 21, 14, 0, 0), istanbul(), counting_player(plays.clone()));

    let status = engine.status();
    assert_eq!(status.times.as_ref().unwrap().date(), june_21());

    let skipped: Vec<PrayerKind> = status
        .events
        .iter()
        .filter(|r| r.state == TriggerState::Skipped(SkipReason::Elapsed))
        .map(|r| r.event.prayer)
        .collect();
    assert_eq!(skipped, [PrayerKind::Fajr, PrayerKind::Dhuhr]);
    assert_eq!(scheduled_keys(&engine).len(), 3);
    assert_eq!(plays.load(Ordering::SeqCst), 0);
}

#[test]
fn test_restart_on_same_instant_is_idempotent() {
    let start = local(ISTANBUL, 21, 14, 0, 0);
    let plays = Arc::new(AtomicUsize::new(0));
    let (first, _h1, _c1) = started(start, istanbul(), counting_player(plays.clone()));
    let (second, _h2, _c2) = started(start, istanbul(), counting_player(plays.clone()));

    assert_eq!(scheduled_keys(&first), scheduled_keys(&second));
    assert_eq!(plays.load(Ordering::SeqCst), 0);
}

#[test]
fn test_status_reports_next_event_and_countdown() {
    let settings = istanbul();
    let asr = prayer_at(&settings, PrayerKind::Asr);
    let start = local(ISTANBUL, 21, 14, 0, 0);
    let (engine, _handle, _clock) = started(start, settings, counting_player(Default::default()));

    let status = engine.status();
    let next = status.next.as_ref().unwrap();
    assert_eq!(next.event.prayer, PrayerKind::Asr);
    assert_eq!(next.countdown, asr - start);
    assert_eq!(status.health(), Health::Pending);
    assert_eq!(status.player, "mock");
}

#[test]
fn test_each_event_fires_exactly_once_at_its_time() {
    let settings = istanbul();
    let asr = prayer_at(&settings, PrayerKind::Asr);
    let plays = Arc::new(AtomicUsize::new(0));
    let (mut engine, _handle, clock) =
        started(local(ISTANBUL, 21, 17, 0, 0), settings, counting_player(plays.clone()));

    // Sleep until the arm window, then arm
    engine.step();
    engine.step();
    assert_eq!(state_of(&engine, PrayerKind::Asr), TriggerState::Armed);
    assert_eq!(clock.now(), asr);

    step_until(&mut engine, |e| is_completed(&state_of(e, PrayerKind::Asr)));
    assert_eq!(plays.load(Ordering::SeqCst), 1);

    step_until(&mut engine, |e| is_completed(&state_of(e, PrayerKind::Maghrib)));
    assert_eq!(plays.load(Ordering::SeqCst), 2);
    assert!(is_completed(&state_of(&engine, PrayerKind::Asr)));
    assert_eq!(engine.status().health(), Health::LastSucceeded);
}

#[test]
fn test_commands_wait_while_an_event_is_armed() {
    let volumes = Arc::new(Mutex::new(Vec::new()));
    let mut player = MockPlaybackPort::new();
    let seen = volumes.clone();
    player.expect_play().returning(move |_, volume| {
        seen.lock().unwrap().push(volume);
        Ok(())
    });
    player.expect_stop().return_const(());
    player.expect_name().return_const("mock");

    let (mut engine, handle, _clock) = started(local(ISTANBUL, 21, 17, 0, 0), istanbul(), player);
    engine.step();
    engine.step();
    assert_eq!(state_of(&engine, PrayerKind::Asr), TriggerState::Armed);

    let mut quieter = istanbul();
    quieter.prayers.volume.default = 10;
    handle.apply_settings(quieter).unwrap();

    // The armed Asr fires with the old volume before the command is read
    engine.step();
    assert_eq!(*volumes.lock().unwrap(), [DEFAULT_VOLUME]);
    let asr = engine
        .history()
        .find(|r| r.event.prayer == PrayerKind::Asr && is_completed(&r.state))
        .unwrap();
    assert_eq!(asr.event.volume, DEFAULT_VOLUME);

    assert_eq!(record_of(&engine, PrayerKind::Maghrib, EventKind::Main).event.volume, 10);
    assert_eq!(
        state_of(&engine, PrayerKind::Asr),
        TriggerState::Skipped(SkipReason::AlreadyFired)
    );
}

#[test]
fn test_playback_timing_out_three_times_completes_with_failure() {
    let mut settings = istanbul();
    settings.playback.timeout = StdDuration::from_millis(30);
    settings.playback.retries = 2;

    let mut player = MockPlaybackPort::new();
    player.expect_play().returning(|_, _| {
        std::thread::sleep(StdDuration::from_millis(250));
        Ok(())
    });
    player.expect_stop().return_const(());
    player.expect_name().return_const("mock");

    let (mut engine, _handle, _clock) = started(local(ISTANBUL, 21, 17, 6, 0), settings, player);
    let began = Instant::now();
    step_until(&mut engine, |e| is_completed(&state_of(e, PrayerKind::Asr)));
    assert!(began.elapsed() < StdDuration::from_secs(2));

    let TriggerState::Completed(outcome) = state_of(&engine, PrayerKind::Asr) else {
        unreachable!()
    };
    assert_eq!(outcome.attempts, 3);
    assert!(outcome.error.unwrap().contains("did not finish"));
    assert!(!outcome.cancelled);

    assert_eq!(state_of(&engine, PrayerKind::Maghrib), TriggerState::Scheduled);
    assert_eq!(engine.status().health(), Health::LastFailed);
    assert_eq!(
        engine.status().next.unwrap().event.prayer,
        PrayerKind::Maghrib
    );
}

#[test]
fn test_fatal_playback_error_is_not_retried() {
    let attempts = Arc::new(AtomicUsize::new(0));
    let counter = attempts.clone();
    let mut player = MockPlaybackPort::new();
    player.expect_play().returning(move |_, _| {
        counter.fetch_add(1, Ordering::SeqCst);
        Err(PlaybackError::Fatal("no recording for makkah/asr".into()))
    });
    player.expect_stop().return_const(());
    player.expect_name().return_const("mock");

    let (mut engine, _handle, _clock) = started(local(ISTANBUL, 21, 17, 6, 0), istanbul(), player);
    step_until(&mut engine, |e| is_completed(&state_of(e, PrayerKind::Asr)));

    assert_eq!(attempts.load(Ordering::SeqCst), 1);
    assert_eq!(engine.status().health(), Health::LastFailed);
}

#[test]
fn test_settings_change_supersedes_pending_events() {
    let start = local(ISTANBUL, 21, 14, 0, 0);
    let (mut engine, handle, _clock) = started(start, istanbul(), counting_player(Default::default()));
    let before: Vec<DateTime<Utc>> = scheduled_keys(&engine).iter().map(|k| k.at).collect();

    let mut quieter = istanbul();
    quieter.prayers.volume.default = 40;
    handle.apply_settings(quieter).unwrap();
    engine.step();

    let superseded: Vec<PrayerKind> = engine
        .history()
        .filter(|r| r.state == TriggerState::Superseded)
        .map(|r| r.event.prayer)
        .collect();
    assert_eq!(
        superseded,
        [PrayerKind::Asr, PrayerKind::Maghrib, PrayerKind::Isha]
    );

    let status = engine.status();
    let scheduled: Vec<&TriggerRecord> = status
        .events
        .iter()
        .filter(|r| r.state == TriggerState::Scheduled)
        .collect();
    assert_eq!(scheduled.len(), 3);
    assert!(scheduled.iter().all(|r| r.event.volume == 40));
    let after: Vec<DateTime<Utc>> = scheduled.iter().map(|r| r.event.key().at).collect();
    assert_eq!(before, after);
    assert!(status.settings_rejected.is_none());
}

#[test]
fn test_rejected_settings_keep_previous_calendar() {
    let (mut engine, handle, _clock) = started(
        local(ISTANBUL, 21, 14, 0, 0),
        istanbul(),
        counting_player(Default::default()),
    );

    let mut broken = istanbul();
    broken.prayers.volume.default = 150;
    handle.apply_settings(broken).unwrap();
    engine.step();

    let status = engine.status();
    assert_eq!(status.health(), Health::SettingsRejected);
    assert!(status.settings_rejected.unwrap().contains("volume (150)"));
    assert_eq!(state_of(&engine, PrayerKind::Asr), TriggerState::Scheduled);
    assert_eq!(
        record_of(&engine, PrayerKind::Asr, EventKind::Main).event.volume,
        DEFAULT_VOLUME
    );
    assert!(engine.history().all(|r| r.state != TriggerState::Superseded));
}

#[test]
fn test_late_wake_fires_within_grace_and_skips_beyond() {
    let settings = istanbul();
    let asr = prayer_at(&settings, PrayerKind::Asr);
    let maghrib = prayer_at(&settings, PrayerKind::Maghrib);
    let plays = Arc::new(AtomicUsize::new(0));
    let (mut engine, _handle, clock) =
        started(local(ISTANBUL, 21, 17, 0, 0), settings, counting_player(plays.clone()));

    clock.set(asr + Duration::seconds(30));
    engine.step();
    assert!(is_completed(&state_of(&engine, PrayerKind::Asr)));
    assert_eq!(plays.load(Ordering::SeqCst), 1);

    clock.set(maghrib + Duration::minutes(10));
    engine.step();
    assert_eq!(
        state_of(&engine, PrayerKind::Maghrib),
        TriggerState::Skipped(SkipReason::Missed)
    );
    assert_eq!(plays.load(Ordering::SeqCst), 1);
}

#[test]
fn test_clock_regression_does_not_refire() {
    let settings = istanbul();
    let asr = prayer_at(&settings, PrayerKind::Asr);
    let plays = Arc::new(AtomicUsize::new(0));
    let (mut engine, _handle, clock) =
        started(local(ISTANBUL, 21, 17, 6, 0), settings, counting_player(plays.clone()));

    step_until(&mut engine, |e| is_completed(&state_of(e, PrayerKind::Asr)));
    assert_eq!(plays.load(Ordering::SeqCst), 1);

    clock.set(asr - Duration::minutes(10));
    engine.step();
    assert_eq!(
        state_of(&engine, PrayerKind::Asr),
        TriggerState::Skipped(SkipReason::AlreadyFired)
    );

    step_until(&mut engine, |e| is_completed(&state_of(e, PrayerKind::Maghrib)));
    assert_eq!(plays.load(Ordering::SeqCst), 2);
}

/// A fire recorded while the wall clock ran a day ahead must not silence the
/// real day once the clock is corrected.
#[test]
fn test_clock_corrected_back_a_day_still_fires_that_day() {
    let dir = tempfile::tempdir().unwrap();
    let plays = Arc::new(AtomicUsize::new(0));
    let (mut params, clock) = params(
        local(ISTANBUL, 22, 17, 6, 0),
        istanbul(),
        counting_player(plays.clone()),
        quiet_notifier(),
    );
    params.journal = Some(JournalFile::new(dir.path().join("journal.json")));
    let (mut engine, _handle) = TriggerEngine::new(params);
    engine.start();

    step_until(&mut engine, |e| is_completed(&state_of(e, PrayerKind::Asr)));
    assert_eq!(plays.load(Ordering::SeqCst), 1);

    clock.set(local(ISTANBUL, 21, 12, 0, 0));
    engine.step();
    for prayer in [PrayerKind::Dhuhr, PrayerKind::Asr, PrayerKind::Maghrib] {
        assert_eq!(state_of(&engine, prayer), TriggerState::Scheduled, "{prayer}");
    }

    step_until(&mut engine, |e| is_completed(&state_of(e, PrayerKind::Asr)));
    assert_eq!(plays.load(Ordering::SeqCst), 3);
}

#[test]
fn test_clock_changed_rebuilds_same_schedule() {
    let (mut engine, handle, _clock) = started(
        local(ISTANBUL, 21, 14, 0, 0),
        istanbul(),
        counting_player(Default::default()),
    );
    let before = scheduled_keys(&engine);

    handle.clock_changed().unwrap();
    engine.step();

    assert_eq!(scheduled_keys(&engine), before);
    assert_eq!(
        engine
            .history()
            .filter(|r| r.state == TriggerState::Superseded)
            .count(),
        3
    );
}

#[test]
fn test_boot_after_midnight_keeps_previous_days_isha() {
    let settings = oslo();
    let isha = prayer_at(&settings, PrayerKind::Isha);
    assert_eq!(isha.with_timezone(&OSLO).date_naive(), june_21().succ_opt().unwrap());

    let (engine, _handle, _clock) = started(
        local(OSLO, 22, 0, 5, 0),
        settings,
        counting_player(Default::default()),
    );
    assert_eq!(engine.status().times.unwrap().date(), june_21());
    assert_eq!(state_of(&engine, PrayerKind::Isha), TriggerState::Scheduled);
    assert_eq!(
        state_of(&engine, PrayerKind::Maghrib),
        TriggerState::Skipped(SkipReason::Elapsed)
    );
}

#[test]
fn test_rollover_waits_for_post_midnight_isha() {
    let plays = Arc::new(AtomicUsize::new(0));
    let (mut engine, _handle, _clock) =
        started(local(OSLO, 21, 23, 30, 0), oslo(), counting_player(plays.clone()));

    step_until(&mut engine, |e| {
        e.history()
            .any(|r| r.event.prayer == PrayerKind::Isha && is_completed(&r.state))
    });
    assert_eq!(plays.load(Ordering::SeqCst), 1);

    let status = engine.status();
    assert_eq!(status.times.unwrap().date(), june_21().succ_opt().unwrap());
    assert_eq!(state_of(&engine, PrayerKind::Isha), TriggerState::Scheduled);
}

#[test]
fn test_pre_alert_notifies_with_prayer_time() {
    let mut settings = istanbul();
    settings.prayers.pre_alert_minutes = 15;
    let asr = prayer_at(&settings, PrayerKind::Asr);

    let mut notifier = MockNotificationPort::new();
    notifier
        .expect_notify()
        .withf(move |prayer, at| *prayer == PrayerKind::Asr && *at == asr)
        .times(1)
        .returning(|_, _| Ok(()));

    let plays = Arc::new(AtomicUsize::new(0));
    let (params, clock) = params(
        local(ISTANBUL, 21, 16, 40, 0),
        settings,
        counting_player(plays.clone()),
        notifier,
    );
    let (mut engine, _handle) = TriggerEngine::new(params);
    engine.start();

    step_until(&mut engine, |e| {
        is_completed(&record_of(e, PrayerKind::Asr, EventKind::PreAlert).state)
    });
    let alert = record_of(&engine, PrayerKind::Asr, EventKind::PreAlert);
    assert_eq!(alert.since, asr - Duration::minutes(15));
    assert!(clock.now() < asr);
    assert_eq!(plays.load(Ordering::SeqCst), 0);

    step_until(&mut engine, |e| is_completed(&state_of(e, PrayerKind::Asr)));
    assert_eq!(plays.load(Ordering::SeqCst), 1);
}

#[test]
fn test_cancel_marks_outcome_cancelled() {
    let settings = istanbul();
    let asr = prayer_at(&settings, PrayerKind::Asr);

    let mut player = MockPlaybackPort::new();
    player.expect_play().returning(|_, _| {
        std::thread::sleep(StdDuration::from_millis(300));
        Ok(())
    });
    player.expect_stop().return_const(());
    player.expect_name().return_const("mock");

    let (mut engine, handle, _clock) = started(asr - Duration::seconds(1), settings, player);
    engine.step();
    assert_eq!(state_of(&engine, PrayerKind::Asr), TriggerState::Armed);

    let canceller = std::thread::spawn(move || {
        std::thread::sleep(StdDuration::from_millis(50));
        handle.cancel_active().unwrap();
    });
    engine.step();
    canceller.join().unwrap();

    let TriggerState::Completed(outcome) = state_of(&engine, PrayerKind::Asr) else {
        panic!("Asr did not complete");
    };
    assert!(outcome.cancelled);
    assert!(outcome.succeeded());
    assert_eq!(outcome.attempts, 1);
}

#[test]
fn test_test_playback_goes_through_the_worker() {
    let plays = Arc::new(AtomicUsize::new(0));
    let (mut engine, handle, _clock) = started(
        local(ISTANBUL, 21, 14, 0, 0),
        istanbul(),
        counting_player(plays.clone()),
    );

    let (reply, response) = channel();
    handle
        .sender()
        .send(Command::RequestTestPlayback {
            track: TrackSelector::new(crate::prayer::AdhanVoice::Madinah, PrayerKind::Fajr),
            volume: 30,
            length: None,
            reply,
        })
        .unwrap();
    engine.step();

    assert_eq!(response.recv().unwrap(), Ok(PlayOutcome::Finished));
    assert_eq!(plays.load(Ordering::SeqCst), 1);
    assert_eq!(scheduled_keys(&engine).len(), 3);
}

#[test]
fn test_test_playback_is_cut_at_its_length() {
    let mut player = MockPlaybackPort::new();
    player.expect_play().returning(|_, _| {
        std::thread::sleep(StdDuration::from_millis(400));
        Ok(())
    });
    player.expect_stop().times(1..).return_const(());
    player.expect_name().return_const("mock");
    let (mut engine, handle, _clock) = started(local(ISTANBUL, 21, 14, 0, 0), istanbul(), player);

    let (reply, response) = channel();
    handle
        .sender()
        .send(Command::RequestTestPlayback {
            track: TrackSelector::new(crate::prayer::AdhanVoice::Makkah, PrayerKind::Asr),
            volume: 50,
            length: Some(StdDuration::from_millis(50)),
            reply,
        })
        .unwrap();
    let began = Instant::now();
    engine.step();

    assert_eq!(response.recv().unwrap(), Ok(PlayOutcome::Truncated));
    assert!(began.elapsed() < StdDuration::from_millis(350));
    // A preview is not an event: nothing in the calendar changed
    assert_eq!(scheduled_keys(&engine).len(), 3);
    assert!(engine.status().last_trigger.is_none());
}

#[test]
fn test_times_for_spans_requested_range() {
    let (mut engine, handle, _clock) = started(
        local(ISTANBUL, 21, 14, 0, 0),
        istanbul(),
        counting_player(Default::default()),
    );

    let (reply, response) = channel();
    handle
        .sender()
        .send(Command::TimesFor {
            start: NaiveDate::from_ymd_opt(2024, 2, 28).unwrap(),
            days: 3,
            reply,
        })
        .unwrap();
    engine.step();

    let days: Vec<NaiveDate> = response
        .recv()
        .unwrap()
        .unwrap()
        .iter()
        .map(DailyTimes::date)
        .collect();
    assert_eq!(
        days,
        [
            NaiveDate::from_ymd_opt(2024, 2, 28).unwrap(),
            NaiveDate::from_ymd_opt(2024, 2, 29).unwrap(),
            NaiveDate::from_ymd_opt(2024, 3, 1).unwrap(),
        ]
    );
}

#[test]
fn test_shutdown_command_stops_the_loop() {
    let (mut engine, handle, _clock) = started(
        local(ISTANBUL, 21, 14, 0, 0),
        istanbul(),
        counting_player(Default::default()),
    );
    handle.shutdown().unwrap();
    assert_eq!(engine.step(), Flow::Shutdown);
}

struct BrokenSource;

impl SettingsSource for BrokenSource {
    fn load(&self) -> anyhow::Result<ScheduleSettings> {
        anyhow::bail!("vakit.toml: latitude (95) must be between -90 and 90")
    }

    fn describe(&self) -> String {
        "broken".into()
    }
}

#[test]
fn test_rebuild_with_unreadable_source_keeps_calendar() {
    let (mut params, _clock) = params(
        local(ISTANBUL, 21, 14, 0, 0),
        istanbul(),
        counting_player(Default::default()),
        quiet_notifier(),
    );
    params.source = Some(Box::new(BrokenSource));
    let (mut engine, handle) = TriggerEngine::new(params);
    engine.start();
    let before = scheduled_keys(&engine);

    handle.rebuild_now().unwrap();
    engine.step();

    assert_eq!(scheduled_keys(&engine), before);
    assert!(
        engine
            .status()
            .settings_rejected
            .unwrap()
            .contains("latitude (95)")
    );
}

#[test]
fn test_journal_prevents_refire_after_restart() {
    let dir = tempfile::tempdir().unwrap();
    let journal = JournalFile::new(dir.path().join("journal.json"));
    let settings = istanbul();
    let asr = prayer_at(&settings, PrayerKind::Asr);

    let plays = Arc::new(AtomicUsize::new(0));
    let (mut first_params, _clock) = params(
        local(ISTANBUL, 21, 17, 6, 0),
        settings.clone(),
        counting_player(plays.clone()),
        quiet_notifier(),
    );
    first_params.journal = Some(journal.clone());
    let (mut first, _handle) = TriggerEngine::new(first_params);
    first.start();
    step_until(&mut first, |e| is_completed(&state_of(e, PrayerKind::Asr)));
    drop(first);

    // Restart at the very instant Asr was due
    let (mut second_params, _clock) = params(
        asr,
        settings,
        counting_player(plays.clone()),
        quiet_notifier(),
    );
    second_params.journal = Some(journal);
    let (mut second, _handle) = TriggerEngine::new(second_params);
    second.start();
    assert_eq!(
        state_of(&second, PrayerKind::Asr),
        TriggerState::Skipped(SkipReason::AlreadyFired)
    );
    second.step();
    assert_eq!(plays.load(Ordering::SeqCst), 1);
}

#[test]
fn test_history_is_bounded() {
    let (mut engine, _handle, _clock) = started(
        local(ISTANBUL, 21, 14, 0, 0),
        istanbul(),
        counting_player(Default::default()),
    );
    for _ in 0..60 {
        engine.handle_command(Command::ClockChanged);
    }
    assert_eq!(engine.history().count(), HISTORY_CAPACITY);
}

#[test]
fn test_retry_helper_uses_linear_backoff() {
    let clock = SimulatedClock::fast_forward(local(ISTANBUL, 21, 12, 0, 0));
    let policy = PlaybackPolicy {
        timeout: StdDuration::from_secs(1),
        retries: 3,
        backoff: StdDuration::from_secs(10),
    };
    let mut calls = 0;
    let outcome = with_retries(&clock, &policy, || {
        calls += 1;
        if calls < 3 {
            Err(PlaybackError::Transient("device busy".into()))
        } else {
            Ok(PlayOutcome::Finished)
        }
    });

    assert_eq!(outcome.attempts, 3);
    assert!(outcome.succeeded());
    // 10s after the first failure, 20s after the second
    assert_eq!(clock.now(), local(ISTANBUL, 21, 12, 0, 30));
}
