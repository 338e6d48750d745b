//! Trigger engine: the long-running scheduling loop.
//!
//! The engine owns the active calendar and every event's [`TriggerState`]. It
//! sleeps until the next event (or until a [`Command`] arrives), fires the
//! event through the playback or notification port, and rebuilds the calendar
//! at day rollover, on settings changes and after clock jumps.
//!
//! ## Guarantees
//!
//! - An event is fired at most once. Every fired event is written to the fire
//!   journal before its port is invoked, and rebuilt calendars mark journaled
//!   events as already fired.
//! - Events that passed while the process was down are skipped, not played late.
//!   A late wake (suspend, scheduler delay) still fires within the misfire grace.
//! - When the next event is within the arm window the loop stops reading
//!   commands until that event has completed.
//! - Playback failures never escape the loop; they end up in the event's
//!   outcome and in [`EngineStatus`].
//!
//! The loop can be driven step by step ([`TriggerEngine::start`],
//! [`TriggerEngine::step`]), which is how the tests and the simulator exercise
//! it with a [`SimulatedClock`](crate::time::SimulatedClock).

pub mod command;
pub mod settings;
pub mod state;
pub mod status;

#[cfg(test)]
mod tests;

pub use command::{Command, EngineHandle};
pub use settings::{PlaybackPolicy, ScheduleSettings, SettingsSource};
pub use state::{Outcome, SkipReason, TriggerRecord, TriggerState};
pub use status::{EngineStatus, Health, NextEvent};

use chrono::{DateTime, Days, Duration, NaiveDate, TimeZone, Utc};
use chrono_tz::Tz;
use std::collections::VecDeque;
use std::sync::Arc;
use std::sync::mpsc::{Receiver, channel};

use crate::backend::{NotificationPort, PlayOutcome, PlaybackPort, PlaybackWorker};
use crate::calendar::{self, EventKey};
use crate::common::constants::*;
use crate::common::utils::format_countdown;
use crate::error::{CalculationError, PlaybackError};
use crate::geo::{self, DailyTimes};
use crate::io::journal::{FireLog, JournalFile};
use crate::prayer::{EventKind, TrackSelector};
use crate::time::{Clock, Wake};

/// How long to wait before retrying a failed rebuild.
const REBUILD_RETRY_HOURS: i64 = 1;

/// Dependencies for creating a [`TriggerEngine`].
pub struct EngineParams {
    pub clock: Arc<dyn Clock>,
    pub player: Arc<dyn PlaybackPort>,
    pub notifier: Box<dyn NotificationPort>,
    pub settings: ScheduleSettings,
    /// Consulted on [`Command::RebuildNow`]; without one the current snapshot is reused.
    pub source: Option<Box<dyn SettingsSource>>,
    pub journal: Option<JournalFile>,
    pub debug_enabled: bool,
}

/// Whether the loop should keep going.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Flow {
    Continue,
    Shutdown,
}

struct Calendar {
    generation: u64,
    times: DailyTimes,
    records: Vec<TriggerRecord>,
}

impl Calendar {
    fn date(&self) -> NaiveDate {
        self.times.date()
    }

    fn next_pending(&self) -> Option<usize> {
        self.records.iter().position(|r| r.state.is_pending())
    }

    /// Local midnight at the end of this calendar's day.
    fn rollover_at(&self) -> Option<DateTime<Utc>> {
        self.date()
            .succ_opt()
            .map(|next| local_midnight(next, self.times.timezone()))
    }
}

pub struct TriggerEngine {
    clock: Arc<dyn Clock>,
    worker: PlaybackWorker,
    notifier: Box<dyn NotificationPort>,
    settings: ScheduleSettings,
    source: Option<Box<dyn SettingsSource>>,
    journal: Option<JournalFile>,
    fire_log: FireLog,
    calendar: Option<Calendar>,
    generation: u64,
    history: VecDeque<TriggerRecord>,
    last_trigger: Option<TriggerRecord>,
    settings_rejected: Option<String>,
    retry_rebuild_at: Option<DateTime<Utc>>,
    last_seen: Option<DateTime<Utc>>,
    wait_target: Option<(EventKey, u64)>,
    inbox: Receiver<Command>,
    debug_enabled: bool,
}

impl TriggerEngine {
    pub fn new(params: EngineParams) -> (Self, EngineHandle) {
        let worker = PlaybackWorker::spawn(params.player);
        let (sender, inbox) = channel();
        let handle = EngineHandle::new(sender, worker.stop_handle());

        let engine = Self {
            clock: params.clock,
            worker,
            notifier: params.notifier,
            settings: params.settings,
            source: params.source,
            journal: params.journal,
            fire_log: FireLog::default(),
            calendar: None,
            generation: 0,
            history: VecDeque::with_capacity(HISTORY_CAPACITY),
            last_trigger: None,
            settings_rejected: None,
            retry_rebuild_at: None,
            last_seen: None,
            wait_target: None,
            inbox,
            debug_enabled: params.debug_enabled,
        };
        (engine, handle)
    }

    /// Run until shutdown, a disconnected command channel or the end of a simulation.
    pub fn run(mut self) {
        self.start();
        while self.step() == Flow::Continue {}
        self.save_journal();
        log_block_start!("Prayer time engine stopped");
    }

    /// Boot: read the journal and build the calendar for the current moment.
    ///
    /// Events that already passed are skipped, journaled ones are marked as
    /// already fired, the rest are scheduled.
    pub fn start(&mut self) {
        if let Some(journal) = &self.journal {
            match journal.load() {
                Ok(log) => self.fire_log = log,
                Err(e) => {
                    log_warning!("Ignoring unreadable fire journal: {e:#}");
                }
            }
        }

        let now = self.clock.now();
        self.last_seen = Some(now);
        log_block_start!("Location: {}", self.settings.location.describe());
        log_indented!("Player: {}", self.worker.port_name());
        self.rebuild(now);
    }

    /// One loop iteration: handle due events, then wait for the next one.
    pub fn step(&mut self) -> Flow {
        self.tick();
        if self.clock.is_ended() {
            return Flow::Shutdown;
        }

        let now = self.clock.now();
        if let Some((index, key)) = self.next_target() {
            let arm_at = key.at - Duration::milliseconds(ARM_WINDOW_MS as i64);
            if now >= arm_at {
                self.arm(index, now);
                if let Ok(wait) = (key.at - now).to_std() {
                    self.clock.sleep(wait);
                }
                return Flow::Continue;
            }
            self.wait_target = Some((key, self.generation));
            return self.wait_until(arm_at);
        }

        self.wait_target = None;
        let deadline = self.idle_deadline(now);
        self.wait_until(deadline)
    }

    pub fn status(&self) -> EngineStatus {
        let now = self.clock.now();
        let (times, events, next) = match &self.calendar {
            Some(calendar) => {
                let next = calendar.next_pending().map(|index| {
                    let event = calendar.records[index].event.clone();
                    let countdown = event.key().at - now;
                    NextEvent { event, countdown }
                });
                (Some(calendar.times.clone()), calendar.records.clone(), next)
            }
            None => (None, Vec::new(), None),
        };

        EngineStatus {
            now,
            location: self.settings.location.describe(),
            player: self.worker.port_name(),
            times,
            events,
            next,
            last_trigger: self.last_trigger.clone(),
            settings_rejected: self.settings_rejected.clone(),
        }
    }

    /// Terminal records, oldest first.
    pub fn history(&self) -> impl Iterator<Item = &TriggerRecord> {
        self.history.iter()
    }

    pub fn handle_command(&mut self, command: Command) -> Flow {
        let now = self.clock.now();
        match command {
            Command::ApplySettings(settings) => {
                log_block_start!("Applying new settings");
                self.apply_settings(*settings, now, false);
            }
            Command::RebuildNow => {
                log_block_start!("Rebuilding prayer calendar");
                let loaded = self.source.as_ref().map(|source| source.load());
                match loaded {
                    Some(Ok(settings)) => self.apply_settings(settings, now, true),
                    Some(Err(e)) => self.reject(format!("{e:#}")),
                    None => self.rebuild(now),
                }
            }
            Command::CancelActive => match &self.last_trigger {
                Some(TriggerRecord {
                    event,
                    state: TriggerState::Completed(outcome),
                    ..
                }) if outcome.cancelled => {
                    log_block_start!("Stopped {}", event.describe());
                }
                _ => {
                    log_block_start!("No playback in progress");
                }
            },
            Command::RequestTestPlayback {
                track,
                volume,
                length,
                reply,
            } => {
                log_block_start!("Test playback: {track} at {volume}%");
                let timeout = self.settings.playback.timeout;
                let result = match length {
                    Some(length) => self.worker.preview(track, volume, length, timeout),
                    None => self.worker.play(track, volume, timeout),
                };
                match &result {
                    Ok(PlayOutcome::Finished) => log_decorated!("Test playback finished"),
                    Ok(PlayOutcome::Cancelled) => log_decorated!("Test playback cancelled"),
                    Ok(PlayOutcome::Truncated) => {
                        log_decorated!("Test playback stopped after its preview length")
                    }
                    Err(e) => log_error!("Test playback failed: {e}"),
                }
                let _ = reply.send(result);
            }
            Command::Status(reply) => {
                let _ = reply.send(self.status());
            }
            Command::TimesFor { start, days, reply } => {
                let _ = reply.send(geo::times_for(
                    start,
                    days,
                    &self.settings.location,
                    &self.settings.calculation,
                ));
            }
            Command::ClockChanged => {
                log_block_start!("System clock changed, revalidating calendar");
                // Honor the misfire grace for anything that came due meanwhile
                self.process_due();
                let now = self.clock.now();
                self.last_seen = Some(now);
                self.rebuild(now);
            }
            Command::Shutdown => return Flow::Shutdown,
        }
        Flow::Continue
    }

    fn wait_until(&mut self, deadline: DateTime<Utc>) -> Flow {
        if self.debug_enabled {
            log_debug!(
                "Sleeping until {}",
                deadline
                    .with_timezone(&self.settings.location.timezone())
                    .format("%Y-%m-%d %H:%M:%S")
            );
        }
        let wake = self.clock.sleep_until(deadline, &self.inbox);
        match wake {
            Wake::Elapsed => {
                self.revalidate_target();
                Flow::Continue
            }
            Wake::Command(command) => self.handle_command(command),
            Wake::Disconnected => Flow::Shutdown,
        }
    }

    /// Clock regression check, due events, rollover and pending rebuild retries.
    fn tick(&mut self) {
        let now = self.clock.now();
        let tolerance = Duration::milliseconds(CLOCK_REGRESSION_TOLERANCE_MS);
        if let Some(last) = self.last_seen
            && now < last - tolerance
        {
            log_block_start!(
                "Clock moved backwards by {}, revalidating calendar",
                format_countdown(last - now)
            );
            self.rebuild(now);
        }

        self.process_due();

        let now = self.clock.now();
        self.last_seen = Some(now);
        if self.retry_rebuild_at.is_some_and(|at| at <= now) {
            self.rebuild(now);
        } else if self.rollover_due(now) {
            log_block_start!("New day, rebuilding prayer calendar");
            self.rebuild(now);
        }
    }

    fn rollover_due(&self, now: DateTime<Utc>) -> bool {
        self.calendar.as_ref().is_some_and(|calendar| {
            calendar.next_pending().is_none()
                && calendar.rollover_at().is_some_and(|at| now >= at)
        })
    }

    fn next_target(&self) -> Option<(usize, EventKey)> {
        let calendar = self.calendar.as_ref()?;
        let index = calendar.next_pending()?;
        Some((index, calendar.records[index].event.key()))
    }

    /// Wake-up time when nothing is scheduled.
    fn idle_deadline(&self, now: DateTime<Utc>) -> DateTime<Utc> {
        let rollover = self
            .calendar
            .as_ref()
            .and_then(Calendar::rollover_at)
            .filter(|at| *at > now);
        [rollover, self.retry_rebuild_at]
            .into_iter()
            .flatten()
            .min()
            .unwrap_or(now + Duration::hours(REBUILD_RETRY_HOURS))
    }

    fn revalidate_target(&mut self) {
        let Some((key, generation)) = self.wait_target.take() else {
            return;
        };
        let still_pending = self
            .calendar
            .as_ref()
            .filter(|calendar| calendar.generation == generation)
            .and_then(|calendar| calendar.records.iter().find(|r| r.event.key() == key))
            .is_some_and(|record| record.state.is_pending());
        if !still_pending && self.debug_enabled {
            log_debug!("Woke for an event that is no longer scheduled");
        }
    }

    fn arm(&mut self, index: usize, now: DateTime<Utc>) {
        let Some(calendar) = self.calendar.as_mut() else {
            return;
        };
        let record = &mut calendar.records[index];
        if record.state == TriggerState::Scheduled {
            record.state = TriggerState::Armed;
            record.since = now;
            if self.debug_enabled {
                log_debug!("Armed {}", record.event.describe());
            }
        }
    }

    /// Fire or skip every pending event whose time has come.
    fn process_due(&mut self) {
        let awake_since = self.clock.now();
        let grace = Duration::seconds(MISFIRE_GRACE_SECS);

        while let Some((index, key)) = self.next_target() {
            let now = self.clock.now();
            if key.at > now {
                return;
            }
            // Events that came due while a previous one was playing are not late
            let late_by = awake_since - key.at;
            if late_by > grace {
                if let Some(calendar) = &self.calendar {
                    log_block_start!(
                        "Missed {} by {}",
                        calendar.records[index].event.describe(),
                        format_countdown(late_by)
                    );
                }
                self.settle(index, TriggerState::Skipped(SkipReason::Missed), now);
            } else {
                self.fire(index);
            }
        }
    }

    fn fire(&mut self, index: usize) {
        let Some(calendar) = self.calendar.as_mut() else {
            return;
        };
        let date = calendar.date();
        let prayer_at = calendar.times.get(calendar.records[index].event.prayer);
        let record = &mut calendar.records[index];
        let event = record.event.clone();
        record.state = TriggerState::Fired;
        record.since = self.clock.now();

        self.fire_log.record(date, &event);
        if let Some(oldest) = date.checked_sub_days(Days::new(JOURNAL_RETENTION_DAYS)) {
            self.fire_log.prune(oldest);
        }
        self.save_journal();

        let policy = self.settings.playback;
        let outcome = match event.kind {
            EventKind::Main => {
                let track = event
                    .track
                    .unwrap_or_else(|| TrackSelector::new(self.settings.prayers.voice, event.prayer));
                log_block_start!("{} ({})", event.describe(), event.prayer.local_name());
                log_indented!("Playing {track} at {}%", event.volume);
                let worker = &mut self.worker;
                with_retries(self.clock.as_ref(), &policy, || {
                    worker.play(track, event.volume, policy.timeout)
                })
            }
            EventKind::PreAlert => {
                log_block_start!("{}", event.describe());
                let notifier = &self.notifier;
                let prayer_at = prayer_at.with_timezone(&Utc);
                with_retries(self.clock.as_ref(), &policy, || {
                    notifier
                        .notify(event.prayer, prayer_at)
                        .map(|()| PlayOutcome::Finished)
                })
            }
        };

        match (&outcome.error, outcome.cancelled) {
            (_, true) => log_decorated!("Cancelled"),
            (None, false) => log_decorated!("Done"),
            (Some(error), false) => log_error!(
                "{} failed after {} attempt(s): {error}",
                event.describe(),
                outcome.attempts
            ),
        }

        let now = self.clock.now();
        self.settle(index, TriggerState::Completed(outcome), now);
        self.last_trigger = self
            .calendar
            .as_ref()
            .map(|calendar| calendar.records[index].clone());
    }

    /// Move a record to a terminal state and remember it.
    fn settle(&mut self, index: usize, state: TriggerState, now: DateTime<Utc>) {
        let Some(calendar) = self.calendar.as_mut() else {
            return;
        };
        let record = &mut calendar.records[index];
        record.state = state;
        record.since = now;
        let record = record.clone();
        self.remember(record);
    }

    fn remember(&mut self, record: TriggerRecord) {
        if self.history.len() == HISTORY_CAPACITY {
            self.history.pop_front();
        }
        self.history.push_back(record);
    }

    /// Recompute the calendar from the current settings.
    fn rebuild(&mut self, now: DateTime<Utc>) {
        match select_times(now, &self.settings) {
            Ok(times) => self.install_calendar(times, now),
            Err(e) => {
                log_pipe!();
                log_error!("Could not compute prayer times: {e}");
                self.settings_rejected = Some(e.to_string());
                self.retry_rebuild_at = Some(now + Duration::hours(REBUILD_RETRY_HOURS));
            }
        }
    }

    /// Validate and adopt a settings snapshot, or keep the current calendar.
    fn apply_settings(&mut self, settings: ScheduleSettings, now: DateTime<Utc>, full: bool) {
        if let Err(e) = settings.validate() {
            self.reject(e.to_string());
            return;
        }

        let reusable = self
            .calendar
            .as_ref()
            .filter(|_| !full && !self.settings.changes_times(&settings))
            .map(|calendar| calendar.times.clone());
        let times = match reusable {
            Some(times) => times,
            None => match select_times(now, &settings) {
                Ok(times) => times,
                Err(e) => {
                    self.reject(e.to_string());
                    return;
                }
            },
        };

        if settings.location.timezone() != self.settings.location.timezone() {
            log_indented!("Timezone: {}", settings.location.timezone());
        }
        self.settings = settings;
        self.settings_rejected = None;
        self.install_calendar(times, now);
    }

    fn reject(&mut self, reason: String) {
        log_pipe!();
        log_warning!("Keeping the current prayer calendar");
        log_indented!("{reason}");
        self.settings_rejected = Some(reason);
    }

    /// Replace the calendar; pending events of the old one are superseded.
    fn install_calendar(&mut self, times: DailyTimes, now: DateTime<Utc>) {
        if let Some(calendar) = self.calendar.as_mut() {
            let mut superseded = Vec::new();
            for record in calendar.records.iter_mut().filter(|r| r.state.is_pending()) {
                record.state = TriggerState::Superseded;
                record.since = now;
                superseded.push(record.clone());
            }
            for record in superseded {
                self.remember(record);
            }
        }

        self.generation += 1;
        let date = times.date();
        let fire_log = &self.fire_log;
        let records: Vec<TriggerRecord> = calendar::build(&times, &self.settings.prayers)
            .into_iter()
            .map(|event| {
                let state = if fire_log.contains(date, &event) {
                    TriggerState::Skipped(SkipReason::AlreadyFired)
                } else if event.key().at < now {
                    TriggerState::Skipped(SkipReason::Elapsed)
                } else {
                    TriggerState::Scheduled
                };
                TriggerRecord {
                    event,
                    state,
                    since: now,
                }
            })
            .collect();
        for record in records.iter().filter(|r| r.state.is_terminal()) {
            self.remember(record.clone());
        }

        self.calendar = Some(Calendar {
            generation: self.generation,
            times,
            records,
        });
        self.retry_rebuild_at = None;
        self.log_calendar();
    }

    fn log_calendar(&self) {
        let Some(calendar) = &self.calendar else {
            return;
        };
        log_block_start!(
            "Prayer calendar for {}",
            calendar.date().format("%A, %d %B %Y")
        );
        for (prayer, at) in calendar.times.iter() {
            log_indented!("{:<8} {}", prayer.to_string(), at.format("%H:%M"));
        }

        let adjustments = calendar.times.adjustments();
        if let Some(latitude) = adjustments.clamped_latitude {
            log_indented!("Computed at latitude {latitude:.1}° (sun never sets or rises)");
        }
        if adjustments.elevation_ignored {
            log_indented!("Sunrise and sunset computed without the elevation dip");
        }
        if adjustments.fajr_from_night_portion || adjustments.isha_from_night_portion {
            log_indented!(
                "Fajr/Isha from the {} night portion",
                self.settings.calculation.high_latitude_rule.as_str()
            );
        }

        let pending = calendar
            .records
            .iter()
            .filter(|r| r.state.is_pending())
            .count();
        log_decorated!(
            "{pending} of {} event(s) scheduled",
            calendar.records.len()
        );
        if self.debug_enabled {
            for record in &calendar.records {
                log_debug!("{} {}", record.event.describe(), record.state);
            }
        }
    }

    fn save_journal(&self) {
        if let Some(journal) = &self.journal
            && let Err(e) = journal.save(&self.fire_log)
        {
            log_warning!("Failed to update fire journal: {e:#}");
        }
    }
}

/// Times for the calendar that is current at `now`.
///
/// Normally the local date of `now`, but the previous day while its last
/// events (an Isha after midnight, say) are still ahead.
fn select_times(
    now: DateTime<Utc>,
    settings: &ScheduleSettings,
) -> Result<DailyTimes, CalculationError> {
    let tz = settings.location.timezone();
    let today = now.with_timezone(&tz).date_naive();

    if let Some(yesterday) = today.pred_opt() {
        let previous = geo::compute(yesterday, &settings.location, &settings.calculation)?;
        let tail_pending = calendar::build(&previous, &settings.prayers)
            .iter()
            .any(|event| event.key().at > now);
        if tail_pending {
            return Ok(previous);
        }
    }
    geo::compute(today, &settings.location, &settings.calculation)
}

/// First instant of `date` in `tz` (01:00 when midnight is skipped by DST).
fn local_midnight(date: NaiveDate, tz: Tz) -> DateTime<Utc> {
    [0, 1]
        .into_iter()
        .filter_map(|hour| date.and_hms_opt(hour, 0, 0))
        .find_map(|naive| tz.from_local_datetime(&naive).earliest())
        .map(|local| local.with_timezone(&Utc))
        .unwrap_or_else(|| date.and_time(chrono::NaiveTime::MIN).and_utc())
}

/// Run `attempt` until it succeeds, fails fatally or the retry budget is spent.
fn with_retries(
    clock: &dyn Clock,
    policy: &PlaybackPolicy,
    mut attempt: impl FnMut() -> Result<PlayOutcome, PlaybackError>,
) -> Outcome {
    let mut attempts = 0;
    loop {
        attempts += 1;
        match attempt() {
            Ok(result) => {
                return Outcome {
                    attempts,
                    error: None,
                    cancelled: result == PlayOutcome::Cancelled,
                };
            }
            Err(e) if e.is_transient() && attempts <= policy.retries => {
                log_warning!("Attempt {attempts} failed: {e}");
                clock.sleep(policy.backoff * attempts);
            }
            Err(e) => {
                return Outcome {
                    attempts,
                    error: Some(e.to_string()),
                    cancelled: false,
                };
            }
        }
    }
}
