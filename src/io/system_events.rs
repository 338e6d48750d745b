//! Wall-clock change and sleep/resume detection.
//!
//! Two monitors, each on its own thread, tell the engine that its notion of
//! "now" may have jumped:
//! - systemd-logind `PrepareForSleep(false)` on the system bus (zbus)
//! - a far-future `CLOCK_REALTIME` timerfd armed with `TFD_TIMER_CANCEL_ON_SET`,
//!   which the kernel cancels whenever the wall clock is set
//!
//! Both end up as [`Command::ClockChanged`](crate::engine::Command::ClockChanged).
//! Either monitor failing only costs that detection; the engine still notices
//! large backward jumps on its own.

use anyhow::{Context, Result};
use nix::errno::Errno;
use nix::sys::time::TimeSpec;
use nix::sys::timerfd::{ClockId, Expiration, TimerFd, TimerFlags, TimerSetTimeFlags};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicI64, Ordering};
use std::thread;
use std::time::{Duration, SystemTime, UNIX_EPOCH};
use zbus::blocking::Connection;

use crate::engine::EngineHandle;

/// Timer events this soon after a resume are the resume itself.
const RESUME_GRACE_SECS: i64 = 5;
const MAX_DBUS_RESTARTS: u8 = 3;
const DBUS_RESTART_DELAY_MS: u64 = 2_000;

#[zbus::proxy(
    interface = "org.freedesktop.login1.Manager",
    default_service = "org.freedesktop.login1",
    default_path = "/org/freedesktop/login1"
)]
trait LogindManager {
    /// `start` is true before suspend and false after resume.
    #[zbus(signal)]
    fn prepare_for_sleep(&self, start: bool) -> zbus::Result<()>;
}

/// Shared between the monitors so a resume is reported once, not twice.
#[derive(Clone, Default)]
struct SleepTracker {
    is_sleeping: Arc<AtomicBool>,
    /// Unix seconds of the last resume, 0 if none yet.
    resume_time: Arc<AtomicI64>,
}

impl SleepTracker {
    fn current_timestamp() -> i64 {
        SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .unwrap_or_default()
            .as_secs() as i64
    }

    fn suppresses_time_change(&self, now: i64) -> bool {
        if self.is_sleeping.load(Ordering::Relaxed) {
            return true;
        }
        let resumed = self.resume_time.load(Ordering::Relaxed);
        resumed != 0 && now - resumed <= RESUME_GRACE_SECS
    }
}

/// Start both monitors. Never fails; problems are logged as warnings.
pub fn start_system_event_monitors(handle: EngineHandle, debug_enabled: bool) {
    let tracker = SleepTracker::default();

    let sleep_handle = handle.clone();
    let sleep_tracker = tracker.clone();
    let spawned = thread::Builder::new()
        .name("sleep-monitor".into())
        .spawn(move || {
            let mut restarts = 0;
            loop {
                match monitor_sleep_signals(&sleep_handle, debug_enabled, &sleep_tracker) {
                    Ok(()) => return,
                    Err(e) => {
                        log_pipe!();
                        log_warning!("Sleep monitor error: {e:#}");
                        if restarts >= MAX_DBUS_RESTARTS {
                            log_indented!("Sleep/resume detection will not be available");
                            return;
                        }
                        restarts += 1;
                        log_indented!(
                            "Restarting D-Bus monitor (attempt {restarts}/{MAX_DBUS_RESTARTS})"
                        );
                        thread::sleep(Duration::from_millis(DBUS_RESTART_DELAY_MS));
                    }
                }
            }
        });
    if let Err(e) = spawned {
        log_warning!("Could not start sleep monitor: {e}");
    }

    let spawned = thread::Builder::new()
        .name("time-change-monitor".into())
        .spawn(move || {
            if let Err(e) = monitor_time_changes(&handle, debug_enabled, &tracker) {
                log_pipe!();
                log_warning!("Time change monitor error: {e:#}");
                log_indented!("System time change detection will not be available");
            }
        });
    if let Err(e) = spawned {
        log_warning!("Could not start time change monitor: {e}");
    }
}

/// Returns `Ok(())` when the engine is gone, `Err` when the bus connection drops.
fn monitor_sleep_signals(
    handle: &EngineHandle,
    debug_enabled: bool,
    tracker: &SleepTracker,
) -> Result<()> {
    let connection = Connection::system().context("Failed to connect to system D-Bus")?;
    let logind =
        LogindManagerProxyBlocking::new(&connection).context("Failed to create logind proxy")?;
    let signals = logind
        .receive_prepare_for_sleep()
        .context("Failed to subscribe to PrepareForSleep signals")?;

    if debug_enabled {
        log_debug!("Subscribed to systemd-logind PrepareForSleep signals");
    }

    for signal in signals {
        let args = match signal.args() {
            Ok(args) => args,
            Err(e) => {
                log_warning!("Failed to parse PrepareForSleep signal args: {e}");
                continue;
            }
        };

        if args.start {
            tracker.is_sleeping.store(true, Ordering::SeqCst);
            log_pipe!();
            log_info!("System entering sleep");
            continue;
        }

        tracker
            .resume_time
            .store(SleepTracker::current_timestamp(), Ordering::SeqCst);
        tracker.is_sleeping.store(false, Ordering::SeqCst);
        log_pipe!();
        log_info!("System resumed from sleep, re-checking the schedule");

        if handle.clock_changed().is_err() {
            return Ok(());
        }
    }

    anyhow::bail!("D-Bus connection lost, PrepareForSleep signal stream ended")
}

/// A realtime timer that only ever "fires" when the wall clock is set.
struct TimeChangeDetector {
    timer: TimerFd,
}

impl TimeChangeDetector {
    fn new() -> nix::Result<Self> {
        let timer = TimerFd::new(ClockId::CLOCK_REALTIME, TimerFlags::empty())?;
        let mut detector = Self { timer };
        detector.arm()?;
        Ok(detector)
    }

    fn arm(&mut self) -> nix::Result<()> {
        let flags =
            TimerSetTimeFlags::TFD_TIMER_ABSTIME | TimerSetTimeFlags::TFD_TIMER_CANCEL_ON_SET;
        let far_future = TimeSpec::new(i64::MAX / 1000, 0);
        self.timer.set(Expiration::OneShot(far_future), flags)
    }

    /// Block until the clock is set, then re-arm.
    fn wait(&mut self) -> Result<()> {
        match self.timer.wait() {
            Ok(()) | Err(Errno::ECANCELED) => {
                self.arm().context("Failed to re-arm time change timer")
            }
            Err(e) => Err(anyhow::anyhow!("Timer wait error: {e}")),
        }
    }
}

fn monitor_time_changes(
    handle: &EngineHandle,
    debug_enabled: bool,
    tracker: &SleepTracker,
) -> Result<()> {
    let mut detector =
        TimeChangeDetector::new().context("Failed to create time change detector")?;

    if debug_enabled {
        log_debug!("Watching for system time changes");
    }

    loop {
        detector.wait()?;

        if tracker.suppresses_time_change(SleepTracker::current_timestamp()) {
            continue;
        }

        log_pipe!();
        log_info!("System time changed, re-checking the schedule");
        if handle.clock_changed().is_err() {
            return Ok(());
        }
    }
}
