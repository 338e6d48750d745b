//! Clock abstraction for real and simulated time.
//!
//! The engine never reads the system clock directly. It asks a [`Clock`] for
//! the current instant and blocks through it, which lets `vakitd simulate`
//! replay a whole day in milliseconds and lets tests drive time explicitly.
//!
//! A global clock is also installed with [`init_clock`] so the logger can
//! prefix simulated output with the simulated wall time.

use chrono::{DateTime, NaiveDateTime, TimeZone, Utc};
use chrono_tz::Tz;
use once_cell::sync::OnceCell;
use std::sync::mpsc::{Receiver, RecvTimeoutError};
use std::sync::{Arc, Mutex};
use std::time::{Duration as StdDuration, Instant};

use crate::common::constants::MAXIMUM_SLEEP_CHUNK_SECS;
use crate::engine::Command;

static CLOCK: OnceCell<Arc<dyn Clock>> = OnceCell::new();

/// Why an interruptible wait returned.
#[derive(Debug)]
pub enum Wake {
    /// The deadline was reached.
    Elapsed,
    /// A command arrived first.
    Command(Command),
    /// Every sender is gone; nothing can wake the engine again.
    Disconnected,
}

pub trait Clock: Send + Sync {
    fn now(&self) -> DateTime<Utc>;

    /// Block for `duration` without looking at the command channel.
    fn sleep(&self, duration: StdDuration);

    /// Block until `deadline` or until a command arrives on `inbox`.
    fn sleep_until(&self, deadline: DateTime<Utc>, inbox: &Receiver<Command>) -> Wake;

    fn is_simulated(&self) -> bool;

    /// True once a simulation has reached its end (always false for real time).
    fn is_ended(&self) -> bool {
        false
    }
}

/// System wall clock.
pub struct RealClock;

impl Clock for RealClock {
    fn now(&self) -> DateTime<Utc> {
        Utc::now()
    }

    fn sleep(&self, duration: StdDuration) {
        std::thread::sleep(duration);
    }

    fn sleep_until(&self, deadline: DateTime<Utc>, inbox: &Receiver<Command>) -> Wake {
        // Sleep in bounded chunks: the monotonic timer behind recv_timeout does
        // not follow wall-clock jumps, so re-measure against the wall clock
        let max_chunk = StdDuration::from_secs(MAXIMUM_SLEEP_CHUNK_SECS);
        loop {
            let Ok(remaining) = (deadline - Utc::now()).to_std() else {
                return Wake::Elapsed;
            };
            if remaining.is_zero() {
                return Wake::Elapsed;
            }
            match inbox.recv_timeout(remaining.min(max_chunk)) {
                Ok(command) => return Wake::Command(command),
                Err(RecvTimeoutError::Timeout) => continue,
                Err(RecvTimeoutError::Disconnected) => return Wake::Disconnected,
            }
        }
    }

    fn is_simulated(&self) -> bool {
        false
    }
}

/// Simulated clock for `vakitd simulate` and tests.
///
/// Two modes:
/// - fast-forward (`multiplier == 0.0`): sleeps return immediately after
///   advancing the clock by the requested amount
/// - accelerated: simulated time flows `multiplier` times faster than real time
pub struct SimulatedClock {
    start: DateTime<Utc>,
    end: DateTime<Utc>,
    multiplier: f64,
    /// Fast-forward position, or the simulated anchor for accelerated mode
    current: Mutex<DateTime<Utc>>,
    /// Real instant corresponding to `current` in accelerated mode
    anchor: Mutex<Instant>,
}

impl SimulatedClock {
    pub fn new(start: DateTime<Utc>, end: DateTime<Utc>, multiplier: f64) -> Self {
        let multiplier = if multiplier.is_finite() && multiplier >= 0.0 {
            multiplier
        } else {
            3600.0
        };
        Self {
            start,
            end,
            multiplier,
            current: Mutex::new(start),
            anchor: Mutex::new(Instant::now()),
        }
    }

    /// Fast-forward clock starting at `start` that never ends.
    pub fn fast_forward(start: DateTime<Utc>) -> Self {
        Self::new(start, DateTime::<Utc>::MAX_UTC, 0.0)
    }

    pub fn start(&self) -> DateTime<Utc> {
        self.start
    }

    fn is_fast_forward(&self) -> bool {
        self.multiplier == 0.0
    }

    /// Move the clock to `instant` (fast-forward mode; backwards allowed for tests).
    pub fn set(&self, instant: DateTime<Utc>) {
        if let Ok(mut current) = self.current.lock() {
            *current = instant.min(self.end);
        }
        if let Ok(mut anchor) = self.anchor.lock() {
            *anchor = Instant::now();
        }
    }

    pub fn advance(&self, duration: chrono::Duration) {
        let target = self.now() + duration;
        self.set(target);
    }

    fn scaled(&self, real: StdDuration) -> chrono::Duration {
        let simulated = real.as_secs_f64() * self.multiplier;
        chrono::Duration::milliseconds((simulated * 1000.0) as i64)
    }
}

impl Clock for SimulatedClock {
    fn now(&self) -> DateTime<Utc> {
        let current = self.current.lock().map(|c| *c).unwrap_or(self.end);
        if self.is_fast_forward() {
            return current;
        }
        let elapsed = self.anchor.lock().map(|a| a.elapsed()).unwrap_or_default();
        (current + self.scaled(elapsed)).min(self.end)
    }

    fn sleep(&self, duration: StdDuration) {
        if self.is_fast_forward() {
            let step = chrono::Duration::from_std(duration).unwrap_or(chrono::Duration::zero());
            self.advance(step);
            // Let log and worker threads keep up with the simulation
            std::thread::sleep(StdDuration::from_millis(1));
        } else {
            let remaining = (self.end - self.now()).to_std().unwrap_or_default();
            let simulated = duration.min(remaining);
            std::thread::sleep(StdDuration::from_secs_f64(
                simulated.as_secs_f64() / self.multiplier,
            ));
        }
    }

    fn sleep_until(&self, deadline: DateTime<Utc>, inbox: &Receiver<Command>) -> Wake {
        if let Ok(command) = inbox.try_recv() {
            return Wake::Command(command);
        }
        let now = self.now();
        if deadline <= now {
            return Wake::Elapsed;
        }

        if self.is_fast_forward() {
            self.set(deadline);
            return Wake::Elapsed;
        }

        let simulated = (deadline.min(self.end) - now).to_std().unwrap_or_default();
        let real = StdDuration::from_secs_f64(simulated.as_secs_f64() / self.multiplier);
        match inbox.recv_timeout(real) {
            Ok(command) => Wake::Command(command),
            Err(RecvTimeoutError::Timeout) => Wake::Elapsed,
            Err(RecvTimeoutError::Disconnected) => Wake::Disconnected,
        }
    }

    fn is_simulated(&self) -> bool {
        true
    }

    fn is_ended(&self) -> bool {
        self.now() >= self.end
    }
}

/// Install the process-wide clock (first call wins).
pub fn init_clock(clock: Arc<dyn Clock>) {
    CLOCK.set(clock).ok();
}

pub fn is_initialized() -> bool {
    CLOCK.get().is_some()
}

/// The process-wide clock, defaulting to the real one.
pub fn clock() -> Arc<dyn Clock> {
    CLOCK.get_or_init(|| Arc::new(RealClock)).clone()
}

pub fn now() -> DateTime<Utc> {
    clock().now()
}

pub fn is_simulated() -> bool {
    clock().is_simulated()
}

/// Parse `YYYY-MM-DD HH:MM:SS` as a wall time in `tz`.
pub fn parse_datetime_in_tz(s: &str, tz: Tz) -> Result<DateTime<Utc>, String> {
    let naive = NaiveDateTime::parse_from_str(s.trim(), "%Y-%m-%d %H:%M:%S")
        .map_err(|e| format!("Invalid datetime format: {e}. Use YYYY-MM-DD HH:MM:SS"))?;
    tz.from_local_datetime(&naive)
        .earliest()
        .map(|dt| dt.with_timezone(&Utc))
        .ok_or_else(|| format!("{s} does not exist in timezone {tz}"))
}
