//! Commands accepted by the engine loop and the handle that sends them.

use anyhow::{Context, Result};
use chrono::NaiveDate;
use std::sync::mpsc::{Sender, channel};
use std::time::Duration;

use super::settings::ScheduleSettings;
use super::status::EngineStatus;
use crate::backend::{PlayOutcome, StopHandle};
use crate::error::{CalculationError, PlaybackError};
use crate::geo::DailyTimes;
use crate::prayer::TrackSelector;

/// Everything that can change engine state from outside the loop.
///
/// Commands are processed in arrival order. While an event is armed the loop
/// does not read the channel, so a command sent then waits until the event
/// has completed.
#[derive(Debug)]
pub enum Command {
    /// Replace the settings snapshot and rebuild.
    ApplySettings(Box<ScheduleSettings>),
    /// Reload from the settings source (if any) and rebuild from scratch.
    RebuildNow,
    /// Bookkeeping after a playback was interrupted through the stop handle.
    CancelActive,
    /// Play a recording outside the calendar, optionally cut at `length`.
    RequestTestPlayback {
        track: TrackSelector,
        volume: u8,
        length: Option<Duration>,
        reply: Sender<Result<PlayOutcome, PlaybackError>>,
    },
    Status(Sender<EngineStatus>),
    TimesFor {
        start: NaiveDate,
        days: u32,
        reply: Sender<Result<Vec<DailyTimes>, CalculationError>>,
    },
    /// The wall clock was set or the system resumed from sleep.
    ClockChanged,
    Shutdown,
}

/// Cloneable entry point for talking to a running engine.
#[derive(Clone)]
pub struct EngineHandle {
    sender: Sender<Command>,
    stop: StopHandle,
}

impl EngineHandle {
    pub(super) fn new(sender: Sender<Command>, stop: StopHandle) -> Self {
        Self { sender, stop }
    }

    pub fn sender(&self) -> Sender<Command> {
        self.sender.clone()
    }

    fn send(&self, command: Command) -> Result<()> {
        self.sender
            .send(command)
            .map_err(|_| anyhow::anyhow!("Prayer time engine is not running"))
    }

    pub fn current_status(&self) -> Result<EngineStatus> {
        let (reply, response) = channel();
        self.send(Command::Status(reply))?;
        response
            .recv()
            .context("Engine stopped before reporting its status")
    }

    pub fn times_for(&self, start: NaiveDate, days: u32) -> Result<Vec<DailyTimes>> {
        let (reply, response) = channel();
        self.send(Command::TimesFor { start, days, reply })?;
        let times = response
            .recv()
            .context("Engine stopped before answering")??;
        Ok(times)
    }

    /// Hand over a new snapshot. The loop validates it like a reloaded file:
    /// an invalid one is reported through `EngineStatus::settings_rejected`.
    pub fn apply_settings(&self, settings: ScheduleSettings) -> Result<()> {
        self.send(Command::ApplySettings(Box::new(settings)))
    }

    /// Play a recording through the same serialized path as scheduled adhans.
    pub fn test_playback(
        &self,
        track: TrackSelector,
        volume: u8,
        length: Option<Duration>,
    ) -> Result<PlayOutcome> {
        let (reply, response) = channel();
        self.send(Command::RequestTestPlayback {
            track,
            volume,
            length,
            reply,
        })?;
        let outcome = response
            .recv()
            .context("Engine stopped before the test playback finished")??;
        Ok(outcome)
    }

    pub fn rebuild_now(&self) -> Result<()> {
        self.send(Command::RebuildNow)
    }

    /// Stop the playback in progress immediately, then record it in the loop.
    pub fn cancel_active(&self) -> Result<()> {
        self.stop.cancel();
        self.send(Command::CancelActive)
    }

    pub fn clock_changed(&self) -> Result<()> {
        self.send(Command::ClockChanged)
    }

    pub fn shutdown(&self) -> Result<()> {
        self.send(Command::Shutdown)
    }
}
