//! Unix signal handling for the daemon.
//!
//! | Signal           | Effect                                   |
//! |------------------|------------------------------------------|
//! | SIGINT, SIGTERM  | stop any playback, then shut down        |
//! | SIGHUP, SIGUSR2  | reload `vakit.toml` and rebuild          |
//! | SIGUSR1          | stop the adhan that is playing right now |
//!
//! Signals are read on a dedicated thread with `signal-hook` and turned into
//! engine commands, so nothing runs in async-signal context.

use anyhow::{Context, Result};
use signal_hook::{
    consts::signal::{SIGHUP, SIGINT, SIGTERM, SIGUSR1, SIGUSR2},
    iterator::Signals,
};
use std::thread;

use crate::engine::EngineHandle;

/// What a received signal asks the engine to do.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SignalAction {
    Shutdown,
    Reload,
    CancelPlayback,
}

impl SignalAction {
    pub fn from_signal(signal: i32) -> Option<Self> {
        match signal {
            SIGINT | SIGTERM => Some(SignalAction::Shutdown),
            SIGHUP | SIGUSR2 => Some(SignalAction::Reload),
            SIGUSR1 => Some(SignalAction::CancelPlayback),
            _ => None,
        }
    }
}

/// Register the handlers and forward signals to the engine.
pub fn setup_signal_handler(handle: EngineHandle, debug_enabled: bool) -> Result<()> {
    let mut signals = Signals::new([SIGINT, SIGTERM, SIGHUP, SIGUSR1, SIGUSR2])
        .context("failed to register signal handlers")?;

    thread::Builder::new()
        .name("signals".into())
        .spawn(move || {
            for signal in signals.forever() {
                let Some(action) = SignalAction::from_signal(signal) else {
                    continue;
                };
                if debug_enabled {
                    log_pipe!();
                    log_debug!("Received signal {signal} ({action:?})");
                }

                let delivered = match action {
                    SignalAction::Shutdown => {
                        log_pipe!();
                        log_info!("Shutdown requested");
                        // The loop cannot see the command while an adhan plays
                        handle.cancel_active().and_then(|()| handle.shutdown())
                    }
                    SignalAction::Reload => {
                        log_pipe!();
                        log_info!("Reload requested");
                        handle.rebuild_now()
                    }
                    SignalAction::CancelPlayback => {
                        log_pipe!();
                        log_info!("Stopping current playback");
                        handle.cancel_active()
                    }
                };

                if delivered.is_err() {
                    // Engine already stopped
                    break;
                }
            }
        })
        .context("failed to spawn signal handler thread")?;

    Ok(())
}
