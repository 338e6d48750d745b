//! Daemon coordinator that manages the complete lifecycle of `vakitd run`.
//!
//! It acquires resources and wires the engine to the outside world:
//! - configuration loading and logging
//! - lock file management for single-instance enforcement
//! - player detection and creation
//! - fire journal
//! - signal handler, clock-change and resume monitors, config watcher
//!
//! The engine loop then runs on the calling thread until shutdown.

use anyhow::{Context, Result};
use std::sync::Arc;

use crate::backend::{LogNotifier, create_player, detect_player};
use crate::common::logger::Log;
use crate::config::{self, ConfigWatcher, FileSettings};
use crate::engine::{EngineParams, TriggerEngine};
use crate::io::journal::JournalFile;
use crate::io::lock::{self, InstanceLock};
use crate::io::signals::setup_signal_handler;
use crate::io::system_events::start_system_event_monitors;
use crate::time::source::{self, RealClock};

/// Builder for configuring and running the daemon.
///
/// ```no_run
/// use vakit::daemon::Vakitd;
///
/// # fn main() -> anyhow::Result<()> {
/// Vakitd::new(false).run()?;
/// # Ok(())
/// # }
/// ```
pub struct Vakitd {
    debug_enabled: bool,
    create_lock: bool,
    show_headers: bool,
}

impl Vakitd {
    /// Create a new runner with defaults matching normal run
    pub fn new(debug_enabled: bool) -> Self {
        Self {
            debug_enabled,
            create_lock: true,
            show_headers: true,
        }
    }

    /// Skip lock file creation
    pub fn without_lock(mut self) -> Self {
        self.create_lock = false;
        self
    }

    /// Skip the version header
    pub fn without_headers(mut self) -> Self {
        self.show_headers = false;
        self
    }

    /// Run until a shutdown signal arrives.
    pub fn run(self) -> Result<()> {
        if self.show_headers {
            log_version!();
        }

        let config = config::load().context("Configuration failed")?;
        let settings = config.to_schedule_settings()?;
        let settings_source = FileSettings::from_config_dir()?;
        let config_path = settings_source.path().to_path_buf();
        config.log_config(&settings, Some(&config_path));
        Log::set_location_timezone(settings.location.timezone());

        // Lock before touching the journal or the audio device
        let _lock: Option<InstanceLock> = if self.create_lock {
            let lock = lock::acquire_lock(&lock::default_lock_path())?;
            if self.debug_enabled {
                log_pipe!();
                log_debug!("Lock acquired at {}", lock.path().display());
            }
            Some(lock)
        } else {
            None
        };

        let player_type = detect_player(config.player())?;
        let player = create_player(player_type, config.audio_dir()?);
        log_block_start!("Audio player: {}", player.name());

        let journal = match JournalFile::default_location() {
            Ok(journal) => Some(journal),
            Err(e) => {
                log_pipe!();
                log_warning!("Fire journal unavailable: {e:#}");
                log_indented!("Events fired before a restart may play again");
                None
            }
        };

        source::init_clock(Arc::new(RealClock));
        let clock = source::clock();
        let (engine, handle) = TriggerEngine::new(EngineParams {
            clock,
            player,
            notifier: Box::new(LogNotifier::new(settings.location.timezone())),
            settings,
            source: Some(Box::new(settings_source)),
            journal,
            debug_enabled: self.debug_enabled,
        });

        setup_signal_handler(handle.clone(), self.debug_enabled)?;
        start_system_event_monitors(handle.clone(), self.debug_enabled);

        let watcher = ConfigWatcher::new(config_path, handle.sender(), self.debug_enabled);
        if let Err(e) = watcher.start() {
            log_pipe!();
            log_warning!("Config file watching unavailable: {e:#}");
            log_indented!("Hot config reload disabled, use SIGHUP for manual reload");
        }

        log_block_start!("Starting prayer time engine...");
        engine.run();
        log_end!();
        Ok(())
    }
}
