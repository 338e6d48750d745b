//! File watching for hot config reloading.
//!
//! Watches the directory holding `vakit.toml` (editors often replace the file
//! instead of writing it in place) and asks the engine to rebuild when the
//! file changes. The engine re-reads the file through its settings source, so
//! a broken edit is rejected there and the previous calendar stays active.

use anyhow::{Context, Result};
use notify::{
    Config as NotifyConfig, Event, EventKind, RecommendedWatcher, RecursiveMode, Watcher,
};
use std::path::{Path, PathBuf};
use std::sync::mpsc::{Sender, channel};
use std::thread;
use std::time::{Duration, Instant};

use crate::common::constants::CONFIG_RELOAD_DEBOUNCE_MS;
use crate::common::utils::private_path;
use crate::engine::Command;

/// Configuration file watcher that sends rebuild requests to the engine.
pub struct ConfigWatcher {
    config_path: PathBuf,
    sender: Sender<Command>,
    debug_enabled: bool,
}

impl ConfigWatcher {
    pub fn new(config_path: PathBuf, sender: Sender<Command>, debug_enabled: bool) -> Self {
        Self {
            config_path,
            sender,
            debug_enabled,
        }
    }

    /// Spawn the watcher thread. Returns once the watch is registered.
    pub fn start(self) -> Result<()> {
        let Some(watch_dir) = self.config_path.parent().map(Path::to_path_buf) else {
            anyhow::bail!(
                "Config path {} has no parent directory",
                private_path(&self.config_path)
            );
        };

        let (tx, rx) = channel();
        let mut watcher = RecommendedWatcher::new(
            move |res: Result<Event, notify::Error>| {
                if let Ok(event) = res
                    && matches!(
                        event.kind,
                        EventKind::Create(_) | EventKind::Modify(_) | EventKind::Remove(_)
                    )
                {
                    let _ = tx.send(event);
                }
            },
            NotifyConfig::default(),
        )
        .context("Failed to create file watcher")?;

        watcher
            .watch(&watch_dir, RecursiveMode::NonRecursive)
            .with_context(|| format!("Failed to watch directory: {}", private_path(&watch_dir)))?;

        if self.debug_enabled {
            log_pipe!();
            log_debug!("Watching {} for changes", private_path(&self.config_path));
        }

        let ConfigWatcher {
            config_path,
            sender,
            debug_enabled,
        } = self;

        thread::Builder::new()
            .name("config-watcher".into())
            .spawn(move || {
                // The watcher must outlive the event loop
                let _watcher = watcher;
                let mut last_reload: Option<Instant> = None;

                for event in rx {
                    if !event.paths.iter().any(|p| affects_config(p, &config_path)) {
                        continue;
                    }

                    let debounce = Duration::from_millis(CONFIG_RELOAD_DEBOUNCE_MS);
                    if last_reload.is_some_and(|at| at.elapsed() < debounce) {
                        continue;
                    }

                    if debug_enabled {
                        log_pipe!();
                        log_info!("Configuration file change detected");
                    }

                    if sender.send(Command::RebuildNow).is_err() {
                        // Engine gone
                        break;
                    }
                    last_reload = Some(Instant::now());
                }
            })
            .context("Failed to spawn config watcher thread")?;

        Ok(())
    }
}

/// Whether an event path refers to the config file, including the temporary
/// names editors write before renaming (`vakit.toml~`, `.vakit.toml.swp`).
pub(crate) fn affects_config(event_path: &Path, config_path: &Path) -> bool {
    if event_path == config_path {
        return true;
    }
    if event_path.parent() != config_path.parent() {
        return false;
    }
    let (Some(event_name), Some(config_name)) = (
        event_path.file_name().and_then(|n| n.to_str()),
        config_path.file_name().and_then(|n| n.to_str()),
    ) else {
        return false;
    };
    event_name.trim_start_matches('.').starts_with(config_name)
}
