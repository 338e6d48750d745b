//! Adhan playback through external command-line players.

use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use std::process::{Child, Command, Stdio};
use std::sync::Mutex;
use std::time::Duration;

use super::{PlaybackPort, PlayerType};
use crate::common::utils::private_path;
use crate::error::PlaybackError;
use crate::prayer::TrackSelector;

const POLL_INTERVAL: Duration = Duration::from_millis(100);

/// Locate the recording for `track` in `audio_dir`.
pub fn resolve_track(audio_dir: &Path, track: &TrackSelector) -> Option<PathBuf> {
    track
        .candidate_file_names()
        .iter()
        .map(|name| audio_dir.join(name))
        .find(|path| path.is_file())
}

/// Build the player invocation with volume mapped to the player's scale.
fn player_command(player: PlayerType, file: &Path, volume: u8) -> Command {
    let volume = u32::from(volume.min(100));
    let mut command = Command::new(player.binary());
    match player {
        PlayerType::Mpg123 => {
            command.args(["-q", "--scale", &(volume * 32_768 / 100).to_string()]);
        }
        PlayerType::Ffplay => {
            command.args(["-nodisp", "-autoexit", "-loglevel", "quiet", "-volume"]);
            command.arg(volume.to_string());
        }
        PlayerType::Paplay => {
            command.arg(format!("--volume={}", volume * 65_536 / 100));
        }
        PlayerType::Aplay | PlayerType::DryRun => {
            command.arg("-q");
        }
    }
    command
        .arg(file)
        .stdin(Stdio::null())
        .stdout(Stdio::null())
        .stderr(Stdio::null());
    command
}

/// Plays recordings with mpg123, ffplay, paplay or aplay.
pub struct CommandPlayer {
    player: PlayerType,
    audio_dir: PathBuf,
    child: Mutex<Option<Child>>,
}

impl CommandPlayer {
    pub fn new(player: PlayerType, audio_dir: PathBuf) -> Self {
        Self {
            player,
            audio_dir,
            child: Mutex::new(None),
        }
    }

    fn lock_child(&self) -> Result<std::sync::MutexGuard<'_, Option<Child>>, PlaybackError> {
        self.child
            .lock()
            .map_err(|_| PlaybackError::Fatal("player state poisoned".into()))
    }
}

impl PlaybackPort for CommandPlayer {
    fn play(&self, track: TrackSelector, volume: u8) -> Result<(), PlaybackError> {
        let file = resolve_track(&self.audio_dir, &track).ok_or_else(|| {
            PlaybackError::Fatal(format!(
                "no recording for {track} in {}",
                private_path(&self.audio_dir)
            ))
        })?;

        let child = player_command(self.player, &file, volume)
            .spawn()
            .map_err(|e| match e.kind() {
                ErrorKind::NotFound | ErrorKind::PermissionDenied => {
                    PlaybackError::Fatal(format!("cannot run {}: {e}", self.player.binary()))
                }
                _ => PlaybackError::Transient(format!("{} failed to start: {e}", self.player.binary())),
            })?;
        *self.lock_child()? = Some(child);

        loop {
            {
                let mut guard = self.lock_child()?;
                let Some(child) = guard.as_mut() else {
                    // Taken by stop()
                    return Ok(());
                };
                match child.try_wait() {
                    Ok(Some(status)) => {
                        *guard = None;
                        return if status.success() {
                            Ok(())
                        } else {
                            Err(PlaybackError::Transient(format!(
                                "{} exited with {status}",
                                self.player.binary()
                            )))
                        };
                    }
                    Ok(None) => {}
                    Err(e) => {
                        *guard = None;
                        return Err(PlaybackError::Transient(format!(
                            "lost track of {}: {e}",
                            self.player.binary()
                        )));
                    }
                }
            }
            std::thread::sleep(POLL_INTERVAL);
        }
    }

    fn stop(&self) {
        if let Ok(mut guard) = self.child.lock()
            && let Some(mut child) = guard.take()
        {
            let _ = child.kill();
            let _ = child.wait();
        }
    }

    fn name(&self) -> &'static str {
        self.player.binary()
    }
}

/// Logs what would be played; used by the simulator and `player = "none"`.
pub struct DryRunPlayer {
    audio_dir: PathBuf,
}

impl DryRunPlayer {
    pub fn new(audio_dir: PathBuf) -> Self {
        Self { audio_dir }
    }
}

impl PlaybackPort for DryRunPlayer {
    fn play(&self, track: TrackSelector, volume: u8) -> Result<(), PlaybackError> {
        match resolve_track(&self.audio_dir, &track) {
            Some(file) => log_indented!("Playing {} at {volume}%", private_path(&file)),
            None => log_indented!("Playing {track} at {volume}% (no recording installed)"),
        }
        Ok(())
    }

    fn stop(&self) {}

    fn name(&self) -> &'static str {
        "dry-run"
    }
}
