//! Lock file management for single-instance enforcement.
//!
//! Two daemons would play every adhan twice, so `vakitd run` takes an
//! exclusive `flock` on `$XDG_RUNTIME_DIR/vakitd.lock` and records its PID and
//! config directory there. A lock left behind by a dead process is removed.

use anyhow::{Context, Result};
use fs2::FileExt;
use std::fs::{File, OpenOptions};
use std::io::{Seek, SeekFrom, Write};
use std::path::{Path, PathBuf};

use crate::common::constants::LOCK_FILE_NAME;
use crate::common::utils::{self, private_path};
use crate::config;

/// Held for the lifetime of the daemon; releases and removes the file on drop.
pub struct InstanceLock {
    file: File,
    path: PathBuf,
}

impl InstanceLock {
    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl Drop for InstanceLock {
    fn drop(&mut self) {
        let _ = self.file.unlock();
        let _ = std::fs::remove_file(&self.path);
    }
}

/// `$XDG_RUNTIME_DIR/vakitd.lock`, or `/tmp/vakitd.lock` without a runtime dir.
pub fn default_lock_path() -> PathBuf {
    dirs::runtime_dir()
        .unwrap_or_else(std::env::temp_dir)
        .join(LOCK_FILE_NAME)
}

/// Acquire the instance lock at `lock_path`.
///
/// Fails with a message naming the running instance when the lock is held by
/// a live process.
pub fn acquire_lock(lock_path: &Path) -> Result<InstanceLock> {
    if let Some(lock) = try_lock(lock_path)? {
        return Ok(lock);
    }

    handle_lock_conflict(lock_path)?;

    // Stale lock was removed, retry once
    try_lock(lock_path)?.with_context(|| {
        format!(
            "Failed to acquire lock {} after removing a stale lock",
            private_path(lock_path)
        )
    })
}

fn try_lock(lock_path: &Path) -> Result<Option<InstanceLock>> {
    // Open without truncating so a running instance's PID stays readable
    let mut file = OpenOptions::new()
        .write(true)
        .create(true)
        .truncate(false)
        .open(lock_path)
        .with_context(|| format!("Failed to open lock file {}", private_path(lock_path)))?;

    if file.try_lock_exclusive().is_err() {
        return Ok(None);
    }

    file.set_len(0)?;
    file.seek(SeekFrom::Start(0))?;
    writeln!(file, "{}", std::process::id())?;
    match config::get_custom_config_dir() {
        Some(dir) => writeln!(file, "{}", dir.display())?,
        None => writeln!(file)?,
    }
    file.flush()?;

    Ok(Some(InstanceLock {
        file,
        path: lock_path.to_path_buf(),
    }))
}

/// PID recorded in a lock file, if it parses.
pub fn read_lock_pid(lock_path: &Path) -> Option<u32> {
    let content = std::fs::read_to_string(lock_path).ok()?;
    content.lines().next()?.trim().parse().ok()
}

/// Resolve a held lock: `Ok(())` if it was stale and has been removed,
/// an error if another instance is alive.
pub fn handle_lock_conflict(lock_path: &Path) -> Result<()> {
    if !lock_path.exists() {
        return Ok(());
    }

    let Some(pid) = read_lock_pid(lock_path) else {
        log_warning!("Lock file contains no valid PID, removing stale lock");
        let _ = std::fs::remove_file(lock_path);
        return Ok(());
    };

    if !utils::is_process_running(pid) {
        log_warning!("Removing stale lock file (process {pid} no longer running)");
        let _ = std::fs::remove_file(lock_path);
        return Ok(());
    }

    log_pipe!();
    log_error!("vakitd is already running (PID: {pid})");
    log_block_start!("Did you mean to:");
    log_indented!("• Reload configuration: kill -HUP {pid}");
    log_indented!("• Stop the current adhan: kill -USR1 {pid}");
    log_indented!("• Show today's times: vakitd times");
    anyhow::bail!("another vakitd instance is running (PID: {pid})")
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn lock_records_pid_and_is_removed_on_drop() {
        let dir = tempdir().unwrap();
        let path = dir.path().join(LOCK_FILE_NAME);

        let lock = acquire_lock(&path).unwrap();
        assert_eq!(lock.path(), path.as_path());
        assert_eq!(read_lock_pid(&path), Some(std::process::id()));

        drop(lock);
        assert!(!path.exists());
    }

    #[test]
    fn second_instance_is_refused() {
        let dir = tempdir().unwrap();
        let path = dir.path().join(LOCK_FILE_NAME);

        let _held = acquire_lock(&path).unwrap();
        let err = acquire_lock(&path).err().unwrap();
        assert!(err.to_string().contains(&std::process::id().to_string()));
    }

    #[test]
    fn stale_lock_is_removed() {
        let dir = tempdir().unwrap();
        let path = dir.path().join(LOCK_FILE_NAME);

        // PIDs are capped well below this on Linux
        std::fs::write(&path, "999999999\n\n").unwrap();
        handle_lock_conflict(&path).unwrap();
        assert!(!path.exists());

        std::fs::write(&path, "garbage\n").unwrap();
        handle_lock_conflict(&path).unwrap();
        assert!(!path.exists());
    }
}
