//! Fire journal: which events have already been triggered.
//!
//! The engine records every event before invoking a port. After a restart or a
//! clock jump the rebuilt calendar consults this record so an adhan is never
//! played twice for the same prayer on the same day. Marks are keyed by date
//! only: a fire recorded while the wall clock was wrong never hides events of
//! other days once the clock is corrected. The file lives in
//! `$XDG_STATE_HOME/vakit/journal.json` and is small enough to rewrite whole.

use anyhow::{Context, Result};
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::path::{Path, PathBuf};

use crate::calendar::Event;
use crate::common::constants::{APP_DIR_NAME, JOURNAL_FILE_NAME};
use crate::prayer::{EventKind, PrayerKind};

/// One triggered event, identified by calendar date rather than instant so
/// that a settings change moving the prayer a few minutes cannot re-fire it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
pub struct FireMark {
    pub date: NaiveDate,
    pub kind: EventKind,
    pub prayer: PrayerKind,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct FireLog {
    #[serde(default)]
    pub marks: BTreeSet<FireMark>,
}

impl FireLog {
    pub fn contains(&self, date: NaiveDate, event: &Event) -> bool {
        self.marks.contains(&FireMark {
            date,
            kind: event.kind,
            prayer: event.prayer,
        })
    }

    pub fn record(&mut self, date: NaiveDate, event: &Event) {
        self.marks.insert(FireMark {
            date,
            kind: event.kind,
            prayer: event.prayer,
        });
    }

    /// Forget marks for dates before `oldest`.
    pub fn prune(&mut self, oldest: NaiveDate) {
        self.marks.retain(|mark| mark.date >= oldest);
    }
}

/// Location of the journal on disk.
#[derive(Debug, Clone)]
pub struct JournalFile {
    path: PathBuf,
}

impl JournalFile {
    pub fn new(path: PathBuf) -> Self {
        Self { path }
    }

    /// `$XDG_STATE_HOME/vakit/journal.json`, falling back to the data dir.
    pub fn default_location() -> Result<Self> {
        let base = dirs::state_dir()
            .or_else(dirs::data_local_dir)
            .context("Could not determine a state directory for the fire journal")?;
        Ok(Self::new(base.join(APP_DIR_NAME).join(JOURNAL_FILE_NAME)))
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Read the journal; a missing file is an empty journal.
    pub fn load(&self) -> Result<FireLog> {
        if !self.path.exists() {
            return Ok(FireLog::default());
        }
        let content = std::fs::read_to_string(&self.path)
            .with_context(|| format!("Failed to read {}", self.path.display()))?;
        serde_json::from_str(&content)
            .with_context(|| format!("Failed to parse {}", self.path.display()))
    }

    /// Replace the journal atomically (write then rename).
    pub fn save(&self, log: &FireLog) -> Result<()> {
        if let Some(parent) = self.path.parent() {
            std::fs::create_dir_all(parent)
                .with_context(|| format!("Failed to create {}", parent.display()))?;
        }
        let content = serde_json::to_string_pretty(log)?;
        let staging = self.path.with_extension("json.tmp");
        std::fs::write(&staging, content)
            .with_context(|| format!("Failed to write {}", staging.display()))?;
        std::fs::rename(&staging, &self.path)
            .with_context(|| format!("Failed to replace {}", self.path.display()))?;
        Ok(())
    }
}
