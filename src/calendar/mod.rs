//! Daily event calendar.
//!
//! [`build`] expands one day's [`DailyTimes`] into the ordered list of events
//! the engine triggers: an adhan (`Main`) for every enabled prayer and, when a
//! lead time is configured, a notification (`PreAlert`) before it.
//!
//! A pre-alert that would fall before the previous enabled prayer's adhan is
//! either moved onto that adhan's instant (ordered right after it) or dropped,
//! depending on [`OverlapPolicy`]. The output is a pure function of its inputs.

use chrono::{DateTime, Duration, Utc};
use chrono_tz::Tz;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};

use crate::common::constants::*;
use crate::error::SettingsError;
use crate::geo::DailyTimes;
use crate::prayer::{AdhanVoice, EventKind, PrayerKind, TrackSelector};

/// What happens to a pre-alert that would precede the previous prayer's adhan.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OverlapPolicy {
    /// Fire it at the previous adhan's instant, right after that adhan.
    #[default]
    Clamp,
    /// Do not schedule it.
    Suppress,
}

/// Adhan volume, globally and per prayer (0-100).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VolumeSettings {
    pub default: u8,
    pub per_prayer: BTreeMap<PrayerKind, u8>,
}

impl Default for VolumeSettings {
    fn default() -> Self {
        Self {
            default: DEFAULT_VOLUME,
            per_prayer: BTreeMap::new(),
        }
    }
}

impl VolumeSettings {
    pub fn volume_for(&self, prayer: PrayerKind) -> u8 {
        self.per_prayer.get(&prayer).copied().unwrap_or(self.default)
    }
}

/// Settings that shape the calendar but not the prayer times themselves.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PrayerSettings {
    pub enabled: BTreeSet<PrayerKind>,
    pub volume: VolumeSettings,
    pub pre_alert_minutes: u32,
    pub pre_alert_overlap: OverlapPolicy,
    pub voice: AdhanVoice,
}

impl Default for PrayerSettings {
    fn default() -> Self {
        Self {
            enabled: PrayerKind::USER_FACING.into_iter().collect(),
            volume: VolumeSettings::default(),
            pre_alert_minutes: DEFAULT_PRE_ALERT_MINUTES,
            pre_alert_overlap: OverlapPolicy::Clamp,
            voice: AdhanVoice::default(),
        }
    }
}

impl PrayerSettings {
    pub fn validate(&self) -> Result<(), SettingsError> {
        if self.enabled.iter().any(|p| !p.is_user_facing()) {
            return Err(SettingsError::Rejected(
                "sunrise cannot be enabled as a prayer event".into(),
            ));
        }
        if self.volume.default > MAXIMUM_VOLUME {
            return Err(SettingsError::Rejected(format!(
                "volume ({}) must be between 0 and {MAXIMUM_VOLUME}",
                self.volume.default
            )));
        }
        if let Some((prayer, volume)) = self
            .volume
            .per_prayer
            .iter()
            .find(|(_, v)| **v > MAXIMUM_VOLUME)
        {
            return Err(SettingsError::Rejected(format!(
                "{} volume ({volume}) must be between 0 and {MAXIMUM_VOLUME}",
                prayer.as_str()
            )));
        }
        if self.pre_alert_minutes > MAXIMUM_PRE_ALERT_MINUTES {
            return Err(SettingsError::Rejected(format!(
                "pre_alert_minutes ({}) must be at most {MAXIMUM_PRE_ALERT_MINUTES}",
                self.pre_alert_minutes
            )));
        }
        Ok(())
    }
}

/// Identity of an event across rebuilds: (instant, kind, prayer).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct EventKey {
    pub at: DateTime<Utc>,
    pub kind: EventKind,
    pub prayer: PrayerKind,
}

/// One timed action in the daily calendar.
#[derive(Debug, Clone, PartialEq)]
pub struct Event {
    pub at: DateTime<Tz>,
    pub kind: EventKind,
    pub prayer: PrayerKind,
    pub volume: u8,
    /// Recording for adhan events; pre-alerts carry none.
    pub track: Option<TrackSelector>,
}

impl Event {
    pub fn key(&self) -> EventKey {
        EventKey {
            at: self.at.with_timezone(&Utc),
            kind: self.kind,
            prayer: self.prayer,
        }
    }

    /// `Asr adhan at 17:07` / `Asr pre-alert at 16:52`.
    pub fn describe(&self) -> String {
        format!("{} {} at {}", self.prayer, self.kind, self.at.format("%H:%M"))
    }

    fn sort_key(&self) -> (DateTime<Tz>, usize, EventKind) {
        (self.at, self.prayer.index(), self.kind)
    }
}

/// Expand one day's times into its ordered event list.
pub fn build(times: &DailyTimes, settings: &PrayerSettings) -> Vec<Event> {
    let lead = Duration::minutes(i64::from(settings.pre_alert_minutes));
    let mut events = Vec::new();
    let mut previous_main: Option<DateTime<Tz>> = None;

    for prayer in PrayerKind::USER_FACING {
        if !settings.enabled.contains(&prayer) {
            continue;
        }
        let at = times.get(prayer);
        let volume = settings.volume.volume_for(prayer);

        if settings.pre_alert_minutes > 0 {
            let alert_at = match previous_main {
                Some(previous) if at - lead < previous => match settings.pre_alert_overlap {
                    OverlapPolicy::Clamp => Some(previous),
                    OverlapPolicy::Suppress => None,
                },
                _ => Some(at - lead),
            };
            if let Some(alert_at) = alert_at {
                events.push(Event {
                    at: alert_at,
                    kind: EventKind::PreAlert,
                    prayer,
                    volume,
                    track: None,
                });
            }
        }

        events.push(Event {
            at,
            kind: EventKind::Main,
            prayer,
            volume,
            track: Some(TrackSelector::new(settings.voice, prayer)),
        });
        previous_main = Some(at);
    }

    events.sort_by_key(Event::sort_key);
    events
}
