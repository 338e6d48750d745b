//! Prayer and event vocabulary shared by the calculator, calendar and engine.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// The daily moments computed by the calculator, in chronological order.
///
/// `Sunrise` is computed because Fajr and the high-latitude rules depend on it,
/// but it is never enabled as an event.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PrayerKind {
    Fajr,
    Sunrise,
    Dhuhr,
    Asr,
    Maghrib,
    Isha,
}

impl PrayerKind {
    pub const ALL: [PrayerKind; 6] = [
        PrayerKind::Fajr,
        PrayerKind::Sunrise,
        PrayerKind::Dhuhr,
        PrayerKind::Asr,
        PrayerKind::Maghrib,
        PrayerKind::Isha,
    ];

    /// Prayers that may be enabled for adhan playback.
    pub const USER_FACING: [PrayerKind; 5] = [
        PrayerKind::Fajr,
        PrayerKind::Dhuhr,
        PrayerKind::Asr,
        PrayerKind::Maghrib,
        PrayerKind::Isha,
    ];

    /// Position in `ALL`; also the chronological rank within a day.
    pub fn index(self) -> usize {
        self as usize
    }

    pub fn is_user_facing(self) -> bool {
        self != PrayerKind::Sunrise
    }

    pub fn as_str(self) -> &'static str {
        match self {
            PrayerKind::Fajr => "fajr",
            PrayerKind::Sunrise => "sunrise",
            PrayerKind::Dhuhr => "dhuhr",
            PrayerKind::Asr => "asr",
            PrayerKind::Maghrib => "maghrib",
            PrayerKind::Isha => "isha",
        }
    }

    /// Turkish vakit name shown alongside the Arabic one.
    /// ASCII form of the Turkish name, as used in recording file names.
    pub fn local_slug(self) -> &'static str {
        match self {
            PrayerKind::Fajr => "imsak",
            PrayerKind::Sunrise => "gunes",
            PrayerKind::Dhuhr => "ogle",
            PrayerKind::Asr => "ikindi",
            PrayerKind::Maghrib => "aksam",
            PrayerKind::Isha => "yatsi",
        }
    }

    pub fn local_name(self) -> &'static str {
        match self {
            PrayerKind::Fajr => "İmsak",
            PrayerKind::Sunrise => "Güneş",
            PrayerKind::Dhuhr => "Öğle",
            PrayerKind::Asr => "İkindi",
            PrayerKind::Maghrib => "Akşam",
            PrayerKind::Isha => "Yatsı",
        }
    }
}

impl fmt::Display for PrayerKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            PrayerKind::Fajr => "Fajr",
            PrayerKind::Sunrise => "Sunrise",
            PrayerKind::Dhuhr => "Dhuhr",
            PrayerKind::Asr => "Asr",
            PrayerKind::Maghrib => "Maghrib",
            PrayerKind::Isha => "Isha",
        };
        f.write_str(name)
    }
}

impl FromStr for PrayerKind {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "fajr" | "imsak" => Ok(PrayerKind::Fajr),
            "sunrise" | "gunes" => Ok(PrayerKind::Sunrise),
            "dhuhr" | "ogle" => Ok(PrayerKind::Dhuhr),
            "asr" | "ikindi" => Ok(PrayerKind::Asr),
            "maghrib" | "aksam" => Ok(PrayerKind::Maghrib),
            "isha" | "yatsi" => Ok(PrayerKind::Isha),
            other => anyhow::bail!("unknown prayer '{other}'"),
        }
    }
}

/// What an event does when it fires.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EventKind {
    /// Adhan playback at the prayer time.
    Main,
    /// Notification some minutes before the prayer time.
    PreAlert,
}

impl fmt::Display for EventKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            EventKind::Main => f.write_str("adhan"),
            EventKind::PreAlert => f.write_str("pre-alert"),
        }
    }
}

/// Recitation style of the adhan recordings.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AdhanVoice {
    #[default]
    Makkah,
    Madinah,
    Istanbul,
}

impl AdhanVoice {
    pub fn as_str(self) -> &'static str {
        match self {
            AdhanVoice::Makkah => "makkah",
            AdhanVoice::Madinah => "madinah",
            AdhanVoice::Istanbul => "istanbul",
        }
    }
}

impl FromStr for AdhanVoice {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "makkah" | "mecca" => Ok(AdhanVoice::Makkah),
            "madinah" | "medina" => Ok(AdhanVoice::Madinah),
            "istanbul" => Ok(AdhanVoice::Istanbul),
            other => anyhow::bail!("unknown adhan voice '{other}' (expected makkah, madinah or istanbul)"),
        }
    }
}

/// Identifies the recording to play; resolved to a file by the playback backend.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct TrackSelector {
    pub voice: AdhanVoice,
    pub prayer: PrayerKind,
}

impl TrackSelector {
    pub fn new(voice: AdhanVoice, prayer: PrayerKind) -> Self {
        Self { voice, prayer }
    }

    /// File names tried in order: prayer-specific first (English, then
    /// Turkish name), then the voice's generic recording.
    pub fn candidate_file_names(&self) -> [String; 3] {
        let voice = self.voice.as_str();
        [
            format!("adhan_{voice}_{}.mp3", self.prayer.as_str()),
            format!("adhan_{voice}_{}.mp3", self.prayer.local_slug()),
            format!("adhan_{voice}.mp3"),
        ]
    }
}

impl fmt::Display for TrackSelector {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.voice.as_str(), self.prayer.as_str())
    }
}
