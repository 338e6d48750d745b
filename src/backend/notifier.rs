//! Pre-alert notifications.

use chrono::{DateTime, Utc};
use chrono_tz::Tz;

use super::NotificationPort;
use crate::error::PlaybackError;
use crate::prayer::PrayerKind;

/// Writes pre-alerts to the log.
pub struct LogNotifier {
    timezone: Tz,
}

impl LogNotifier {
    pub fn new(timezone: Tz) -> Self {
        Self { timezone }
    }
}

impl NotificationPort for LogNotifier {
    fn notify(&self, prayer: PrayerKind, prayer_time: DateTime<Utc>) -> Result<(), PlaybackError> {
        let local = prayer_time.with_timezone(&self.timezone);
        let minutes = (prayer_time - crate::time::source::now()).num_minutes().max(0);
        log_info!(
            "{prayer} ({}) at {} - {minutes} min remaining",
            prayer.local_name(),
            local.format("%H:%M")
        );
        Ok(())
    }
}
