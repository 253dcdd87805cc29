use chrono::Timelike;
use serde::{Deserialize, Serialize};

const MINUTES_PER_DAY: u16 = 24 * 60;

/// A daily WARM window.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub struct ScheduleEntry {
    #[serde(rename = "startMinutes")]
    pub start_minutes: u16,
    #[serde(rename = "durationMinutes")]
    pub duration_minutes: u16,
}

impl ScheduleEntry {
    pub fn validate(&self) -> bool {
        self.start_minutes < MINUTES_PER_DAY
            && (1..MINUTES_PER_DAY).contains(&self.duration_minutes)
    }

    /// Windows may run past midnight into the next day.
    fn contains(&self, minute_of_day: u16) -> bool {
        let start = self.start_minutes % MINUTES_PER_DAY;
        let since_start =
            (minute_of_day % MINUTES_PER_DAY + MINUTES_PER_DAY - start) % MINUTES_PER_DAY;
        since_start < self.duration_minutes
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct Schedule {
    pub enabled: bool,
    pub entries: Vec<ScheduleEntry>,
}

impl Schedule {
    pub fn normalize(&mut self) {
        self.entries.retain(ScheduleEntry::validate);
        self.entries.sort_by_key(|entry| entry.start_minutes);
        self.entries.dedup();
    }

    pub fn has_schedule(&self) -> bool {
        self.enabled && !self.entries.is_empty()
    }

    pub fn is_warm_scheduled_at<T: Timelike>(&self, now: &T) -> bool {
        if !self.has_schedule() {
            return false;
        }
        let minute_of_day = (now.hour() * 60 + now.minute()) as u16;
        self.entries
            .iter()
            .filter(|entry| entry.validate())
            .any(|entry| entry.contains(minute_of_day))
    }
}
