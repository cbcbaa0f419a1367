use std::collections::BTreeSet;
use std::fmt;
use std::str::FromStr;

use chrono::NaiveDate;
use serde::{Deserialize, Deserializer, Serialize, Serializer};

pub const DEFAULT_SLOT_MINUTES: u32 = 60;

/// Minutes since midnight, written as zero-padded `HH:MM`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct TimeOfDay(u32);

impl TimeOfDay {
    pub fn from_minutes(minutes: u32) -> Self {
        TimeOfDay(minutes)
    }

    pub fn hm(hour: u32, minute: u32) -> Self {
        TimeOfDay(hour * 60 + minute)
    }

    pub fn minutes(&self) -> u32 {
        self.0
    }

    /// Like `FromStr`, but also accepts `24:00` as the end of the day.
    pub fn parse_end(s: &str) -> Result<Self, String> {
        if s.trim() == "24:00" {
            return Ok(END_OF_DAY);
        }
        s.parse()
    }
}

pub const END_OF_DAY: TimeOfDay = TimeOfDay(24 * 60);

impl fmt::Display for TimeOfDay {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:02}:{:02}", self.0 / 60, self.0 % 60)
    }
}

impl FromStr for TimeOfDay {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let (hour, minute) = s
            .trim()
            .split_once(':')
            .ok_or_else(|| format!("invalid time format: {s}"))?;
        let hour: u32 = hour
            .parse()
            .map_err(|_| format!("invalid hour in: {s}"))?;
        let minute: u32 = minute
            .parse()
            .map_err(|_| format!("invalid minute in: {s}"))?;
        if hour > 23 || minute > 59 {
            return Err(format!("time out of range: {s}"));
        }
        Ok(TimeOfDay::hm(hour, minute))
    }
}

impl Serialize for TimeOfDay {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

impl<'de> Deserialize<'de> for TimeOfDay {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        s.parse().map_err(serde::de::Error::custom)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WorkingHours {
    pub start: TimeOfDay,
    #[serde(deserialize_with = "deserialize_end")]
    pub end: TimeOfDay,
}

fn deserialize_end<'de, D: Deserializer<'de>>(deserializer: D) -> Result<TimeOfDay, D::Error> {
    let s = String::deserialize(deserializer)?;
    TimeOfDay::parse_end(&s).map_err(serde::de::Error::custom)
}

impl Default for WorkingHours {
    fn default() -> Self {
        Self {
            start: TimeOfDay::hm(9, 0),
            end: TimeOfDay::hm(17, 0),
        }
    }
}

/// A provider's recurring schedule. Day indexes count from Sunday = 0.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct AvailabilityProfile {
    pub working_hours: WorkingHours,
    pub working_days: BTreeSet<u8>,
    pub unavailable_dates: BTreeSet<NaiveDate>,
    pub slot_duration: u32,
}

impl Default for AvailabilityProfile {
    fn default() -> Self {
        Self {
            working_hours: WorkingHours::default(),
            working_days: (1..=5).collect(),
            unavailable_dates: BTreeSet::new(),
            slot_duration: DEFAULT_SLOT_MINUTES,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DaySlots {
    pub date: NaiveDate,
    pub time_slots: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NextSlot {
    pub date: NaiveDate,
    pub time: String,
}
