use std::fmt;
use std::str::FromStr;

use chrono::{Datelike, NaiveDate};
use serde::{Deserialize, Serialize};

pub const MINUTES_PER_DAY: u16 = 24 * 60;

/// Day of the week as a closed enumeration. The index follows the storage
/// convention (0 = Sunday .. 6 = Saturday) and is what goes over the wire.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "u8", into = "u8")]
pub enum Weekday {
    Sunday,
    Monday,
    Tuesday,
    Wednesday,
    Thursday,
    Friday,
    Saturday,
}

impl Weekday {
    pub fn index(self) -> u8 {
        match self {
            Weekday::Sunday => 0,
            Weekday::Monday => 1,
            Weekday::Tuesday => 2,
            Weekday::Wednesday => 3,
            Weekday::Thursday => 4,
            Weekday::Friday => 5,
            Weekday::Saturday => 6,
        }
    }

    pub fn from_index(index: u8) -> Result<Self, InvalidWeekday> {
        match index {
            0 => Ok(Weekday::Sunday),
            1 => Ok(Weekday::Monday),
            2 => Ok(Weekday::Tuesday),
            3 => Ok(Weekday::Wednesday),
            4 => Ok(Weekday::Thursday),
            5 => Ok(Weekday::Friday),
            6 => Ok(Weekday::Saturday),
            other => Err(InvalidWeekday(other)),
        }
    }

    pub fn from_date(date: NaiveDate) -> Self {
        match date.weekday() {
            chrono::Weekday::Sun => Weekday::Sunday,
            chrono::Weekday::Mon => Weekday::Monday,
            chrono::Weekday::Tue => Weekday::Tuesday,
            chrono::Weekday::Wed => Weekday::Wednesday,
            chrono::Weekday::Thu => Weekday::Thursday,
            chrono::Weekday::Fri => Weekday::Friday,
            chrono::Weekday::Sat => Weekday::Saturday,
        }
    }
}

impl TryFrom<u8> for Weekday {
    type Error = InvalidWeekday;

    fn try_from(value: u8) -> Result<Self, Self::Error> {
        Weekday::from_index(value)
    }
}

impl From<Weekday> for u8 {
    fn from(value: Weekday) -> Self {
        value.index()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct InvalidWeekday(pub u8);

impl fmt::Display for InvalidWeekday {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "day of week must be between 0 (Sunday) and 6 (Saturday), got {}", self.0)
    }
}

impl std::error::Error for InvalidWeekday {}

/// A time of day as validated minutes since midnight, serialized as "HH:MM".
/// Using an integer type here removes the string-parsing edge cases the
/// boundary would otherwise carry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct SlotTime(u16);

impl SlotTime {
    pub fn from_minutes(minutes: u16) -> Result<Self, InvalidSlotTime> {
        if minutes >= MINUTES_PER_DAY {
            return Err(InvalidSlotTime(format!(
                "{} minutes is past the end of the day",
                minutes
            )));
        }
        Ok(SlotTime(minutes))
    }

    pub fn from_hm(hours: u16, minutes: u16) -> Result<Self, InvalidSlotTime> {
        if minutes >= 60 {
            return Err(InvalidSlotTime(format!("invalid minute component {}", minutes)));
        }
        Self::from_minutes(hours * 60 + minutes)
    }

    pub fn minutes(self) -> u16 {
        self.0
    }

    /// The time `minutes` later the same day, or None at or past midnight.
    pub fn plus_minutes(self, minutes: u16) -> Option<SlotTime> {
        let total = self.0.checked_add(minutes)?;
        SlotTime::from_minutes(total).ok()
    }

    /// Whole-minute offset from midnight, for arithmetic that may legally
    /// land on 24:00 (exclusive interval ends).
    pub fn as_u32(self) -> u32 {
        self.0 as u32
    }
}

impl fmt::Display for SlotTime {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:02}:{:02}", self.0 / 60, self.0 % 60)
    }
}

impl FromStr for SlotTime {
    type Err = InvalidSlotTime;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        // Accept "HH:MM" and the storage layer's "HH:MM:SS" rendering.
        let mut parts = s.split(':');
        let (hours, minutes) = match (parts.next(), parts.next(), parts.next(), parts.next()) {
            (Some(h), Some(m), None, None) | (Some(h), Some(m), Some("00"), None) => (h, m),
            (_, _, Some(seconds), None) => {
                return Err(InvalidSlotTime(format!(
                    "slot times must fall on whole minutes, got seconds component {:?}",
                    seconds
                )))
            }
            _ => return Err(InvalidSlotTime(format!("expected HH:MM, got {:?}", s))),
        };

        let hours: u16 = hours
            .parse()
            .map_err(|_| InvalidSlotTime(format!("invalid hour component {:?}", hours)))?;
        let minutes: u16 = minutes
            .parse()
            .map_err(|_| InvalidSlotTime(format!("invalid minute component {:?}", minutes)))?;

        SlotTime::from_hm(hours, minutes)
    }
}

impl TryFrom<String> for SlotTime {
    type Error = InvalidSlotTime;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<SlotTime> for String {
    fn from(value: SlotTime) -> Self {
        value.to_string()
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InvalidSlotTime(pub String);

impl fmt::Display for InvalidSlotTime {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "invalid slot time: {}", self.0)
    }
}

impl std::error::Error for InvalidSlotTime {}
