use chrono::{NaiveTime, Timelike};
use serde::{Deserialize, Serialize};

const MINUTES_PER_DAY: u32 = 24 * 60;

/// Errors raised while building or editing a clock-time range.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum TimeRangeError {
    #[error("end time {end} must be after start time {start}")]
    InvalidRange { start: String, end: String },
    #[error("a {minutes} minute interview starting at {start} does not fit within the day")]
    Overnight { start: String, minutes: u32 },
    #[error("duration must be at least one minute")]
    EmptyDuration,
    #[error("duration of {given} minutes disagrees with {start}-{end} ({expected} minutes)")]
    Inconsistent {
        start: String,
        end: String,
        given: u32,
        expected: u32,
    },
    #[error("'{0}' is not a HH:MM 24-hour clock time")]
    MalformedClock(String),
}

/// Minutes elapsed since midnight, ignoring seconds.
pub fn minutes_of_day(time: NaiveTime) -> u32 {
    time.hour() * 60 + time.minute()
}

/// Length of `start..end` in minutes. Zero or negative spans are rejected.
pub fn duration(start: NaiveTime, end: NaiveTime) -> Result<u32, TimeRangeError> {
    let start_minutes = minutes_of_day(start);
    let end_minutes = minutes_of_day(end);
    if end_minutes <= start_minutes {
        return Err(TimeRangeError::InvalidRange {
            start: format_clock(start),
            end: format_clock(end),
        });
    }
    Ok(end_minutes - start_minutes)
}

/// Clock time `minutes` after `start`. Never wraps past midnight.
pub fn end_time(start: NaiveTime, minutes: u32) -> Result<NaiveTime, TimeRangeError> {
    if minutes == 0 {
        return Err(TimeRangeError::EmptyDuration);
    }
    let overnight = || TimeRangeError::Overnight {
        start: format_clock(start),
        minutes,
    };
    let total = minutes_of_day(start)
        .checked_add(minutes)
        .filter(|total| *total < MINUTES_PER_DAY)
        .ok_or_else(overnight)?;
    NaiveTime::from_hms_opt(total / 60, total % 60, 0).ok_or_else(overnight)
}

/// Half-open overlap test: a range ending at 10:00 does not touch one starting at 10:00.
pub fn overlaps(a: &TimeRange, b: &TimeRange) -> bool {
    a.start < b.end && b.start < a.end
}

pub fn parse_clock(raw: &str) -> Result<NaiveTime, TimeRangeError> {
    let trimmed = raw.trim();
    let bytes = trimmed.as_bytes();
    let well_formed = bytes.len() == 5
        && bytes[2] == b':'
        && bytes
            .iter()
            .enumerate()
            .all(|(index, byte)| index == 2 || byte.is_ascii_digit());
    if !well_formed {
        return Err(TimeRangeError::MalformedClock(raw.to_string()));
    }
    NaiveTime::parse_from_str(trimmed, "%H:%M")
        .map_err(|_| TimeRangeError::MalformedClock(raw.to_string()))
}

pub fn format_clock(time: NaiveTime) -> String {
    time.format("%H:%M").to_string()
}

/// Validated start/end pair within a single day.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct TimeRange {
    #[serde(with = "clock")]
    pub start: NaiveTime,
    #[serde(with = "clock")]
    pub end: NaiveTime,
}

impl TimeRange {
    pub fn new(start: NaiveTime, end: NaiveTime) -> Result<Self, TimeRangeError> {
        duration(start, end)?;
        Ok(Self { start, end })
    }

    pub fn from_duration(start: NaiveTime, minutes: u32) -> Result<Self, TimeRangeError> {
        let end = end_time(start, minutes)?;
        Ok(Self { start, end })
    }

    pub fn duration_minutes(&self) -> u32 {
        minutes_of_day(self.end).saturating_sub(minutes_of_day(self.start))
    }

    pub fn overlaps(&self, other: &TimeRange) -> bool {
        overlaps(self, other)
    }

    /// Apply a partial edit so start, end and duration stay consistent.
    ///
    /// Moving only the start keeps the duration and shifts the end; moving only the
    /// end recomputes the duration; a bare duration change moves the end.
    pub fn apply_edit(
        &self,
        start: Option<NaiveTime>,
        end: Option<NaiveTime>,
        minutes: Option<u32>,
    ) -> Result<Self, TimeRangeError> {
        match (start, end, minutes) {
            (None, None, None) => Ok(*self),
            (Some(start), Some(end), None) => Self::new(start, end),
            (Some(start), None, None) => Self::from_duration(start, self.duration_minutes()),
            (None, Some(end), None) => Self::new(self.start, end),
            (None, None, Some(minutes)) => Self::from_duration(self.start, minutes),
            (Some(start), None, Some(minutes)) => Self::from_duration(start, minutes),
            (None, Some(end), Some(minutes)) => {
                let range = Self::new(self.start, end)?;
                range.ensure_duration(minutes)?;
                Ok(range)
            }
            (Some(start), Some(end), Some(minutes)) => {
                let range = Self::new(start, end)?;
                range.ensure_duration(minutes)?;
                Ok(range)
            }
        }
    }

    fn ensure_duration(&self, given: u32) -> Result<(), TimeRangeError> {
        let expected = self.duration_minutes();
        if given == expected {
            Ok(())
        } else {
            Err(TimeRangeError::Inconsistent {
                start: format_clock(self.start),
                end: format_clock(self.end),
                given,
                expected,
            })
        }
    }
}

/// Serde adapter rendering `NaiveTime` as `HH:MM`.
pub mod clock {
    use chrono::NaiveTime;
    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S>(time: &NaiveTime, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.serialize_str(&super::format_clock(*time))
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<NaiveTime, D::Error>
    where
        D: Deserializer<'de>,
    {
        let raw = String::deserialize(deserializer)?;
        super::parse_clock(&raw).map_err(serde::de::Error::custom)
    }

    /// Variant of the adapter for optional fields.
    pub mod option {
        use chrono::NaiveTime;
        use serde::{Deserialize, Deserializer, Serializer};

        pub fn serialize<S>(time: &Option<NaiveTime>, serializer: S) -> Result<S::Ok, S::Error>
        where
            S: Serializer,
        {
            match time {
                Some(time) => serializer.serialize_some(&super::super::format_clock(*time)),
                None => serializer.serialize_none(),
            }
        }

        pub fn deserialize<'de, D>(deserializer: D) -> Result<Option<NaiveTime>, D::Error>
        where
            D: Deserializer<'de>,
        {
            let raw = Option::<String>::deserialize(deserializer)?;
            raw.map(|value| super::super::parse_clock(&value).map_err(serde::de::Error::custom))
                .transpose()
        }
    }
}
