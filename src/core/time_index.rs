//! Timestamp normalization.
//!
//! Every stream in a session carries its own clock representation: the
//! self-report log uses full date-times, the eye and head trackers use
//! time-of-day strings with a fractional suffix, and the wristband exports
//! epoch seconds in UTC. All of them are reduced to a [`TimeOfDay`] at
//! one-second resolution so they can be compared against each other.
//!
//! Comparison happens within a single day only. Nothing here rolls over
//! midnight; callers that need day arithmetic get `None` from
//! [`TimeOfDay::checked_offset`] instead of a wrapped value.

use crate::error::AlignError;
use chrono::{DateTime, Duration, FixedOffset, NaiveDateTime, NaiveTime, Timelike};
use chrono_tz::Tz;
use serde::{Deserialize, Serialize, Serializer};
use std::fmt;
use std::str::FromStr;

/// Length of the day every [`TimeOfDay`] lives in.
pub const SECONDS_PER_DAY: u32 = 86_400;

/// Wall-clock time of day truncated to whole seconds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct TimeOfDay(NaiveTime);

impl TimeOfDay {
    /// Truncate a precise time to its second.
    pub fn from_time(time: NaiveTime) -> Self {
        Self(time.with_nanosecond(0).unwrap_or(time))
    }

    pub fn from_hms(hour: u32, minute: u32, second: u32) -> Option<Self> {
        NaiveTime::from_hms_opt(hour, minute, second).map(Self)
    }

    pub fn seconds_from_midnight(&self) -> u32 {
        self.0.num_seconds_from_midnight()
    }

    /// Shift by `secs` seconds, or `None` if the result leaves the day.
    pub fn checked_offset(&self, secs: i64) -> Option<Self> {
        let (shifted, wrapped) = self.0.overflowing_add_signed(Duration::seconds(secs));
        if wrapped != 0 {
            None
        } else {
            Some(Self(shifted))
        }
    }
}

impl fmt::Display for TimeOfDay {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0.format("%H-%M-%S"))
    }
}

impl FromStr for TimeOfDay {
    type Err = AlignError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        NaiveTime::parse_from_str(s.trim(), "%H-%M-%S")
            .map(Self::from_time)
            .map_err(|_| AlignError::malformed(s, "%H-%M-%S"))
    }
}

impl Serialize for TimeOfDay {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.collect_str(self)
    }
}

/// Clock used to turn epoch seconds into local wall-clock time.
///
/// Accepts either a fixed offset (`+02:00`) or an IANA zone name
/// (`Europe/Berlin`, `UTC`).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub enum ClockZone {
    Fixed(FixedOffset),
    Named(Tz),
}

impl ClockZone {
    /// Local time of day for a UTC instant.
    pub fn local_time(&self, utc: DateTime<chrono::Utc>) -> NaiveTime {
        match self {
            ClockZone::Fixed(offset) => utc.with_timezone(offset).time(),
            ClockZone::Named(tz) => utc.with_timezone(tz).time(),
        }
    }
}

impl Default for ClockZone {
    fn default() -> Self {
        ClockZone::Named(Tz::UTC)
    }
}

impl FromStr for ClockZone {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.trim();
        if s.starts_with('+') || s.starts_with('-') {
            return s
                .parse::<FixedOffset>()
                .map(ClockZone::Fixed)
                .map_err(|e| format!("invalid offset '{s}': {e}"));
        }
        s.parse::<Tz>()
            .map(ClockZone::Named)
            .map_err(|e| format!("invalid timezone '{s}': {e}"))
    }
}

impl fmt::Display for ClockZone {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ClockZone::Fixed(offset) => write!(f, "{offset}"),
            ClockZone::Named(tz) => write!(f, "{}", tz.name()),
        }
    }
}

impl TryFrom<String> for ClockZone {
    type Error = String;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<ClockZone> for String {
    fn from(zone: ClockZone) -> Self {
        zone.to_string()
    }
}

/// Declared representation of a timestamp column.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", content = "value", rename_all = "snake_case")]
pub enum TimeFormat {
    /// Full date-time in a strftime pattern, e.g. `%Y.%m.%d %H:%M:%S:%f`.
    DateTime(String),
    /// Time of day in a strftime pattern, e.g. `%H-%M-%S-%f`.
    TimeOfDay(String),
    /// Epoch seconds converted through a clock zone.
    Epoch(ClockZone),
}

impl fmt::Display for TimeFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TimeFormat::DateTime(pattern) | TimeFormat::TimeOfDay(pattern) => {
                write!(f, "{pattern}")
            }
            TimeFormat::Epoch(zone) => write!(f, "epoch seconds ({zone})"),
        }
    }
}

/// A timestamp as it appears in an input file.
#[derive(Debug, Clone, Copy)]
pub enum RawTimestamp<'a> {
    Text(&'a str),
    Epoch(f64),
}

/// Normalize a raw timestamp to a second-resolution time of day.
pub fn normalize(raw: RawTimestamp<'_>, format: &TimeFormat) -> Result<TimeOfDay, AlignError> {
    match (raw, format) {
        (RawTimestamp::Text(text), TimeFormat::DateTime(pattern)) => {
            NaiveDateTime::parse_from_str(text.trim(), pattern)
                .map(|dt| TimeOfDay::from_time(dt.time()))
                .map_err(|_| AlignError::malformed(text, pattern.as_str()))
        }
        (RawTimestamp::Text(text), TimeFormat::TimeOfDay(pattern)) => {
            NaiveTime::parse_from_str(text.trim(), pattern)
                .map(TimeOfDay::from_time)
                .map_err(|_| AlignError::malformed(text, pattern.as_str()))
        }
        (RawTimestamp::Text(text), TimeFormat::Epoch(zone)) => {
            let epoch = text
                .trim()
                .parse::<f64>()
                .map_err(|_| AlignError::malformed(text, format.to_string()))?;
            from_epoch(epoch, zone)
        }
        (RawTimestamp::Epoch(epoch), TimeFormat::Epoch(zone)) => from_epoch(epoch, zone),
        (RawTimestamp::Epoch(epoch), _) => {
            Err(AlignError::malformed(epoch.to_string(), format.to_string()))
        }
    }
}

/// Convert epoch seconds to local time of day in `zone`.
pub fn from_epoch(epoch: f64, zone: &ClockZone) -> Result<TimeOfDay, AlignError> {
    let expected = || format!("epoch seconds ({zone})");
    if !epoch.is_finite() {
        return Err(AlignError::malformed(epoch.to_string(), expected()));
    }

    let secs = epoch.floor();
    let nanos = (((epoch - secs) * 1e9) as u32).min(999_999_999);
    let utc = DateTime::from_timestamp(secs as i64, nanos)
        .ok_or_else(|| AlignError::malformed(epoch.to_string(), expected()))?;

    Ok(TimeOfDay::from_time(zone.local_time(utc)))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn tod(s: &str) -> TimeOfDay {
        s.parse().unwrap()
    }

    #[test]
    fn test_datetime_truncated_to_second() {
        let format = TimeFormat::DateTime("%Y.%m.%d %H:%M:%S:%f".to_string());
        let t = normalize(RawTimestamp::Text("2021.05.03 10:15:30:987654"), &format).unwrap();
        assert_eq!(t, tod("10-15-30"));
    }

    #[test]
    fn test_time_of_day_with_fraction() {
        let format = TimeFormat::TimeOfDay("%H-%M-%S-%f".to_string());
        let t = normalize(RawTimestamp::Text("10-15-30-500"), &format).unwrap();
        assert_eq!(t.to_string(), "10-15-30");
    }

    #[test]
    fn test_epoch_with_fixed_offset() {
        // 2021-05-03T10:15:30.25Z
        let zone: ClockZone = "+02:00".parse().unwrap();
        let t = normalize(RawTimestamp::Epoch(1_620_036_930.25), &TimeFormat::Epoch(zone)).unwrap();
        assert_eq!(t, tod("12-15-30"));
    }

    #[test]
    fn test_epoch_with_named_zone() {
        let zone: ClockZone = "Europe/Berlin".parse().unwrap();
        let t = normalize(RawTimestamp::Text("1620036930.0"), &TimeFormat::Epoch(zone)).unwrap();
        assert_eq!(t, tod("12-15-30"));

        let utc = ClockZone::default();
        assert_eq!(from_epoch(1_620_036_930.0, &utc).unwrap(), tod("10-15-30"));
    }

    #[test]
    fn test_malformed_timestamps() {
        let format = TimeFormat::TimeOfDay("%H-%M-%S-%f".to_string());
        let err = normalize(RawTimestamp::Text("10:15:30"), &format).unwrap_err();
        assert!(matches!(err, AlignError::MalformedTimestamp { .. }));

        let err = normalize(RawTimestamp::Epoch(1.0), &format).unwrap_err();
        assert!(matches!(err, AlignError::MalformedTimestamp { .. }));

        let epoch = TimeFormat::Epoch(ClockZone::default());
        assert!(normalize(RawTimestamp::Text("yesterday"), &epoch).is_err());
        assert!(normalize(RawTimestamp::Epoch(f64::NAN), &epoch).is_err());
    }

    #[test]
    fn test_checked_offset_stops_at_midnight() {
        let t = tod("00-00-02");
        assert_eq!(t.checked_offset(-2), Some(tod("00-00-00")));
        assert_eq!(t.checked_offset(-3), None);

        let late = tod("23-59-59");
        assert_eq!(late.checked_offset(1), None);
        assert_eq!(late.checked_offset(-59), Some(tod("23-59-00")));
    }

    #[test]
    fn test_clock_zone_round_trips_through_string() {
        for raw in ["+02:00", "UTC", "America/New_York"] {
            let zone: ClockZone = raw.parse().unwrap();
            let back: ClockZone = String::from(zone).parse().unwrap();
            assert_eq!(zone, back);
        }
        assert!("Mars/Olympus".parse::<ClockZone>().is_err());
    }
}
