use std::fmt;
use std::str::FromStr;

use chrono::{NaiveDateTime, Timelike, Utc};
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use thiserror::Error;

const PARSE_FORMATS: [&str; 2] = ["%Y-%m-%d %H:%M:%S%.f", "%Y-%m-%dT%H:%M:%S%.f"];
const SECONDS_FORMAT: &str = "%Y-%m-%dT%H:%M:%S";
const MICROS_FORMAT: &str = "%Y-%m-%dT%H:%M:%S%.6f";

#[derive(Debug, Error, PartialEq)]
#[error("time data {0:?} does not match any of the available formats")]
pub struct InvalidDateTime(pub String);

/// UTC timestamp stored and exchanged as `YYYY-MM-DDTHH:MM:SS`, with
/// microseconds only when they are non-zero. Parsing also accepts a space
/// between date and time.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct DateTime(NaiveDateTime);

impl DateTime {
    /// Current time truncated to microseconds.
    pub fn now() -> Self {
        let now = Utc::now().naive_utc();
        let micros = now.nanosecond() / 1_000 * 1_000;
        Self(now.with_nanosecond(micros).unwrap_or(now))
    }

    pub fn as_naive(&self) -> NaiveDateTime {
        self.0
    }
}

impl From<NaiveDateTime> for DateTime {
    fn from(value: NaiveDateTime) -> Self {
        Self(value)
    }
}

impl FromStr for DateTime {
    type Err = InvalidDateTime;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        PARSE_FORMATS
            .iter()
            .find_map(|format| NaiveDateTime::parse_from_str(s, format).ok())
            .map(DateTime)
            .ok_or_else(|| InvalidDateTime(s.to_string()))
    }
}

impl fmt::Display for DateTime {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let format = if self.0.nanosecond() / 1_000 == 0 { SECONDS_FORMAT } else { MICROS_FORMAT };
        write!(f, "{}", self.0.format(format))
    }
}

impl Serialize for DateTime {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

impl<'de> Deserialize<'de> for DateTime {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let raw = String::deserialize(deserializer)?;
        raw.parse().map_err(serde::de::Error::custom)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn parses_both_separators() {
        let spaced: DateTime = "2024-03-01 10:20:30".parse().unwrap();
        let tee: DateTime = "2024-03-01T10:20:30".parse().unwrap();
        assert_eq!(spaced, tee);
        assert_eq!(tee.to_string(), "2024-03-01T10:20:30");
    }

    #[test]
    fn keeps_microseconds_when_present() {
        let value: DateTime = "2024-03-01 10:20:30.250000".parse().unwrap();
        assert_eq!(value.to_string(), "2024-03-01T10:20:30.250000");
        assert_eq!(serde_json::to_value(value).unwrap(), json!("2024-03-01T10:20:30.250000"));
    }

    #[test]
    fn rejects_other_shapes() {
        assert!("2024-03-01".parse::<DateTime>().is_err());
        assert!(serde_json::from_value::<DateTime>(json!("yesterday")).is_err());
        assert!(serde_json::from_value::<DateTime>(json!(17)).is_err());
    }

    #[test]
    fn orders_chronologically() {
        let earlier: DateTime = "2024-03-01 10:20:30".parse().unwrap();
        let later: DateTime = "2024-03-01 10:20:31".parse().unwrap();
        assert!(earlier < later);
    }
}
