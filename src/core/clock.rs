use std::fmt;
use std::ops::Add;

use chrono::{DateTime, NaiveDateTime};

use crate::error::TraceError;

const FORMAT: &str = "%Y-%m-%d %H:%M:%S";

/// Civil timestamp with second resolution, stored as epoch seconds.
/// All scheduler arithmetic happens on the integer seconds; only parsing
/// and display go through the calendar.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Stamp(i64);

impl Stamp {
    pub const fn from_epoch(secs: i64) -> Self {
        Stamp(secs)
    }

    pub const fn epoch(self) -> i64 {
        self.0
    }

    /// Parses the two leading fields of a record (`YYYY-MM-DD HH:MM:SS`).
    pub fn parse(date: &str, time: &str) -> Result<Self, TraceError> {
        let text = format!("{date} {time}");
        let dt = NaiveDateTime::parse_from_str(&text, FORMAT)
            .map_err(|source| TraceError::Timestamp { text, source })?;
        Ok(Stamp(dt.and_utc().timestamp()))
    }

    pub fn seconds_since(self, earlier: Stamp) -> i64 {
        self.0 - earlier.0
    }
}

impl Add<i64> for Stamp {
    type Output = Stamp;

    fn add(self, secs: i64) -> Stamp {
        Stamp(self.0 + secs)
    }
}

impl fmt::Display for Stamp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match DateTime::from_timestamp(self.0, 0) {
            Some(dt) => write!(f, "{}", dt.format(FORMAT)),
            None => write!(f, "@{}", self.0),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_display_roundtrip() {
        let stamp = Stamp::parse("2013-03-01", "00:00:27").unwrap();
        assert_eq!(stamp.to_string(), "2013-03-01 00:00:27");
    }

    #[test]
    fn arithmetic_in_seconds() {
        let a = Stamp::parse("2013-03-01", "00:00:00").unwrap();
        let b = Stamp::parse("2013-03-01", "01:00:01").unwrap();
        assert_eq!(b.seconds_since(a), 3601);
        assert_eq!(a + 3601, b);
        assert!(a < b);
    }

    #[test]
    fn rejects_garbage() {
        assert!(Stamp::parse("2013-03-01", "24:99:00").is_err());
        assert!(Stamp::parse("not-a-date", "00:00:00").is_err());
    }
}
