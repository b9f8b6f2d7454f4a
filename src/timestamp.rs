use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, FixedOffset, SecondsFormat, Utc};

use crate::text::{TextDecode, TextEncode, TextError};

/// A point in time that keeps the UTC offset it was written with.
///
/// The text form is RFC 3339: `2024-08-19T05:09:29-01:00`, or `2024-08-19T05:09:29Z` for UTC.
/// Fractional seconds are written only when present, with trailing zeros trimmed: `.5`, never
/// `.500`.
///
/// The zero value is the Unix epoch, `1970-01-01T00:00:00Z`, not the year-one instant some other
/// form codecs use. `omitempty` drops the epoch and keeps `0001-01-01T00:00:00Z`.
#[derive(Copy, Clone, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Timestamp(DateTime<FixedOffset>);

impl Timestamp {
    /// Create a UTC timestamp from seconds and nanoseconds past the Unix epoch.
    pub fn from_unix(sec: i64, nano: u32) -> Option<Timestamp> {
        DateTime::<Utc>::from_timestamp(sec, nano).map(Timestamp::from)
    }

    /// Seconds since the Unix epoch.
    pub fn timestamp_utc(&self) -> i64 {
        self.0.timestamp()
    }

    pub fn as_datetime(&self) -> &DateTime<FixedOffset> {
        &self.0
    }

    pub fn into_inner(self) -> DateTime<FixedOffset> {
        self.0
    }
}

impl Default for Timestamp {
    fn default() -> Self {
        Timestamp(DateTime::<Utc>::UNIX_EPOCH.fixed_offset())
    }
}

impl From<DateTime<FixedOffset>> for Timestamp {
    fn from(t: DateTime<FixedOffset>) -> Self {
        Timestamp(t)
    }
}

impl From<DateTime<Utc>> for Timestamp {
    fn from(t: DateTime<Utc>) -> Self {
        Timestamp(t.fixed_offset())
    }
}

impl FromStr for Timestamp {
    type Err = chrono::ParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        DateTime::<FixedOffset>::parse_from_rfc3339(s).map(Timestamp)
    }
}

impl fmt::Display for Timestamp {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        let mut text = self.0.to_rfc3339_opts(SecondsFormat::Secs, true);
        let nanos = self.0.timestamp_subsec_nanos() % 1_000_000_000;
        if nanos != 0 {
            let frac = format!(".{:09}", nanos);
            // Seconds end eight characters past the 'T'.
            if let Some(at) = text.find('T').map(|t| t + 9) {
                text.insert_str(at, frac.trim_end_matches('0'));
            }
        }
        f.write_str(&text)
    }
}

impl TextEncode for Timestamp {
    fn encode_text(&self) -> Result<String, TextError> {
        Ok(self.to_string())
    }

    fn is_zero(&self) -> bool {
        *self == Timestamp::default()
    }
}

impl TextDecode for Timestamp {
    fn decode_text(text: &str) -> Result<Self, TextError> {
        text.parse()
            .map_err(|e| TextError::new(format!("parsing time {:?}: {}", text, e)))
    }
}

crate::text_serde!(Timestamp);
