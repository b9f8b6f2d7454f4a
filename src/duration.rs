use std::fmt;
use std::str::FromStr;
use std::time;

use crate::text::{TextDecode, TextEncode, TextError};

const NANOSECOND: u64 = 1;
const MICROSECOND: u64 = 1_000 * NANOSECOND;
const MILLISECOND: u64 = 1_000 * MICROSECOND;
const SECOND: u64 = 1_000 * MILLISECOND;
const MINUTE: u64 = 60 * SECOND;
const HOUR: u64 = 60 * MINUTE;

/// Magnitude of `i64::MIN`, the largest magnitude a negative duration may reach.
const MAX_MAGNITUDE: u64 = 1 << 63;

/// A signed span of time with nanosecond resolution, written as a sequence of unit-suffixed
/// decimal numbers such as `300ms`, `-1.5h` or `2h45m`.
///
/// Valid units are `ns`, `us` (or `µs`), `ms`, `s`, `m`, `h`. The canonical text form uses the
/// largest units that fit, e.g. `30m0s`, `1h2m3.5s`, `1.5ms`, `0s`.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Duration {
    nanos: i64,
}

impl Duration {
    pub const ZERO: Duration = Duration { nanos: 0 };

    pub const fn from_nanos(nanos: i64) -> Self {
        Self { nanos }
    }

    pub const fn from_millis(millis: i64) -> Self {
        Self {
            nanos: millis.saturating_mul(MILLISECOND as i64),
        }
    }

    pub const fn from_secs(secs: i64) -> Self {
        Self {
            nanos: secs.saturating_mul(SECOND as i64),
        }
    }

    pub const fn from_mins(mins: i64) -> Self {
        Self {
            nanos: mins.saturating_mul(MINUTE as i64),
        }
    }

    pub const fn as_nanos(&self) -> i64 {
        self.nanos
    }

    pub const fn is_zero(&self) -> bool {
        self.nanos == 0
    }

    pub const fn is_negative(&self) -> bool {
        self.nanos < 0
    }
}

/// Failure to read a duration string.
#[derive(Clone, Debug, PartialEq, Eq, thiserror::Error)]
pub enum DurationError {
    #[error("invalid duration {0:?}")]
    Invalid(String),
    #[error("missing unit in duration {0:?}")]
    MissingUnit(String),
    #[error("unknown unit {unit:?} in duration {input:?}")]
    UnknownUnit { unit: String, input: String },
}

fn unit_scale(unit: &str) -> Option<u64> {
    Some(match unit {
        "ns" => NANOSECOND,
        "us" | "\u{00b5}s" | "\u{03bc}s" => MICROSECOND,
        "ms" => MILLISECOND,
        "s" => SECOND,
        "m" => MINUTE,
        "h" => HOUR,
        _ => return None,
    })
}

/// Split off the leading run of decimal digits. `None` means the run overflowed.
fn leading_int(s: &str) -> Option<(u64, &str)> {
    let end = s.find(|c: char| !c.is_ascii_digit()).unwrap_or(s.len());
    let mut value: u64 = 0;
    for b in s[..end].bytes() {
        value = value
            .checked_mul(10)
            .and_then(|v| v.checked_add(u64::from(b - b'0')))
            .filter(|v| *v <= MAX_MAGNITUDE)?;
    }
    Some((value, &s[end..]))
}

/// Split off the leading run of fraction digits, returning the digits read as an integer and
/// the power of ten they were scaled by. Digits beyond what fits are consumed but dropped.
fn leading_fraction(s: &str) -> (u64, f64, &str) {
    let end = s.find(|c: char| !c.is_ascii_digit()).unwrap_or(s.len());
    let mut value: u64 = 0;
    let mut scale = 1.0;
    let mut overflow = false;
    for b in s[..end].bytes() {
        if overflow {
            continue;
        }
        match value
            .checked_mul(10)
            .and_then(|v| v.checked_add(u64::from(b - b'0')))
            .filter(|v| *v <= MAX_MAGNITUDE)
        {
            Some(v) => {
                value = v;
                scale *= 10.0;
            }
            None => overflow = true,
        }
    }
    (value, scale, &s[end..])
}

impl FromStr for Duration {
    type Err = DurationError;

    fn from_str(input: &str) -> Result<Self, Self::Err> {
        let invalid = || DurationError::Invalid(input.to_owned());

        let mut s = input;
        let mut negative = false;
        if let Some(rest) = s.strip_prefix('-') {
            negative = true;
            s = rest;
        } else if let Some(rest) = s.strip_prefix('+') {
            s = rest;
        }
        if s == "0" {
            return Ok(Duration::ZERO);
        }
        if s.is_empty() {
            return Err(invalid());
        }

        let mut total: u64 = 0;
        while !s.is_empty() {
            if !s.starts_with(|c: char| c == '.' || c.is_ascii_digit()) {
                return Err(invalid());
            }

            let before = s.len();
            let (whole, rest) = leading_int(s).ok_or_else(invalid)?;
            s = rest;
            let has_whole = s.len() != before;

            let mut frac = 0;
            let mut scale = 1.0;
            let mut has_frac = false;
            if let Some(rest) = s.strip_prefix('.') {
                let before = rest.len();
                let (f, sc, rest) = leading_fraction(rest);
                frac = f;
                scale = sc;
                s = rest;
                has_frac = s.len() != before;
            }
            if !has_whole && !has_frac {
                return Err(invalid());
            }

            let unit_end = s
                .find(|c: char| c == '.' || c.is_ascii_digit())
                .unwrap_or(s.len());
            if unit_end == 0 {
                return Err(DurationError::MissingUnit(input.to_owned()));
            }
            let unit = &s[..unit_end];
            s = &s[unit_end..];
            let scale_ns = unit_scale(unit).ok_or_else(|| DurationError::UnknownUnit {
                unit: unit.to_owned(),
                input: input.to_owned(),
            })?;

            let mut value = whole
                .checked_mul(scale_ns)
                .filter(|v| *v <= MAX_MAGNITUDE)
                .ok_or_else(invalid)?;
            if frac > 0 {
                // Float math keeps precision for fractions of large units like hours.
                value += (frac as f64 * (scale_ns as f64 / scale)) as u64;
                if value > MAX_MAGNITUDE {
                    return Err(invalid());
                }
            }
            total = total
                .checked_add(value)
                .filter(|v| *v <= MAX_MAGNITUDE)
                .ok_or_else(invalid)?;
        }

        if negative {
            Ok(Duration::from_nanos((total as i64).wrapping_neg()))
        } else if total > i64::MAX as u64 {
            Err(invalid())
        } else {
            Ok(Duration::from_nanos(total as i64))
        }
    }
}

/// Split `v` into its integer part and the trimmed fraction of `v / 10^prec`, e.g.
/// `(1500, 3)` gives `(1, ".5")`.
fn split_fraction(v: u64, prec: u32) -> (u64, String) {
    let pow = 10u64.pow(prec);
    let frac = v % pow;
    if frac == 0 {
        return (v / pow, String::new());
    }
    let digits = format!("{:0width$}", frac, width = prec as usize);
    (v / pow, format!(".{}", digits.trim_end_matches('0')))
}

impl fmt::Display for Duration {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        let magnitude = self.nanos.unsigned_abs();
        if magnitude == 0 {
            return f.write_str("0s");
        }
        if self.nanos < 0 {
            f.write_str("-")?;
        }

        if magnitude < SECOND {
            let (prec, unit) = if magnitude < MICROSECOND {
                (0, "ns")
            } else if magnitude < MILLISECOND {
                (3, "\u{00b5}s")
            } else {
                (6, "ms")
            };
            let (whole, frac) = split_fraction(magnitude, prec);
            return write!(f, "{}{}{}", whole, frac, unit);
        }

        let (secs, frac) = split_fraction(magnitude, 9);
        let hours = secs / 3600;
        let mins = secs / 60 % 60;
        if hours > 0 {
            write!(f, "{}h", hours)?;
        }
        if secs >= 60 {
            write!(f, "{}m", mins)?;
        }
        write!(f, "{}{}s", secs % 60, frac)
    }
}

impl TryFrom<time::Duration> for Duration {
    type Error = DurationError;

    fn try_from(d: time::Duration) -> Result<Self, Self::Error> {
        i64::try_from(d.as_nanos())
            .map(Duration::from_nanos)
            .map_err(|_| DurationError::Invalid(format!("{:?}", d)))
    }
}

impl TryFrom<Duration> for time::Duration {
    type Error = DurationError;

    fn try_from(d: Duration) -> Result<Self, Self::Error> {
        u64::try_from(d.nanos)
            .map(time::Duration::from_nanos)
            .map_err(|_| DurationError::Invalid(d.to_string()))
    }
}

impl TextEncode for Duration {
    fn encode_text(&self) -> Result<String, TextError> {
        Ok(self.to_string())
    }

    fn is_zero(&self) -> bool {
        Duration::is_zero(self)
    }
}

impl TextDecode for Duration {
    fn decode_text(text: &str) -> Result<Self, TextError> {
        text.parse().map_err(TextError::new)
    }
}

crate::text_serde!(Duration);

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(s: &str) -> Duration {
        s.parse().unwrap_or_else(|e| panic!("{:?} should parse: {}", s, e))
    }

    #[test]
    fn parse_units() {
        assert_eq!(parse("30s"), Duration::from_secs(30));
        assert_eq!(parse("30m"), Duration::from_mins(30));
        assert_eq!(parse("1h30m"), Duration::from_mins(90));
        assert_eq!(parse("1.5h"), Duration::from_mins(90));
        assert_eq!(parse("300ms"), Duration::from_millis(300));
        assert_eq!(parse("-1.5s"), Duration::from_millis(-1500));
        assert_eq!(parse("+5ns"), Duration::from_nanos(5));
        assert_eq!(parse("2us"), Duration::from_nanos(2000));
        assert_eq!(parse("2\u{00b5}s"), Duration::from_nanos(2000));
        assert_eq!(parse("2\u{03bc}s"), Duration::from_nanos(2000));
        assert_eq!(parse(".5s"), Duration::from_millis(500));
        assert_eq!(parse("1.s"), Duration::from_secs(1));
        assert_eq!(parse("0"), Duration::ZERO);
        assert_eq!(parse("-0"), Duration::ZERO);
        assert_eq!(parse("2562047h47m16.854775807s"), Duration::from_nanos(i64::MAX));
        assert_eq!(parse("-2562047h47m16.854775808s"), Duration::from_nanos(i64::MIN));
    }

    #[test]
    fn parse_errors() {
        assert_eq!(
            "not a duration".parse::<Duration>().unwrap_err(),
            DurationError::Invalid("not a duration".to_string())
        );
        assert_eq!(
            "1".parse::<Duration>().unwrap_err(),
            DurationError::MissingUnit("1".to_string())
        );
        assert_eq!(
            "1d".parse::<Duration>().unwrap_err(),
            DurationError::UnknownUnit {
                unit: "d".to_string(),
                input: "1d".to_string()
            }
        );
        for bad in ["", "-", ".s", "s", "1h-2m", "9223372036854775808ns"] {
            assert!(bad.parse::<Duration>().is_err(), "{:?} should fail", bad);
        }
        assert_eq!(
            "not a duration".parse::<Duration>().unwrap_err().to_string(),
            "invalid duration \"not a duration\""
        );
    }

    #[test]
    fn display_canonical() {
        assert_eq!(Duration::ZERO.to_string(), "0s");
        assert_eq!(Duration::from_secs(30).to_string(), "30s");
        assert_eq!(Duration::from_mins(30).to_string(), "30m0s");
        assert_eq!(Duration::from_mins(60).to_string(), "1h0m0s");
        assert_eq!(parse("1h2m3.5s").to_string(), "1h2m3.5s");
        assert_eq!(Duration::from_millis(1500).to_string(), "1.5s");
        assert_eq!(Duration::from_nanos(1_500_000).to_string(), "1.5ms");
        assert_eq!(Duration::from_nanos(2_000).to_string(), "2\u{00b5}s");
        assert_eq!(Duration::from_nanos(7).to_string(), "7ns");
        assert_eq!(Duration::from_millis(-1500).to_string(), "-1.5s");
        assert_eq!(Duration::from_nanos(i64::MIN).to_string(), "-2562047h47m16.854775808s");
    }

    #[test]
    fn display_reparses() {
        for nanos in [1, 999, 1_001, 123_456_789, 59_999_999_999, 3_600_000_000_001, -42] {
            let d = Duration::from_nanos(nanos);
            assert_eq!(parse(&d.to_string()), d);
        }
    }

    #[test]
    fn std_conversions() {
        let d = Duration::try_from(time::Duration::from_millis(250)).unwrap();
        assert_eq!(d, Duration::from_millis(250));
        assert_eq!(time::Duration::try_from(d).unwrap(), time::Duration::from_millis(250));
        assert!(time::Duration::try_from(Duration::from_secs(-1)).is_err());
        assert!(Duration::try_from(time::Duration::from_secs(u64::MAX)).is_err());
    }
}
