//! String conversion for leaf values.
//!
//! Integers follow the usual literal grammar with an automatically detected base: `0x`/`0X` for
//! hex, `0o`/`0O` or a bare leading `0` for octal, `0b`/`0B` for binary. Underscores may separate
//! digits. Floats accept decimal and scientific notation plus `inf`, `infinity` and `nan` in any
//! case. Booleans accept `1 t T TRUE true True 0 f F FALSE false False`.

use std::fmt;

/// The scalar type a string was being converted into.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ScalarKind {
    Int,
    Uint,
    Float,
    Bool,
    Char,
}

impl fmt::Display for ScalarKind {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.write_str(match self {
            ScalarKind::Int => "integer",
            ScalarKind::Uint => "unsigned integer",
            ScalarKind::Float => "float",
            ScalarKind::Bool => "bool",
            ScalarKind::Char => "char",
        })
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ScalarErrorKind {
    /// The input isn't a literal of the expected kind.
    Syntax,
    /// The input is well-formed but doesn't fit the destination's width.
    Range,
}

impl fmt::Display for ScalarErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.write_str(match self {
            ScalarErrorKind::Syntax => "invalid syntax",
            ScalarErrorKind::Range => "value out of range",
        })
    }
}

/// Failure to convert a string into a scalar.
#[derive(Clone, Debug, PartialEq, Eq, thiserror::Error)]
#[error("parsing {kind} {input:?}: {reason}")]
pub struct ScalarError {
    pub kind: ScalarKind,
    pub input: String,
    pub reason: ScalarErrorKind,
}

impl ScalarError {
    fn new(kind: ScalarKind, input: &str, reason: ScalarErrorKind) -> Self {
        Self {
            kind,
            input: input.to_owned(),
            reason,
        }
    }
}

/// Parse the unsigned magnitude of an integer literal, detecting its base from the prefix.
fn parse_magnitude(s: &str) -> Result<u128, ScalarErrorKind> {
    let bytes = s.as_bytes();
    let (radix, digits, prefixed) = match bytes {
        [b'0', b'x' | b'X', ..] => (16, &s[2..], true),
        [b'0', b'o' | b'O', ..] => (8, &s[2..], true),
        [b'0', b'b' | b'B', ..] => (2, &s[2..], true),
        [b'0', _, ..] => (8, &s[1..], true),
        _ => (10, s, false),
    };

    let mut value: u128 = 0;
    let mut saw_digit = false;
    // A prefix counts as a digit for underscore placement: `0x_ff` is fine, `_1` is not.
    let mut last_was_digit = prefixed;
    for c in digits.chars() {
        if c == '_' {
            if !last_was_digit {
                return Err(ScalarErrorKind::Syntax);
            }
            last_was_digit = false;
            continue;
        }
        let d = c.to_digit(radix).ok_or(ScalarErrorKind::Syntax)?;
        value = value
            .checked_mul(u128::from(radix))
            .and_then(|v| v.checked_add(u128::from(d)))
            .ok_or(ScalarErrorKind::Range)?;
        saw_digit = true;
        last_was_digit = true;
    }
    if !saw_digit || !last_was_digit {
        return Err(ScalarErrorKind::Syntax);
    }
    Ok(value)
}

/// Parse a signed integer that must fit in `bits` bits (8 through 128).
pub fn parse_int(input: &str, bits: u32) -> Result<i128, ScalarError> {
    let fail = |reason| ScalarError::new(ScalarKind::Int, input, reason);
    let (negative, body) = match input.as_bytes().first() {
        Some(b'-') => (true, &input[1..]),
        Some(b'+') => (false, &input[1..]),
        _ => (false, input),
    };
    let magnitude = parse_magnitude(body).map_err(fail)?;
    let limit = 1u128 << (bits - 1);
    if negative {
        if magnitude > limit {
            return Err(fail(ScalarErrorKind::Range));
        }
        // `limit` itself is the most negative value; two's complement wrap handles it.
        Ok((magnitude as i128).wrapping_neg())
    } else {
        if magnitude >= limit {
            return Err(fail(ScalarErrorKind::Range));
        }
        Ok(magnitude as i128)
    }
}

/// Parse an unsigned integer that must fit in `bits` bits. No sign is accepted.
pub fn parse_uint(input: &str, bits: u32) -> Result<u128, ScalarError> {
    let fail = |reason| ScalarError::new(ScalarKind::Uint, input, reason);
    if input.starts_with(['+', '-']) {
        return Err(fail(ScalarErrorKind::Syntax));
    }
    let magnitude = parse_magnitude(input).map_err(fail)?;
    if bits < 128 && magnitude >> bits != 0 {
        return Err(fail(ScalarErrorKind::Range));
    }
    Ok(magnitude)
}

fn is_infinity_literal(input: &str) -> bool {
    let body = input.trim_start_matches(['+', '-']);
    body.eq_ignore_ascii_case("inf") || body.eq_ignore_ascii_case("infinity")
}

/// Parse a float, rounded to 32 or 64 bits. Finite input that rounds to infinity is a range
/// error.
pub fn parse_float(input: &str, bits: u32) -> Result<f64, ScalarError> {
    let fail = |reason| ScalarError::new(ScalarKind::Float, input, reason);
    let value = if bits == 32 {
        input
            .parse::<f32>()
            .map(f64::from)
            .map_err(|_| fail(ScalarErrorKind::Syntax))?
    } else {
        input
            .parse::<f64>()
            .map_err(|_| fail(ScalarErrorKind::Syntax))?
    };
    if value.is_infinite() && !is_infinity_literal(input) {
        return Err(fail(ScalarErrorKind::Range));
    }
    Ok(value)
}

pub fn parse_bool(input: &str) -> Result<bool, ScalarError> {
    match input {
        "1" | "t" | "T" | "TRUE" | "true" | "True" => Ok(true),
        "0" | "f" | "F" | "FALSE" | "false" | "False" => Ok(false),
        _ => Err(ScalarError::new(
            ScalarKind::Bool,
            input,
            ScalarErrorKind::Syntax,
        )),
    }
}

pub fn parse_char(input: &str) -> Result<char, ScalarError> {
    let mut chars = input.chars();
    match (chars.next(), chars.next()) {
        (Some(c), None) => Ok(c),
        _ => Err(ScalarError::new(
            ScalarKind::Char,
            input,
            ScalarErrorKind::Syntax,
        )),
    }
}

pub fn format_bool(v: bool) -> String {
    let text = if v { "true" } else { "false" };
    text.to_string()
}

/// Shortest decimal that reads back to the same value, never in exponent form. 32-bit floats are
/// widened first, so they print with their exact 64-bit expansion.
pub fn format_float(v: f64) -> String {
    if v.is_nan() {
        "NaN".to_string()
    } else if v.is_infinite() {
        let text = if v > 0.0 { "+Inf" } else { "-Inf" };
        text.to_string()
    } else {
        v.to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn int_bases() {
        assert_eq!(parse_int("42", 64).unwrap(), 42);
        assert_eq!(parse_int("-42", 64).unwrap(), -42);
        assert_eq!(parse_int("+7", 64).unwrap(), 7);
        assert_eq!(parse_int("0x1F", 64).unwrap(), 31);
        assert_eq!(parse_int("0o17", 64).unwrap(), 15);
        assert_eq!(parse_int("017", 64).unwrap(), 15);
        assert_eq!(parse_int("0b101", 64).unwrap(), 5);
        assert_eq!(parse_int("0", 64).unwrap(), 0);
        assert_eq!(parse_int("1_000", 64).unwrap(), 1000);
        assert_eq!(parse_int("0x_ff", 64).unwrap(), 255);
    }

    #[test]
    fn int_syntax_errors() {
        for bad in ["", "two", "-", "0x", "08", "1__0", "_1", "1_", "1.5", " 1"] {
            let err = parse_int(bad, 64).unwrap_err();
            assert_eq!(err.reason, ScalarErrorKind::Syntax, "input {:?}", bad);
        }
        assert_eq!(
            parse_int("two", 64).unwrap_err().to_string(),
            "parsing integer \"two\": invalid syntax"
        );
    }

    #[test]
    fn int_width() {
        assert_eq!(parse_int("127", 8).unwrap(), 127);
        assert_eq!(parse_int("-128", 8).unwrap(), -128);
        assert_eq!(parse_int("128", 8).unwrap_err().reason, ScalarErrorKind::Range);
        assert_eq!(parse_int("-129", 8).unwrap_err().reason, ScalarErrorKind::Range);
        assert_eq!(parse_int("-9223372036854775808", 64).unwrap(), i64::MIN as i128);
        assert_eq!(
            parse_int("9223372036854775808", 64).unwrap_err().reason,
            ScalarErrorKind::Range
        );
        assert_eq!(
            parse_int("-170141183460469231731687303715884105728", 128).unwrap(),
            i128::MIN
        );
    }

    #[test]
    fn uint_rules() {
        assert_eq!(parse_uint("255", 8).unwrap(), 255);
        assert_eq!(parse_uint("256", 8).unwrap_err().reason, ScalarErrorKind::Range);
        assert_eq!(parse_uint("+1", 8).unwrap_err().reason, ScalarErrorKind::Syntax);
        assert_eq!(parse_uint("-1", 8).unwrap_err().reason, ScalarErrorKind::Syntax);
        assert_eq!(parse_uint("0xffffffffffffffff", 64).unwrap(), u64::MAX as u128);
        assert_eq!(
            parse_uint("340282366920938463463374607431768211456", 128)
                .unwrap_err()
                .reason,
            ScalarErrorKind::Range
        );
    }

    #[test]
    fn floats() {
        assert_eq!(parse_float("6", 32).unwrap(), 6.0);
        assert_eq!(parse_float("1.5e3", 64).unwrap(), 1500.0);
        assert!(parse_float("NaN", 64).unwrap().is_nan());
        assert_eq!(parse_float("+Inf", 64).unwrap(), f64::INFINITY);
        assert_eq!(parse_float("-infinity", 32).unwrap(), f64::NEG_INFINITY);
        assert_eq!(parse_float("1e39", 32).unwrap_err().reason, ScalarErrorKind::Range);
        assert_eq!(parse_float("1e39", 64).unwrap(), 1e39);
        assert_eq!(parse_float("two", 64).unwrap_err().reason, ScalarErrorKind::Syntax);
    }

    #[test]
    fn float_formatting() {
        assert_eq!(format_float(8.0), "8");
        assert_eq!(format_float(0.1), "0.1");
        assert_eq!(format_float(1e21), "1000000000000000000000");
        assert_eq!(format_float(f64::from(7.1f32)), "7.099999904632568");
        assert_eq!(format_float(f64::NAN), "NaN");
        assert_eq!(format_float(f64::NEG_INFINITY), "-Inf");
        // The widened 32-bit value still reads back to the original.
        assert_eq!(parse_float("7.099999904632568", 32).unwrap() as f32, 7.1f32);
    }

    #[test]
    fn bools_and_chars() {
        for t in ["1", "t", "T", "TRUE", "true", "True"] {
            assert!(parse_bool(t).unwrap());
        }
        for f in ["0", "f", "F", "FALSE", "false", "False"] {
            assert!(!parse_bool(f).unwrap());
        }
        assert!(parse_bool("yes").is_err());
        assert_eq!(format_bool(true), "true");
        assert_eq!(parse_char("é").unwrap(), 'é');
        assert!(parse_char("ab").is_err());
        assert!(parse_char("").is_err());
    }
}
