//! Strict conversion between raw array values and typed values.
//!
//! Every cast must consume its whole input: `"12"` is an int, `"12abc"` and
//! `""` are not.

use crate::error::ParamError;

/// A type that can be stored in and read back from a param value.
pub trait ParamValue: Sized {
    /// Name used in cast error messages.
    const TYPE_NAME: &'static str;

    fn cast(key: &str, raw: &str) -> Result<Self, ParamError>;

    /// Text written into the tree by the setters.
    fn render(&self) -> String;
}

impl ParamValue for i64 {
    const TYPE_NAME: &'static str = "int";

    fn cast(key: &str, raw: &str) -> Result<Self, ParamError> {
        cast_to_int(key, raw)
    }

    fn render(&self) -> String {
        self.to_string()
    }
}

impl ParamValue for bool {
    const TYPE_NAME: &'static str = "boolean";

    fn cast(key: &str, raw: &str) -> Result<Self, ParamError> {
        cast_to_bool(key, raw)
    }

    fn render(&self) -> String {
        String::from(if *self { "true" } else { "false" })
    }
}

impl ParamValue for f64 {
    const TYPE_NAME: &'static str = "double";

    fn cast(key: &str, raw: &str) -> Result<Self, ParamError> {
        cast_to_double(key, raw)
    }

    fn render(&self) -> String {
        format!("{self:.6}")
    }
}

impl ParamValue for String {
    const TYPE_NAME: &'static str = "string";

    fn cast(_key: &str, raw: &str) -> Result<Self, ParamError> {
        Ok(raw.to_string())
    }

    fn render(&self) -> String {
        self.clone()
    }
}

fn cast_error<T: ParamValue>(key: &str, raw: &str) -> ParamError {
    ParamError::Cast {
        key: key.to_string(),
        value: raw.to_string(),
        target: T::TYPE_NAME,
    }
}

/// Integer with C `strtol` base detection: `0x` prefix for hexadecimal, a
/// leading `0` for octal, decimal otherwise.
pub fn cast_to_int(key: &str, raw: &str) -> Result<i64, ParamError> {
    parse_integer(raw).ok_or_else(|| cast_error::<i64>(key, raw))
}

/// Case-insensitive `y`/`yes`/`true`/`1` and `n`/`no`/`false`/`0`.
pub fn cast_to_bool(key: &str, raw: &str) -> Result<bool, ParamError> {
    const TRUE: [&str; 3] = ["y", "yes", "true"];
    const FALSE: [&str; 3] = ["n", "no", "false"];

    if raw == "1" || TRUE.iter().any(|t| raw.eq_ignore_ascii_case(t)) {
        Ok(true)
    } else if raw == "0" || FALSE.iter().any(|f| raw.eq_ignore_ascii_case(f)) {
        Ok(false)
    } else {
        Err(cast_error::<bool>(key, raw))
    }
}

pub fn cast_to_double(key: &str, raw: &str) -> Result<f64, ParamError> {
    let trimmed = raw.trim_start_matches(|c: char| c.is_ascii_whitespace());
    trimmed
        .parse::<f64>()
        .map_err(|_| cast_error::<f64>(key, raw))
}

fn parse_integer(raw: &str) -> Option<i64> {
    let s = raw.trim_start_matches(|c: char| c.is_ascii_whitespace());
    let (negative, s) = match s.as_bytes().first() {
        Some(b'-') => (true, &s[1..]),
        Some(b'+') => (false, &s[1..]),
        _ => (false, s),
    };

    let (radix, digits) = if let Some(hex) = s.strip_prefix("0x").or_else(|| s.strip_prefix("0X")) {
        (16, hex)
    } else if s.len() > 1 && s.starts_with('0') {
        (8, &s[1..])
    } else {
        (10, s)
    };

    if digits.is_empty() || !digits.chars().all(|c| c.is_digit(radix)) {
        return None;
    }
    let magnitude = i128::from_str_radix(digits, radix).ok()?;
    let value = if negative { -magnitude } else { magnitude };
    i64::try_from(value).ok()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_int_requires_full_consumption() {
        assert_eq!(cast_to_int("k", "12").unwrap(), 12);
        assert!(matches!(
            cast_to_int("k", "12abc"),
            Err(ParamError::Cast { target: "int", .. })
        ));
        assert!(cast_to_int("k", "").is_err());
        assert!(cast_to_int("k", "-").is_err());
        assert!(cast_to_int("k", "1.5").is_err());
        assert!(cast_to_int("k", "12 ").is_err());
    }

    #[test]
    fn test_int_bases_and_signs() {
        assert_eq!(cast_to_int("k", "-42").unwrap(), -42);
        assert_eq!(cast_to_int("k", "+7").unwrap(), 7);
        assert_eq!(cast_to_int("k", "  9").unwrap(), 9);
        assert_eq!(cast_to_int("k", "0x1F").unwrap(), 31);
        assert_eq!(cast_to_int("k", "-0X10").unwrap(), -16);
        assert_eq!(cast_to_int("k", "017").unwrap(), 15);
        assert_eq!(cast_to_int("k", "0").unwrap(), 0);
        assert!(cast_to_int("k", "08").is_err());
        assert!(cast_to_int("k", "0x").is_err());
    }

    #[test]
    fn test_int_out_of_range() {
        assert_eq!(
            cast_to_int("k", "-9223372036854775808").unwrap(),
            i64::MIN
        );
        assert!(cast_to_int("k", "9223372036854775808").is_err());
    }

    #[test]
    fn test_bool_is_case_insensitive() {
        for raw in ["y", "Y", "yes", "YES", "True", "1"] {
            assert!(cast_to_bool("k", raw).unwrap(), "{raw}");
        }
        for raw in ["n", "No", "FALSE", "0"] {
            assert!(!cast_to_bool("k", raw).unwrap(), "{raw}");
        }
        for raw in ["", "on", "2", "yess"] {
            assert!(cast_to_bool("k", raw).is_err(), "{raw}");
        }
    }

    #[test]
    fn test_double() {
        assert_eq!(cast_to_double("k", "1.5").unwrap(), 1.5);
        assert_eq!(cast_to_double("k", "-2e3").unwrap(), -2000.0);
        assert_eq!(cast_to_double("k", "3").unwrap(), 3.0);
        assert!(cast_to_double("k", "1.5x").is_err());
        assert!(cast_to_double("k", "").is_err());
    }

    #[test]
    fn test_render() {
        assert_eq!(42i64.render(), "42");
        assert_eq!(true.render(), "true");
        assert_eq!(0.5f64.render(), "0.500000");
        assert_eq!(String::from("x").render(), "x");
    }

    #[test]
    fn test_cast_error_message() {
        let err = cast_to_int("robot.id", "abc").unwrap_err();
        assert_eq!(
            err.to_string(),
            "key \"robot.id\" (\"abc\") did not cast properly to int"
        );
    }
}
