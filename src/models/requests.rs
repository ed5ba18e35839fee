//! Request DTOs for the cache server API
//!
//! Defines the query parameters accepted by the HTTP handlers and the
//! parser for their duration strings.

use chrono::Duration;
use serde::Deserialize;

use crate::error::{CacheError, Result};

/// Query string of the SET operation (POST /:key)
///
/// # Fields
/// - `ttl`: Optional duration such as `10s`, `1.5h` or `2h45m`
#[derive(Debug, Clone, Default, Deserialize)]
pub struct SetQuery {
    #[serde(default)]
    pub ttl: Option<String>,
}

impl SetQuery {
    /// Returns the requested TTL; an absent or empty parameter is zero.
    pub fn ttl(&self) -> Result<Duration> {
        parse_ttl(self.ttl.as_deref().unwrap_or(""))
    }
}

// Only reached for inputs with a decimal point, which humantime rejects.
fn unit_nanos(unit: &str) -> Option<i128> {
    match unit {
        "ns" => Some(1),
        "us" => Some(1_000),
        "ms" => Some(1_000_000),
        "s" => Some(1_000_000_000),
        "m" => Some(60_000_000_000),
        "h" => Some(3_600_000_000_000),
        _ => None,
    }
}

fn split_digits(input: &str) -> (&str, &str) {
    let end = input
        .find(|c: char| !c.is_ascii_digit())
        .unwrap_or(input.len());
    input.split_at(end)
}

/// Sums components such as `1.5h` or `.5s3ms` into nanoseconds.
fn parse_fractional(mut rest: &str) -> Result<i64> {
    let mut total: i128 = 0;
    while !rest.is_empty() {
        let (whole, after) = split_digits(rest);
        rest = after;

        let mut fraction = "";
        if let Some(after_dot) = rest.strip_prefix('.') {
            let (digits, after) = split_digits(after_dot);
            fraction = digits;
            rest = after;
        }
        if whole.is_empty() && fraction.is_empty() {
            return Err(CacheError::MalformedDuration);
        }

        let unit_end = rest
            .find(|c: char| c.is_ascii_digit() || c == '.')
            .unwrap_or(rest.len());
        let unit = unit_nanos(&rest[..unit_end]).ok_or(CacheError::MalformedDuration)?;
        rest = &rest[unit_end..];

        let whole: i128 = if whole.is_empty() {
            0
        } else {
            whole.parse().map_err(|_| CacheError::MalformedDuration)?
        };
        let mut part = whole
            .checked_mul(unit)
            .ok_or(CacheError::MalformedDuration)?;

        // Digits beyond nanosecond precision of an hour cannot matter.
        let fraction = &fraction[..fraction.len().min(18)];
        if !fraction.is_empty() {
            let scale = 10i128.pow(fraction.len() as u32);
            let digits: i128 = fraction.parse().map_err(|_| CacheError::MalformedDuration)?;
            part += digits * unit / scale;
        }

        total = total
            .checked_add(part)
            .ok_or(CacheError::MalformedDuration)?;
    }

    i64::try_from(total).map_err(|_| CacheError::MalformedDuration)
}

// == Parse TTL ==
/// Parses a duration string: an optional sign followed by one or more
/// numbers, each with a unit (`ns`, `us`, `µs`, `ms`, `s`, `m`, `h`).
///
/// Integer components go through `humantime::parse_duration`. Decimal
/// components (`1.5h`, `.5s`) are summed here since humantime has no
/// fractions. The empty string and a bare `0` are zero. Anything else that
/// does not parse, or does not fit in `i64` nanoseconds, fails with
/// `MalformedDuration`.
pub fn parse_ttl(input: &str) -> Result<Duration> {
    let (negative, rest) = match input.as_bytes().first() {
        Some(b'-') => (true, &input[1..]),
        Some(b'+') => (false, &input[1..]),
        _ => (false, input),
    };
    if input.is_empty() || rest == "0" {
        return Ok(Duration::zero());
    }
    if rest.is_empty() {
        return Err(CacheError::MalformedDuration);
    }

    let rest = rest.replace(['\u{b5}', '\u{3bc}'], "u");
    let nanos = if rest.contains('.') {
        parse_fractional(&rest)?
    } else {
        let parsed = humantime::parse_duration(&rest).map_err(|_| CacheError::MalformedDuration)?;
        i64::try_from(parsed.as_nanos()).map_err(|_| CacheError::MalformedDuration)?
    };

    Ok(Duration::nanoseconds(if negative { -nanos } else { nanos }))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_set_query_deserialize() {
        let query: SetQuery = serde_json::from_str(r#"{"ttl": "10s"}"#).unwrap();
        assert_eq!(query.ttl().unwrap(), Duration::seconds(10));

        let query: SetQuery = serde_json::from_str("{}").unwrap();
        assert_eq!(query.ttl().unwrap(), Duration::zero());
    }

    #[test]
    fn test_parse_simple_units() {
        assert_eq!(parse_ttl("").unwrap(), Duration::zero());
        assert_eq!(parse_ttl("0").unwrap(), Duration::zero());
        assert_eq!(parse_ttl("15ns").unwrap(), Duration::nanoseconds(15));
        assert_eq!(parse_ttl("15us").unwrap(), Duration::microseconds(15));
        assert_eq!(parse_ttl("15\u{b5}s").unwrap(), Duration::microseconds(15));
        assert_eq!(parse_ttl("15\u{3bc}s").unwrap(), Duration::microseconds(15));
        assert_eq!(parse_ttl("15ms").unwrap(), Duration::milliseconds(15));
        assert_eq!(parse_ttl("10s").unwrap(), Duration::seconds(10));
        assert_eq!(parse_ttl("2m").unwrap(), Duration::minutes(2));
        assert_eq!(parse_ttl("3h").unwrap(), Duration::hours(3));
    }

    #[test]
    fn test_parse_compound_and_fractional() {
        assert_eq!(
            parse_ttl("2h45m").unwrap(),
            Duration::hours(2) + Duration::minutes(45)
        );
        assert_eq!(parse_ttl("1.5h").unwrap(), Duration::minutes(90));
        assert_eq!(parse_ttl(".5s").unwrap(), Duration::milliseconds(500));
        assert_eq!(parse_ttl("1.s").unwrap(), Duration::seconds(1));
        assert_eq!(parse_ttl("+5s").unwrap(), Duration::seconds(5));
        assert_eq!(parse_ttl("-1s").unwrap(), Duration::seconds(-1));
        assert_eq!(parse_ttl("-0").unwrap(), Duration::zero());
        assert_eq!(
            parse_ttl("1h0.5m").unwrap(),
            Duration::hours(1) + Duration::seconds(30)
        );
    }

    #[test]
    fn test_parse_limits_to_i64_nanos() {
        assert_eq!(
            parse_ttl("2562047h").unwrap(),
            Duration::hours(2_562_047)
        );
        for input in ["2562048h", "2562047.9h", "-2562048h"] {
            assert!(
                matches!(parse_ttl(input), Err(CacheError::MalformedDuration)),
                "accepted {:?}",
                input
            );
        }
    }

    #[test]
    fn test_parse_rejects_malformed() {
        for input in ["15", "abc", "10x", "s", "-", ".s", "1..5s", "5s3", "9999999999999h"] {
            assert!(
                matches!(parse_ttl(input), Err(CacheError::MalformedDuration)),
                "accepted {:?}",
                input
            );
        }
    }
}
