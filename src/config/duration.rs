//! Duration values in config files.

use std::sync::OnceLock;
use std::time::Duration;

use regex::Regex;
use serde::Deserialize;
use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("invalid duration {0:?}")]
pub struct DurationError(pub String);

/// A duration as written in the config: either a string such as `1m30s` or
/// a bare number of seconds.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(untagged)]
pub enum DurationValue {
    Seconds(u64),
    Text(String),
}

impl DurationValue {
    pub fn to_duration(&self) -> Result<Duration, DurationError> {
        match self {
            DurationValue::Seconds(secs) => Ok(Duration::from_secs(*secs)),
            DurationValue::Text(text) => parse_duration(text),
        }
    }
}

/// Parse a sequence of `<number><unit>` pairs, e.g. `1h30m` or `1.5s`.
///
/// Units are `ns`, `us`/`µs`, `ms`, `s`, `m` and `h`. A bare integer is read
/// as seconds and `0` needs no unit.
pub fn parse_duration(text: &str) -> Result<Duration, DurationError> {
    static PART: OnceLock<Regex> = OnceLock::new();
    let re = PART.get_or_init(|| Regex::new(r"([0-9]*\.?[0-9]+)(ns|us|µs|ms|s|m|h)").unwrap());

    let invalid = || DurationError(text.to_string());
    let trimmed = text.trim();

    if trimmed.is_empty() {
        return Err(invalid());
    }

    if let Ok(secs) = trimmed.parse::<u64>() {
        return Ok(Duration::from_secs(secs));
    }

    // Accumulated in nanoseconds
    let mut total = 0f64;
    let mut last = 0;

    for caps in re.captures_iter(trimmed) {
        let (Some(whole), Some(value), Some(unit)) = (caps.get(0), caps.get(1), caps.get(2))
        else {
            return Err(invalid());
        };

        // Parts must be contiguous
        if whole.start() != last {
            return Err(invalid());
        }
        last = whole.end();

        let value: f64 = value.as_str().parse().map_err(|_| invalid())?;
        let scale = match unit.as_str() {
            "ns" => 1.0,
            "us" | "µs" => 1e3,
            "ms" => 1e6,
            "s" => 1e9,
            "m" => 60e9,
            "h" => 3600e9,
            _ => return Err(invalid()),
        };
        total += value * scale;
    }

    if last != trimmed.len() {
        return Err(invalid());
    }

    if !total.is_finite() || total >= u64::MAX as f64 {
        return Err(invalid());
    }

    Ok(Duration::from_nanos(total.round() as u64))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_duration() {
        assert_eq!(parse_duration("10s"), Ok(Duration::from_secs(10)));
        assert_eq!(parse_duration("1m"), Ok(Duration::from_secs(60)));
        assert_eq!(parse_duration("1h30m"), Ok(Duration::from_secs(5400)));
        assert_eq!(parse_duration("1.5s"), Ok(Duration::from_millis(1500)));
        assert_eq!(parse_duration("250ms"), Ok(Duration::from_millis(250)));
        assert_eq!(parse_duration("0"), Ok(Duration::ZERO));
        assert_eq!(parse_duration("30"), Ok(Duration::from_secs(30)));
    }

    #[test]
    fn test_parse_duration_invalid() {
        for text in ["", "abc", "10x", "-5s", "1m foo", "s", "1h 30m"] {
            assert!(parse_duration(text).is_err(), "expected error for {:?}", text);
        }
    }

    #[test]
    fn test_duration_value() {
        let secs: DurationValue = serde_yaml::from_str("5").unwrap();
        assert_eq!(secs.to_duration(), Ok(Duration::from_secs(5)));

        let text: DurationValue = serde_yaml::from_str("2m").unwrap();
        assert_eq!(text.to_duration(), Ok(Duration::from_secs(120)));
    }
}
