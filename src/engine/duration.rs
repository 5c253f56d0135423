//! Duration values for `timeout`, `delay` and `retry_delay`
//!
//! A bare number is seconds (`timeout=5400`). Suffixed forms may be combined:
//! `500ms`, `90s`, `30m`, `1h30m`, `2d`.

use serde::Deserialize;
use std::time::Duration;

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum DurationError {
    #[error("Invalid duration '{input}': {reason}")]
    Invalid { input: String, reason: String },
}

fn invalid(input: &str, reason: impl Into<String>) -> DurationError {
    DurationError::Invalid {
        input: input.to_string(),
        reason: reason.into(),
    }
}

/// Parse a duration string like "5400", "1h30m", "500ms", "2d"
pub fn parse_duration(s: &str) -> Result<Duration, DurationError> {
    let input = s.trim();
    if input.is_empty() {
        return Err(invalid(s, "empty string"));
    }

    let mut total = Duration::ZERO;
    let mut current_num = String::new();
    let mut chars = input.chars().peekable();

    while let Some(c) = chars.next() {
        if c.is_ascii_digit() || c == '.' {
            current_num.push(c);
            continue;
        }

        if current_num.is_empty() {
            return Err(invalid(input, format!("expected number before unit '{}'", c)));
        }
        let num: f64 = current_num
            .parse()
            .map_err(|_| invalid(input, format!("invalid number: {}", current_num)))?;
        current_num.clear();

        let secs = match c {
            'd' => num * 24.0 * 60.0 * 60.0,
            'h' => num * 60.0 * 60.0,
            'm' if chars.peek() == Some(&'s') => {
                chars.next();
                num / 1000.0
            }
            'm' => num * 60.0,
            's' => num,
            _ => return Err(invalid(input, format!("unknown unit '{}'", c))),
        };
        total = add_secs(input, total, secs)?;
    }

    // Trailing number without a unit is seconds
    if !current_num.is_empty() {
        let num: f64 = current_num
            .parse()
            .map_err(|_| invalid(input, format!("invalid number: {}", current_num)))?;
        total = add_secs(input, total, num)?;
    }

    Ok(total)
}

fn add_secs(input: &str, total: Duration, secs: f64) -> Result<Duration, DurationError> {
    Duration::try_from_secs_f64(secs)
        .ok()
        .and_then(|d| total.checked_add(d))
        .ok_or_else(|| invalid(input, "out of range"))
}

/// Serde helper for duration fields in runner.yaml
pub fn deserialize_duration<'de, D>(deserializer: D) -> Result<Duration, D::Error>
where
    D: serde::Deserializer<'de>,
{
    let raw = DurationValue::deserialize(deserializer)?;
    parse_duration(&raw.into_string()).map_err(serde::de::Error::custom)
}

/// Serde helper for optional duration fields in runner.yaml
pub fn deserialize_opt_duration<'de, D>(deserializer: D) -> Result<Option<Duration>, D::Error>
where
    D: serde::Deserializer<'de>,
{
    Option::<DurationValue>::deserialize(deserializer)?
        .map(|raw| parse_duration(&raw.into_string()).map_err(serde::de::Error::custom))
        .transpose()
}

/// YAML accepts both `timeout: 90` and `timeout: 90s`
#[derive(Deserialize)]
#[serde(untagged)]
enum DurationValue {
    Seconds(u64),
    Text(String),
}

impl DurationValue {
    fn into_string(self) -> String {
        match self {
            DurationValue::Seconds(secs) => secs.to_string(),
            DurationValue::Text(text) => text,
        }
    }
}
