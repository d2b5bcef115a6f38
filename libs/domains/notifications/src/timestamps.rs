//! Timestamp conversions between inbound requests and outbound messages.
//!
//! Outbound timestamps are strings of digits holding milliseconds since the
//! Unix epoch.

use chrono::{DateTime, FixedOffset, TimeZone};
use serde_json::{Map, Value};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum TimestampError {
    #[error("invalid data type")]
    InvalidType,

    #[error("unable to parse timestamp '{value}': {source}")]
    Parse {
        value: String,
        #[source]
        source: chrono::ParseError,
    },
}

/// Parse a request timestamp. Fractional seconds and any UTC offset are accepted.
pub fn parse_timestamp(value: &str) -> Result<DateTime<FixedOffset>, TimestampError> {
    DateTime::parse_from_rfc3339(value).map_err(|source| TimestampError::Parse {
        value: value.to_string(),
        source,
    })
}

/// Format a timestamp as epoch milliseconds.
pub fn format_timestamp<Tz: TimeZone>(timestamp: &DateTime<Tz>) -> String {
    timestamp.timestamp_millis().to_string()
}

/// Convert a timestamp string to epoch milliseconds.
///
/// Empty strings and strings that are already all digits are returned as-is.
pub fn fix_timestamp(value: &str) -> Result<String, TimestampError> {
    if value.is_empty() || value.bytes().all(|b| b.is_ascii_digit()) {
        return Ok(value.to_string());
    }

    parse_timestamp(value).map(|parsed| format_timestamp(&parsed))
}

/// Normalize `map[key]` to epoch milliseconds in place. A missing key is left missing.
pub fn fix_timestamp_field(map: &mut Map<String, Value>, key: &str) -> Result<(), TimestampError> {
    let Some(current) = map.get(key) else {
        return Ok(());
    };

    let raw = match current {
        Value::String(s) => s.clone(),
        Value::Number(n) => match (n.as_i64(), n.as_f64()) {
            (Some(i), _) => i.to_string(),
            (None, Some(f)) => (f.trunc() as i64).to_string(),
            (None, None) => return Err(TimestampError::InvalidType),
        },
        _ => return Err(TimestampError::InvalidType),
    };

    let fixed = fix_timestamp(&raw)?;
    map.insert(key.to_string(), Value::String(fixed));
    Ok(())
}
