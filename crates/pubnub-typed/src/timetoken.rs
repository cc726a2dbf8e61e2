//! Timetoken conversion. A timetoken counts 100 ns ticks since the Unix epoch.

use chrono::{DateTime, Utc};

const TICKS_PER_MILLI: i64 = 10_000;

/// The Unix epoch, used wherever a timetoken cannot be read.
pub fn epoch() -> DateTime<Utc> {
    DateTime::default()
}

/// Convert a timetoken to a UTC timestamp, truncated to milliseconds.
pub fn to_datetime(timetoken: i64) -> DateTime<Utc> {
    DateTime::from_timestamp_millis(timetoken / TICKS_PER_MILLI).unwrap_or_default()
}

/// Convert a UTC timestamp to a timetoken with millisecond precision.
pub fn from_datetime(at: DateTime<Utc>) -> i64 {
    at.timestamp_millis().saturating_mul(TICKS_PER_MILLI)
}

/// Parse timetoken text leniently. Anything unparseable maps to the epoch.
pub fn parse_text(text: &str) -> DateTime<Utc> {
    let text = text.trim();
    if let Ok(ticks) = text.parse::<i64>() {
        return to_datetime(ticks);
    }
    match text.parse::<f64>() {
        Ok(ticks) if ticks.is_finite() => {
            DateTime::from_timestamp_millis((ticks / TICKS_PER_MILLI as f64) as i64)
                .unwrap_or_default()
        }
        _ => {
            tracing::trace!(text, "unparseable timetoken, using epoch");
            epoch()
        }
    }
}
