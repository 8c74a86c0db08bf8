//! Timestamp parsing for query parameters

use chrono::{DateTime, NaiveDateTime, Utc};

/// Parse an ISO-8601 timestamp, treating offset-less values as UTC
///
/// Accepts RFC 3339 (`2025-01-10T08:00:00Z`, `...+02:00`) as well as naive
/// forms such as `2025-01-10T08:00:00` or `2025-01-10T08:00:00.123456`.
pub fn parse_timestamp(value: &str) -> Result<DateTime<Utc>, chrono::ParseError> {
    let value = value.trim();
    match DateTime::parse_from_rfc3339(value) {
        Ok(dt) => Ok(dt.with_timezone(&Utc)),
        Err(rfc_err) => NaiveDateTime::parse_from_str(value, "%Y-%m-%dT%H:%M:%S%.f")
            .or_else(|_| NaiveDateTime::parse_from_str(value, "%Y-%m-%d %H:%M:%S%.f"))
            .map(|naive| naive.and_utc())
            .map_err(|_| rfc_err),
    }
}
