//! UTC timestamp helpers shared by the clients, writers, and replay tools

use chrono::{NaiveDateTime, Utc};

/// Timestamp layout used across every persisted record: `YYYY-MM-DD HH:MM:SS.mmm`
pub const TIMESTAMP_FORMAT: &str = "%Y-%m-%d %H:%M:%S%.3f";

/// Current UTC wall-clock time at millisecond precision.
#[must_use]
pub fn utc_timestamp_millis() -> String {
    Utc::now().format(TIMESTAMP_FORMAT).to_string()
}

/// Parse a record timestamp back to seconds since the UNIX epoch (UTC).
///
/// Returns `None` when the string does not match [`TIMESTAMP_FORMAT`]
/// (a sub-millisecond fraction is accepted).
#[must_use]
pub fn parse_timestamp_secs(ts: &str) -> Option<f64> {
    let parsed = NaiveDateTime::parse_from_str(ts, "%Y-%m-%d %H:%M:%S%.f").ok()?;
    let utc = parsed.and_utc();
    Some(utc.timestamp_millis() as f64 / 1000.0)
}
