//! Timestamp utilities

use chrono::{DateTime, Utc};

/// Get current UTC timestamp
pub fn now() -> DateTime<Utc> {
    Utc::now()
}

/// Convert milliseconds to duration
pub fn millis_to_duration(millis: u64) -> std::time::Duration {
    std::time::Duration::from_millis(millis)
}

/// Whole hours and minutes between two instants, formatted as `Dd-H:MM`
///
/// Used for idle-time log lines. Negative spans (clock skew) clamp to zero.
pub fn format_idle(since: DateTime<Utc>, until: DateTime<Utc>) -> String {
    let minutes = (until - since).num_minutes().max(0);
    let days = minutes / (24 * 60);
    let hours = (minutes / 60) % 24;
    let mins = minutes % 60;
    if days > 0 {
        format!("{}d-{}:{:02}", days, hours, mins)
    } else {
        format!("{}:{:02}", hours, mins)
    }
}
