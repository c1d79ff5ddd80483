//! Timestamp utilities

use chrono::Utc;

/// Milliseconds since the Unix epoch
pub fn unix_millis() -> i64 {
    Utc::now().timestamp_millis()
}
