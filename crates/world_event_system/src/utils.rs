//! Small helpers shared across the event system.

use std::time::{SystemTime, UNIX_EPOCH};
use uuid::Uuid;

/// Current time as Unix milliseconds.
pub fn current_timestamp_millis() -> i64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_millis() as i64)
        .unwrap_or(0)
}

/// New time-sortable event identifier (UUIDv7).
pub fn new_event_id() -> String {
    Uuid::now_v7().to_string()
}
