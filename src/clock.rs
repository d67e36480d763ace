//! Wall-clock helper
//!
//! Core logic takes timestamps as arguments so tests can drive it
//! deterministically; this is the single place real time comes from.

use std::time::{SystemTime, UNIX_EPOCH};

/// Current unix time in milliseconds
pub fn unix_ms() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default()
        .as_millis() as u64
}
