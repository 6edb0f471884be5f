//! Shared primitive types.

use chrono::{DateTime, Utc};

/// Point in time used for all throttle decisions.
pub type Timestamp = DateTime<Utc>;

/// Identifier of the browser tab a navigation belongs to.
pub type TabId = i64;

/// Current wall-clock time.
#[inline]
pub fn now() -> Timestamp {
    Utc::now()
}

/// Current time as milliseconds since UNIX epoch.
#[inline]
pub fn now_ms() -> u64 {
    Utc::now().timestamp_millis().max(0) as u64
}
