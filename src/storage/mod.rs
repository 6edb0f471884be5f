//! Persistent key-value storage for agent state.
//!
//! The engine itself never touches storage; the controller and refresh
//! service write through a [`KeyValueStore`] after every mutation.
//!
//! Keys and shapes:
//! - `rules`: raw rule map (key → encoded 4-slot string)
//! - `referrer`: referrer map, same shape
//! - `freq_track`: throttle records (key → RFC 3339 timestamp)
//! - `report_setting`: settings object
//! - `uTracking`, `malware`: user notice flag and redirect counter, written
//!   by the host

pub mod file_store;
pub mod memory;

pub use file_store::JsonFileStore;
pub use memory::MemoryStore;

use serde_json::{Map, Value};

pub const KEY_RULES: &str = "rules";
pub const KEY_REFERRER: &str = "referrer";
pub const KEY_FREQ_TRACK: &str = "freq_track";
pub const KEY_SETTINGS: &str = "report_setting";
pub const KEY_USER_TRACKING: &str = "uTracking";
pub const KEY_REDIRECT_COUNT: &str = "malware";

/// Durable key-value storage.
pub trait KeyValueStore: Send + Sync {
    /// Fetch the requested keys; missing keys are absent from the result.
    fn get(&self, keys: &[&str]) -> Result<Map<String, Value>, String>;

    /// Write every entry of `values`, replacing existing values.
    fn set(&self, values: Map<String, Value>) -> Result<(), String>;
}
