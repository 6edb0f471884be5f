//! Per-rule trigger tracking for frequency policies.
//!
//! Records are created only when a rule actually fires and are never swept;
//! staleness is judged lazily in [`ThrottleTracker::is_eligible`].

use crate::rule::Frequency;
use crate::types::Timestamp;
use chrono::{DateTime, Duration, Utc};
use log::warn;
use serde_json::{Map, Value};
use std::collections::HashMap;

/// Window for [`Frequency::Per24h`].
pub fn per24h_window() -> Duration {
    Duration::hours(24)
}

/// Last-fired timestamp per rule key.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ThrottleTracker {
    records: HashMap<String, Timestamp>,
}

impl ThrottleTracker {
    /// Create an empty tracker.
    pub fn new() -> Self {
        Self::default()
    }

    /// Whether the rule `key` may fire at `now` under `policy`.
    ///
    /// `Per24h` requires the last trigger to be strictly older than
    /// `now - 24h`; a record exactly 24 hours old is still throttled.
    pub fn is_eligible(&self, key: &str, policy: Frequency, now: Timestamp) -> bool {
        match policy {
            Frequency::Always => true,
            Frequency::Once => !self.records.contains_key(key),
            Frequency::Per24h => match self.records.get(key) {
                None => true,
                Some(last) => match now.checked_sub_signed(per24h_window()) {
                    Some(cutoff) => *last < cutoff,
                    None => false,
                },
            },
        }
    }

    /// Record that `key` fired at `now`, replacing any earlier record.
    pub fn record_trigger(&mut self, key: &str, now: Timestamp) {
        self.records.insert(key.to_string(), now);
    }

    /// Last trigger time for `key`.
    pub fn last_trigger(&self, key: &str) -> Option<Timestamp> {
        self.records.get(key).copied()
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    /// Persisted form: JSON object of key -> RFC 3339 timestamp.
    pub fn to_json(&self) -> Value {
        let map: Map<String, Value> = self
            .records
            .iter()
            .map(|(key, at)| (key.clone(), Value::String(at.to_rfc3339())))
            .collect();
        Value::Object(map)
    }

    /// Load from the persisted form.
    ///
    /// Accepts either the JSON object itself or a string containing it.
    /// Entries whose timestamp cannot be read are dropped.
    pub fn from_json(value: &Value) -> Result<Self, String> {
        let decoded;
        let object = match value {
            Value::Object(map) => map,
            Value::String(encoded) => {
                decoded = serde_json::from_str::<Value>(encoded)
                    .map_err(|e| format!("Invalid throttle record JSON: {}", e))?;
                decoded
                    .as_object()
                    .ok_or("Throttle record is not a JSON object")?
            }
            Value::Null => return Ok(Self::new()),
            _ => return Err("Throttle record is not a JSON object".to_string()),
        };

        let mut records = HashMap::with_capacity(object.len());
        for (key, raw) in object {
            let parsed = raw
                .as_str()
                .and_then(|s| DateTime::parse_from_rfc3339(s).ok())
                .map(|at| at.with_timezone(&Utc));
            match parsed {
                Some(at) => {
                    records.insert(key.clone(), at);
                }
                None => warn!("Dropping unreadable throttle record for '{}'", key),
            }
        }

        Ok(Self { records })
    }
}
