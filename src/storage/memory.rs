//! In-memory store for tests and embedding hosts that persist elsewhere.

use parking_lot::RwLock;
use serde_json::{Map, Value};

use super::KeyValueStore;

#[derive(Debug, Default)]
pub struct MemoryStore {
    values: RwLock<Map<String, Value>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Snapshot of everything stored.
    pub fn snapshot(&self) -> Map<String, Value> {
        self.values.read().clone()
    }
}

impl KeyValueStore for MemoryStore {
    fn get(&self, keys: &[&str]) -> Result<Map<String, Value>, String> {
        let values = self.values.read();
        Ok(keys
            .iter()
            .filter_map(|key| values.get(*key).map(|v| (key.to_string(), v.clone())))
            .collect())
    }

    fn set(&self, values: Map<String, Value>) -> Result<(), String> {
        let mut stored = self.values.write();
        for (key, value) in values {
            stored.insert(key, value);
        }
        Ok(())
    }
}
