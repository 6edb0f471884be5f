//! File-backed store - a single JSON document on disk.
//!
//! The whole document is held in memory and rewritten on every `set`
//! through a temp file and an atomic rename, so a crash mid-write leaves the
//! previous document intact.
//!
//! # File Format
//! ```text
//! {
//!   "rules":      { "<key>": "<encoded rule>", ... },
//!   "referrer":   { ... },
//!   "freq_track": { "<key>": "<rfc3339>", ... },
//!   ...
//! }
//! ```

use parking_lot::RwLock;
use serde_json::{Map, Value};
use std::fs::{File, OpenOptions};
use std::io::Write;
use std::path::{Path, PathBuf};

use super::KeyValueStore;

/// JSON file storage.
pub struct JsonFileStore {
    /// Path to storage file
    path: PathBuf,

    /// Document contents
    document: RwLock<Map<String, Value>>,
}

impl std::fmt::Debug for JsonFileStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("JsonFileStore")
            .field("path", &self.path)
            .field("keys", &self.document.read().len())
            .finish()
    }
}

impl JsonFileStore {
    /// Open or create storage at the given path.
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self, String> {
        let path = path.as_ref().to_path_buf();

        // Create parent directory if needed
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent)
                    .map_err(|e| format!("Failed to create directory: {}", e))?;
            }
        }

        let store = Self {
            path: path.clone(),
            document: RwLock::new(Map::new()),
        };

        if path.exists() {
            store.load()?;
        } else {
            store.persist(&Map::new())?;
        }

        Ok(store)
    }

    /// Path of the backing file.
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Load the document from disk.
    fn load(&self) -> Result<(), String> {
        let file = File::open(&self.path).map_err(|e| format!("Open failed: {}", e))?;
        let value: Value =
            serde_json::from_reader(file).map_err(|e| format!("Parse store failed: {}", e))?;

        match value {
            Value::Object(map) => {
                *self.document.write() = map;
                Ok(())
            }
            _ => Err("Store file is not a JSON object".to_string()),
        }
    }

    /// Write `document` to disk via temp file + rename.
    fn persist(&self, document: &Map<String, Value>) -> Result<(), String> {
        let tmp_path = self.path.with_extension("tmp");
        let mut file = OpenOptions::new()
            .write(true)
            .create(true)
            .truncate(true)
            .open(&tmp_path)
            .map_err(|e| format!("Create temp failed: {}", e))?;

        let encoded = serde_json::to_vec_pretty(document)
            .map_err(|e| format!("Serialize store failed: {}", e))?;
        file.write_all(&encoded)
            .map_err(|e| format!("Write store failed: {}", e))?;

        file.sync_all().map_err(|e| format!("Sync failed: {}", e))?;
        drop(file);

        // Atomic rename
        std::fs::rename(&tmp_path, &self.path).map_err(|e| format!("Rename failed: {}", e))?;
        Ok(())
    }
}

impl KeyValueStore for JsonFileStore {
    fn get(&self, keys: &[&str]) -> Result<Map<String, Value>, String> {
        let document = self.document.read();
        Ok(keys
            .iter()
            .filter_map(|key| document.get(*key).map(|v| (key.to_string(), v.clone())))
            .collect())
    }

    fn set(&self, values: Map<String, Value>) -> Result<(), String> {
        // Hold the write lock across the disk write so concurrent sets
        // reach the file in the same order they reach memory
        let mut document = self.document.write();
        let mut next = document.clone();
        for (key, value) in values {
            next.insert(key, value);
        }
        self.persist(&next)?;
        *document = next;
        Ok(())
    }
}
