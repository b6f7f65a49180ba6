//! Persistent key-value store for settings.
//!
//! The store holds a nested JSON tree addressed by dotted keys, so
//! `water_pump.duty_cycle.value` names a leaf three levels deep. Leaf values
//! are always stored as text and cast back to the declared setting kind on
//! read. The persisted layout per device is:
//!
//! ```json
//! {
//!   "water_pump": {
//!     "duty_cycle": {
//!       "value": "0.3",
//!       "type": "float",
//!       "description": "Fraction of each cycle the pump is active."
//!     }
//!   }
//! }
//! ```
//!
//! All methods are synchronous to keep the core usable on embedded targets;
//! async wrappers belong to the sync layer.

use serde_json::{Map, Value};
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Mutex;
use thiserror::Error;

/// Errors that can occur during store operations.
#[derive(Debug, Error)]
pub enum StoreError {
    /// Failed to read the backing storage.
    #[error("failed to read store: {0}")]
    Read(String),

    /// Failed to write the backing storage.
    #[error("failed to write store: {0}")]
    Write(String),

    /// The backing storage does not contain a valid JSON tree.
    #[error("store contains invalid data: {0}")]
    InvalidData(String),
}

/// Abstract persistent store addressed by dotted keys.
///
/// Implementations provide the actual storage mechanism: `MemoryStore` for
/// tests and volatile use, `FileStore` for a JSON file on disk. Writes merge
/// into the nested tree keyed by `.`-split segments.
pub trait SettingsStore: Send + Sync {
    /// Read the value at a dotted key. Returns `None` when the key is absent.
    fn read(&self, key: &str) -> Result<Option<Value>, StoreError>;

    /// Write a value at a dotted key, creating intermediate objects as needed.
    fn write(&self, key: &str, value: Value) -> Result<(), StoreError>;

    /// Return the full nested tree.
    fn load(&self) -> Result<Value, StoreError>;
}

/// Look up a dotted key in a nested tree.
fn lookup<'a>(tree: &'a Value, key: &str) -> Option<&'a Value> {
    let mut current = tree;
    for segment in key.split('.') {
        match current {
            Value::Object(map) => current = map.get(segment)?,
            _ => return None,
        }
    }
    Some(current)
}

/// Set a dotted key in a nested tree, creating intermediate objects as
/// needed. A non-object intermediate node is replaced by an object.
fn merge(tree: &mut Value, key: &str, value: Value) {
    let segments: Vec<&str> = key.split('.').collect();
    let mut current = tree;

    for (i, segment) in segments.iter().enumerate() {
        if !current.is_object() {
            *current = Value::Object(Map::new());
        }
        let map = match current.as_object_mut() {
            Some(map) => map,
            None => return,
        };
        if i == segments.len() - 1 {
            map.insert((*segment).to_string(), value);
            return;
        }
        current = map
            .entry((*segment).to_string())
            .or_insert_with(|| Value::Object(Map::new()));
    }
}

/// In-memory store implementation.
///
/// Used by tests and as the default on targets without a writable filesystem.
#[derive(Debug)]
pub struct MemoryStore {
    data: Mutex<Value>,
}

impl Default for MemoryStore {
    fn default() -> Self {
        Self::new()
    }
}

impl MemoryStore {
    /// Create a new empty store.
    pub fn new() -> Self {
        Self {
            data: Mutex::new(Value::Object(Map::new())),
        }
    }

    /// Create a store pre-seeded with a nested tree.
    pub fn with_data(data: Value) -> Self {
        Self {
            data: Mutex::new(data),
        }
    }
}

impl SettingsStore for MemoryStore {
    fn read(&self, key: &str) -> Result<Option<Value>, StoreError> {
        let data = self.data.lock().expect("store lock poisoned");
        Ok(lookup(&data, key).cloned())
    }

    fn write(&self, key: &str, value: Value) -> Result<(), StoreError> {
        let mut data = self.data.lock().expect("store lock poisoned");
        merge(&mut data, key, value);
        Ok(())
    }

    fn load(&self) -> Result<Value, StoreError> {
        let data = self.data.lock().expect("store lock poisoned");
        Ok(data.clone())
    }
}

/// JSON-file-backed store implementation.
///
/// The file is read once when the store is opened and rewritten on every
/// write. A crash between an in-memory update and its write can leave the
/// two out of step; the next successful write reconciles them.
#[derive(Debug)]
pub struct FileStore {
    path: PathBuf,
    data: Mutex<Value>,
}

impl FileStore {
    /// Open a store at the given path. A missing file yields an empty tree;
    /// a file that is not valid JSON is an error.
    pub fn open(path: impl Into<PathBuf>) -> Result<Self, StoreError> {
        let path = path.into();
        let data = if path.exists() {
            let text = fs::read_to_string(&path)
                .map_err(|e| StoreError::Read(format!("{}: {}", path.display(), e)))?;
            serde_json::from_str(&text)
                .map_err(|e| StoreError::InvalidData(format!("{}: {}", path.display(), e)))?
        } else {
            Value::Object(Map::new())
        };
        Ok(Self {
            path,
            data: Mutex::new(data),
        })
    }

    /// The path this store writes to.
    pub fn path(&self) -> &Path {
        &self.path
    }

    fn flush(&self, data: &Value) -> Result<(), StoreError> {
        if let Some(parent) = self.path.parent() {
            if !parent.as_os_str().is_empty() {
                fs::create_dir_all(parent)
                    .map_err(|e| StoreError::Write(format!("{}: {}", parent.display(), e)))?;
            }
        }
        let text = serde_json::to_string_pretty(data)
            .map_err(|e| StoreError::Write(e.to_string()))?;
        fs::write(&self.path, text)
            .map_err(|e| StoreError::Write(format!("{}: {}", self.path.display(), e)))
    }
}

impl SettingsStore for FileStore {
    fn read(&self, key: &str) -> Result<Option<Value>, StoreError> {
        let data = self.data.lock().expect("store lock poisoned");
        Ok(lookup(&data, key).cloned())
    }

    fn write(&self, key: &str, value: Value) -> Result<(), StoreError> {
        let mut data = self.data.lock().expect("store lock poisoned");
        merge(&mut data, key, value);
        self.flush(&data)
    }

    fn load(&self) -> Result<Value, StoreError> {
        let data = self.data.lock().expect("store lock poisoned");
        Ok(data.clone())
    }
}
