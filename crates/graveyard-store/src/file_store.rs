use std::fs::{self, File, OpenOptions};
use std::io::{self, Write};
use std::path::PathBuf;

use fs2::FileExt;
use serde_json::{Map, Value};
use tempfile::NamedTempFile;
use tracing::debug;

use crate::{KeyValueStore, StoreError};

/// Keeps every key in one JSON object file.
///
/// Each `get` re-reads the file so separate instances over the same path see
/// each other's writes. Each `update` holds an exclusive lock on
/// `<file>.lock` while it re-reads, modifies and rewrites the object, so
/// writers on different keys (in any thread or process) never drop each
/// other's entries. The rewrite goes through a sibling temp file that is
/// renamed into place, so readers never observe a torn file.
#[derive(Debug, Clone)]
pub struct JsonFileStore {
    path: PathBuf,
}

impl JsonFileStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    /// Every key currently stored, in key order.
    pub fn keys(&self) -> Result<Vec<String>, StoreError> {
        Ok(self.read_entries()?.keys().cloned().collect())
    }

    fn read_entries(&self) -> Result<Map<String, Value>, StoreError> {
        let raw = match fs::read_to_string(&self.path) {
            Ok(raw) => raw,
            Err(err) if err.kind() == io::ErrorKind::NotFound => return Ok(Map::new()),
            Err(source) => {
                return Err(StoreError::Io {
                    action: "read",
                    path: self.path.clone(),
                    source,
                });
            }
        };

        if raw.trim().is_empty() {
            return Ok(Map::new());
        }

        match serde_json::from_str::<Value>(&raw) {
            Ok(Value::Object(entries)) => Ok(entries),
            Ok(other) => Err(StoreError::Corrupt {
                path: self.path.clone(),
                reason: format!("expected a JSON object at top level, found {}", kind(&other)),
            }),
            Err(err) => Err(StoreError::Corrupt {
                path: self.path.clone(),
                reason: err.to_string(),
            }),
        }
    }

    fn write_entries(&self, entries: Map<String, Value>) -> Result<(), StoreError> {
        let mut payload = serde_json::to_vec_pretty(&Value::Object(entries)).map_err(|source| {
            StoreError::Serialize {
                path: self.path.clone(),
                source,
            }
        })?;
        payload.push(b'\n');

        let mut staged = NamedTempFile::new_in(self.parent_dir()).map_err(|source| {
            StoreError::Io {
                action: "stage",
                path: self.path.clone(),
                source,
            }
        })?;
        staged
            .write_all(&payload)
            .and_then(|()| staged.as_file().sync_all())
            .map_err(|source| StoreError::Io {
                action: "write staged",
                path: staged.path().to_path_buf(),
                source,
            })?;
        staged.persist(&self.path).map_err(|err| StoreError::Io {
            action: "replace",
            path: self.path.clone(),
            source: err.error,
        })?;
        Ok(())
    }

    /// Blocks until a fresh handle holds the exclusive lock on the sibling
    /// `.lock` file. The lock is released when the returned handle drops.
    fn lock(&self) -> Result<File, StoreError> {
        let parent = self.parent_dir();
        fs::create_dir_all(&parent).map_err(|source| StoreError::Io {
            action: "create parent directory of",
            path: self.path.clone(),
            source,
        })?;

        let lock_path = self.lock_path();
        let file = OpenOptions::new()
            .read(true)
            .write(true)
            .create(true)
            .truncate(false)
            .open(&lock_path)
            .map_err(|source| StoreError::Io {
                action: "open lock for",
                path: lock_path.clone(),
                source,
            })?;
        FileExt::lock_exclusive(&file).map_err(|source| StoreError::Io {
            action: "lock",
            path: lock_path,
            source,
        })?;
        Ok(file)
    }

    fn parent_dir(&self) -> PathBuf {
        match self.path.parent() {
            Some(parent) if !parent.as_os_str().is_empty() => parent.to_path_buf(),
            _ => PathBuf::from("."),
        }
    }

    fn lock_path(&self) -> PathBuf {
        let mut file_name = self
            .path
            .file_name()
            .map(|name| name.to_os_string())
            .unwrap_or_else(|| "store.json".into());
        file_name.push(".lock");
        self.path.with_file_name(file_name)
    }
}

impl KeyValueStore for JsonFileStore {
    fn get(&self, key: &str, default: Value) -> Result<Value, StoreError> {
        let mut entries = self.read_entries()?;
        Ok(entries.remove(key).unwrap_or(default))
    }

    fn update(&self, key: &str, value: Value) -> Result<(), StoreError> {
        let _lock = self.lock()?;
        let mut entries = self.read_entries()?;
        entries.insert(key.to_string(), value);
        self.write_entries(entries)?;
        debug!(key, path = %self.path.display(), "store entry updated");
        Ok(())
    }
}

fn kind(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "a boolean",
        Value::Number(_) => "a number",
        Value::String(_) => "a string",
        Value::Array(_) => "an array",
        Value::Object(_) => "an object",
    }
}
