use std::collections::BTreeMap;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Mutex, MutexGuard, PoisonError};

use serde_json::Value;

use crate::{KeyValueStore, StoreError};

/// Process-local store. Values live as long as the instance.
#[derive(Debug, Default)]
pub struct MemoryStore {
    entries: Mutex<BTreeMap<String, Value>>,
    fail_updates: AtomicBool,
    update_count: AtomicU64,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_entry(key: &str, value: Value) -> Self {
        let store = Self::new();
        store.entries().insert(key.to_string(), value);
        store
    }

    /// Raw stored value, bypassing any default.
    pub fn snapshot(&self, key: &str) -> Option<Value> {
        self.entries().get(key).cloned()
    }

    /// While set, every `update` fails with [`StoreError::Unavailable`] and
    /// leaves stored values untouched.
    pub fn fail_updates(&self, fail: bool) {
        self.fail_updates.store(fail, Ordering::SeqCst);
    }

    pub fn update_count(&self) -> u64 {
        self.update_count.load(Ordering::SeqCst)
    }

    fn entries(&self) -> MutexGuard<'_, BTreeMap<String, Value>> {
        self.entries.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl KeyValueStore for MemoryStore {
    fn get(&self, key: &str, default: Value) -> Result<Value, StoreError> {
        Ok(self.entries().get(key).cloned().unwrap_or(default))
    }

    fn update(&self, key: &str, value: Value) -> Result<(), StoreError> {
        if self.fail_updates.load(Ordering::SeqCst) {
            return Err(StoreError::Unavailable {
                key: key.to_string(),
                reason: "updates are disabled".to_string(),
            });
        }

        self.entries().insert(key.to_string(), value);
        self.update_count.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }
}
