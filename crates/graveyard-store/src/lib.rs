mod error;
mod file_store;
mod memory_store;

pub use error::StoreError;
pub use file_store::JsonFileStore;
pub use memory_store::MemoryStore;

use serde_json::Value;

/// Durable key-value storage the ledger persists through.
///
/// `update` replaces a key's value wholesale. Nothing ties a `get` to a
/// later `update`: two callers interleaving load-modify-write on one key can
/// lose an update.
pub trait KeyValueStore: Send + Sync {
    fn get(&self, key: &str, default: Value) -> Result<Value, StoreError>;

    fn update(&self, key: &str, value: Value) -> Result<(), StoreError>;
}

impl<S: KeyValueStore + ?Sized> KeyValueStore for std::sync::Arc<S> {
    fn get(&self, key: &str, default: Value) -> Result<Value, StoreError> {
        (**self).get(key, default)
    }

    fn update(&self, key: &str, value: Value) -> Result<(), StoreError> {
        (**self).update(key, value)
    }
}
