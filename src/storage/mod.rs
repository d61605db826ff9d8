//! Local key-value store and the counters kept in it.
//!
//! Values are JSON documents addressed by key. `update` is an atomic
//! read-modify-write, so concurrent invocations of the tool never lose a
//! counter increment.

pub mod file;
pub mod stats;

pub use file::FileStore;
pub use stats::{
    dashboard_stats, is_admin, record_search, record_visit, reset_stats, set_admin, DashboardStats,
    PeriodStats,
};

use crate::error::StoreError;
use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::Value;
#[cfg(test)]
use std::collections::HashMap;
#[cfg(test)]
use std::sync::Mutex;

/// Read-modify-write callback. Receives the current value, if any.
pub type Updater<'a> = Box<dyn FnOnce(Option<Value>) -> Result<Value, StoreError> + 'a>;

/// Persistent key-value storage.
pub trait KeyValueStore: Send + Sync {
    fn get(&self, key: &str) -> Result<Option<Value>, StoreError>;

    /// Replace the value of `key` with the updater's result while holding
    /// the store lock. Returns the stored value.
    fn update(&self, key: &str, updater: Updater<'_>) -> Result<Value, StoreError>;

    fn remove(&self, key: &str) -> Result<(), StoreError>;
}

/// Read and deserialize a value.
pub fn get_typed<T: DeserializeOwned>(
    store: &dyn KeyValueStore,
    key: &str,
) -> Result<Option<T>, StoreError> {
    store
        .get(key)?
        .map(|value| decode(key, value))
        .transpose()
}

/// Atomically transform a typed value.
pub fn update_typed<T, F>(store: &dyn KeyValueStore, key: &str, f: F) -> Result<T, StoreError>
where
    T: Serialize + DeserializeOwned,
    F: FnOnce(Option<T>) -> T,
{
    let stored = store.update(
        key,
        Box::new(|current: Option<Value>| {
            let current = current.map(|value| decode(key, value)).transpose()?;
            encode(key, &f(current))
        }),
    )?;
    decode(key, stored)
}

fn decode<T: DeserializeOwned>(key: &str, value: Value) -> Result<T, StoreError> {
    serde_json::from_value(value).map_err(|source| StoreError::Corrupt {
        key: key.to_string(),
        source,
    })
}

fn encode<T: Serialize>(key: &str, value: &T) -> Result<Value, StoreError> {
    serde_json::to_value(value).map_err(|source| StoreError::Corrupt {
        key: key.to_string(),
        source,
    })
}

/// In-memory store.
#[cfg(test)]
#[derive(Debug, Default)]
pub struct MemoryStore {
    values: Mutex<HashMap<String, Value>>,
}

#[cfg(test)]
impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[cfg(test)]
impl KeyValueStore for MemoryStore {
    fn get(&self, key: &str) -> Result<Option<Value>, StoreError> {
        let values = self.values.lock().map_err(|_| StoreError::Poisoned)?;
        Ok(values.get(key).cloned())
    }

    fn update(&self, key: &str, updater: Updater<'_>) -> Result<Value, StoreError> {
        let mut values = self.values.lock().map_err(|_| StoreError::Poisoned)?;
        let next = updater(values.get(key).cloned())?;
        values.insert(key.to_string(), next.clone());
        Ok(next)
    }

    fn remove(&self, key: &str) -> Result<(), StoreError> {
        let mut values = self.values.lock().map_err(|_| StoreError::Poisoned)?;
        values.remove(key);
        Ok(())
    }
}
