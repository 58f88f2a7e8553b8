use std::sync::{Arc, OnceLock};

use log::{debug, error};
use serde::de::DeserializeOwned;
use serde_json::{Map, Value};

use super::DynamicValue;
use crate::config::default_backend;
use crate::engine::{Container, SubscriptionId};
use crate::error::Result;
use crate::persist::{MemoryStorage, Persistence, StorageBackend};

/// Backend identifier the dynamic store is persisted under.
pub const DYNAMIC_STORE_KEY: &str = "dynamixx-store";

/// Entries in insertion order.
pub type Entries = Map<String, Value>;

/// A keyed store of heterogeneous values, always persisted.
///
/// Clones share the same entries. Each operation is a single locked step
/// on the underlying container, followed by a write to the backend.
/// Keys keep the order they were first added in.
#[derive(Clone)]
pub struct DynamicStore {
    container: Container<Entries>,
    storage: Arc<dyn StorageBackend>,
}

impl DynamicStore {
    /// Create a store persisted to `storage`, rehydrating any snapshot
    /// already stored under [`DYNAMIC_STORE_KEY`].
    pub fn new(storage: Arc<dyn StorageBackend>) -> Result<Self> {
        let container = Container::new(Entries::new());
        Persistence::with_fixed_name(DYNAMIC_STORE_KEY, Arc::clone(&storage)).attach(&container)?;
        debug!(
            "Created dynamic store with {} entries",
            container.read(|entries| entries.len())
        );
        Ok(Self { container, storage })
    }

    /// Create an isolated store backed by a fresh [`MemoryStorage`].
    pub fn in_memory() -> Self {
        let storage: Arc<dyn StorageBackend> = Arc::new(MemoryStorage::new());
        let container = Container::new(Entries::new());
        Persistence::with_fixed_name(DYNAMIC_STORE_KEY, Arc::clone(&storage))
            .persist_changes(&container);
        Self { container, storage }
    }

    /// Set `key` to `value`, replacing whatever was there.
    pub fn add_state(&self, key: impl Into<String>, value: impl Into<DynamicValue>) {
        let (key, value) = (key.into(), value.into());
        self.container.update(|entries| {
            entries.insert(key, value.into_value());
        });
    }

    /// Merge `value` into the value stored under `key`.
    ///
    /// See [`DynamicValue::merge`] for the policy. A key with no value yet
    /// is simply set.
    pub fn update_state(&self, key: impl Into<String>, value: impl Into<DynamicValue>) {
        let (key, value) = (key.into(), value.into());
        self.container.update(|entries| match entries.get_mut(&key) {
            Some(slot) => {
                let current = DynamicValue::from(std::mem::take(slot));
                *slot = DynamicValue::merge(Some(current), value).into_value();
            }
            None => {
                entries.insert(key, value.into_value());
            }
        });
    }

    pub fn get_state(&self, key: &str) -> Option<DynamicValue> {
        self.container
            .read(|entries| entries.get(key).cloned())
            .map(DynamicValue::from)
    }

    /// Read `key` as a typed value.
    pub fn get_as<T: DeserializeOwned>(&self, key: &str) -> Result<Option<T>> {
        let Some(value) = self.get_state(key) else {
            return Ok(None);
        };
        Ok(Some(serde_json::from_value(value.into_value())?))
    }

    /// Delete `key`, returning its value if it had one. The remaining keys
    /// keep their order.
    pub fn remove_state(&self, key: &str) -> Option<DynamicValue> {
        self.container
            .update(|entries| entries.shift_remove(key))
            .map(DynamicValue::from)
    }

    /// Drop every entry.
    pub fn reset_state(&self) {
        debug!("Resetting dynamic store");
        self.container.update(|entries| entries.clear());
    }

    pub fn contains_key(&self, key: &str) -> bool {
        self.container.read(|entries| entries.contains_key(key))
    }

    pub fn keys(&self) -> Vec<String> {
        self.container.read(|entries| entries.keys().cloned().collect())
    }

    pub fn len(&self) -> usize {
        self.container.read(|entries| entries.len())
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Copy of every entry.
    pub fn snapshot(&self) -> Entries {
        self.container.get()
    }

    pub fn subscribe<F>(&self, callback: F) -> SubscriptionId
    where
        F: Fn(&Entries) + Send + Sync + 'static,
    {
        self.container.subscribe(callback)
    }

    pub fn unsubscribe(&self, id: SubscriptionId) -> bool {
        self.container.unsubscribe(id)
    }

    /// The backend this store persists to.
    pub fn storage(&self) -> Arc<dyn StorageBackend> {
        Arc::clone(&self.storage)
    }
}

static GLOBAL: OnceLock<DynamicStore> = OnceLock::new();

/// The process-wide dynamic store.
///
/// Created on first access and kept for the rest of the process. It
/// persists to the environment-provided backend (see
/// [`StorageConfig`](crate::config::StorageConfig)) and falls back to
/// in-memory storage when none is configured or it cannot be read.
/// Prefer constructing a [`DynamicStore`] directly where it can be passed
/// around.
pub fn use_dynamic_store() -> &'static DynamicStore {
    GLOBAL.get_or_init(|| open_with_fallback(default_backend))
}

fn open_with_fallback<F>(fallback: F) -> DynamicStore
where
    F: FnOnce() -> Option<Arc<dyn StorageBackend>>,
{
    match fallback() {
        Some(storage) => DynamicStore::new(storage).unwrap_or_else(|e| {
            error!("Failed to open dynamic store storage, using memory: {}", e);
            DynamicStore::in_memory()
        }),
        None => DynamicStore::in_memory(),
    }
}
