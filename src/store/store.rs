use std::sync::Arc;

use log::{debug, warn};
use serde::de::DeserializeOwned;
use serde::Serialize;

use crate::config::default_backend;
use crate::engine::{Container, SubscriptionId};
use crate::error::Result;
use crate::merge::merge_records;
use crate::persist::{PersistOptions, Persistence, StorageBackend};

/// Options for [`create_store`].
pub struct StoreOptions<T> {
    /// Persistence identifier. Required when `persist` is set.
    pub name: String,
    pub initial_state: T,
    pub persist: bool,
    /// Backend to persist to. `None` falls back to the environment-provided
    /// backend, see [`StorageConfig`](crate::config::StorageConfig).
    pub storage: Option<Arc<dyn StorageBackend>>,
    pub version: u32,
}

impl<T> StoreOptions<T> {
    pub fn new(name: impl Into<String>, initial_state: T) -> Self {
        Self {
            name: name.into(),
            initial_state,
            persist: false,
            storage: None,
            version: 0,
        }
    }

    pub fn persist(mut self, persist: bool) -> Self {
        self.persist = persist;
        self
    }

    pub fn storage(mut self, storage: Arc<dyn StorageBackend>) -> Self {
        self.storage = Some(storage);
        self
    }

    pub fn version(mut self, version: u32) -> Self {
        self.version = version;
        self
    }
}

/// A typed state container with shallow-merge updates and reset.
///
/// Clones share the same state.
pub struct TypedStore<T> {
    name: String,
    container: Container<T>,
    initial_state: Arc<T>,
    persistence: Option<Persistence>,
}

/// Create a typed store from `options`.
///
/// When persistence is requested but no backend can be resolved the store
/// is returned without persistence. A persisted store with an empty name
/// fails with [`StoreError::Config`](crate::StoreError::Config).
///
/// # Examples
///
/// ```
/// use dynamixx::{create_store, StoreOptions};
/// use serde::{Deserialize, Serialize};
/// use serde_json::json;
///
/// #[derive(Clone, Serialize, Deserialize)]
/// struct Counter {
///     count: i64,
///     label: String,
/// }
///
/// let store = create_store(StoreOptions::new(
///     "counter",
///     Counter { count: 0, label: "clicks".into() },
/// ))
/// .unwrap();
///
/// store.set_state(json!({ "count": 3 })).unwrap();
/// assert_eq!(store.get_state().count, 3);
/// assert_eq!(store.get_state().label, "clicks");
///
/// store.reset();
/// assert_eq!(store.get_state().count, 0);
/// ```
pub fn create_store<T>(options: StoreOptions<T>) -> Result<TypedStore<T>>
where
    T: Clone + Serialize + DeserializeOwned + Send + Sync + 'static,
{
    create_with_fallback(options, default_backend)
}

fn create_with_fallback<T, F>(options: StoreOptions<T>, fallback: F) -> Result<TypedStore<T>>
where
    T: Clone + Serialize + DeserializeOwned + Send + Sync + 'static,
    F: FnOnce() -> Option<Arc<dyn StorageBackend>>,
{
    let StoreOptions {
        name,
        initial_state,
        persist,
        storage,
        version,
    } = options;

    let container = Container::new(initial_state.clone());

    let persistence = if persist {
        match storage.or_else(fallback) {
            Some(storage) => {
                let persistence =
                    Persistence::new(PersistOptions::new(name.clone(), storage).version(version))?;
                persistence.attach(&container)?;
                Some(persistence)
            }
            None => {
                warn!(
                    "No storage backend available for store '{}', continuing without persistence",
                    name
                );
                None
            }
        }
    } else {
        None
    };

    debug!(
        "Created store '{}' (persisted: {})",
        name,
        persistence.is_some()
    );

    Ok(TypedStore {
        name,
        container,
        initial_state: Arc::new(initial_state),
        persistence,
    })
}

impl<T> TypedStore<T>
where
    T: Clone + Serialize + DeserializeOwned + Send + Sync + 'static,
{
    /// Shallow-merge `updates` into the current state.
    ///
    /// `updates` must serialize to a record. Each of its fields replaces the
    /// same-named field of the state; nested values and sequences are
    /// replaced wholesale. If the merged record no longer fits `T` the call
    /// fails and the state is left untouched.
    pub fn set_state<P: Serialize>(&self, updates: P) -> Result<()> {
        let patch = serde_json::to_value(updates)?;
        self.container.try_update(|state| {
            let merged = merge_records(serde_json::to_value(&*state)?, patch)?;
            *state = serde_json::from_value(merged)?;
            Ok(())
        })
    }

    /// Mutate the state through a closure.
    pub fn update<F>(&self, f: F)
    where
        F: FnOnce(&mut T),
    {
        self.container.update(f);
    }

    /// Snapshot of the current state.
    pub fn get_state(&self) -> T {
        self.container.get()
    }

    /// Read the current state without cloning it.
    pub fn read<F, R>(&self, f: F) -> R
    where
        F: FnOnce(&T) -> R,
    {
        self.container.read(f)
    }

    /// Replace the whole state with the initial state captured at
    /// construction.
    pub fn reset(&self) {
        debug!("Resetting store '{}'", self.name);
        self.container.set(T::clone(&self.initial_state));
    }

    pub fn initial_state(&self) -> &T {
        &self.initial_state
    }

    pub fn subscribe<F>(&self, callback: F) -> SubscriptionId
    where
        F: Fn(&T) + Send + Sync + 'static,
    {
        self.container.subscribe(callback)
    }

    pub fn unsubscribe(&self, id: SubscriptionId) -> bool {
        self.container.unsubscribe(id)
    }

    /// Remove this store's persisted snapshot. The in-memory state is kept.
    pub fn clear_persisted(&self) -> Result<()> {
        match &self.persistence {
            Some(persistence) => persistence.clear(),
            None => Ok(()),
        }
    }
}

impl<T> TypedStore<T> {
    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn is_persisted(&self) -> bool {
        self.persistence.is_some()
    }
}

impl<T> Clone for TypedStore<T> {
    fn clone(&self) -> Self {
        Self {
            name: self.name.clone(),
            container: self.container.clone(),
            initial_state: Arc::clone(&self.initial_state),
            persistence: self.persistence.clone(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::StoreError;
    use crate::persist::MemoryStorage;
    use serde::Deserialize;
    use serde_json::{json, Value};

    #[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
    struct Settings {
        theme: String,
        volume: u8,
        tags: Vec<String>,
    }

    #[derive(Serialize)]
    struct SettingsPatch {
        #[serde(skip_serializing_if = "Option::is_none")]
        theme: Option<String>,
        #[serde(skip_serializing_if = "Option::is_none")]
        volume: Option<u8>,
    }

    fn settings() -> Settings {
        Settings {
            theme: "light".to_string(),
            volume: 5,
            tags: vec!["a".to_string()],
        }
    }

    fn plain_store() -> TypedStore<Settings> {
        create_store(StoreOptions::new("settings", settings())).unwrap()
    }

    #[test]
    fn set_state_merges_one_level() {
        let store = plain_store();

        store.set_state(json!({"volume": 9})).unwrap();

        assert_eq!(
            store.get_state(),
            Settings {
                theme: "light".to_string(),
                volume: 9,
                tags: vec!["a".to_string()],
            }
        );
    }

    #[test]
    fn set_state_accepts_typed_patches() {
        let store = plain_store();

        store
            .set_state(SettingsPatch {
                theme: Some("dark".to_string()),
                volume: None,
            })
            .unwrap();

        assert_eq!(store.get_state().theme, "dark");
        assert_eq!(store.get_state().volume, 5);
    }

    #[test]
    fn set_state_replaces_sequences() {
        let store = plain_store();

        store.set_state(json!({"tags": ["b", "c"]})).unwrap();

        assert_eq!(store.get_state().tags, vec!["b", "c"]);
    }

    #[test]
    fn set_state_rejects_bad_updates_and_keeps_state() {
        let store = plain_store();

        assert!(matches!(
            store.set_state(json!([1, 2])),
            Err(StoreError::NotARecord(_))
        ));
        assert!(matches!(
            store.set_state(json!({"volume": "loud"})),
            Err(StoreError::Serialization(_))
        ));
        assert_eq!(store.get_state(), settings());
    }

    #[test]
    fn reset_restores_initial_state_and_keeps_operations() {
        let store = plain_store();
        store.set_state(json!({"theme": "dark", "volume": 1})).unwrap();
        store.update(|s| s.tags.push("z".to_string()));

        store.reset();
        assert_eq!(store.get_state(), settings());
        assert_eq!(store.initial_state(), &settings());

        store.set_state(json!({"volume": 2})).unwrap();
        assert_eq!(store.get_state().volume, 2);
        store.reset();
        assert_eq!(store.get_state().volume, 5);
    }

    #[test]
    fn persisted_store_writes_under_its_name() {
        let storage = MemoryStorage::new();
        let store = create_store(
            StoreOptions::new("settings", settings())
                .persist(true)
                .storage(Arc::new(storage.clone())),
        )
        .unwrap();
        assert!(store.is_persisted());

        store.set_state(json!({"volume": 7})).unwrap();

        let raw = storage.get_item("settings").unwrap().unwrap();
        let value: Value = serde_json::from_str(&raw).unwrap();
        assert_eq!(value["state"]["volume"], json!(7));
        assert_eq!(value["version"], json!(0));
    }

    #[test]
    fn persisted_store_rehydrates() {
        let storage: Arc<dyn StorageBackend> = Arc::new(MemoryStorage::new());
        let options = || {
            StoreOptions::new("settings", settings())
                .persist(true)
                .storage(Arc::clone(&storage))
        };

        let first = create_store(options()).unwrap();
        first.set_state(json!({"theme": "dark"})).unwrap();

        let second = create_store(options()).unwrap();
        assert_eq!(second.get_state().theme, "dark");
        assert_eq!(second.initial_state(), &settings());
    }

    #[test]
    fn reset_is_persisted() {
        let storage = MemoryStorage::new();
        let store = create_store(
            StoreOptions::new("settings", settings())
                .persist(true)
                .storage(Arc::new(storage.clone())),
        )
        .unwrap();
        store.set_state(json!({"volume": 1})).unwrap();

        store.reset();

        let raw = storage.get_item("settings").unwrap().unwrap();
        let value: Value = serde_json::from_str(&raw).unwrap();
        assert_eq!(value["state"]["volume"], json!(5));
    }

    #[test]
    fn persisting_without_backend_degrades() {
        let store = create_with_fallback(
            StoreOptions::new("settings", settings()).persist(true),
            || None,
        )
        .unwrap();

        assert!(!store.is_persisted());
        store.set_state(json!({"volume": 3})).unwrap();
        assert_eq!(store.get_state().volume, 3);
        store.clear_persisted().unwrap();
    }

    #[test]
    fn persisting_without_name_is_a_config_error() {
        let result = create_store(
            StoreOptions::new("", settings())
                .persist(true)
                .storage(Arc::new(MemoryStorage::new())),
        );

        assert!(matches!(result, Err(StoreError::Config(_))));
    }

    #[test]
    fn non_persisted_store_ignores_name() {
        let store = create_store(StoreOptions::new("", settings())).unwrap();
        assert!(!store.is_persisted());
        assert_eq!(store.name(), "");
    }

    #[test]
    fn clear_persisted_removes_snapshot_only() {
        let storage = MemoryStorage::new();
        let store = create_store(
            StoreOptions::new("settings", settings())
                .persist(true)
                .storage(Arc::new(storage.clone())),
        )
        .unwrap();
        store.set_state(json!({"volume": 8})).unwrap();

        store.clear_persisted().unwrap();

        assert!(storage.is_empty());
        assert_eq!(store.get_state().volume, 8);
    }
}
