use std::sync::Arc;

use log::{debug, error, trace, warn};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use super::StorageBackend;
use crate::engine::{Container, SubscriptionId};
use crate::error::{Result, StoreError};
use crate::merge::shallow_merge;

/// Where and how a container is persisted.
#[derive(Clone)]
pub struct PersistOptions {
    /// Backend identifier the snapshot is stored under.
    pub name: String,
    pub storage: Arc<dyn StorageBackend>,
    /// Snapshots written with another version are ignored on hydration.
    pub version: u32,
}

impl PersistOptions {
    pub fn new(name: impl Into<String>, storage: Arc<dyn StorageBackend>) -> Self {
        Self {
            name: name.into(),
            storage,
            version: 0,
        }
    }

    pub fn version(mut self, version: u32) -> Self {
        self.version = version;
        self
    }
}

#[derive(Serialize)]
struct SnapshotRef<'a, T> {
    state: &'a T,
    version: u32,
}

#[derive(Deserialize)]
struct Snapshot {
    state: Value,
    #[serde(default)]
    version: u32,
}

/// Persistence middleware for a [`Container`].
///
/// The stored representation is `{"state": <snapshot>, "version": <n>}`
/// under `options.name`.
#[derive(Clone)]
pub struct Persistence {
    options: PersistOptions,
}

impl Persistence {
    /// Validate the options. A persisted container needs a non-empty name.
    pub fn new(options: PersistOptions) -> Result<Self> {
        if options.name.trim().is_empty() {
            return Err(StoreError::Config(
                "a persisted store requires a non-empty name".to_string(),
            ));
        }
        Ok(Self { options })
    }

    /// For identifiers known at compile time to be valid.
    pub(crate) fn with_fixed_name(name: &'static str, storage: Arc<dyn StorageBackend>) -> Self {
        Self {
            options: PersistOptions::new(name, storage),
        }
    }

    pub fn name(&self) -> &str {
        &self.options.name
    }

    pub fn version(&self) -> u32 {
        self.options.version
    }

    /// Rehydrate, then write the state to the backend after every change.
    pub fn attach<T>(&self, container: &Container<T>) -> Result<SubscriptionId>
    where
        T: Clone + Serialize + DeserializeOwned + Send + Sync + 'static,
    {
        self.hydrate(container)?;
        Ok(self.persist_changes(container))
    }

    /// Write the state to the backend after every change, without
    /// rehydrating first. Write failures are logged; the in-memory change
    /// stands.
    pub fn persist_changes<T>(&self, container: &Container<T>) -> SubscriptionId
    where
        T: Clone + Serialize + Send + Sync + 'static,
    {
        let persistence = self.clone();
        let id = container.subscribe(move |state: &T| {
            if let Err(e) = persistence.write(state) {
                error!(
                    "Failed to persist state for '{}': {}",
                    persistence.name(),
                    e
                );
            }
        });
        debug!("Persistence attached for '{}'", self.name());
        id
    }

    /// Merge a previously persisted snapshot into the container.
    ///
    /// Returns `true` if a snapshot was applied. Persisted fields overwrite
    /// current ones one level deep; fields the snapshot lacks keep their
    /// current value. Unreadable or mismatched snapshots are skipped.
    pub fn hydrate<T>(&self, container: &Container<T>) -> Result<bool>
    where
        T: Clone + Serialize + DeserializeOwned,
    {
        let Some(raw) = self.options.storage.get_item(self.name())? else {
            trace!("No persisted snapshot for '{}'", self.name());
            return Ok(false);
        };

        let snapshot: Snapshot = match serde_json::from_str(&raw) {
            Ok(snapshot) => snapshot,
            Err(e) => {
                warn!("Discarding unreadable snapshot for '{}': {}", self.name(), e);
                return Ok(false);
            }
        };

        if snapshot.version != self.options.version {
            warn!(
                "Discarding snapshot for '{}': version {} does not match {}",
                self.name(),
                snapshot.version,
                self.options.version
            );
            return Ok(false);
        }

        let merged = match (serde_json::to_value(container.get())?, snapshot.state) {
            (Value::Object(mut current), Value::Object(persisted)) => {
                shallow_merge(&mut current, persisted);
                Value::Object(current)
            }
            (_, persisted) => persisted,
        };

        match serde_json::from_value::<T>(merged) {
            Ok(state) => {
                container.set(state);
                debug!("Rehydrated '{}' from storage", self.name());
                Ok(true)
            }
            Err(e) => {
                warn!("Discarding incompatible snapshot for '{}': {}", self.name(), e);
                Ok(false)
            }
        }
    }

    /// Write `state` to the backend.
    pub fn write<T: Serialize>(&self, state: &T) -> Result<()> {
        let raw = serde_json::to_string(&SnapshotRef {
            state,
            version: self.options.version,
        })?;
        trace!("Persisting {} bytes for '{}'", raw.len(), self.name());
        self.options.storage.set_item(self.name(), &raw)
    }

    /// Remove the persisted snapshot.
    pub fn clear(&self) -> Result<()> {
        debug!("Clearing persisted snapshot for '{}'", self.name());
        self.options.storage.remove_item(self.name())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::persist::MemoryStorage;
    use serde_json::json;

    #[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
    struct Prefs {
        theme: String,
        font_size: u32,
    }

    fn prefs() -> Prefs {
        Prefs {
            theme: "light".to_string(),
            font_size: 12,
        }
    }

    fn persistence(storage: &MemoryStorage) -> Persistence {
        Persistence::new(PersistOptions::new("prefs", Arc::new(storage.clone()))).unwrap()
    }

    #[test]
    fn empty_name_is_a_config_error() {
        let options = PersistOptions::new("  ", Arc::new(MemoryStorage::new()));
        assert!(matches!(
            Persistence::new(options),
            Err(StoreError::Config(_))
        ));
    }

    #[test]
    fn writes_snapshot_after_each_change() {
        let storage = MemoryStorage::new();
        let container = Container::new(prefs());
        persistence(&storage).attach(&container).unwrap();

        assert_eq!(storage.get_item("prefs").unwrap(), None);

        container.update(|p| p.font_size = 14);

        let raw = storage.get_item("prefs").unwrap().unwrap();
        let value: Value = serde_json::from_str(&raw).unwrap();
        assert_eq!(
            value,
            json!({"state": {"theme": "light", "font_size": 14}, "version": 0})
        );
    }

    #[test]
    fn hydrate_merges_persisted_fields_over_current() {
        let storage = MemoryStorage::new();
        storage
            .set_item("prefs", r#"{"state":{"theme":"dark"},"version":0}"#)
            .unwrap();

        let container = Container::new(prefs());
        assert!(persistence(&storage).hydrate(&container).unwrap());

        assert_eq!(
            container.get(),
            Prefs {
                theme: "dark".to_string(),
                font_size: 12,
            }
        );
    }

    #[test]
    fn hydrate_skips_garbage_and_other_versions() {
        let storage = MemoryStorage::new();
        let container = Container::new(prefs());

        storage.set_item("prefs", "not json").unwrap();
        assert!(!persistence(&storage).hydrate(&container).unwrap());

        storage
            .set_item("prefs", r#"{"state":{"theme":"dark"},"version":3}"#)
            .unwrap();
        assert!(!persistence(&storage).hydrate(&container).unwrap());

        storage
            .set_item("prefs", r#"{"state":{"font_size":"big"},"version":0}"#)
            .unwrap();
        assert!(!persistence(&storage).hydrate(&container).unwrap());

        assert_eq!(container.get(), prefs());
    }

    #[test]
    fn versioned_snapshots_round_trip() {
        let storage = MemoryStorage::new();
        let options = PersistOptions::new("prefs", Arc::new(storage.clone())).version(2);
        let persistence = Persistence::new(options).unwrap();

        persistence
            .write(&Prefs {
                theme: "dark".to_string(),
                font_size: 20,
            })
            .unwrap();

        let container = Container::new(prefs());
        assert!(persistence.hydrate(&container).unwrap());
        assert_eq!(container.get().font_size, 20);
    }

    #[test]
    fn clear_removes_snapshot() {
        let storage = MemoryStorage::new();
        let persistence = persistence(&storage);
        persistence.write(&prefs()).unwrap();

        persistence.clear().unwrap();

        assert!(storage.is_empty());
    }
}
