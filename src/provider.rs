//! Lifecycle wrapper that decides whether the dynamic store's snapshot
//! survives.

use std::sync::Arc;

use log::debug;

use crate::dynamic::{DynamicStore, DYNAMIC_STORE_KEY};
use crate::error::Result;
use crate::persist::StorageBackend;

/// Clears the persisted dynamic-store snapshot when persistence is off.
///
/// Mounting with `persist == false` removes [`DYNAMIC_STORE_KEY`] from the
/// backend. While mounted, every change of the flag re-runs that check;
/// setting the flag to the value it already has does nothing. Only the
/// persisted copy is touched, never a live store's entries.
pub struct StoreProvider {
    storage: Arc<dyn StorageBackend>,
    persist: bool,
    mounted: bool,
}

impl StoreProvider {
    /// A provider over `storage`, with persistence enabled.
    pub fn new(storage: Arc<dyn StorageBackend>) -> Self {
        Self {
            storage,
            persist: true,
            mounted: false,
        }
    }

    /// A provider over the backend `store` persists to.
    pub fn for_store(store: &DynamicStore) -> Self {
        Self::new(store.storage())
    }

    pub fn persist(mut self, persist: bool) -> Self {
        self.persist = persist;
        self
    }

    /// Run the mount effect and hand `children` back unchanged.
    pub fn mount<C>(&mut self, children: C) -> Result<C> {
        self.apply()?;
        self.mounted = true;
        Ok(children)
    }

    /// Change the flag, re-running the effect if mounted and the value
    /// actually changed.
    pub fn set_persist(&mut self, persist: bool) -> Result<()> {
        if self.persist == persist {
            return Ok(());
        }
        self.persist = persist;
        if self.mounted {
            self.apply()?;
        }
        Ok(())
    }

    pub fn persist_enabled(&self) -> bool {
        self.persist
    }

    pub fn is_mounted(&self) -> bool {
        self.mounted
    }

    fn apply(&self) -> Result<()> {
        if !self.persist {
            debug!("Persistence disabled, clearing '{}'", DYNAMIC_STORE_KEY);
            self.storage.remove_item(DYNAMIC_STORE_KEY)?;
        }
        Ok(())
    }
}
