//! # Dynamixx
//!
//! Typed and dynamic state stores with optional persistence.
//!
//! ## Typed stores
//!
//! [`create_store`] builds a [`TypedStore<T>`] from an initial state:
//! - `set_state` - shallow merge of a partial update
//! - `get_state` - snapshot of the current state
//! - `reset` - back to the initial state
//!
//! ## Dynamic store
//!
//! [`DynamicStore`] maps string keys to [`DynamicValue`]s and is always
//! persisted under `"dynamixx-store"`. `update_state` concatenates
//! sequences, shallow-merges records and overwrites everything else.
//! [`use_dynamic_store`] returns the process-wide instance.
//!
//! ## Persistence
//!
//! Stores persist through a [`StorageBackend`]: [`MemoryStorage`],
//! [`FileStorage`], or your own. [`StoreProvider`] clears the dynamic
//! store's snapshot when persistence is turned off.

pub mod config;
pub mod dynamic;
pub mod engine;
pub mod error;
pub mod merge;
pub mod persist;
pub mod provider;
pub mod store;

// Re-export main types for convenience
pub use config::StorageConfig;
pub use dynamic::{use_dynamic_store, DynamicStore, DynamicValue, Entries, DYNAMIC_STORE_KEY};
pub use engine::{Container, SubscriptionId};
pub use error::{Result, StoreError};
pub use persist::{FileStorage, MemoryStorage, PersistOptions, Persistence, StorageBackend};
pub use provider::StoreProvider;
pub use store::{create_store, StoreOptions, TypedStore};
