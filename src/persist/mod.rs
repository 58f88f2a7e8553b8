//! Durable key-value storage and the persistence middleware.
//!
//! A [`StorageBackend`] stores string snapshots under string identifiers.
//! [`Persistence`] hooks a [`Container`](crate::engine::Container) up to a
//! backend: it rehydrates the container once, then writes the full state
//! after every change.

mod backend;
mod middleware;

pub use backend::{FileStorage, MemoryStorage, StorageBackend};
pub use middleware::{PersistOptions, Persistence};
