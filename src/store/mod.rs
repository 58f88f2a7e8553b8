//! Typed stores built from an initial state.
//!
//! [`create_store`] wraps a [`Container`](crate::engine::Container) with
//! shallow-merge updates, snapshots and a reset back to the initial state,
//! optionally persisted through a storage backend.

mod store;

pub use store::{create_store, StoreOptions, TypedStore};
