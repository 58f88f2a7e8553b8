//! Reactive state container.
//!
//! Every store in this crate keeps its data in a [`Container`], which
//! serialises mutation through a single write lock and notifies listeners
//! after each change. Persistence plugs in as one of those listeners.

mod container;

pub use container::{Container, SubscriptionId};
