//! The dynamic keyed store.
//!
//! An open-ended mapping from string keys to [`DynamicValue`]s, persisted
//! under [`DYNAMIC_STORE_KEY`]. Updates follow a per-kind merge policy:
//! sequences are concatenated, records are shallow-merged, anything else
//! is overwritten.

mod store;
mod value;

pub use store::{use_dynamic_store, DynamicStore, Entries, DYNAMIC_STORE_KEY};
pub use value::DynamicValue;
