//! Inventory domain module.
//!
//! The `Item` entity and its write-side inputs, implemented as plain
//! deterministic logic (no IO, no storage).

pub mod item;

pub use item::{Item, ItemPatch, NewItem};
