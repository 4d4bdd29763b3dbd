//! Storage abstraction and implementations for Shelf.
//!
//! This crate provides a trait-based progress store with an in-memory
//! backend and a single-file JSON backend.

#![warn(missing_docs)]

pub mod trait_;
pub mod arena;
pub mod memory_storage;
pub mod json_storage;

pub use trait_::{ProgressStore, StorageError, Result};
pub use arena::{Arena, LibrarySnapshot, SNAPSHOT_VERSION};
pub use memory_storage::MemoryStore;
pub use json_storage::JsonStore;
