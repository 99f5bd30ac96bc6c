//! Token storage for the tareas client.
//!
//! The client persists exactly one value, the bearer token, under a fixed
//! key. This crate provides the storage trait and a JSON file backend that
//! survives restarts, plus an in-memory backend.

#![warn(missing_docs)]

pub mod trait_;
pub mod json_storage;
pub mod memory;

pub use trait_::{TokenStore, StorageError, Result, TOKEN_KEY};
pub use json_storage::JsonTokenStore;
pub use memory::MemoryTokenStore;
