//! Storage abstraction and implementations for Stepwise.
//!
//! This crate provides a trait-based repository interface with a JSON
//! document backend and an optional SQLite backend (`sqlite` feature).

#![warn(missing_docs)]

pub mod trait_;
pub mod json_storage;
#[cfg(feature = "sqlite")]
pub mod sqlite_storage;

pub use trait_::{Storage, StorageError, Result};
pub use json_storage::JsonStorage;
#[cfg(feature = "sqlite")]
pub use sqlite_storage::SqliteStorage;
