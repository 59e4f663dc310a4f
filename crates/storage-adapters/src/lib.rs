//! comfyboard/crates/storage-adapters/src/lib.rs
//!
//! Concrete adapters for the `domains` ports: SQLite persistence and local
//! filesystem media.

#[cfg(feature = "media-local")]
pub mod media;
#[cfg(feature = "db-sqlite")]
pub mod sqlite;

#[cfg(feature = "media-local")]
pub use media::{LocalMediaStorage, MediaInfo};
#[cfg(feature = "db-sqlite")]
pub use sqlite::{connect, connect_in_memory, CapacityPruner, SqliteStore};
