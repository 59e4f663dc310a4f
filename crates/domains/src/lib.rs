//! comfyboard/crates/domains/src/lib.rs
//!
//! The central domain model, error taxonomy and port definitions for
//! comfyboard. No I/O lives here.

pub mod clock;
pub mod errors;
pub mod media;
pub mod models;
pub mod ports;

// Re-exporting for easier access in other crates
pub use clock::*;
pub use errors::*;
pub use media::*;
pub use models::*;
pub use ports::*;
