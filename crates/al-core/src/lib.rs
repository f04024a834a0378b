//! anonlog/crates/al-core/src/lib.rs
//!
//! Domain models, settings, and port definitions for the anonlog feed engine.

pub mod error;
pub mod models;
pub mod policy;
pub mod settings;
pub mod traits;

// Re-exporting for easier access in other crates
pub use error::*;
pub use models::*;
pub use policy::*;
pub use settings::*;
pub use traits::*;
