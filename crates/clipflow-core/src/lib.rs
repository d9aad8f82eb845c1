//! ClipFlow Core Engine
//!
//! Core editing engine module.
//! Handles the timeline model, the shared-state sync bridge, media assets,
//! and the export render pipeline.

pub mod assets;
pub mod fs;
pub mod process;
pub mod project;
pub mod render;
pub mod sync;
pub mod timeline;

// Re-export common types
mod types;
pub use types::*;

mod error;
pub use error::*;
