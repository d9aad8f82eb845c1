//! Clipflow Core Type Definitions
//!
//! Defines fundamental types used throughout the engine.

use serde::{Deserialize, Serialize};

// =============================================================================
// ID Types
// =============================================================================

/// Project unique identifier
pub type ProjectId = String;

/// Asset unique identifier
pub type AssetId = String;

/// Track unique identifier
pub type TrackId = String;

/// Element unique identifier (UUID)
pub type ElementId = String;

/// Marker unique identifier
pub type MarkerId = String;

/// Edit action unique identifier (ULID from our writers; any globally
/// unique string from external writers)
pub type ActionId = String;

/// Export job identifier (caller-supplied)
pub type ExportId = String;

/// Generates a new element id
pub fn new_element_id() -> ElementId {
    uuid::Uuid::new_v4().to_string()
}

/// Generates a new edit action id
pub fn new_action_id() -> ActionId {
    ulid::Ulid::new().to_string()
}

// =============================================================================
// Time Types
// =============================================================================

/// Time in seconds (floating point)
pub type TimeSec = f64;

/// Time in frames (integer)
pub type Frame = i64;

// =============================================================================
// Spatial Types
// =============================================================================

/// Canvas size in pixels
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct CanvasSize {
    pub width: u32,
    pub height: u32,
}

impl CanvasSize {
    pub fn new(width: u32, height: u32) -> Self {
        Self { width, height }
    }

    /// Returns the aspect ratio as a float
    pub fn aspect_ratio(&self) -> f64 {
        self.width as f64 / self.height as f64
    }
}

impl Default for CanvasSize {
    fn default() -> Self {
        Self::new(1920, 1080)
    }
}
