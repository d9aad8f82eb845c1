//! Clipflow Error Definitions
//!
//! Defines error types used throughout the engine.

use thiserror::Error;

use super::{AssetId, ElementId, TimeSec, TrackId};

/// Core engine error types
#[derive(Error, Debug)]
pub enum CoreError {
    // =========================================================================
    // Project Errors
    // =========================================================================
    #[error("Project not found: {0}")]
    ProjectNotFound(String),

    #[error("Snapshot corrupted: {0}")]
    SnapshotCorrupted(String),

    #[error("Failed to save snapshot: {0}")]
    SnapshotSaveFailed(String),

    // =========================================================================
    // Asset Errors
    // =========================================================================
    #[error("Asset not found: {0}")]
    AssetNotFound(AssetId),

    #[error("File not found: {0}")]
    FileNotFound(String),

    // =========================================================================
    // Timeline Errors
    // =========================================================================
    #[error("Track not found: {0}")]
    TrackNotFound(TrackId),

    #[error("Element not found: {0}")]
    ElementNotFound(ElementId),

    #[error("Invalid split point: {0} seconds")]
    InvalidSplitPoint(TimeSec),

    #[error("Validation error: {0}")]
    ValidationError(String),

    // =========================================================================
    // Sync Errors
    // =========================================================================
    #[error("Unknown action: {0}")]
    UnknownAction(String),

    /// A shared file was read mid-write (partial/invalid content).
    /// Watchers swallow this and wait for the next notification.
    #[error("Transient read: {0}")]
    TransientRead(String),

    // =========================================================================
    // Render Errors
    // =========================================================================
    #[error("Render failed: {0}")]
    RenderFailed(String),

    #[error("External tool failed: {0}")]
    ExternalTool(String),

    #[error("Timeout: {0}")]
    Timeout(String),

    // =========================================================================
    // General Errors
    // =========================================================================
    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    #[error("JSON parsing error: {0}")]
    JsonError(#[from] serde_json::Error),

    #[error("Internal error: {0}")]
    Internal(String),

    #[error("Not found: {0}")]
    NotFound(String),
}

/// Core engine result type
pub type CoreResult<T> = Result<T, CoreError>;

impl CoreError {
    /// HTTP-equivalent status code for the transport-agnostic response
    /// surfaces (media serving, export submission).
    pub fn status_code(&self) -> u16 {
        match self {
            CoreError::ValidationError(_)
            | CoreError::UnknownAction(_)
            | CoreError::InvalidSplitPoint(_) => 400,
            CoreError::ProjectNotFound(_)
            | CoreError::AssetNotFound(_)
            | CoreError::FileNotFound(_)
            | CoreError::TrackNotFound(_)
            | CoreError::ElementNotFound(_)
            | CoreError::NotFound(_) => 404,
            _ => 500,
        }
    }

    /// Structured error body for callers, never a raw stack trace.
    pub fn to_error_body(&self) -> serde_json::Value {
        serde_json::json!({ "error": self.to_string() })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_codes() {
        assert_eq!(
            CoreError::ValidationError("bad trim".to_string()).status_code(),
            400
        );
        assert_eq!(
            CoreError::AssetNotFound("asset_001".to_string()).status_code(),
            404
        );
        assert_eq!(
            CoreError::RenderFailed("boom".to_string()).status_code(),
            500
        );
    }

    #[test]
    fn test_error_body_is_structured() {
        let body = CoreError::UnknownAction("frobnicate".to_string()).to_error_body();
        assert_eq!(body["error"], "Unknown action: frobnicate");
    }
}
