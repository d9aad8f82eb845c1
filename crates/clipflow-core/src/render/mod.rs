//! Export Rendering Module
//!
//! Turns a project snapshot plus its staged media into an encoded video
//! artifact. The pipeline drives an external composition renderer, records
//! milestone progress in an in-memory registry, and streams progress frames
//! to polling clients.

pub mod pipeline;
pub mod progress;
pub mod renderer;

pub use pipeline::{export_concurrency, ExportArtifact, ExportPipeline, ExportRequest, FilePart};
pub use progress::{ProgressChannel, ProgressRegistry};
pub use renderer::{CompositionInfo, ProcessRenderer, RenderSpec, Renderer};

use serde::{Deserialize, Serialize};

// =============================================================================
// Export Status
// =============================================================================

/// Lifecycle state of one export job
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ExportStatus {
    Preparing,
    Bundling,
    Selecting,
    Rendering,
    Finalizing,
    Complete,
    Error,
}

impl ExportStatus {
    /// Terminal states close the progress channel
    pub fn is_terminal(&self) -> bool {
        matches!(self, ExportStatus::Complete | ExportStatus::Error)
    }
}

/// In-memory progress record for one export.
///
/// Jobs are ephemeral: they live only in the registry and are discarded
/// once a terminal status has been observed.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExportJob {
    /// Percentage, 0 to 100
    pub progress: f64,
    pub status: ExportStatus,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl ExportJob {
    pub fn new(progress: f64, status: ExportStatus) -> Self {
        Self {
            progress,
            status,
            error: None,
        }
    }

    pub fn failed(message: impl Into<String>) -> Self {
        Self {
            progress: 0.0,
            status: ExportStatus::Error,
            error: Some(message.into()),
        }
    }
}

// =============================================================================
// Format / Quality
// =============================================================================

/// Output container format
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ExportFormat {
    Mp4,
    Webm,
}

impl ExportFormat {
    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "mp4" => Some(ExportFormat::Mp4),
            "webm" => Some(ExportFormat::Webm),
            _ => None,
        }
    }

    pub fn extension(&self) -> &'static str {
        match self {
            ExportFormat::Mp4 => "mp4",
            ExportFormat::Webm => "webm",
        }
    }

    pub fn content_type(&self) -> &'static str {
        match self {
            ExportFormat::Mp4 => "video/mp4",
            ExportFormat::Webm => "video/webm",
        }
    }

    /// Codec name passed to the composition renderer
    pub fn codec(&self) -> &'static str {
        match self {
            ExportFormat::Mp4 => "h264",
            ExportFormat::Webm => "vp8",
        }
    }
}

/// Quality preset, mapped onto a constant rate factor
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ExportQuality {
    Low,
    Medium,
    High,
    VeryHigh,
}

impl ExportQuality {
    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "low" => Some(ExportQuality::Low),
            "medium" => Some(ExportQuality::Medium),
            "high" => Some(ExportQuality::High),
            "very_high" => Some(ExportQuality::VeryHigh),
            _ => None,
        }
    }

    /// Lower CRF means higher quality
    pub fn crf(&self) -> u32 {
        match self {
            ExportQuality::Low => 28,
            ExportQuality::Medium => 23,
            ExportQuality::High => 18,
            ExportQuality::VeryHigh => 15,
        }
    }
}

// =============================================================================
// Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_format_mapping() {
        assert_eq!(ExportFormat::parse("mp4"), Some(ExportFormat::Mp4));
        assert_eq!(ExportFormat::parse("webm"), Some(ExportFormat::Webm));
        assert_eq!(ExportFormat::parse("avi"), None);

        assert_eq!(ExportFormat::Mp4.content_type(), "video/mp4");
        assert_eq!(ExportFormat::Webm.extension(), "webm");
        assert_eq!(ExportFormat::Mp4.codec(), "h264");
    }

    #[test]
    fn test_quality_crf() {
        assert_eq!(ExportQuality::Low.crf(), 28);
        assert_eq!(ExportQuality::Medium.crf(), 23);
        assert_eq!(ExportQuality::High.crf(), 18);
        assert_eq!(ExportQuality::VeryHigh.crf(), 15);
        assert_eq!(
            ExportQuality::parse("very_high"),
            Some(ExportQuality::VeryHigh)
        );
        assert_eq!(ExportQuality::parse("ultra"), None);
    }

    #[test]
    fn test_status_serde_and_terminal() {
        assert_eq!(
            serde_json::to_string(&ExportStatus::Rendering).unwrap(),
            "\"rendering\""
        );
        assert!(ExportStatus::Complete.is_terminal());
        assert!(ExportStatus::Error.is_terminal());
        assert!(!ExportStatus::Finalizing.is_terminal());
    }

    #[test]
    fn test_failed_job_shape() {
        let job = ExportJob::failed("renderer crashed");
        assert_eq!(job.progress, 0.0);
        assert_eq!(job.status, ExportStatus::Error);

        let body = serde_json::to_value(&job).unwrap();
        assert_eq!(body["status"], "error");
        assert_eq!(body["error"], "renderer crashed");
    }
}
