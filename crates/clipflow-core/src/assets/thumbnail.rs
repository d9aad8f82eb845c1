//! Thumbnail Generation
//!
//! Delegates frame extraction to the external transcoder. The primary
//! invocation seeks one second in; when the seek fails (file shorter than
//! the seek point, or a still image), a first-frame fallback runs before
//! failure is reported.

use std::path::{Path, PathBuf};

use tracing::{debug, warn};

use crate::process::configure_tokio_command;
use crate::{AssetId, CoreError, CoreResult};

/// Seek offset for the primary thumbnail attempt
const PRIMARY_SEEK: &str = "00:00:01";

/// Generates and manages per-asset thumbnails
pub struct ThumbnailService {
    transcoder_path: PathBuf,
    thumbnails_dir: PathBuf,
}

impl ThumbnailService {
    /// Creates a service using the `ffmpeg` on PATH
    pub fn new(thumbnails_dir: impl Into<PathBuf>) -> Self {
        Self {
            transcoder_path: PathBuf::from("ffmpeg"),
            thumbnails_dir: thumbnails_dir.into(),
        }
    }

    /// Uses an explicit transcoder binary
    pub fn with_transcoder_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.transcoder_path = path.into();
        self
    }

    /// Thumbnail location for an asset. The id is path-validated first.
    pub fn thumbnail_path(&self, asset_id: &str) -> CoreResult<PathBuf> {
        crate::fs::validate_path_id_component(asset_id, "assetId")
            .map_err(CoreError::ValidationError)?;
        Ok(self.thumbnails_dir.join(format!("{asset_id}.jpg")))
    }

    /// Generates a thumbnail for the asset, returning the output path.
    ///
    /// Tries the seeked invocation first, then the first-frame fallback;
    /// only after both fail is an `ExternalTool` error reported.
    pub async fn generate(&self, input: &Path, asset_id: &str) -> CoreResult<PathBuf> {
        if !input.exists() {
            return Err(CoreError::FileNotFound(input.display().to_string()));
        }

        let output = self.thumbnail_path(asset_id)?;
        std::fs::create_dir_all(&self.thumbnails_dir)?;

        match self.extract_frame(input, &output, Some(PRIMARY_SEEK)).await {
            Ok(()) => Ok(output),
            Err(primary_err) => {
                debug!(error = %primary_err, asset_id = %asset_id,
                    "Seeked thumbnail attempt failed, retrying at first frame");
                self.extract_frame(input, &output, None)
                    .await
                    .map_err(|fallback_err| {
                        warn!(asset_id = %asset_id, "Thumbnail generation failed on both attempts");
                        CoreError::ExternalTool(format!(
                            "thumbnail generation failed (seeked: {primary_err}; first-frame: {fallback_err})"
                        ))
                    })?;
                Ok(output)
            }
        }
    }

    async fn extract_frame(
        &self,
        input: &Path,
        output: &Path,
        seek: Option<&str>,
    ) -> Result<(), String> {
        let mut cmd = tokio::process::Command::new(&self.transcoder_path);
        cmd.arg("-y");
        if let Some(seek) = seek {
            cmd.args(["-ss", seek]);
        }
        cmd.arg("-i")
            .arg(input)
            .args(["-vframes", "1", "-q:v", "2"])
            .arg(output);
        configure_tokio_command(&mut cmd);

        let result = cmd
            .output()
            .await
            .map_err(|e| format!("failed to spawn transcoder: {e}"))?;

        if !result.status.success() {
            let stderr = String::from_utf8_lossy(&result.stderr);
            return Err(format!(
                "transcoder exited with {}: {}",
                result.status,
                stderr.trim()
            ));
        }
        if !output.exists() {
            return Err("transcoder produced no output file".to_string());
        }
        Ok(())
    }

    /// Deletes an asset's thumbnail if present. Returns whether a file was
    /// removed.
    pub fn delete_thumbnail(&self, asset_id: &AssetId) -> CoreResult<bool> {
        let path = self.thumbnail_path(asset_id)?;
        if !path.exists() {
            return Ok(false);
        }
        std::fs::remove_file(&path)?;
        Ok(true)
    }
}

// =============================================================================
// Tests
// =============================================================================
