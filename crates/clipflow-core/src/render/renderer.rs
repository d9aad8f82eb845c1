//! Composition Renderer
//!
//! Abstraction over the external composition renderer that turns a bundled
//! project plus input props into encoded video. The process-backed
//! implementation reports fractional progress by parsing `progress=` lines
//! from the renderer's stdout.

use std::path::{Path, PathBuf};

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::sync::mpsc;
use tracing::{debug, warn};

use crate::process::configure_tokio_command;
use crate::{CoreError, CoreResult, Frame};

use super::{ExportFormat, ExportQuality};

// =============================================================================
// Renderer Trait
// =============================================================================

/// Composition metadata reported by the renderer after selection
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CompositionInfo {
    pub id: String,
    pub width: u32,
    pub height: u32,
    pub fps: f64,
    pub duration_in_frames: Frame,
}

/// Everything the renderer needs for one encode
#[derive(Debug, Clone)]
pub struct RenderSpec {
    pub bundle_dir: PathBuf,
    pub composition_id: String,
    pub props_path: PathBuf,
    pub output_path: PathBuf,
    pub format: ExportFormat,
    pub quality: ExportQuality,
    pub concurrency: usize,
}

/// Bundle, select a composition, render.
///
/// Split into three calls so the pipeline can report a milestone between
/// each stage. Render progress is a fraction in `[0, 1]` pushed through the
/// provided channel.
#[async_trait]
pub trait Renderer: Send + Sync {
    /// Prepares the render bundle, returning its location
    async fn bundle(&self, work_dir: &Path) -> CoreResult<PathBuf>;

    /// Resolves the composition to render, with the input props applied
    async fn select_composition(
        &self,
        bundle_dir: &Path,
        props_path: &Path,
    ) -> CoreResult<CompositionInfo>;

    /// Renders the composition into `spec.output_path`
    async fn render(&self, spec: &RenderSpec, progress: mpsc::Sender<f64>) -> CoreResult<()>;
}

// =============================================================================
// Process-Backed Renderer
// =============================================================================

/// Drives the external renderer binary as a child process
pub struct ProcessRenderer {
    renderer_path: PathBuf,
}

impl ProcessRenderer {
    pub fn new(renderer_path: impl Into<PathBuf>) -> Self {
        Self {
            renderer_path: renderer_path.into(),
        }
    }
}

#[async_trait]
impl Renderer for ProcessRenderer {
    async fn bundle(&self, work_dir: &Path) -> CoreResult<PathBuf> {
        let bundle_dir = work_dir.join("bundle");

        let mut cmd = tokio::process::Command::new(&self.renderer_path);
        cmd.arg("bundle").arg("--out").arg(&bundle_dir);
        configure_tokio_command(&mut cmd);

        let output = cmd
            .output()
            .await
            .map_err(|e| CoreError::ExternalTool(format!("failed to spawn renderer: {e}")))?;
        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            return Err(CoreError::ExternalTool(format!(
                "bundling failed ({}): {}",
                output.status,
                stderr.trim()
            )));
        }

        Ok(bundle_dir)
    }

    async fn select_composition(
        &self,
        bundle_dir: &Path,
        props_path: &Path,
    ) -> CoreResult<CompositionInfo> {
        let mut cmd = tokio::process::Command::new(&self.renderer_path);
        cmd.arg("compositions")
            .arg("--bundle")
            .arg(bundle_dir)
            .arg("--props")
            .arg(props_path);
        configure_tokio_command(&mut cmd);

        let output = cmd
            .output()
            .await
            .map_err(|e| CoreError::ExternalTool(format!("failed to spawn renderer: {e}")))?;
        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            return Err(CoreError::ExternalTool(format!(
                "composition selection failed ({}): {}",
                output.status,
                stderr.trim()
            )));
        }

        let info: CompositionInfo = serde_json::from_slice(&output.stdout).map_err(|e| {
            CoreError::ExternalTool(format!("renderer reported an unreadable composition: {e}"))
        })?;
        Ok(info)
    }

    async fn render(&self, spec: &RenderSpec, progress: mpsc::Sender<f64>) -> CoreResult<()> {
        let mut cmd = tokio::process::Command::new(&self.renderer_path);
        cmd.arg("render")
            .arg("--bundle")
            .arg(&spec.bundle_dir)
            .args(["--composition", &spec.composition_id])
            .arg("--props")
            .arg(&spec.props_path)
            .arg("--output")
            .arg(&spec.output_path)
            .args(["--codec", spec.format.codec()])
            .args(["--crf", &spec.quality.crf().to_string()])
            .args(["--concurrency", &spec.concurrency.to_string()])
            .arg("--progress");
        cmd.stdout(std::process::Stdio::piped());
        cmd.stderr(std::process::Stdio::piped());
        configure_tokio_command(&mut cmd);

        let mut child = cmd
            .spawn()
            .map_err(|e| CoreError::ExternalTool(format!("failed to spawn renderer: {e}")))?;

        if let Some(stdout) = child.stdout.take() {
            let tx = progress.clone();
            tokio::spawn(async move {
                let reader = BufReader::new(stdout);
                let mut lines = reader.lines();
                while let Ok(Some(line)) = lines.next_line().await {
                    if let Some(fraction) = parse_progress_line(&line) {
                        if tx.send(fraction).await.is_err() {
                            // Receiver gone, stop reading
                            break;
                        }
                    } else {
                        debug!(line = %line, "Renderer output");
                    }
                }
            });
        }

        let status = child
            .wait()
            .await
            .map_err(|e| CoreError::ExternalTool(format!("renderer wait failed: {e}")))?;
        if !status.success() {
            warn!(status = %status, "Renderer exited with failure");
            return Err(CoreError::ExternalTool(format!(
                "render failed with {status}"
            )));
        }
        if !spec.output_path.exists() {
            return Err(CoreError::ExternalTool(
                "renderer produced no output file".to_string(),
            ));
        }
        Ok(())
    }
}

/// Parses a `progress=<fraction>` stdout line. Values are clamped to `[0, 1]`.
pub fn parse_progress_line(line: &str) -> Option<f64> {
    let value = line.trim().strip_prefix("progress=")?;
    let fraction: f64 = value.trim().parse().ok()?;
    Some(fraction.clamp(0.0, 1.0))
}

// =============================================================================
// Tests
// =============================================================================
