//! Export Pipeline
//!
//! Accepts the multipart export payload, stages the referenced media into a
//! per-export temp directory, drives the composition renderer through its
//! bundle / select / render stages, and returns the encoded artifact as
//! bytes. Staged files and the artifact are deleted on every exit path.

use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::Arc;

use serde_json::json;
use tokio::sync::mpsc;
use tracing::{info, warn};

use crate::timeline::ProjectSnapshot;
use crate::{AssetId, CoreError, CoreResult, ExportId};

use super::progress::ProgressRegistry;
use super::renderer::{RenderSpec, Renderer};
use super::{ExportFormat, ExportQuality, ExportStatus};

/// Render concurrency: three quarters of the cores, never fewer than two
pub fn export_concurrency() -> usize {
    (num_cpus::get() * 3 / 4).max(2)
}

// =============================================================================
// Request
// =============================================================================

/// One uploaded file part of the multipart payload
#[derive(Debug, Clone)]
pub struct FilePart {
    /// Part name, e.g. `media_<assetId>`
    pub name: String,
    /// Original file name, used for the staged extension
    pub file_name: String,
    pub bytes: Vec<u8>,
}

/// A parsed export submission
#[derive(Debug)]
pub struct ExportRequest {
    pub export_id: ExportId,
    pub snapshot: ProjectSnapshot,
    pub format: ExportFormat,
    pub quality: ExportQuality,
    /// Uploaded media keyed by asset id
    pub media: HashMap<AssetId, FilePart>,
}

impl ExportRequest {
    /// Builds a request from multipart fields and file parts.
    ///
    /// `projectData` and `exportId` are required; `format` and `quality`
    /// default to mp4/high when absent. Media parts are matched by the
    /// `media_<assetId>` naming convention and the embedded asset id is
    /// path-validated before it can name a staged file.
    pub fn from_parts(
        fields: &HashMap<String, String>,
        files: Vec<FilePart>,
    ) -> CoreResult<Self> {
        let project_data = fields
            .get("projectData")
            .ok_or_else(|| CoreError::ValidationError("projectData part is required".to_string()))?;
        let snapshot: ProjectSnapshot = serde_json::from_str(project_data)
            .map_err(|e| CoreError::ValidationError(format!("invalid projectData: {e}")))?;

        let export_id = fields
            .get("exportId")
            .ok_or_else(|| CoreError::ValidationError("exportId part is required".to_string()))?
            .clone();
        crate::fs::validate_path_id_component(&export_id, "exportId")
            .map_err(CoreError::ValidationError)?;

        let format = match fields.get("format") {
            Some(value) => ExportFormat::parse(value).ok_or_else(|| {
                CoreError::ValidationError(format!("unknown export format: {value}"))
            })?,
            None => ExportFormat::Mp4,
        };
        let quality = match fields.get("quality") {
            Some(value) => ExportQuality::parse(value).ok_or_else(|| {
                CoreError::ValidationError(format!("unknown export quality: {value}"))
            })?,
            None => ExportQuality::High,
        };

        let mut media = HashMap::new();
        for part in files {
            let Some(asset_id) = part.name.strip_prefix("media_") else {
                continue;
            };
            crate::fs::validate_path_id_component(asset_id, "assetId")
                .map_err(CoreError::ValidationError)?;
            media.insert(asset_id.to_string(), part);
        }

        Ok(Self {
            export_id,
            snapshot,
            format,
            quality,
            media,
        })
    }
}

/// The finished export, ready to hand back to the client
#[derive(Debug)]
pub struct ExportArtifact {
    pub bytes: Vec<u8>,
    pub content_type: &'static str,
    pub file_name: String,
}

// =============================================================================
// Pipeline
// =============================================================================

/// Runs exports end to end against a renderer and a progress registry
pub struct ExportPipeline {
    renderer: Arc<dyn Renderer>,
    registry: ProgressRegistry,
}

impl ExportPipeline {
    pub fn new(renderer: Arc<dyn Renderer>, registry: ProgressRegistry) -> Self {
        Self { renderer, registry }
    }

    pub fn registry(&self) -> &ProgressRegistry {
        &self.registry
    }

    /// Runs one export.
    ///
    /// Milestones land in the registry as the stages complete: 5 preparing,
    /// 10 bundling, 15 selecting, 20 rendering (then mapped into 20-95),
    /// 98 finalizing, 100 complete. Any failure records `(0, error, message)`.
    /// The staging directory, including the rendered artifact, is removed
    /// before this returns, success or not.
    pub async fn run(&self, request: ExportRequest) -> CoreResult<ExportArtifact> {
        let export_id = request.export_id.clone();
        let work_dir = std::env::temp_dir().join(format!("clipflow-export-{export_id}"));

        let result = self.run_inner(request, &work_dir).await;

        if work_dir.exists() {
            if let Err(e) = std::fs::remove_dir_all(&work_dir) {
                warn!(error = %e, path = %work_dir.display(), "Failed to clean export staging dir");
            }
        }

        match result {
            Ok(artifact) => {
                self.registry.set(&export_id, 100.0, ExportStatus::Complete);
                Ok(artifact)
            }
            Err(err) => {
                self.registry.set_error(&export_id, err.to_string());
                Err(err)
            }
        }
    }

    async fn run_inner(
        &self,
        request: ExportRequest,
        work_dir: &std::path::Path,
    ) -> CoreResult<ExportArtifact> {
        let export_id = &request.export_id;
        self.registry.set(export_id, 5.0, ExportStatus::Preparing);

        if request.snapshot.tracks.iter().all(|t| t.elements.is_empty()) {
            return Err(CoreError::ValidationError(
                "timeline has no elements to export".to_string(),
            ));
        }

        let media_dir = work_dir.join("media");
        std::fs::create_dir_all(&media_dir)?;

        // Stage uploaded media by asset id, then point the snapshot at the
        // staged copies so the renderer reads local files
        let mut snapshot = request.snapshot;
        let mut staged: HashMap<AssetId, PathBuf> = HashMap::new();
        for (asset_id, part) in &request.media {
            let ext = std::path::Path::new(&part.file_name)
                .extension()
                .and_then(|e| e.to_str())
                .map(|e| format!(".{e}"))
                .unwrap_or_default();
            let path = media_dir.join(format!("{asset_id}{ext}"));
            std::fs::write(&path, &part.bytes)?;
            staged.insert(asset_id.clone(), path);
        }
        for asset in &mut snapshot.assets {
            if let Some(path) = staged.get(&asset.id) {
                let location = path.display().to_string();
                asset.file_path = Some(location.clone());
                asset.url = location;
            }
        }

        let fps = snapshot.project.fps;
        let duration_in_frames = snapshot.duration_in_frames(fps);
        let props_path = work_dir.join("props.json");
        let props = json!({
            "projectData": snapshot,
            "durationInFrames": duration_in_frames,
            "fps": fps,
        });
        crate::fs::atomic_write_json_pretty(&props_path, &props)?;

        self.registry.set(export_id, 10.0, ExportStatus::Bundling);
        let bundle_dir = self.renderer.bundle(work_dir).await?;

        self.registry.set(export_id, 15.0, ExportStatus::Selecting);
        let composition = self
            .renderer
            .select_composition(&bundle_dir, &props_path)
            .await?;

        self.registry.set(export_id, 20.0, ExportStatus::Rendering);
        let output_path = work_dir.join(format!("output.{}", request.format.extension()));
        let spec = RenderSpec {
            bundle_dir,
            composition_id: composition.id,
            props_path,
            output_path: output_path.clone(),
            format: request.format,
            quality: request.quality,
            concurrency: export_concurrency(),
        };

        let (tx, mut rx) = mpsc::channel::<f64>(64);
        let registry = self.registry.clone();
        let mapper_id = export_id.clone();
        let mapper = tokio::spawn(async move {
            while let Some(fraction) = rx.recv().await {
                registry.set(
                    &mapper_id,
                    map_render_progress(fraction),
                    ExportStatus::Rendering,
                );
            }
        });

        let render_result = self.renderer.render(&spec, tx).await;
        // The progress sender is dropped by now, so the mapper drains and
        // exits before the next milestone lands
        let _ = mapper.await;
        render_result?;

        self.registry.set(export_id, 98.0, ExportStatus::Finalizing);
        let bytes = std::fs::read(&output_path)?;

        info!(export_id = %export_id, size = bytes.len(), "Export rendered");
        Ok(ExportArtifact {
            bytes,
            content_type: request.format.content_type(),
            file_name: format!("{export_id}.{}", request.format.extension()),
        })
    }
}

/// Maps a renderer fraction into the 20-95 progress band
fn map_render_progress(fraction: f64) -> f64 {
    (20.0 + fraction * 75.0).min(95.0)
}

// =============================================================================
// Tests
// =============================================================================
