//! ClipFlow CLI
//!
//! Headless entry points into the editing engine: stream sync events from a
//! shared-state directory, run an export end to end, generate thumbnails,
//! and inspect a project snapshot.

use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::{Arc, OnceLock};

use anyhow::{bail, Context};
use clap::{Parser, Subcommand};
use tracing::{info, warn};

use clipflow_core::assets::ThumbnailService;
use clipflow_core::project::SnapshotStore;
use clipflow_core::render::{
    ExportFormat, ExportPipeline, ExportQuality, ExportRequest, FilePart, ProcessRenderer,
    ProgressChannel, ProgressRegistry,
};
use clipflow_core::sync;

static LOG_GUARD: OnceLock<tracing_appender::non_blocking::WorkerGuard> = OnceLock::new();

#[derive(Parser)]
#[command(name = "clipflow-cli", version, about = "ClipFlow headless tooling")]
struct Cli {
    /// Directory for rolling log files
    #[arg(long, global = true, default_value = ".logs")]
    log_dir: PathBuf,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Stream sync events from a shared-state directory to stdout
    Sync {
        /// Shared-state directory holding the project snapshot and edit log
        #[arg(long)]
        shared_dir: PathBuf,
    },
    /// Render a project snapshot into a video file
    Export {
        /// Path to a project snapshot JSON file
        #[arg(long)]
        project: PathBuf,
        /// Output file for the encoded video
        #[arg(long)]
        output: PathBuf,
        /// Container format: mp4 or webm
        #[arg(long, default_value = "mp4")]
        format: String,
        /// Quality preset: low, medium, high, very_high
        #[arg(long, default_value = "high")]
        quality: String,
        /// Composition renderer binary
        #[arg(long, default_value = "clipflow-render")]
        renderer: PathBuf,
    },
    /// Generate a thumbnail for a media file
    Thumbnail {
        /// Input media file
        #[arg(long)]
        input: PathBuf,
        /// Asset id, also names the output file
        #[arg(long)]
        asset_id: String,
        /// Directory for generated thumbnails
        #[arg(long)]
        out_dir: PathBuf,
        /// Transcoder binary
        #[arg(long, default_value = "ffmpeg")]
        ffmpeg: PathBuf,
    },
    /// Print a summary of the project in a shared-state directory
    Inspect {
        #[arg(long)]
        shared_dir: PathBuf,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    init_logging(&cli.log_dir);

    match cli.command {
        Command::Sync { shared_dir } => run_sync(shared_dir).await,
        Command::Export {
            project,
            output,
            format,
            quality,
            renderer,
        } => run_export(project, output, &format, &quality, renderer).await,
        Command::Thumbnail {
            input,
            asset_id,
            out_dir,
            ffmpeg,
        } => run_thumbnail(input, &asset_id, out_dir, ffmpeg).await,
        Command::Inspect { shared_dir } => run_inspect(shared_dir),
    }
}

fn init_logging(log_dir: &PathBuf) {
    // Log to file for production debugging; stdout remains available in dev
    let _ = std::fs::create_dir_all(log_dir);

    let file_appender = tracing_appender::rolling::daily(log_dir, "clipflow.log");
    let (non_blocking, guard) = tracing_appender::non_blocking(file_appender);
    let _ = LOG_GUARD.set(guard);

    use tracing_subscriber::prelude::*;

    let env_filter = tracing_subscriber::EnvFilter::from_default_env()
        .add_directive(tracing::Level::INFO.into());

    let stderr_layer = tracing_subscriber::fmt::layer()
        .with_writer(std::io::stderr)
        .with_ansi(cfg!(debug_assertions));

    let file_layer = tracing_subscriber::fmt::layer()
        .with_writer(non_blocking)
        .with_ansi(false);

    let subscriber = tracing_subscriber::registry()
        .with(env_filter)
        .with(stderr_layer)
        .with(file_layer);

    // Avoid panics if already initialized (tests)
    let _ = tracing::subscriber::set_global_default(subscriber);
}

/// Streams sync frames to stdout until interrupted.
async fn run_sync(shared_dir: PathBuf) -> anyhow::Result<()> {
    let store = Arc::new(SnapshotStore::new(shared_dir));
    let (handle, mut rx) = sync::connect(store)
        .map_err(|e| anyhow::anyhow!("failed to start sync connection: {e}"))?;

    info!("Sync connection open, streaming events");
    loop {
        tokio::select! {
            event = rx.recv() => {
                match event {
                    Some(event) => {
                        use std::io::Write;
                        print!("{}", event.to_frame());
                        std::io::stdout().flush()?;
                    }
                    None => break,
                }
            }
            _ = tokio::signal::ctrl_c() => {
                info!("Interrupted, closing sync connection");
                break;
            }
        }
    }

    handle.disconnect();
    Ok(())
}

/// Runs one export from a snapshot file, staging each asset's local media.
async fn run_export(
    project: PathBuf,
    output: PathBuf,
    format: &str,
    quality: &str,
    renderer: PathBuf,
) -> anyhow::Result<()> {
    if ExportFormat::parse(format).is_none() {
        bail!("unknown format: {format}");
    }
    if ExportQuality::parse(quality).is_none() {
        bail!("unknown quality: {quality}");
    }

    let project_data = std::fs::read_to_string(&project)
        .with_context(|| format!("failed to read {}", project.display()))?;
    let snapshot: clipflow_core::timeline::ProjectSnapshot = serde_json::from_str(&project_data)
        .context("project file is not a valid snapshot")?;

    let export_id = clipflow_core::new_action_id();
    let mut fields = HashMap::new();
    fields.insert("projectData".to_string(), project_data);
    fields.insert("exportId".to_string(), export_id.clone());
    fields.insert("format".to_string(), format.to_string());
    fields.insert("quality".to_string(), quality.to_string());

    let mut files = Vec::new();
    for asset in &snapshot.assets {
        let Some(path) = &asset.file_path else {
            warn!(asset = %asset.id, "Asset has no local file, skipping upload");
            continue;
        };
        let bytes = std::fs::read(path)
            .with_context(|| format!("failed to read asset media {path}"))?;
        files.push(FilePart {
            name: format!("media_{}", asset.id),
            file_name: asset.name.clone(),
            bytes,
        });
    }

    let request = ExportRequest::from_parts(&fields, files)?;
    let registry = ProgressRegistry::new();
    let pipeline = ExportPipeline::new(Arc::new(ProcessRenderer::new(renderer)), registry.clone());

    // Mirror progress frames into the log while the render runs
    let mut progress_rx = ProgressChannel::new(registry).subscribe(export_id.clone());
    let progress_task = tokio::spawn(async move {
        while let Some(frame) = progress_rx.recv().await {
            info!(frame = %frame.trim(), "Export progress");
        }
    });

    let artifact = pipeline.run(request).await?;
    let _ = progress_task.await;

    std::fs::write(&output, &artifact.bytes)
        .with_context(|| format!("failed to write {}", output.display()))?;
    info!(
        export_id = %export_id,
        output = %output.display(),
        size = artifact.bytes.len(),
        "Export complete"
    );
    Ok(())
}

async fn run_thumbnail(
    input: PathBuf,
    asset_id: &str,
    out_dir: PathBuf,
    ffmpeg: PathBuf,
) -> anyhow::Result<()> {
    let service = ThumbnailService::new(out_dir).with_transcoder_path(ffmpeg);
    let path = service.generate(&input, asset_id).await?;
    println!("{}", path.display());
    Ok(())
}

fn run_inspect(shared_dir: PathBuf) -> anyhow::Result<()> {
    let store = SnapshotStore::new(shared_dir);
    let snapshot = store.load()?;

    let elements: usize = snapshot.tracks.iter().map(|t| t.elements.len()).sum();
    let summary = serde_json::json!({
        "id": snapshot.project.id,
        "name": snapshot.project.name,
        "fps": snapshot.project.fps,
        "duration": snapshot.duration(),
        "durationInFrames": snapshot.duration_in_frames(snapshot.project.fps),
        "tracks": snapshot.tracks.len(),
        "elements": elements,
        "assets": snapshot.assets.len(),
    });
    println!("{}", serde_json::to_string_pretty(&summary)?);
    Ok(())
}
