//! Export Progress Channel
//!
//! In-memory registry of export jobs plus a polling push channel. A
//! subscriber receives a frame whenever the job changes, and the channel
//! closes itself once a terminal status has been delivered. Jobs never
//! touch disk.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use serde_json::json;
use tokio::sync::mpsc;
use tracing::{debug, warn};

use crate::ExportId;

use super::{ExportJob, ExportStatus};

/// How often a subscriber re-reads its job
pub const POLL_INTERVAL: Duration = Duration::from_millis(300);

/// A subscription is abandoned after this long regardless of job state
pub const SUBSCRIPTION_TIMEOUT: Duration = Duration::from_secs(5 * 60);

// =============================================================================
// Registry
// =============================================================================

/// Shared map of live export jobs, keyed by export id
#[derive(Clone, Default)]
pub struct ProgressRegistry {
    jobs: Arc<Mutex<HashMap<ExportId, ExportJob>>>,
}

impl ProgressRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Records the job's current progress and status
    pub fn set(&self, export_id: &ExportId, progress: f64, status: ExportStatus) {
        self.set_job(export_id, ExportJob::new(progress, status));
    }

    /// Records a failure: progress resets to zero and the message is kept
    pub fn set_error(&self, export_id: &ExportId, message: impl Into<String>) {
        self.set_job(export_id, ExportJob::failed(message));
    }

    fn set_job(&self, export_id: &ExportId, job: ExportJob) {
        if let Ok(mut jobs) = self.jobs.lock() {
            jobs.insert(export_id.clone(), job);
        }
    }

    pub fn get(&self, export_id: &ExportId) -> Option<ExportJob> {
        self.jobs
            .lock()
            .ok()
            .and_then(|jobs| jobs.get(export_id).cloned())
    }

    /// Discards the job entry. Called once a terminal frame has been sent.
    pub fn clear(&self, export_id: &ExportId) {
        if let Ok(mut jobs) = self.jobs.lock() {
            jobs.remove(export_id);
        }
    }

    #[cfg(test)]
    pub(crate) fn len(&self) -> usize {
        self.jobs.lock().map(|jobs| jobs.len()).unwrap_or(0)
    }
}

// =============================================================================
// Subscription
// =============================================================================

/// Push channel over a registry
pub struct ProgressChannel {
    registry: ProgressRegistry,
}

impl ProgressChannel {
    pub fn new(registry: ProgressRegistry) -> Self {
        Self { registry }
    }

    /// Subscribes to one export's progress.
    ///
    /// Frames are `data: {...}\n\n` strings carrying progress, status and
    /// the error message when present. A frame is pushed whenever the job
    /// changes; after a `complete` or `error` frame the entry is discarded
    /// and the channel closes. Subscriptions that outlive the hard timeout
    /// are dropped unconditionally.
    pub fn subscribe(&self, export_id: ExportId) -> mpsc::UnboundedReceiver<String> {
        let (tx, rx) = mpsc::unbounded_channel();
        let registry = self.registry.clone();

        tokio::spawn(async move {
            let started = tokio::time::Instant::now();
            let mut interval = tokio::time::interval(POLL_INTERVAL);
            let mut last_sent: Option<ExportJob> = None;

            loop {
                interval.tick().await;

                if started.elapsed() >= SUBSCRIPTION_TIMEOUT {
                    warn!(export_id = %export_id, "Progress subscription timed out");
                    registry.clear(&export_id);
                    break;
                }

                let Some(job) = registry.get(&export_id) else {
                    continue;
                };
                if last_sent.as_ref() == Some(&job) {
                    continue;
                }

                if tx.send(progress_frame(&job)).is_err() {
                    // Client disconnected
                    break;
                }

                if job.status.is_terminal() {
                    debug!(export_id = %export_id, status = ?job.status,
                        "Export reached terminal state, closing progress channel");
                    registry.clear(&export_id);
                    break;
                }
                last_sent = Some(job);
            }
        });

        rx
    }
}

fn progress_frame(job: &ExportJob) -> String {
    let mut payload = json!({
        "progress": job.progress,
        "status": job.status,
    });
    if let Some(error) = &job.error {
        payload["error"] = json!(error);
    }
    format!("data: {payload}\n\n")
}

// =============================================================================
// Tests
// =============================================================================
