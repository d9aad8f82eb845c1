//! Snapshot Store
//!
//! Owns the shared project document on disk. This is the only component
//! permitted to write `project-snapshot.json`; everything else reads it or
//! submits edit actions for the store to apply.
//!
//! Writes are atomic (temp file + rename) so concurrent readers in other
//! processes never observe a partial document. Each save also archives a
//! copy into the project's own storage area and a rolling history entry.

use std::path::{Path, PathBuf};

use tracing::{debug, warn};

use crate::timeline::ProjectSnapshot;
use crate::{fs as cffs, CoreError, CoreResult};

use super::actions::{apply_action, EditAction, PendingEditsLog};

/// Rolling history copies kept per shared-state directory
const MAX_HISTORY: usize = 20;

/// Shared-state file names
pub mod shared_files {
    pub const SNAPSHOT: &str = "project-snapshot.json";
    pub const PENDING_EDITS: &str = "pending-edits.json";
    pub const SYNC_INPUT: &str = "sync-input.json";
}

/// Manages the shared project document and its archival copies
pub struct SnapshotStore {
    shared_dir: PathBuf,
}

impl SnapshotStore {
    pub fn new(shared_dir: impl Into<PathBuf>) -> Self {
        Self {
            shared_dir: shared_dir.into(),
        }
    }

    pub fn shared_dir(&self) -> &Path {
        &self.shared_dir
    }

    /// Path of the shared snapshot document
    pub fn snapshot_path(&self) -> PathBuf {
        self.shared_dir.join(shared_files::SNAPSHOT)
    }

    /// Path of the shared sync-input file
    pub fn sync_input_path(&self) -> PathBuf {
        self.shared_dir.join(shared_files::SYNC_INPUT)
    }

    /// The pending-edits log in this shared-state directory
    pub fn pending_edits(&self) -> PendingEditsLog {
        PendingEditsLog::new(self.shared_dir.join(shared_files::PENDING_EDITS))
    }

    /// Per-project archive location, independent of the shared "active
    /// project" snapshot
    pub fn archive_path(&self, project_id: &str) -> CoreResult<PathBuf> {
        cffs::validate_path_id_component(project_id, "projectId")
            .map_err(CoreError::ValidationError)?;
        Ok(self
            .shared_dir
            .join("projects")
            .join(project_id)
            .join("snapshot.json"))
    }

    fn history_dir(&self) -> PathBuf {
        self.shared_dir.join("history")
    }

    /// Whether a shared snapshot exists yet
    pub fn exists(&self) -> bool {
        self.snapshot_path().exists()
    }

    /// Loads the shared snapshot document.
    ///
    /// Corrupt content is a `TransientRead`: the usual cause is reading while
    /// another process is mid-write, and callers retry on the next change
    /// notification.
    pub fn load(&self) -> CoreResult<ProjectSnapshot> {
        let path = self.snapshot_path();
        if !path.exists() {
            return Err(CoreError::ProjectNotFound(
                path.to_string_lossy().to_string(),
            ));
        }
        let content = std::fs::read_to_string(&path)?;
        serde_json::from_str(&content)
            .map_err(|e| CoreError::TransientRead(format!("snapshot at {}: {}", path.display(), e)))
    }

    /// Loads the shared snapshot, creating the default document when absent.
    pub fn load_or_default(&self, name: &str) -> CoreResult<ProjectSnapshot> {
        match self.load() {
            Ok(snapshot) => Ok(snapshot),
            Err(CoreError::ProjectNotFound(_)) => {
                let snapshot = ProjectSnapshot::new(name);
                self.save(&snapshot)?;
                Ok(snapshot)
            }
            Err(e) => Err(e),
        }
    }

    /// Saves the document: atomic shared write, then per-project archive and
    /// rolling history copy.
    ///
    /// Archive and history failures are logged, never fatal; the shared
    /// document is already durable at that point.
    pub fn save(&self, snapshot: &ProjectSnapshot) -> CoreResult<()> {
        cffs::atomic_write_json_pretty(&self.snapshot_path(), snapshot)?;

        match self.archive_path(&snapshot.project.id) {
            Ok(archive) => {
                if let Err(e) = cffs::atomic_write_json_pretty(&archive, snapshot) {
                    warn!(error = %e, project_id = %snapshot.project.id, "Failed to archive snapshot");
                }
            }
            Err(e) => {
                warn!(error = %e, "Skipping archive: invalid project id");
            }
        }

        if let Err(e) = self.write_history_entry(snapshot) {
            warn!(error = %e, "Failed to write snapshot history entry");
        }

        debug!(path = %self.snapshot_path().display(), "Snapshot saved");
        Ok(())
    }

    /// Applies an edit action to the current document and persists the
    /// result. Reducer failures leave the persisted document untouched.
    pub fn apply_and_save(&self, action: &EditAction) -> CoreResult<ProjectSnapshot> {
        let current = self.load()?;
        let next = apply_action(&current, action)?;
        self.save(&next)?;
        Ok(next)
    }

    fn write_history_entry(&self, snapshot: &ProjectSnapshot) -> CoreResult<()> {
        let dir = self.history_dir();
        std::fs::create_dir_all(&dir)?;

        let name = format!("snapshot-{}.json", chrono::Utc::now().timestamp_millis());
        cffs::atomic_write_json_pretty(&dir.join(name), snapshot)?;

        // Prune to the newest entries. Millisecond timestamps sort
        // lexicographically for the lifetime of this format.
        let mut entries: Vec<PathBuf> = std::fs::read_dir(&dir)?
            .filter_map(|e| e.ok())
            .map(|e| e.path())
            .filter(|p| {
                p.file_name()
                    .and_then(|n| n.to_str())
                    .is_some_and(|n| n.starts_with("snapshot-") && n.ends_with(".json"))
            })
            .collect();
        entries.sort();

        while entries.len() > MAX_HISTORY {
            let oldest = entries.remove(0);
            if let Err(e) = std::fs::remove_file(&oldest) {
                warn!(error = %e, path = %oldest.display(), "Failed to prune history entry");
            }
        }
        Ok(())
    }
}

// =============================================================================
// Tests
// =============================================================================
