//! Shared-State Directory Watcher
//!
//! Filesystem change detection for the shared-state directory using
//! `notify`. Events are debounced and classified by which shared file
//! changed. One watcher is created per browser connection, and its lifetime
//! is tied to that connection, with no process-wide watcher state.

use std::path::PathBuf;

use notify_debouncer_mini::new_debouncer;
use tokio::sync::mpsc;

use crate::project::shared_files;

/// A classified change in the shared-state directory
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SharedFileChange {
    /// The snapshot document changed
    Snapshot,
    /// The pending-edits log changed
    PendingEdits,
    /// Any other shared file changed (file name relative to the shared dir)
    Other(String),
}

/// Watcher over one shared-state directory
pub struct SharedStateWatcher {
    /// Stop signal sender; dropping this stops the watcher
    _stop_tx: Option<tokio::sync::oneshot::Sender<()>>,
}

impl SharedStateWatcher {
    /// Start watching the shared-state directory.
    ///
    /// Changes are debounced (500ms) and sent through the provided channel.
    /// Atomic-write artifacts (`.tmp`/`.bak`) and subdirectories are
    /// filtered out.
    pub fn start(
        shared_dir: PathBuf,
        event_tx: mpsc::UnboundedSender<SharedFileChange>,
    ) -> Result<Self, String> {
        let (stop_tx, mut stop_rx) = tokio::sync::oneshot::channel::<()>();
        let root_clone = shared_dir.clone();

        let (tx, rx) = std::sync::mpsc::channel();
        let mut debouncer = new_debouncer(std::time::Duration::from_millis(500), tx)
            .map_err(|e| format!("Failed to create file watcher: {}", e))?;

        debouncer
            .watcher()
            .watch(&shared_dir, notify::RecursiveMode::NonRecursive)
            .map_err(|e| format!("Failed to watch directory: {}", e))?;

        // Spawn a thread to process debounced events
        std::thread::spawn(move || {
            // Keep the debouncer alive
            let _debouncer = debouncer;

            loop {
                // Check for stop signal
                if stop_rx.try_recv().is_ok() {
                    tracing::debug!("Shared-state watcher stopped by signal");
                    break;
                }

                // Poll for events with timeout
                match rx.recv_timeout(std::time::Duration::from_millis(200)) {
                    Ok(Ok(events)) => {
                        for event in events {
                            let path = &event.path;

                            let file_name = match path.strip_prefix(&root_clone) {
                                Ok(rel) => rel.to_string_lossy().replace('\\', "/"),
                                Err(_) => continue,
                            };

                            // Only files directly in the shared dir; archive
                            // and history subdirectories are not part of the
                            // sync surface.
                            if file_name.contains('/') {
                                continue;
                            }
                            // Atomic-write artifacts
                            if file_name.ends_with(".tmp") || file_name.ends_with(".bak") {
                                continue;
                            }

                            let change = classify(&file_name);
                            if event_tx.send(change).is_err() {
                                tracing::debug!(
                                    "Shared-state event channel closed, stopping watcher"
                                );
                                return;
                            }
                        }
                    }
                    Ok(Err(error)) => {
                        tracing::warn!(error = %error, "File watcher error");
                    }
                    Err(std::sync::mpsc::RecvTimeoutError::Timeout) => {
                        // Normal timeout, continue loop
                    }
                    Err(std::sync::mpsc::RecvTimeoutError::Disconnected) => {
                        tracing::debug!("File watcher channel disconnected, stopping");
                        break;
                    }
                }
            }
        });

        Ok(Self {
            _stop_tx: Some(stop_tx),
        })
    }

    /// Stop the watcher
    pub fn stop(&mut self) {
        self._stop_tx.take(); // Dropping the sender signals the thread to stop
    }
}

fn classify(file_name: &str) -> SharedFileChange {
    match file_name {
        shared_files::SNAPSHOT => SharedFileChange::Snapshot,
        shared_files::PENDING_EDITS => SharedFileChange::PendingEdits,
        other => SharedFileChange::Other(other.to_string()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_classify() {
        assert_eq!(classify("project-snapshot.json"), SharedFileChange::Snapshot);
        assert_eq!(classify("pending-edits.json"), SharedFileChange::PendingEdits);
        assert_eq!(
            classify("sync-input.json"),
            SharedFileChange::Other("sync-input.json".to_string())
        );
    }

    #[tokio::test]
    async fn test_watcher_start_and_stop() {
        let dir = tempfile::tempdir().unwrap();
        let (tx, _rx) = mpsc::unbounded_channel();

        let mut watcher = SharedStateWatcher::start(dir.path().to_path_buf(), tx).unwrap();

        // Give the watcher time to start
        tokio::time::sleep(std::time::Duration::from_millis(100)).await;

        watcher.stop();
        // Should not panic
    }

    #[tokio::test]
    async fn test_watcher_detects_snapshot_change() {
        let dir = tempfile::tempdir().unwrap();
        let (tx, mut rx) = mpsc::unbounded_channel();

        let _watcher = SharedStateWatcher::start(dir.path().to_path_buf(), tx).unwrap();

        // Wait for watcher to initialize
        tokio::time::sleep(std::time::Duration::from_millis(200)).await;

        std::fs::write(dir.path().join("project-snapshot.json"), b"{}").unwrap();

        // Wait for debounced event (500ms debounce + overhead)
        tokio::time::sleep(std::time::Duration::from_millis(1500)).await;

        let event = rx.try_recv();
        assert!(
            event.is_ok(),
            "Expected a change event after writing the snapshot"
        );
        assert_eq!(event.unwrap(), SharedFileChange::Snapshot);
    }

    #[tokio::test]
    async fn test_watcher_skips_atomic_write_artifacts() {
        let dir = tempfile::tempdir().unwrap();
        let (tx, mut rx) = mpsc::unbounded_channel();

        let _watcher = SharedStateWatcher::start(dir.path().to_path_buf(), tx).unwrap();

        tokio::time::sleep(std::time::Duration::from_millis(200)).await;

        std::fs::write(dir.path().join("project-snapshot.json.tmp"), b"{}").unwrap();

        tokio::time::sleep(std::time::Duration::from_millis(1500)).await;

        assert!(rx.try_recv().is_err());
    }
}
