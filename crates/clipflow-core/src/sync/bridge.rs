//! Sync Bridge
//!
//! Gives every connected browser client a live, deduplicated view of edits
//! that originate outside the browser. Per connection: a catch-up snapshot
//! on connect, a baseline of already-logged action ids, then incremental
//! push driven by filesystem notifications.
//!
//! Delivery semantics are at-most-once per connection: the delivered-id set
//! only ever grows, and a transient mid-write read produces no event rather
//! than desynchronizing the set.

use std::collections::HashSet;
use std::sync::Arc;

use tokio::sync::mpsc;
use tracing::{debug, warn};

use crate::project::SnapshotStore;
use crate::ActionId;

use super::events::{ConnectedEvent, SyncEvent, UpdateEvent};
use super::watcher::{SharedFileChange, SharedStateWatcher};

/// Action kinds pushed to browsers as `edit` events.
///
/// `addText` is deliberately absent: text insertion is UI-local and the
/// browser applies it before it ever reaches the log.
pub const ALLOWED_ACTIONS: &[&str] = &[
    "addSubtitle",
    "addMultipleSubtitles",
    "clearSubtitles",
    "removeElement",
    "updateElement",
    "splitElement",
    "moveElement",
    "addMarkers",
    "importMedia",
    "importImage",
    "importVideo",
    "importAudio",
    "importAudioBatch",
    "setFullState",
    "updateSnapshot",
];

/// Whether an action kind may be pushed as an `edit` event
pub fn is_allowed_action(action: &str) -> bool {
    ALLOWED_ACTIONS.contains(&action)
}

// =============================================================================
// Per-Connection State
// =============================================================================

/// Delivery state for one browser connection.
///
/// Separated from the watcher plumbing so the protocol is testable without
/// filesystem notification timing.
pub struct SyncConnection {
    store: Arc<SnapshotStore>,
    delivered: HashSet<ActionId>,
}

impl SyncConnection {
    /// Creates connection state and the initial catch-up events:
    /// `connected`, then a full `snapshot_update` when a document exists.
    ///
    /// The baseline records every action id already present in the
    /// pending-edits log so none of them are re-sent incrementally. A
    /// transient read at connect time yields an empty baseline; those ids
    /// will be seen (and delivered) on the next notification, which is the
    /// correct catch-up behavior for a log we could not read yet.
    pub fn connect(store: Arc<SnapshotStore>) -> (Self, Vec<SyncEvent>) {
        let mut events = vec![SyncEvent::Connected(ConnectedEvent::now())];

        match store.load() {
            Ok(snapshot) => match serde_json::to_value(&snapshot) {
                Ok(value) => events.push(SyncEvent::SnapshotUpdate(value)),
                Err(e) => warn!(error = %e, "Failed to serialize catch-up snapshot"),
            },
            Err(e) => debug!(error = %e, "No catch-up snapshot on connect"),
        }

        let delivered = match store.pending_edits().ids() {
            Ok(ids) => ids,
            Err(e) => {
                debug!(error = %e, "Could not read baseline pending-edit ids");
                HashSet::new()
            }
        };

        (Self { store, delivered }, events)
    }

    /// Produces the events for one filesystem change notification.
    ///
    /// Transient reads (file mid-write) are swallowed: the result is simply
    /// no events, and the next notification re-attempts.
    pub fn handle_change(&mut self, change: &SharedFileChange) -> Vec<SyncEvent> {
        match change {
            SharedFileChange::Snapshot => match self.store.load() {
                Ok(snapshot) => match serde_json::to_value(&snapshot) {
                    Ok(value) => vec![SyncEvent::SnapshotUpdate(value)],
                    Err(e) => {
                        warn!(error = %e, "Failed to serialize snapshot update");
                        vec![]
                    }
                },
                Err(e) => {
                    debug!(error = %e, "Swallowed snapshot read during change");
                    vec![]
                }
            },
            SharedFileChange::PendingEdits => {
                let actions = match self.store.pending_edits().read() {
                    Ok(actions) => actions,
                    Err(e) => {
                        debug!(error = %e, "Swallowed pending-edits read during change");
                        return vec![];
                    }
                };

                let mut events = vec![];
                for action in actions {
                    if self.delivered.contains(&action.id) {
                        continue;
                    }
                    // Mark seen regardless of the allow-list so filtered
                    // kinds are not re-examined on every notification.
                    self.delivered.insert(action.id.clone());

                    if is_allowed_action(&action.action) {
                        events.push(SyncEvent::Edit(action));
                    } else {
                        debug!(action = %action.action, "Skipping non-allow-listed action");
                    }
                }
                events
            }
            SharedFileChange::Other(file) => {
                let path = self.store.shared_dir().join(file);
                let content = match std::fs::read_to_string(&path) {
                    Ok(content) => content,
                    Err(e) => {
                        debug!(error = %e, file = %file, "Swallowed shared file read");
                        return vec![];
                    }
                };
                match serde_json::from_str(&content) {
                    Ok(value) => vec![SyncEvent::Update(UpdateEvent {
                        file: file.clone(),
                        content: value,
                    })],
                    Err(e) => {
                        debug!(error = %e, file = %file, "Swallowed partial shared file");
                        vec![]
                    }
                }
            }
        }
    }

    /// Number of action ids this connection has marked as delivered/seen
    pub fn delivered_count(&self) -> usize {
        self.delivered.len()
    }
}

// =============================================================================
// Bridge (connection lifecycle)
// =============================================================================

/// Handle for one live bridge connection. Dropping it tears down the watcher
/// and the forwarding task, even if the client disconnected mid-push.
pub struct SyncConnectionHandle {
    watcher: SharedStateWatcher,
}

impl SyncConnectionHandle {
    /// Explicitly stop watching (dropping the handle does the same)
    pub fn disconnect(mut self) {
        self.watcher.stop();
    }
}

/// Connects a browser client: emits catch-up events, starts a watcher scoped
/// to this connection, and forwards incremental events until the client goes
/// away.
///
/// Returns the receiving side of the event stream and the lifecycle handle.
pub fn connect(
    store: Arc<SnapshotStore>,
) -> Result<(SyncConnectionHandle, mpsc::UnboundedReceiver<SyncEvent>), String> {
    let (event_tx, event_rx) = mpsc::unbounded_channel();
    let (mut connection, catch_up) = SyncConnection::connect(store.clone());

    for event in catch_up {
        if event_tx.send(event).is_err() {
            return Err("client disconnected during catch-up".to_string());
        }
    }

    let (change_tx, mut change_rx) = mpsc::unbounded_channel();
    let watcher = SharedStateWatcher::start(store.shared_dir().to_path_buf(), change_tx)?;

    tokio::spawn(async move {
        while let Some(change) = change_rx.recv().await {
            for event in connection.handle_change(&change) {
                if event_tx.send(event).is_err() {
                    debug!("Sync client disconnected, stopping forwarder");
                    return;
                }
            }
        }
    });

    Ok((SyncConnectionHandle { watcher }, event_rx))
}

// =============================================================================
// Tests
// =============================================================================
