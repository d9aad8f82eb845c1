//! Sync Push Events
//!
//! Typed events pushed to each connected browser client over its persistent
//! one-way channel, plus the text-event-stream framing used on the wire.

use serde::{Deserialize, Serialize};

use crate::project::EditAction;

/// Event names used on the push channel
pub mod event_names {
    /// Sent once when a client connects
    pub const CONNECTED: &str = "connected";
    /// Full snapshot document (catch-up and on snapshot file change)
    pub const SNAPSHOT_UPDATE: &str = "snapshot_update";
    /// A newly observed, allow-listed edit action
    pub const EDIT: &str = "edit";
    /// Any other shared file forwarded verbatim
    pub const UPDATE: &str = "update";
}

/// `connected` event payload
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ConnectedEvent {
    pub timestamp: String,
}

impl ConnectedEvent {
    pub fn now() -> Self {
        Self {
            timestamp: chrono::Utc::now().to_rfc3339(),
        }
    }
}

/// `update` event payload: a shared file forwarded verbatim
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UpdateEvent {
    /// File name within the shared-state directory
    pub file: String,
    /// Parsed file content
    pub content: serde_json::Value,
}

/// An event pushed to one browser connection
#[derive(Clone, Debug)]
pub enum SyncEvent {
    Connected(ConnectedEvent),
    SnapshotUpdate(serde_json::Value),
    Edit(EditAction),
    Update(UpdateEvent),
}

impl SyncEvent {
    /// Wire event name
    pub fn name(&self) -> &'static str {
        match self {
            SyncEvent::Connected(_) => event_names::CONNECTED,
            SyncEvent::SnapshotUpdate(_) => event_names::SNAPSHOT_UPDATE,
            SyncEvent::Edit(_) => event_names::EDIT,
            SyncEvent::Update(_) => event_names::UPDATE,
        }
    }

    /// JSON payload carried by the event
    pub fn payload(&self) -> serde_json::Value {
        match self {
            SyncEvent::Connected(e) => serde_json::to_value(e).unwrap_or_default(),
            SyncEvent::SnapshotUpdate(v) => v.clone(),
            SyncEvent::Edit(a) => serde_json::to_value(a).unwrap_or_default(),
            SyncEvent::Update(e) => serde_json::to_value(e).unwrap_or_default(),
        }
    }

    /// Serializes to a named text-event-stream frame
    pub fn to_frame(&self) -> String {
        format!("event: {}\ndata: {}\n\n", self.name(), self.payload())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_frame_format() {
        let event = SyncEvent::SnapshotUpdate(serde_json::json!({ "tracks": [] }));
        let frame = event.to_frame();

        assert!(frame.starts_with("event: snapshot_update\ndata: "));
        assert!(frame.ends_with("\n\n"));
        assert!(frame.contains("{\"tracks\":[]}"));
    }

    #[test]
    fn test_event_names() {
        assert_eq!(SyncEvent::Connected(ConnectedEvent::now()).name(), "connected");
        assert_eq!(
            SyncEvent::Update(UpdateEvent {
                file: "sync-input.json".to_string(),
                content: serde_json::json!({}),
            })
            .name(),
            "update"
        );
    }
}
