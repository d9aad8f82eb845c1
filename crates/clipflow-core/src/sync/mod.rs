//! Cross-Process Sync Module
//!
//! Watches the shared-state directory and pushes deduplicated, typed edit
//! events to every connected browser client.

pub mod bridge;
pub mod events;
pub mod watcher;

pub use bridge::{connect, is_allowed_action, SyncConnection, SyncConnectionHandle, ALLOWED_ACTIONS};
pub use events::{event_names, ConnectedEvent, SyncEvent, UpdateEvent};
pub use watcher::{SharedFileChange, SharedStateWatcher};
