//! Project Persistence Module
//!
//! The snapshot store (exclusive writer of the shared document) and the
//! pending-edits action log shared with external writers.

pub mod actions;
pub mod snapshot;

pub use actions::{apply_action, ActionKind, EditAction, PendingEditsLog};
pub use snapshot::{shared_files, SnapshotStore};
