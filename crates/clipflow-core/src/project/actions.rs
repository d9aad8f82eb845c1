//! Edit Actions
//!
//! The pending-edits log is the append-only channel every writer (UI,
//! planner, automation process) uses to request changes to the shared
//! document. Each entry is self-identified; re-delivery of the same id must
//! be a no-op downstream.

use std::collections::HashSet;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::timeline::{ops, Asset, Element, ProjectSnapshot, TrackKind};
use crate::{ActionId, CoreError, CoreResult};

/// Pending-edits entries older than this are dropped on append to keep the
/// shared file small.
const MAX_PENDING_EDITS: usize = 100;

// =============================================================================
// Action Kinds
// =============================================================================

/// The closed set of action kinds the reducer understands
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum ActionKind {
    AddSubtitle,
    AddText,
    AddMultipleSubtitles,
    ClearSubtitles,
    RemoveElement,
    UpdateElement,
    SplitElement,
    MoveElement,
    AddMarkers,
    ImportMedia,
    ImportImage,
    ImportVideo,
    ImportAudio,
    ImportAudioBatch,
    SetFullState,
    UpdateSnapshot,
}

impl ActionKind {
    /// Parses a wire action name; `None` for unknown kinds.
    pub fn parse(name: &str) -> Option<Self> {
        serde_json::from_value(serde_json::Value::String(name.to_string())).ok()
    }

    /// Wire name of the kind
    pub fn name(&self) -> String {
        match serde_json::to_value(self) {
            Ok(serde_json::Value::String(s)) => s,
            _ => String::new(),
        }
    }
}

// =============================================================================
// Edit Action
// =============================================================================

/// A self-identified, idempotency-bearing unit of change.
///
/// `action` stays a free-form string on the wire so unknown kinds from newer
/// writers deserialize fine and get skipped instead of crashing the reader.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EditAction {
    pub id: ActionId,
    pub action: String,
    #[serde(default)]
    pub data: serde_json::Value,
    #[serde(default)]
    pub timestamp: Option<String>,
    #[serde(default)]
    pub processed: bool,
}

impl EditAction {
    /// Creates a new action with a fresh ULID id and current timestamp
    pub fn new(kind: ActionKind, data: serde_json::Value) -> Self {
        Self {
            id: crate::new_action_id(),
            action: kind.name(),
            data,
            timestamp: Some(chrono::Utc::now().to_rfc3339()),
            processed: false,
        }
    }

    /// Parsed action kind; `None` when the kind is unknown
    pub fn kind(&self) -> Option<ActionKind> {
        ActionKind::parse(&self.action)
    }
}

// =============================================================================
// Pending-Edits Log
// =============================================================================

/// Append-oriented JSON-array log of pending edit actions.
///
/// Reads are tolerant: a mid-write (partial/invalid) file surfaces as
/// `TransientRead` so watchers can swallow it and retry on the next
/// notification.
pub struct PendingEditsLog {
    path: PathBuf,
}

impl PendingEditsLog {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Reads all entries. A missing file is an empty log.
    pub fn read(&self) -> CoreResult<Vec<EditAction>> {
        if !self.path.exists() {
            return Ok(vec![]);
        }
        let content = std::fs::read_to_string(&self.path)?;
        serde_json::from_str(&content).map_err(|e| {
            CoreError::TransientRead(format!(
                "pending-edits at {}: {}",
                self.path.display(),
                e
            ))
        })
    }

    /// All action ids currently in the log (a connection's baseline).
    pub fn ids(&self) -> CoreResult<HashSet<ActionId>> {
        Ok(self.read()?.into_iter().map(|a| a.id).collect())
    }

    /// Appends an action, truncating the log to the newest entries.
    pub fn append(&self, action: &EditAction) -> CoreResult<()> {
        let mut actions = self.read()?;
        actions.push(action.clone());
        if actions.len() > MAX_PENDING_EDITS {
            let drop = actions.len() - MAX_PENDING_EDITS;
            actions.drain(..drop);
        }
        crate::fs::atomic_write_json_pretty(&self.path, &actions)
    }

    /// Marks an action as processed in place.
    pub fn mark_processed(&self, action_id: &str) -> CoreResult<bool> {
        let mut actions = self.read()?;
        let mut found = false;
        for action in &mut actions {
            if action.id == action_id {
                action.processed = true;
                found = true;
            }
        }
        if found {
            crate::fs::atomic_write_json_pretty(&self.path, &actions)?;
        }
        Ok(found)
    }
}

// =============================================================================
// Reducer
// =============================================================================

/// Pure reducer: applies one action to a snapshot, producing the next
/// snapshot. Unknown action kinds fail with `UnknownAction` and leave the
/// input untouched; they must never crash the writer.
pub fn apply_action(snapshot: &ProjectSnapshot, action: &EditAction) -> CoreResult<ProjectSnapshot> {
    let kind = action
        .kind()
        .ok_or_else(|| CoreError::UnknownAction(action.action.clone()))?;
    let data = &action.data;
    let mut next = snapshot.clone();

    match kind {
        ActionKind::AddSubtitle | ActionKind::AddText => {
            let element = ops::text_element_from_data(data);
            let track_id = text_track_id(&next)?;
            ops::add_element(&mut next, &track_id, Element::Text(element))?;
        }
        ActionKind::AddMultipleSubtitles => {
            let subtitles = data
                .get("subtitles")
                .and_then(|v| v.as_array())
                .cloned()
                .unwrap_or_default();
            let track_id = text_track_id(&next)?;
            for entry in subtitles {
                let mut with_default = entry.clone();
                if with_default.get("duration").is_none() {
                    if let Some(obj) = with_default.as_object_mut() {
                        obj.insert("duration".to_string(), serde_json::json!(3.0));
                    }
                }
                let element = ops::text_element_from_data(&with_default);
                ops::add_element(&mut next, &track_id, Element::Text(element))?;
            }
        }
        ActionKind::ClearSubtitles => {
            ops::clear_text_elements(&mut next);
        }
        ActionKind::RemoveElement => {
            let element_id = required_str(data, "elementId")?;
            // Removing an already-gone element is a no-op, not an error;
            // writers may race.
            ops::remove_element(&mut next, element_id);
        }
        ActionKind::UpdateElement => {
            let element_id = required_str(data, "elementId")?.to_string();
            let patch = match data.get("updates") {
                Some(updates) => updates.clone(),
                None => {
                    let mut patch = data.clone();
                    if let Some(obj) = patch.as_object_mut() {
                        obj.remove("elementId");
                        obj.remove("trackId");
                    }
                    patch
                }
            };
            ops::update_element(&mut next, &element_id, &patch)?;
        }
        ActionKind::SplitElement => {
            let element_id = required_str(data, "elementId")?.to_string();
            let split_time = data
                .get("splitTime")
                .and_then(|v| v.as_f64())
                .ok_or_else(|| {
                    CoreError::ValidationError("splitElement requires splitTime".to_string())
                })?;
            let track_id = match data.get("trackId").and_then(|v| v.as_str()) {
                Some(t) => t.to_string(),
                None => next
                    .find_element_track(&element_id)
                    .map(|t| t.id.clone())
                    .ok_or_else(|| CoreError::ElementNotFound(element_id.clone()))?,
            };
            ops::split_element(&mut next, &track_id, &element_id, split_time)?;
        }
        ActionKind::MoveElement => {
            let element_id = required_str(data, "elementId")?.to_string();
            let to_track = data.get("toTrackId").and_then(|v| v.as_str());
            let start_time = data.get("startTime").and_then(|v| v.as_f64());
            let delta = data.get("delta").and_then(|v| v.as_f64());
            ops::move_element(&mut next, &element_id, to_track, start_time, delta)?;
        }
        ActionKind::AddMarkers => {
            let track_id = data
                .get("trackId")
                .and_then(|v| v.as_str())
                .map(|s| s.to_string())
                .or_else(|| next.tracks.first().map(|t| t.id.clone()))
                .ok_or_else(|| {
                    CoreError::ValidationError("addMarkers: no track available".to_string())
                })?;
            let times: Vec<f64> = match data.get("times").and_then(|v| v.as_array()) {
                Some(times) => times.iter().filter_map(|v| v.as_f64()).collect(),
                None => data
                    .get("markers")
                    .and_then(|v| v.as_array())
                    .map(|markers| {
                        markers
                            .iter()
                            .filter_map(|m| m.get("time").and_then(|v| v.as_f64()))
                            .collect()
                    })
                    .unwrap_or_default(),
            };
            ops::add_markers(&mut next, &track_id, &times)?;
        }
        ActionKind::ImportMedia
        | ActionKind::ImportImage
        | ActionKind::ImportVideo
        | ActionKind::ImportAudio => {
            let media_kind = match kind {
                ActionKind::ImportImage => Some(crate::timeline::MediaKind::Image),
                ActionKind::ImportVideo => Some(crate::timeline::MediaKind::Video),
                ActionKind::ImportAudio => Some(crate::timeline::MediaKind::Audio),
                _ => None,
            };
            import_media_item(&mut next, data, media_kind)?;
        }
        ActionKind::ImportAudioBatch => {
            let files = data.get("files").and_then(|v| v.as_array()).ok_or_else(|| {
                CoreError::ValidationError(
                    "importAudioBatch: files array is required".to_string(),
                )
            })?;
            // Items without an explicit startTime land back to back at the
            // current timeline end
            for item in files {
                import_media_item(&mut next, item, Some(crate::timeline::MediaKind::Audio))?;
            }
        }
        ActionKind::SetFullState => {
            let value = data.get("snapshot").unwrap_or(data);
            next = serde_json::from_value(value.clone())?;
        }
        ActionKind::UpdateSnapshot => {
            // Merge incoming document, preserving assets the incoming writer
            // does not know about.
            let value = data.get("snapshot").unwrap_or(data);
            let incoming: ProjectSnapshot = serde_json::from_value(value.clone())?;
            let mut merged = incoming;
            for existing in &next.assets {
                if merged.get_asset(&existing.id).is_none() {
                    merged.assets.push(existing.clone());
                }
            }
            next = merged;
        }
    }

    next.project.updated_at = chrono::Utc::now().to_rfc3339();
    Ok(next)
}

fn text_track_id(snapshot: &ProjectSnapshot) -> CoreResult<String> {
    snapshot
        .tracks
        .iter()
        .find(|t| t.kind == TrackKind::Text)
        .map(|t| t.id.clone())
        .ok_or_else(|| CoreError::ValidationError("no text track in snapshot".to_string()))
}

/// Imports one media item: adds a linked asset and places a referencing
/// element on the main media track. Kind is inferred from the path when not
/// dictated by the action.
fn import_media_item(
    next: &mut ProjectSnapshot,
    data: &serde_json::Value,
    media_kind: Option<crate::timeline::MediaKind>,
) -> CoreResult<()> {
    let file_path = required_str(data, "filePath")?.to_string();
    let name = data
        .get("name")
        .and_then(|v| v.as_str())
        .map(|s| s.to_string())
        .or_else(|| {
            Path::new(&file_path)
                .file_name()
                .map(|n| n.to_string_lossy().to_string())
        })
        .unwrap_or_else(|| file_path.clone());

    let media_kind =
        media_kind.unwrap_or_else(|| crate::assets::media_kind_for_path(&file_path));

    let mut asset = Asset::new_linked(&name, media_kind, &file_path);
    if let Some(duration) = data.get("duration").and_then(|v| v.as_f64()) {
        asset.duration = Some(duration);
    }

    let start_time = data
        .get("startTime")
        .and_then(|v| v.as_f64())
        .unwrap_or_else(|| next.duration());
    let element = ops::media_element_for_asset(&asset, start_time);

    let track_id = next.main_track_mut().map(|t| t.id.clone()).ok_or_else(|| {
        CoreError::ValidationError("import: no media track available".to_string())
    })?;
    next.assets.push(asset);
    ops::add_element(next, &track_id, Element::Media(element))?;
    Ok(())
}

fn required_str<'a>(data: &'a serde_json::Value, key: &str) -> CoreResult<&'a str> {
    data.get(key).and_then(|v| v.as_str()).ok_or_else(|| {
        CoreError::ValidationError(format!("action data missing required field {key}"))
    })
}

// =============================================================================
// Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::timeline::MediaElement;
    use tempfile::TempDir;

    #[test]
    fn test_action_kind_round_trip() {
        assert_eq!(ActionKind::parse("addSubtitle"), Some(ActionKind::AddSubtitle));
        assert_eq!(ActionKind::parse("splitElement"), Some(ActionKind::SplitElement));
        assert_eq!(ActionKind::parse("setFullState"), Some(ActionKind::SetFullState));
        assert_eq!(
            ActionKind::parse("importAudioBatch"),
            Some(ActionKind::ImportAudioBatch)
        );
        assert_eq!(ActionKind::parse("frobnicate"), None);
        assert_eq!(ActionKind::SplitElement.name(), "splitElement");
    }

    #[test]
    fn test_unknown_action_rejected_without_mutation() {
        let snapshot = ProjectSnapshot::new("Reducer Test");
        let action = EditAction {
            id: "edit_1".to_string(),
            action: "teleportElement".to_string(),
            data: serde_json::json!({}),
            timestamp: None,
            processed: false,
        };

        let result = apply_action(&snapshot, &action);
        assert!(matches!(result, Err(CoreError::UnknownAction(_))));
    }

    #[test]
    fn test_add_subtitle_lands_on_text_track() {
        let snapshot = ProjectSnapshot::new("Subtitles");
        let action = EditAction::new(
            ActionKind::AddSubtitle,
            serde_json::json!({ "text": "Hello", "startTime": 1.0, "duration": 2.0 }),
        );

        let next = apply_action(&snapshot, &action).unwrap();
        let track = next.get_track("text-track").unwrap();
        assert_eq!(track.elements.len(), 1);
        // Input untouched
        assert!(snapshot.get_track("text-track").unwrap().elements.is_empty());
    }

    #[test]
    fn test_add_multiple_subtitles_defaults_duration() {
        let snapshot = ProjectSnapshot::new("Batch");
        let action = EditAction::new(
            ActionKind::AddMultipleSubtitles,
            serde_json::json!({ "subtitles": [
                { "text": "one", "startTime": 0.0 },
                { "text": "two", "startTime": 3.0, "duration": 5.0 }
            ]}),
        );

        let next = apply_action(&snapshot, &action).unwrap();
        let track = next.get_track("text-track").unwrap();
        assert_eq!(track.elements.len(), 2);
        match (&track.elements[0], &track.elements[1]) {
            (Element::Text(a), Element::Text(b)) => {
                assert_eq!(a.duration, 3.0);
                assert_eq!(b.duration, 5.0);
            }
            other => panic!("Unexpected elements: {:?}", other),
        }
    }

    #[test]
    fn test_split_action_without_track_id() {
        let mut snapshot = ProjectSnapshot::new("Split Action");
        let element = MediaElement::new("asset_001", "a.mp4", 10.0);
        let element_id = element.id.clone();
        snapshot.tracks[0].elements.push(Element::Media(element));

        let action = EditAction::new(
            ActionKind::SplitElement,
            serde_json::json!({ "elementId": element_id, "splitTime": 4.0 }),
        );

        let next = apply_action(&snapshot, &action).unwrap();
        assert_eq!(next.get_track("main-track").unwrap().elements.len(), 2);
    }

    #[test]
    fn test_import_media_adds_asset_and_element() {
        let snapshot = ProjectSnapshot::new("Import");
        let action = EditAction::new(
            ActionKind::ImportMedia,
            serde_json::json!({ "filePath": "/media/clip.mp4", "duration": 7.5 }),
        );

        let next = apply_action(&snapshot, &action).unwrap();
        assert_eq!(next.assets.len(), 1);
        assert!(next.assets[0].is_linked);
        assert_eq!(next.assets[0].duration, Some(7.5));

        let track = next.get_track("main-track").unwrap();
        assert_eq!(track.elements.len(), 1);
        assert_eq!(
            track.elements[0].media_id(),
            Some(next.assets[0].id.as_str())
        );
    }

    #[test]
    fn test_import_audio_batch_places_items_sequentially() {
        let snapshot = ProjectSnapshot::new("Batch Import");
        let action = EditAction::new(
            ActionKind::ImportAudioBatch,
            serde_json::json!({ "files": [
                { "filePath": "/media/a.wav", "duration": 4.0 },
                { "filePath": "/media/b.wav", "duration": 2.5 },
            ]}),
        );

        let next = apply_action(&snapshot, &action).unwrap();
        assert_eq!(next.assets.len(), 2);
        assert!(next
            .assets
            .iter()
            .all(|a| a.kind == crate::timeline::MediaKind::Audio));

        let track = next.get_track("main-track").unwrap();
        assert_eq!(track.elements.len(), 2);
        // Second item starts where the first ends
        assert_eq!(track.elements[0].start_time(), 0.0);
        assert_eq!(track.elements[1].start_time(), 4.0);
    }

    #[test]
    fn test_import_audio_batch_requires_files_array() {
        let snapshot = ProjectSnapshot::new("Batch Import");
        let action = EditAction::new(
            ActionKind::ImportAudioBatch,
            serde_json::json!({ "filePath": "/media/a.wav" }),
        );

        let result = apply_action(&snapshot, &action);
        assert!(matches!(result, Err(CoreError::ValidationError(_))));
    }

    #[test]
    fn test_set_full_state_replaces_document() {
        let snapshot = ProjectSnapshot::new("Old");
        let replacement = ProjectSnapshot::new("New");
        let action = EditAction::new(
            ActionKind::SetFullState,
            serde_json::json!({ "snapshot": serde_json::to_value(&replacement).unwrap() }),
        );

        let next = apply_action(&snapshot, &action).unwrap();
        assert_eq!(next.project.name, "New");
    }

    #[test]
    fn test_update_snapshot_preserves_unknown_assets() {
        let mut snapshot = ProjectSnapshot::new("Merge");
        let kept = Asset::new_linked("kept.mp4", crate::timeline::MediaKind::Video, "/m/kept.mp4");
        let kept_id = kept.id.clone();
        snapshot.assets.push(kept);

        let incoming = ProjectSnapshot::new("Incoming");
        let action = EditAction::new(
            ActionKind::UpdateSnapshot,
            serde_json::json!({ "snapshot": serde_json::to_value(&incoming).unwrap() }),
        );

        let next = apply_action(&snapshot, &action).unwrap();
        assert_eq!(next.project.name, "Incoming");
        assert!(next.get_asset(&kept_id).is_some());
    }

    #[test]
    fn test_pending_log_read_missing_is_empty() {
        let dir = TempDir::new().unwrap();
        let log = PendingEditsLog::new(dir.path().join("pending-edits.json"));
        assert!(log.read().unwrap().is_empty());
        assert!(log.ids().unwrap().is_empty());
    }

    #[test]
    fn test_pending_log_append_and_ids() {
        let dir = TempDir::new().unwrap();
        let log = PendingEditsLog::new(dir.path().join("pending-edits.json"));

        let a = EditAction::new(ActionKind::ClearSubtitles, serde_json::json!({}));
        let b = EditAction::new(ActionKind::ClearSubtitles, serde_json::json!({}));
        log.append(&a).unwrap();
        log.append(&b).unwrap();

        let ids = log.ids().unwrap();
        assert_eq!(ids.len(), 2);
        assert!(ids.contains(&a.id));
        assert!(ids.contains(&b.id));
    }

    #[test]
    fn test_pending_log_truncates_to_newest() {
        let dir = TempDir::new().unwrap();
        let log = PendingEditsLog::new(dir.path().join("pending-edits.json"));

        let mut last_id = String::new();
        for _ in 0..(MAX_PENDING_EDITS + 10) {
            let action = EditAction::new(ActionKind::ClearSubtitles, serde_json::json!({}));
            last_id = action.id.clone();
            log.append(&action).unwrap();
        }

        let actions = log.read().unwrap();
        assert_eq!(actions.len(), MAX_PENDING_EDITS);
        assert_eq!(actions.last().unwrap().id, last_id);
    }

    #[test]
    fn test_pending_log_corrupt_file_is_transient() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("pending-edits.json");
        std::fs::write(&path, "[{ \"id\": \"truncated mid-wri").unwrap();

        let log = PendingEditsLog::new(&path);
        assert!(matches!(log.read(), Err(CoreError::TransientRead(_))));
    }

    #[test]
    fn test_mark_processed() {
        let dir = TempDir::new().unwrap();
        let log = PendingEditsLog::new(dir.path().join("pending-edits.json"));

        let action = EditAction::new(ActionKind::ClearSubtitles, serde_json::json!({}));
        log.append(&action).unwrap();

        assert!(log.mark_processed(&action.id).unwrap());
        assert!(!log.mark_processed("missing").unwrap());
        assert!(log.read().unwrap()[0].processed);
    }

    #[test]
    fn test_external_writer_wire_format_accepted() {
        // Entries written by the automation process carry extra fields and
        // free-form ids.
        let json = serde_json::json!([{
            "id": "edit_1723000000_abc123",
            "action": "removeElement",
            "data": { "elementId": "el_1" },
            "timestamp": "2026-08-01T00:00:00Z",
            "processed": false
        }]);

        let dir = TempDir::new().unwrap();
        let path = dir.path().join("pending-edits.json");
        std::fs::write(&path, serde_json::to_string(&json).unwrap()).unwrap();

        let actions = PendingEditsLog::new(&path).read().unwrap();
        assert_eq!(actions.len(), 1);
        assert_eq!(actions[0].kind(), Some(ActionKind::RemoveElement));
    }
}
