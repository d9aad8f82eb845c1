//! Timeline Model Definitions
//!
//! Defines the persisted project document: tracks, elements, markers, and
//! the asset registry. The same document is shared on disk between the
//! browser client, the backend, and external automation writers, so every
//! type serializes with the wire field names (`camelCase`, tagged unions).

use serde::{Deserialize, Serialize};

use crate::{AssetId, CanvasSize, ElementId, Frame, MarkerId, ProjectId, TimeSec, TrackId};

// =============================================================================
// Project Metadata
// =============================================================================

/// Project-level metadata stored in the snapshot document
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProjectMeta {
    pub id: ProjectId,
    pub name: String,
    /// Frame rate (frames per second)
    pub fps: f64,
    pub canvas_size: CanvasSize,
    /// Background color as a CSS color string (e.g. "#000000")
    pub background_color: String,
    pub created_at: String,
    pub updated_at: String,
}

impl ProjectMeta {
    /// Creates metadata for a new project
    pub fn new(name: &str) -> Self {
        let now = chrono::Utc::now().to_rfc3339();
        Self {
            id: ulid::Ulid::new().to_string(),
            name: name.to_string(),
            fps: 30.0,
            canvas_size: CanvasSize::default(),
            background_color: "#000000".to_string(),
            created_at: now.clone(),
            updated_at: now,
        }
    }
}

// =============================================================================
// Marker
// =============================================================================

/// Timeline marker. Markers are addressed by `(trackId, markerId)` pairs;
/// multiple markers may share the same time.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Marker {
    pub id: MarkerId,
    /// Time position in seconds
    pub time: TimeSec,
}

impl Marker {
    pub fn new(time: TimeSec) -> Self {
        Self {
            id: ulid::Ulid::new().to_string(),
            time,
        }
    }
}

// =============================================================================
// Element
// =============================================================================

/// Media element: a placed slice of an asset.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MediaElement {
    pub id: ElementId,
    /// Referenced asset id
    pub media_id: AssetId,
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub thumbnail_url: Option<String>,
    /// Start time on the timeline (seconds)
    pub start_time: TimeSec,
    /// Native asset length (seconds), NOT the on-timeline length
    pub duration: TimeSec,
    /// Seconds clipped from the head of the asset
    #[serde(default)]
    pub trim_start: TimeSec,
    /// Seconds clipped from the tail of the asset
    #[serde(default)]
    pub trim_end: TimeSec,
    #[serde(default = "default_center_x")]
    pub x: f64,
    #[serde(default = "default_center_y")]
    pub y: f64,
    #[serde(default)]
    pub width: Option<f64>,
    #[serde(default)]
    pub height: Option<f64>,
    #[serde(default = "default_one")]
    pub scale: f64,
    #[serde(default)]
    pub rotation: f64,
    #[serde(default = "default_one")]
    pub opacity: f64,
    #[serde(default = "default_one")]
    pub volume: f64,
    #[serde(default)]
    pub muted: bool,
}

impl MediaElement {
    /// Creates a media element covering the asset's full native length
    pub fn new(media_id: &str, name: &str, duration: TimeSec) -> Self {
        Self {
            id: crate::new_element_id(),
            media_id: media_id.to_string(),
            name: name.to_string(),
            thumbnail_url: None,
            start_time: 0.0,
            duration,
            trim_start: 0.0,
            trim_end: 0.0,
            x: default_center_x(),
            y: default_center_y(),
            width: None,
            height: None,
            scale: 1.0,
            rotation: 0.0,
            opacity: 1.0,
            volume: 1.0,
            muted: false,
        }
    }

    /// Places the element at the given timeline position (builder style)
    pub fn place_at(mut self, start_time: TimeSec) -> Self {
        self.start_time = start_time;
        self
    }

    /// On-timeline length after trims are subtracted from the native duration.
    /// Invariant: must stay > 0 after every mutator.
    pub fn visible_duration(&self) -> TimeSec {
        self.duration - self.trim_start - self.trim_end
    }

    /// End time on the timeline
    pub fn end_time(&self) -> TimeSec {
        self.start_time + self.visible_duration()
    }
}

/// Text alignment options for text elements
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum TextAlign {
    Left,
    Center,
    Right,
}

/// Text element: on-screen text/subtitle.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TextElement {
    pub id: ElementId,
    pub content: String,
    pub start_time: TimeSec,
    pub duration: TimeSec,
    #[serde(default = "default_text_x")]
    pub x: f64,
    #[serde(default = "default_text_y")]
    pub y: f64,
    #[serde(default = "default_font_size")]
    pub font_size: f64,
    #[serde(default = "default_font_family")]
    pub font_family: String,
    #[serde(default = "default_text_color")]
    pub color: String,
    #[serde(default = "default_text_background")]
    pub background_color: String,
    #[serde(default = "default_text_align")]
    pub text_align: TextAlign,
    #[serde(default = "default_font_weight")]
    pub font_weight: String,
    #[serde(default = "default_font_style")]
    pub font_style: String,
    #[serde(default = "default_one")]
    pub opacity: f64,
}

impl TextElement {
    /// Creates a text element with the standard subtitle styling
    pub fn new(content: &str, start_time: TimeSec, duration: TimeSec) -> Self {
        Self {
            id: crate::new_element_id(),
            content: content.to_string(),
            start_time,
            duration,
            x: default_text_x(),
            y: default_text_y(),
            font_size: default_font_size(),
            font_family: default_font_family(),
            color: default_text_color(),
            background_color: default_text_background(),
            text_align: default_text_align(),
            font_weight: default_font_weight(),
            font_style: default_font_style(),
            opacity: 1.0,
        }
    }

    /// End time on the timeline
    pub fn end_time(&self) -> TimeSec {
        self.start_time + self.duration
    }
}

fn default_one() -> f64 {
    1.0
}
fn default_center_x() -> f64 {
    960.0
}
fn default_center_y() -> f64 {
    540.0
}
fn default_text_x() -> f64 {
    960.0
}
fn default_text_y() -> f64 {
    900.0
}
fn default_font_size() -> f64 {
    48.0
}
fn default_font_family() -> String {
    "Arial".to_string()
}
fn default_text_color() -> String {
    "#FFFFFF".to_string()
}
fn default_text_background() -> String {
    "rgba(0,0,0,0.7)".to_string()
}
fn default_text_align() -> TextAlign {
    TextAlign::Center
}
fn default_font_weight() -> String {
    "normal".to_string()
}
fn default_font_style() -> String {
    "normal".to_string()
}

/// Timeline element (tagged union on the wire: `"type": "media" | "text"`)
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "camelCase")]
pub enum Element {
    Media(MediaElement),
    Text(TextElement),
}

impl Element {
    pub fn id(&self) -> &str {
        match self {
            Element::Media(e) => &e.id,
            Element::Text(e) => &e.id,
        }
    }

    pub fn start_time(&self) -> TimeSec {
        match self {
            Element::Media(e) => e.start_time,
            Element::Text(e) => e.start_time,
        }
    }

    pub fn set_start_time(&mut self, start_time: TimeSec) {
        match self {
            Element::Media(e) => e.start_time = start_time,
            Element::Text(e) => e.start_time = start_time,
        }
    }

    /// On-timeline end of the element (start + visible length)
    pub fn end_time(&self) -> TimeSec {
        match self {
            Element::Media(e) => e.end_time(),
            Element::Text(e) => e.end_time(),
        }
    }

    /// Referenced asset id, if this element plays media
    pub fn media_id(&self) -> Option<&str> {
        match self {
            Element::Media(e) => Some(&e.media_id),
            Element::Text(_) => None,
        }
    }
}

// =============================================================================
// Track
// =============================================================================

/// Track kind enumeration
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum TrackKind {
    Media,
    Audio,
    Text,
}

/// Track (contains elements and markers directly).
///
/// Track order is render z-order: index 0 is rendered topmost, so the
/// composition reverses the list at render time.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Track {
    pub id: TrackId,
    pub name: String,
    #[serde(rename = "type")]
    pub kind: TrackKind,
    #[serde(default)]
    pub muted: bool,
    /// The default media track new imports land on
    #[serde(default)]
    pub is_main: bool,
    #[serde(default)]
    pub markers: Vec<Marker>,
    #[serde(default)]
    pub elements: Vec<Element>,
}

impl Track {
    /// Creates a new track with the given name and kind
    pub fn new(id: &str, name: &str, kind: TrackKind) -> Self {
        Self {
            id: id.to_string(),
            name: name.to_string(),
            kind,
            muted: false,
            is_main: false,
            markers: vec![],
            elements: vec![],
        }
    }

    /// Gets an element by ID
    pub fn get_element(&self, element_id: &str) -> Option<&Element> {
        self.elements.iter().find(|e| e.id() == element_id)
    }

    /// Gets a mutable element by ID
    pub fn get_element_mut(&mut self, element_id: &str) -> Option<&mut Element> {
        self.elements.iter_mut().find(|e| e.id() == element_id)
    }

    /// Removes an element by ID
    pub fn remove_element(&mut self, element_id: &str) -> Option<Element> {
        if let Some(pos) = self.elements.iter().position(|e| e.id() == element_id) {
            Some(self.elements.remove(pos))
        } else {
            None
        }
    }

    /// Returns true if any element on this track has the given id
    pub fn has_element(&self, element_id: &str) -> bool {
        self.elements.iter().any(|e| e.id() == element_id)
    }
}

// =============================================================================
// Asset
// =============================================================================

/// Media kind enumeration
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum MediaKind {
    Video,
    Audio,
    Image,
}

/// Asset registry record.
///
/// `is_linked` assets reference a file outside the project's own storage;
/// project operations never delete the external original.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Asset {
    pub id: AssetId,
    pub name: String,
    #[serde(rename = "type")]
    pub kind: MediaKind,
    /// Streaming URL the browser uses for playback
    pub url: String,
    /// Absolute path on the local filesystem, when known
    #[serde(default)]
    pub file_path: Option<String>,
    #[serde(default)]
    pub is_linked: bool,
    #[serde(default)]
    pub thumbnail_url: Option<String>,
    #[serde(default)]
    pub width: Option<u32>,
    #[serde(default)]
    pub height: Option<u32>,
    #[serde(default)]
    pub duration: Option<TimeSec>,
}

impl Asset {
    /// Creates a linked asset pointing at an external file
    pub fn new_linked(name: &str, kind: MediaKind, file_path: &str) -> Self {
        Self {
            id: ulid::Ulid::new().to_string(),
            name: name.to_string(),
            kind,
            url: crate::assets::serve_url(file_path),
            file_path: Some(file_path.to_string()),
            is_linked: true,
            thumbnail_url: None,
            width: None,
            height: None,
            duration: None,
        }
    }
}

// =============================================================================
// Project Snapshot
// =============================================================================

/// The single persisted document: project metadata, tracks, and the asset
/// registry. This is the shared source of truth on disk.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProjectSnapshot {
    pub project: ProjectMeta,
    #[serde(default)]
    pub tracks: Vec<Track>,
    #[serde(default)]
    pub assets: Vec<Asset>,
}

impl ProjectSnapshot {
    /// Creates the default document for a fresh project: main media track,
    /// text track, audio track.
    pub fn new(name: &str) -> Self {
        let mut main_track = Track::new("main-track", "Main Track", TrackKind::Media);
        main_track.is_main = true;

        Self {
            project: ProjectMeta::new(name),
            tracks: vec![
                main_track,
                Track::new("text-track", "Text Track", TrackKind::Text),
                Track::new("audio-track", "Audio Track", TrackKind::Audio),
            ],
            assets: vec![],
        }
    }

    /// Gets a track by ID
    pub fn get_track(&self, track_id: &str) -> Option<&Track> {
        self.tracks.iter().find(|t| t.id == track_id)
    }

    /// Gets a mutable track by ID
    pub fn get_track_mut(&mut self, track_id: &str) -> Option<&mut Track> {
        self.tracks.iter_mut().find(|t| t.id == track_id)
    }

    /// Finds the track holding the given element
    pub fn find_element_track(&self, element_id: &str) -> Option<&Track> {
        self.tracks.iter().find(|t| t.has_element(element_id))
    }

    /// The default media track new imports land on (falls back to the first
    /// media track)
    pub fn main_track_mut(&mut self) -> Option<&mut Track> {
        if let Some(pos) = self.tracks.iter().position(|t| t.is_main) {
            return self.tracks.get_mut(pos);
        }
        self.tracks
            .iter_mut()
            .find(|t| t.kind == TrackKind::Media)
    }

    /// Gets an asset by ID
    pub fn get_asset(&self, asset_id: &str) -> Option<&Asset> {
        self.assets.iter().find(|a| a.id == asset_id)
    }

    /// Total timeline duration: the maximum element end time across all tracks
    pub fn duration(&self) -> TimeSec {
        self.tracks
            .iter()
            .flat_map(|t| t.elements.iter())
            .map(|e| e.end_time())
            .fold(0.0, f64::max)
    }

    /// Total output length in frames, rounded up
    pub fn duration_in_frames(&self, fps: f64) -> Frame {
        (self.duration() * fps).ceil() as Frame
    }
}

// =============================================================================
// Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_new_snapshot_has_default_tracks() {
        let snapshot = ProjectSnapshot::new("Test Project");

        assert_eq!(snapshot.tracks.len(), 3);
        assert_eq!(snapshot.tracks[0].kind, TrackKind::Media);
        assert!(snapshot.tracks[0].is_main);
        assert_eq!(snapshot.tracks[1].kind, TrackKind::Text);
        assert_eq!(snapshot.tracks[2].kind, TrackKind::Audio);
        assert_eq!(snapshot.project.fps, 30.0);
        assert_eq!(snapshot.project.background_color, "#000000");
        assert_eq!(snapshot.project.canvas_size, CanvasSize::new(1920, 1080));
    }

    #[test]
    fn test_visible_duration() {
        let mut element = MediaElement::new("asset_001", "clip.mp4", 10.0);
        element.trim_start = 1.5;
        element.trim_end = 2.5;

        assert!((element.visible_duration() - 6.0).abs() < 1e-9);
        assert!((element.end_time() - 6.0).abs() < 1e-9);
    }

    #[test]
    fn test_snapshot_duration_is_max_end_time() {
        let mut snapshot = ProjectSnapshot::new("Duration Test");

        let media = MediaElement::new("asset_001", "a.mp4", 10.0).place_at(2.0);
        snapshot.tracks[0].elements.push(Element::Media(media));

        let text = TextElement::new("Hello", 5.0, 4.0);
        snapshot.tracks[1].elements.push(Element::Text(text));

        // Media ends at 12.0, text at 9.0
        assert!((snapshot.duration() - 12.0).abs() < 1e-9);
        assert_eq!(snapshot.duration_in_frames(30.0), 360);
    }

    #[test]
    fn test_duration_in_frames_rounds_up() {
        let mut snapshot = ProjectSnapshot::new("Rounding");
        let media = MediaElement::new("asset_001", "a.mp4", 1.01);
        snapshot.tracks[0].elements.push(Element::Media(media));

        assert_eq!(snapshot.duration_in_frames(30.0), 31);
    }

    #[test]
    fn test_element_tagged_serialization() {
        let media = Element::Media(MediaElement::new("asset_001", "a.mp4", 5.0));
        let json = serde_json::to_value(&media).unwrap();
        assert_eq!(json["type"], "media");
        assert_eq!(json["mediaId"], "asset_001");
        assert_eq!(json["trimStart"], 0.0);

        let text = Element::Text(TextElement::new("Hi", 0.0, 5.0));
        let json = serde_json::to_value(&text).unwrap();
        assert_eq!(json["type"], "text");
        assert_eq!(json["fontFamily"], "Arial");
        assert_eq!(json["backgroundColor"], "rgba(0,0,0,0.7)");
        assert_eq!(json["textAlign"], "center");
    }

    #[test]
    fn test_element_deserializes_with_defaults() {
        // Minimal wire form an external writer might produce
        let json = serde_json::json!({
            "type": "media",
            "id": "el_1",
            "mediaId": "asset_001",
            "startTime": 0.0,
            "duration": 8.0
        });

        let element: Element = serde_json::from_value(json).unwrap();
        match element {
            Element::Media(e) => {
                assert_eq!(e.trim_start, 0.0);
                assert_eq!(e.scale, 1.0);
                assert_eq!(e.volume, 1.0);
                assert!(!e.muted);
            }
            other => panic!("Unexpected element: {:?}", other),
        }
    }

    #[test]
    fn test_track_serializes_kind_as_type() {
        let track = Track::new("main-track", "Main", TrackKind::Media);
        let json = serde_json::to_value(&track).unwrap();
        assert_eq!(json["type"], "media");
    }

    #[test]
    fn test_track_element_lookup() {
        let mut track = Track::new("t1", "Track 1", TrackKind::Media);
        let element = MediaElement::new("asset_001", "a.mp4", 5.0);
        let id = element.id.clone();
        track.elements.push(Element::Media(element));

        assert!(track.has_element(&id));
        assert!(track.get_element(&id).is_some());
        assert!(track.remove_element(&id).is_some());
        assert!(!track.has_element(&id));
    }

    #[test]
    fn test_linked_asset() {
        let asset = Asset::new_linked("clip.mp4", MediaKind::Video, "/media/clip.mp4");
        assert!(asset.is_linked);
        assert_eq!(asset.file_path.as_deref(), Some("/media/clip.mp4"));
        assert!(asset.url.contains("path="));
    }
}
