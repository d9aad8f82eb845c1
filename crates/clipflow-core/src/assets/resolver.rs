//! Media Asset Resolver
//!
//! Maps an asset record to a physical file (owned copy vs. linked external),
//! a streaming URL, and a thumbnail, and implements the deletion semantics:
//! a linked asset's external original is never touched.

use std::path::Path;

use tracing::{debug, warn};

use crate::timeline::{MediaKind, ProjectSnapshot};
use crate::{AssetId, CoreError, CoreResult};

use super::thumbnail::ThumbnailService;

// =============================================================================
// MIME / Kind Mapping
// =============================================================================

/// MIME type for a file path, by extension
pub fn mime_for_path(path: &str) -> &'static str {
    let ext = Path::new(path)
        .extension()
        .and_then(|e| e.to_str())
        .unwrap_or("")
        .to_ascii_lowercase();
    match ext.as_str() {
        "mp4" => "video/mp4",
        "webm" => "video/webm",
        "mov" => "video/quicktime",
        "avi" => "video/x-msvideo",
        "mkv" => "video/x-matroska",
        "mp3" => "audio/mpeg",
        "wav" => "audio/wav",
        "ogg" => "audio/ogg",
        "aac" => "audio/aac",
        "m4a" => "audio/mp4",
        "flac" => "audio/flac",
        "jpg" | "jpeg" => "image/jpeg",
        "png" => "image/png",
        "gif" => "image/gif",
        "webp" => "image/webp",
        "bmp" => "image/bmp",
        "svg" => "image/svg+xml",
        _ => "application/octet-stream",
    }
}

/// Media kind inferred from a file path's MIME type
pub fn media_kind_for_path(path: &str) -> MediaKind {
    let mime = mime_for_path(path);
    if mime.starts_with("audio/") {
        MediaKind::Audio
    } else if mime.starts_with("image/") {
        MediaKind::Image
    } else {
        MediaKind::Video
    }
}

/// Streaming URL the browser uses to play a local file
pub fn serve_url(file_path: &str) -> String {
    format!("/api/media/serve?path={}", percent_encode(file_path))
}

/// Percent-encodes a query component (RFC 3986 unreserved set kept)
fn percent_encode(value: &str) -> String {
    let mut out = String::with_capacity(value.len());
    for byte in value.bytes() {
        match byte {
            b'A'..=b'Z' | b'a'..=b'z' | b'0'..=b'9' | b'-' | b'_' | b'.' | b'~' => {
                out.push(byte as char)
            }
            _ => out.push_str(&format!("%{:02X}", byte)),
        }
    }
    out
}

// =============================================================================
// Deletion
// =============================================================================

/// What a delete actually removed
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DeleteOutcome {
    pub removed_entry: bool,
    pub removed_file: bool,
    pub removed_thumbnail: bool,
    /// Elements referencing the asset stripped from tracks
    pub removed_elements: usize,
}

/// Resolves asset records against the project's storage area
pub struct AssetResolver {
    /// The project's own asset directory; files under it are owned
    project_dir: std::path::PathBuf,
    thumbnails: ThumbnailService,
}

impl AssetResolver {
    pub fn new(project_dir: impl Into<std::path::PathBuf>, thumbnails: ThumbnailService) -> Self {
        Self {
            project_dir: project_dir.into(),
            thumbnails,
        }
    }

    pub fn thumbnails(&self) -> &ThumbnailService {
        &self.thumbnails
    }

    /// An asset is linked when its file lives outside the project directory
    /// (or carries the explicit flag).
    pub fn is_linked(&self, asset: &crate::timeline::Asset) -> bool {
        if asset.is_linked {
            return true;
        }
        match &asset.file_path {
            Some(path) => !Path::new(path).starts_with(&self.project_dir),
            None => true,
        }
    }

    /// Deletes an asset from the snapshot.
    ///
    /// - Registry entry: always removed.
    /// - Referencing media elements: always stripped from every track.
    /// - Thumbnail: always deleted.
    /// - Physical file: deleted only for owned assets; a linked external
    ///   original is never touched.
    pub fn delete_asset(
        &self,
        snapshot: &mut ProjectSnapshot,
        asset_id: &AssetId,
    ) -> CoreResult<DeleteOutcome> {
        let pos = snapshot
            .assets
            .iter()
            .position(|a| &a.id == asset_id)
            .ok_or_else(|| CoreError::AssetNotFound(asset_id.clone()))?;
        let asset = snapshot.assets.remove(pos);

        let mut outcome = DeleteOutcome {
            removed_entry: true,
            ..Default::default()
        };

        // Strip referencing elements from all tracks
        for track in &mut snapshot.tracks {
            let before = track.elements.len();
            track
                .elements
                .retain(|e| e.media_id() != Some(asset_id.as_str()));
            outcome.removed_elements += before - track.elements.len();
        }

        if !self.is_linked(&asset) {
            if let Some(path) = &asset.file_path {
                match std::fs::remove_file(path) {
                    Ok(()) => outcome.removed_file = true,
                    Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                        debug!(path = %path, "Owned asset file already gone");
                    }
                    Err(e) => {
                        warn!(error = %e, path = %path, "Failed to delete owned asset file");
                    }
                }
            }
        }

        outcome.removed_thumbnail = self.thumbnails.delete_thumbnail(asset_id)?;
        Ok(outcome)
    }
}

// =============================================================================
// Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::timeline::{Asset, Element, MediaElement};
    use tempfile::TempDir;

    fn resolver_for(dir: &TempDir) -> AssetResolver {
        let thumbnails = ThumbnailService::new(dir.path().join("assets").join("_thumbnails"));
        AssetResolver::new(dir.path(), thumbnails)
    }

    fn snapshot_with_asset(asset: Asset) -> (ProjectSnapshot, String) {
        let mut snapshot = ProjectSnapshot::new("Resolver Test");
        let id = asset.id.clone();
        let mut element = MediaElement::new(&id, &asset.name, 5.0);
        element.media_id = id.clone();
        snapshot.tracks[0].elements.push(Element::Media(element));
        snapshot.assets.push(asset);
        (snapshot, id)
    }

    #[test]
    fn test_mime_for_path() {
        assert_eq!(mime_for_path("/a/b.mp4"), "video/mp4");
        assert_eq!(mime_for_path("/a/b.MP3"), "audio/mpeg");
        assert_eq!(mime_for_path("/a/b.jpeg"), "image/jpeg");
        assert_eq!(mime_for_path("/a/b.unknown"), "application/octet-stream");
        assert_eq!(mime_for_path("noext"), "application/octet-stream");
    }

    #[test]
    fn test_media_kind_for_path() {
        assert_eq!(media_kind_for_path("/x.wav"), MediaKind::Audio);
        assert_eq!(media_kind_for_path("/x.png"), MediaKind::Image);
        assert_eq!(media_kind_for_path("/x.mkv"), MediaKind::Video);
    }

    #[test]
    fn test_serve_url_encodes_path() {
        let url = serve_url("/media/my clip.mp4");
        assert_eq!(url, "/api/media/serve?path=%2Fmedia%2Fmy%20clip.mp4");
    }

    #[test]
    fn test_deleting_linked_asset_keeps_external_file() {
        let project = TempDir::new().unwrap();
        let external = TempDir::new().unwrap();
        let resolver = resolver_for(&project);

        let external_file = external.path().join("original.mp4");
        std::fs::write(&external_file, b"media").unwrap();

        let asset = Asset::new_linked(
            "original.mp4",
            MediaKind::Video,
            external_file.to_str().unwrap(),
        );
        let (mut snapshot, asset_id) = snapshot_with_asset(asset);

        // Give the asset a thumbnail on disk
        let thumb = resolver.thumbnails.thumbnail_path(&asset_id).unwrap();
        std::fs::create_dir_all(thumb.parent().unwrap()).unwrap();
        std::fs::write(&thumb, b"jpg").unwrap();

        let outcome = resolver.delete_asset(&mut snapshot, &asset_id).unwrap();

        assert!(outcome.removed_entry);
        assert!(!outcome.removed_file);
        assert!(outcome.removed_thumbnail);
        assert_eq!(outcome.removed_elements, 1);

        assert!(external_file.exists(), "linked original must survive");
        assert!(!thumb.exists());
        assert!(snapshot.get_asset(&asset_id).is_none());
        assert!(snapshot.tracks[0].elements.is_empty());
    }

    #[test]
    fn test_deleting_owned_asset_removes_file() {
        let project = TempDir::new().unwrap();
        let resolver = resolver_for(&project);

        let owned_file = project.path().join("assets").join("owned.mp4");
        std::fs::create_dir_all(owned_file.parent().unwrap()).unwrap();
        std::fs::write(&owned_file, b"media").unwrap();

        let mut asset = Asset::new_linked(
            "owned.mp4",
            MediaKind::Video,
            owned_file.to_str().unwrap(),
        );
        asset.is_linked = false;
        let (mut snapshot, asset_id) = snapshot_with_asset(asset);

        let outcome = resolver.delete_asset(&mut snapshot, &asset_id).unwrap();

        assert!(outcome.removed_file);
        assert!(!owned_file.exists());
    }

    #[test]
    fn test_delete_missing_asset_is_not_found() {
        let project = TempDir::new().unwrap();
        let resolver = resolver_for(&project);
        let mut snapshot = ProjectSnapshot::new("Missing");

        let result = resolver.delete_asset(&mut snapshot, &"nope".to_string());
        assert!(matches!(result, Err(CoreError::AssetNotFound(_))));
    }

    #[test]
    fn test_is_linked_by_location() {
        let project = TempDir::new().unwrap();
        let resolver = resolver_for(&project);

        let inside = project.path().join("assets").join("a.mp4");
        let mut owned = Asset::new_linked("a.mp4", MediaKind::Video, inside.to_str().unwrap());
        owned.is_linked = false;
        assert!(!resolver.is_linked(&owned));

        let mut outside = Asset::new_linked("b.mp4", MediaKind::Video, "/elsewhere/b.mp4");
        outside.is_linked = false;
        assert!(resolver.is_linked(&outside));

        let mut pathless = Asset::new_linked("c.mp4", MediaKind::Video, "/x/c.mp4");
        pathless.file_path = None;
        pathless.is_linked = false;
        assert!(resolver.is_linked(&pathless));
    }
}
