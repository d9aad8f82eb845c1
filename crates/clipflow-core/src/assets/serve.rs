//! Media Streaming
//!
//! Serves a local media file by absolute path with byte-range support so the
//! browser can scrub and seek, falling back to whole-file responses.
//! Transport-agnostic: the result is a status + headers + body triple the
//! hosting layer writes out verbatim.

use tokio::io::{AsyncReadExt, AsyncSeekExt};

use crate::{CoreError, CoreResult};

use super::resolver::mime_for_path;

/// A ready-to-write response for one media request
#[derive(Debug)]
pub struct MediaResponse {
    pub status: u16,
    pub headers: Vec<(String, String)>,
    pub body: Vec<u8>,
}

impl MediaResponse {
    fn error(err: &CoreError) -> Self {
        Self {
            status: err.status_code(),
            headers: vec![("Content-Type".to_string(), "application/json".to_string())],
            body: err.to_error_body().to_string().into_bytes(),
        }
    }
}

/// A parsed, clamped byte range
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ByteRange {
    pub start: u64,
    /// Inclusive end offset
    pub end: u64,
}

impl ByteRange {
    pub fn len(&self) -> u64 {
        self.end - self.start + 1
    }

    pub fn is_empty(&self) -> bool {
        self.end < self.start
    }
}

/// Parses a `bytes=start-end` header against the file length.
///
/// The end offset is optional and clamped to the last byte. Returns `None`
/// for anything unparseable (the caller then serves the whole file) and a
/// zero-length range is never produced.
pub fn parse_range(header: &str, file_len: u64) -> Option<ByteRange> {
    if file_len == 0 {
        return None;
    }
    let spec = header.trim().strip_prefix("bytes=")?;
    let (start_s, end_s) = spec.split_once('-')?;

    let start: u64 = start_s.trim().parse().ok()?;
    if start >= file_len {
        return None;
    }
    let end = match end_s.trim() {
        "" => file_len - 1,
        s => s.parse::<u64>().ok()?.min(file_len - 1),
    };
    if end < start {
        return None;
    }
    Some(ByteRange { start, end })
}

/// Serves a media file by absolute path.
///
/// - Non-absolute or URL-shaped paths: 400.
/// - Missing files: 404.
/// - With a valid `Range` header: 206 partial content.
/// - Otherwise: 200 with the whole file.
pub async fn serve_file(path: &str, range_header: Option<&str>) -> MediaResponse {
    match serve_file_inner(path, range_header).await {
        Ok(response) => response,
        Err(err) => MediaResponse::error(&err),
    }
}

async fn serve_file_inner(path: &str, range_header: Option<&str>) -> CoreResult<MediaResponse> {
    let path = crate::fs::validate_local_media_path(path, "path")
        .map_err(CoreError::ValidationError)?;

    let metadata = tokio::fs::metadata(&path)
        .await
        .map_err(|_| CoreError::FileNotFound(path.display().to_string()))?;
    if !metadata.is_file() {
        return Err(CoreError::FileNotFound(path.display().to_string()));
    }
    let file_len = metadata.len();
    let content_type = mime_for_path(&path.to_string_lossy()).to_string();

    if let Some(range) = range_header.and_then(|h| parse_range(h, file_len)) {
        let mut file = tokio::fs::File::open(&path).await?;
        file.seek(std::io::SeekFrom::Start(range.start)).await?;

        let mut body = vec![0u8; range.len() as usize];
        file.read_exact(&mut body).await?;

        return Ok(MediaResponse {
            status: 206,
            headers: vec![
                ("Content-Type".to_string(), content_type),
                (
                    "Content-Range".to_string(),
                    format!("bytes {}-{}/{}", range.start, range.end, file_len),
                ),
                ("Accept-Ranges".to_string(), "bytes".to_string()),
                ("Content-Length".to_string(), range.len().to_string()),
            ],
            body,
        });
    }

    let body = tokio::fs::read(&path).await?;
    Ok(MediaResponse {
        status: 200,
        headers: vec![
            ("Content-Type".to_string(), content_type),
            ("Accept-Ranges".to_string(), "bytes".to_string()),
            ("Content-Length".to_string(), body.len().to_string()),
        ],
        body,
    })
}

// =============================================================================
// Tests
// =============================================================================
