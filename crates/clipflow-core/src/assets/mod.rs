//! Asset Management Module
//!
//! Owned/linked asset resolution, thumbnail generation via the external
//! transcoder, and byte-range media streaming.

pub mod resolver;
pub mod serve;
pub mod thumbnail;

pub use resolver::{
    media_kind_for_path, mime_for_path, serve_url, AssetResolver, DeleteOutcome,
};
pub use serve::{parse_range, serve_file, ByteRange, MediaResponse};
pub use thumbnail::ThumbnailService;
