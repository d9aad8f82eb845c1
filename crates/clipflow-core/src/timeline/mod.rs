//! Timeline Domain Module
//!
//! Pure data model and invariant-preserving mutators for the shared project
//! document, plus keyframe interpolation for animated properties.

pub mod keyframes;
pub mod models;
pub mod ops;

pub use keyframes::{value_at, Easing, Keyframe};
pub use models::{
    Asset, Element, Marker, MediaElement, MediaKind, ProjectMeta, ProjectSnapshot, TextAlign,
    TextElement, Track, TrackKind,
};
