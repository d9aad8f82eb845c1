//! Timeline Mutators
//!
//! Pure mutation functions over the snapshot document. Every mutator either
//! preserves the model invariants or fails with a `ValidationError` and
//! leaves the snapshot untouched: no partial application, no I/O.

use crate::{CoreError, CoreResult, TimeSec};

use super::models::{Element, MediaElement, ProjectSnapshot, TextElement, TrackKind};

const MIN_VISIBLE_DURATION: TimeSec = 1e-6;

// =============================================================================
// Validation
// =============================================================================

/// Checks the element-level invariants: non-negative trims and a positive
/// visible duration.
pub fn validate_element(element: &Element) -> CoreResult<()> {
    match element {
        Element::Media(e) => {
            if e.trim_start < 0.0 || e.trim_end < 0.0 {
                return Err(CoreError::ValidationError(format!(
                    "element {}: trims must be non-negative (trimStart={}, trimEnd={})",
                    e.id, e.trim_start, e.trim_end
                )));
            }
            if e.visible_duration() < MIN_VISIBLE_DURATION {
                return Err(CoreError::ValidationError(format!(
                    "element {}: trims consume the entire duration ({}s - {}s - {}s <= 0)",
                    e.id, e.duration, e.trim_start, e.trim_end
                )));
            }
        }
        Element::Text(e) => {
            if e.duration < MIN_VISIBLE_DURATION {
                return Err(CoreError::ValidationError(format!(
                    "element {}: duration must be positive",
                    e.id
                )));
            }
        }
    }
    Ok(())
}

// =============================================================================
// Element Mutators
// =============================================================================

/// Adds an element to a track. Fails if the track is missing, the element id
/// already exists on that track, or the element violates the invariants.
pub fn add_element(
    snapshot: &mut ProjectSnapshot,
    track_id: &str,
    element: Element,
) -> CoreResult<()> {
    validate_element(&element)?;

    let track = snapshot
        .get_track_mut(track_id)
        .ok_or_else(|| CoreError::TrackNotFound(track_id.to_string()))?;

    if track.has_element(element.id()) {
        return Err(CoreError::ValidationError(format!(
            "duplicate element id {} on track {}",
            element.id(),
            track_id
        )));
    }

    track.elements.push(element);
    Ok(())
}

/// Removes an element by id from every track. Returns whether anything was
/// removed.
pub fn remove_element(snapshot: &mut ProjectSnapshot, element_id: &str) -> bool {
    let mut removed = false;
    for track in &mut snapshot.tracks {
        if track.remove_element(element_id).is_some() {
            removed = true;
        }
    }
    removed
}

/// Merges a JSON field patch into an element and re-validates.
///
/// The patch is a shallow object merge over the element's wire form; the
/// `id` and `type` fields are never overwritten. On validation failure the
/// element is left unchanged.
pub fn update_element(
    snapshot: &mut ProjectSnapshot,
    element_id: &str,
    patch: &serde_json::Value,
) -> CoreResult<()> {
    let patch_obj = patch
        .as_object()
        .ok_or_else(|| CoreError::ValidationError("element patch must be an object".to_string()))?;

    for track in &mut snapshot.tracks {
        if let Some(element) = track.get_element_mut(element_id) {
            let mut value = serde_json::to_value(&*element)?;
            let obj = value
                .as_object_mut()
                .ok_or_else(|| CoreError::Internal("element did not serialize to an object".to_string()))?;

            for (key, field) in patch_obj {
                if key == "id" || key == "type" {
                    continue;
                }
                obj.insert(key.clone(), field.clone());
            }

            let updated: Element = serde_json::from_value(value)?;
            validate_element(&updated)?;
            *element = updated;
            return Ok(());
        }
    }

    Err(CoreError::ElementNotFound(element_id.to_string()))
}

/// Splits an element at `split_time` (timeline seconds) into two elements
/// whose visible spans are contiguous.
///
/// For media elements the trims are recomputed so the two parts play exactly
/// the source ranges the original covered; duration is never mutated
/// directly.
pub fn split_element(
    snapshot: &mut ProjectSnapshot,
    track_id: &str,
    element_id: &str,
    split_time: TimeSec,
) -> CoreResult<()> {
    let track = snapshot
        .get_track_mut(track_id)
        .ok_or_else(|| CoreError::TrackNotFound(track_id.to_string()))?;

    let element = track
        .get_element(element_id)
        .ok_or_else(|| CoreError::ElementNotFound(element_id.to_string()))?
        .clone();

    let start = element.start_time();
    let end = element.end_time();
    if split_time <= start + MIN_VISIBLE_DURATION || split_time >= end - MIN_VISIBLE_DURATION {
        return Err(CoreError::InvalidSplitPoint(split_time));
    }
    let offset = split_time - start;

    let second = match &element {
        Element::Media(e) => {
            let mut first = e.clone();
            let mut second = e.clone();
            second.id = crate::new_element_id();

            // First part ends at the split point; second resumes the source
            // exactly where the first stopped.
            first.trim_end = e.duration - e.trim_start - offset;
            second.start_time = split_time;
            second.trim_start = e.trim_start + offset;

            let first = Element::Media(first);
            let second = Element::Media(second);
            validate_element(&first)?;
            validate_element(&second)?;

            if let Some(slot) = track.get_element_mut(element_id) {
                *slot = first;
            }
            second
        }
        Element::Text(e) => {
            let mut first = e.clone();
            let mut second = e.clone();
            second.id = crate::new_element_id();

            first.duration = offset;
            second.start_time = split_time;
            second.duration = e.duration - offset;

            let first = Element::Text(first);
            let second = Element::Text(second);
            validate_element(&first)?;
            validate_element(&second)?;

            if let Some(slot) = track.get_element_mut(element_id) {
                *slot = first;
            }
            second
        }
    };

    track.elements.push(second);
    Ok(())
}

/// Moves an element on the timeline: absolute `start_time` wins over
/// relative `delta` (clamped at 0), and `to_track_id` relocates the element
/// to another track.
pub fn move_element(
    snapshot: &mut ProjectSnapshot,
    element_id: &str,
    to_track_id: Option<&str>,
    start_time: Option<TimeSec>,
    delta: Option<TimeSec>,
) -> CoreResult<()> {
    let source_track_id = snapshot
        .find_element_track(element_id)
        .map(|t| t.id.clone())
        .ok_or_else(|| CoreError::ElementNotFound(element_id.to_string()))?;

    let current_start = snapshot
        .get_track(&source_track_id)
        .and_then(|t| t.get_element(element_id))
        .map(|e| e.start_time())
        .unwrap_or(0.0);

    let next_start = match (start_time, delta) {
        (Some(abs), _) => abs.max(0.0),
        (None, Some(d)) => (current_start + d).max(0.0),
        (None, None) => current_start,
    };

    match to_track_id {
        Some(target_id) if target_id != source_track_id => {
            if snapshot.get_track(target_id).is_none() {
                return Err(CoreError::TrackNotFound(target_id.to_string()));
            }
            if snapshot
                .get_track(target_id)
                .is_some_and(|t| t.has_element(element_id))
            {
                return Err(CoreError::ValidationError(format!(
                    "duplicate element id {} on track {}",
                    element_id, target_id
                )));
            }

            let mut element = snapshot
                .get_track_mut(&source_track_id)
                .and_then(|t| t.remove_element(element_id))
                .ok_or_else(|| CoreError::ElementNotFound(element_id.to_string()))?;
            element.set_start_time(next_start);

            // Target existence was checked above.
            if let Some(target) = snapshot.get_track_mut(target_id) {
                target.elements.push(element);
            }
        }
        _ => {
            if let Some(element) = snapshot
                .get_track_mut(&source_track_id)
                .and_then(|t| t.get_element_mut(element_id))
            {
                element.set_start_time(next_start);
            }
        }
    }

    Ok(())
}

/// Adjusts a media element's trims in place, preserving the positive
/// visible-duration invariant.
pub fn trim_element(
    snapshot: &mut ProjectSnapshot,
    element_id: &str,
    trim_start: Option<TimeSec>,
    trim_end: Option<TimeSec>,
) -> CoreResult<()> {
    for track in &mut snapshot.tracks {
        if let Some(element) = track.get_element_mut(element_id) {
            match element {
                Element::Media(e) => {
                    let mut updated = e.clone();
                    if let Some(ts) = trim_start {
                        updated.trim_start = ts;
                    }
                    if let Some(te) = trim_end {
                        updated.trim_end = te;
                    }
                    validate_element(&Element::Media(updated.clone()))?;
                    *e = updated;
                    return Ok(());
                }
                Element::Text(_) => {
                    return Err(CoreError::ValidationError(format!(
                        "element {} is a text element and has no trims",
                        element_id
                    )))
                }
            }
        }
    }
    Err(CoreError::ElementNotFound(element_id.to_string()))
}

// =============================================================================
// Markers and Track-Level Mutators
// =============================================================================

/// Appends markers at the given times to a track.
pub fn add_markers(
    snapshot: &mut ProjectSnapshot,
    track_id: &str,
    times: &[TimeSec],
) -> CoreResult<()> {
    let track = snapshot
        .get_track_mut(track_id)
        .ok_or_else(|| CoreError::TrackNotFound(track_id.to_string()))?;

    for &time in times {
        track.markers.push(super::models::Marker::new(time));
    }
    Ok(())
}

/// Removes every element from every text track. Returns the number removed.
pub fn clear_text_elements(snapshot: &mut ProjectSnapshot) -> usize {
    let mut removed = 0;
    for track in &mut snapshot.tracks {
        if track.kind == TrackKind::Text {
            removed += track.elements.len();
            track.elements.clear();
        }
    }
    removed
}

// =============================================================================
// Convenience Constructors (action defaults)
// =============================================================================

/// Builds a subtitle-styled text element from loosely-typed action data.
pub fn text_element_from_data(data: &serde_json::Value) -> TextElement {
    let content = data
        .get("text")
        .or_else(|| data.get("content"))
        .and_then(|v| v.as_str())
        .unwrap_or("");
    let start_time = data
        .get("startTime")
        .and_then(|v| v.as_f64())
        .unwrap_or(0.0);
    let duration = data.get("duration").and_then(|v| v.as_f64()).unwrap_or(5.0);

    let mut element = TextElement::new(content, start_time, duration);
    if let Some(x) = data.get("x").and_then(|v| v.as_f64()) {
        element.x = x;
    }
    if let Some(y) = data.get("y").and_then(|v| v.as_f64()) {
        element.y = y;
    }
    if let Some(size) = data.get("fontSize").and_then(|v| v.as_f64()) {
        element.font_size = size;
    }
    if let Some(family) = data.get("fontFamily").and_then(|v| v.as_str()) {
        element.font_family = family.to_string();
    }
    if let Some(color) = data.get("color").and_then(|v| v.as_str()) {
        element.color = color.to_string();
    }
    element
}

/// Builds a media element for a newly imported asset.
pub fn media_element_for_asset(
    asset: &super::models::Asset,
    start_time: TimeSec,
) -> MediaElement {
    let mut element =
        MediaElement::new(&asset.id, &asset.name, asset.duration.unwrap_or(5.0));
    element.start_time = start_time;
    element.thumbnail_url = asset.thumbnail_url.clone();
    element
}

// =============================================================================
// Tests
// =============================================================================
