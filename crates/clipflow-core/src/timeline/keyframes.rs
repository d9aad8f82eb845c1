//! Keyframe Interpolation
//!
//! Resolves an animated property's value at any query time from its keyframe
//! list. Called once per animated property per rendered frame, so this must
//! stay deterministic and side-effect-free.

use serde::{Deserialize, Serialize};

use crate::TimeSec;

/// Easing curve applied to the segment *after* a keyframe
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum Easing {
    Linear,
    EaseIn,
    EaseOut,
    EaseInOut,
}

impl Easing {
    /// Maps linear progress `p` in [0, 1] through the curve (quadratic
    /// variants)
    pub fn apply(&self, p: f64) -> f64 {
        match self {
            Easing::Linear => p,
            Easing::EaseIn => p * p,
            Easing::EaseOut => p * (2.0 - p),
            Easing::EaseInOut => {
                if p < 0.5 {
                    2.0 * p * p
                } else {
                    -1.0 + (4.0 - 2.0 * p) * p
                }
            }
        }
    }
}

/// A single keyframe on one animatable numeric property
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Keyframe {
    pub time: TimeSec,
    pub value: f64,
    /// Easing for the segment from this keyframe to the next
    #[serde(default)]
    pub easing: Option<Easing>,
}

impl Keyframe {
    pub fn new(time: TimeSec, value: f64) -> Self {
        Self {
            time,
            value,
            easing: None,
        }
    }

    pub fn with_easing(mut self, easing: Easing) -> Self {
        self.easing = Some(easing);
        self
    }
}

/// Resolves the property value at time `t`.
///
/// - At or before the first keyframe: the first value.
/// - At or after the last keyframe: the last value.
/// - Otherwise: interpolate within the bracketing pair using the easing
///   attached to the previous keyframe, progress clamped to [0, 1].
///
/// The input list need not be pre-sorted; the caller's order is not trusted.
pub fn value_at(keyframes: &[Keyframe], t: TimeSec) -> Option<f64> {
    if keyframes.is_empty() {
        return None;
    }

    let mut sorted: Vec<&Keyframe> = keyframes.iter().collect();
    sorted.sort_by(|a, b| a.time.partial_cmp(&b.time).unwrap_or(std::cmp::Ordering::Equal));

    let first = sorted[0];
    let last = sorted[sorted.len() - 1];
    if t <= first.time {
        return Some(first.value);
    }
    if t >= last.time {
        return Some(last.value);
    }

    for pair in sorted.windows(2) {
        let (prev, next) = (pair[0], pair[1]);
        if t >= prev.time && t <= next.time {
            let span = next.time - prev.time;
            if span <= 0.0 {
                return Some(next.value);
            }
            let p = ((t - prev.time) / span).clamp(0.0, 1.0);
            let eased = prev.easing.unwrap_or(Easing::Linear).apply(p);
            return Some(prev.value + (next.value - prev.value) * eased);
        }
    }

    Some(last.value)
}

// =============================================================================
// Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_empty_list_has_no_value() {
        assert!(value_at(&[], 1.0).is_none());
    }

    #[test]
    fn test_clamps_outside_range() {
        let kfs = vec![Keyframe::new(1.0, 10.0), Keyframe::new(3.0, 30.0)];

        assert_eq!(value_at(&kfs, 0.0), Some(10.0));
        assert_eq!(value_at(&kfs, 1.0), Some(10.0));
        assert_eq!(value_at(&kfs, 3.0), Some(30.0));
        assert_eq!(value_at(&kfs, 99.0), Some(30.0));
    }

    #[test]
    fn test_linear_interpolation_matches_endpoints_and_midpoint() {
        let kfs = vec![Keyframe::new(0.0, 0.0), Keyframe::new(2.0, 100.0)];

        assert_eq!(value_at(&kfs, 0.0), Some(0.0));
        assert_eq!(value_at(&kfs, 1.0), Some(50.0));
        assert_eq!(value_at(&kfs, 2.0), Some(100.0));
    }

    #[test]
    fn test_linear_is_monotonic_between_keyframes() {
        let kfs = vec![Keyframe::new(0.0, 0.0), Keyframe::new(1.0, 1.0)];

        let mut prev = f64::NEG_INFINITY;
        for i in 0..=100 {
            let v = value_at(&kfs, i as f64 / 100.0).unwrap();
            assert!(v >= prev, "non-monotonic at step {}", i);
            prev = v;
        }
    }

    #[test]
    fn test_easing_comes_from_previous_keyframe() {
        let kfs = vec![
            Keyframe::new(0.0, 0.0).with_easing(Easing::EaseIn),
            Keyframe::new(1.0, 1.0).with_easing(Easing::EaseOut),
        ];

        // ease-in (p^2) at p=0.5 -> 0.25, from the *previous* keyframe
        let v = value_at(&kfs, 0.5).unwrap();
        assert!((v - 0.25).abs() < 1e-9);
    }

    #[test]
    fn test_ease_out_and_in_out() {
        assert!((Easing::EaseOut.apply(0.5) - 0.75).abs() < 1e-9);
        assert!((Easing::EaseInOut.apply(0.25) - 0.125).abs() < 1e-9);
        assert!((Easing::EaseInOut.apply(0.75) - 0.875).abs() < 1e-9);
        // All curves hit the endpoints exactly
        for easing in [Easing::Linear, Easing::EaseIn, Easing::EaseOut, Easing::EaseInOut] {
            assert_eq!(easing.apply(0.0), 0.0);
            assert_eq!(easing.apply(1.0), 1.0);
        }
    }

    #[test]
    fn test_unsorted_input_is_handled() {
        let kfs = vec![Keyframe::new(2.0, 100.0), Keyframe::new(0.0, 0.0)];
        assert_eq!(value_at(&kfs, 1.0), Some(50.0));
    }

    #[test]
    fn test_duplicate_times_do_not_divide_by_zero() {
        let kfs = vec![
            Keyframe::new(1.0, 10.0),
            Keyframe::new(1.0, 20.0),
            Keyframe::new(2.0, 30.0),
        ];
        // Must return a deterministic, finite value
        let v = value_at(&kfs, 1.5).unwrap();
        assert!(v.is_finite());
    }

    #[test]
    fn test_easing_serde_tags() {
        let json = serde_json::to_value(Easing::EaseInOut).unwrap();
        assert_eq!(json, "ease-in-out");

        let kf: Keyframe =
            serde_json::from_value(serde_json::json!({ "time": 1.0, "value": 2.0, "easing": "ease-in" }))
                .unwrap();
        assert_eq!(kf.easing, Some(Easing::EaseIn));
    }
}
