//! Camera capability descriptors and the control state derived from them.
//!
//! Platforms report zoom and focus ranges only for some devices. Each
//! control is modelled as present-with-range or absent so callers never
//! have to probe an untyped bag of properties.

use serde::{Deserialize, Serialize};

/// A numeric control range reported by the device.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct RangeCapability {
    /// Smallest accepted value.
    pub min: f64,
    /// Largest accepted value.
    pub max: f64,
    /// Increment between accepted values (0 means continuous).
    pub step: f64,
}

impl RangeCapability {
    /// Creates a new range. Bounds given in the wrong order are swapped.
    pub fn new(min: f64, max: f64, step: f64) -> Self {
        Self {
            min: min.min(max),
            max: max.max(min),
            step,
        }
    }

    /// Builds a range from driver-reported values.
    ///
    /// Returns `None` when either bound is not finite. A step that is not a
    /// positive finite number becomes 0 (continuous).
    pub fn from_reported(min: f64, max: f64, step: f64) -> Option<Self> {
        if !min.is_finite() || !max.is_finite() {
            return None;
        }
        let step = if step.is_finite() && step > 0.0 { step } else { 0.0 };
        Some(Self::new(min, max, step))
    }

    /// Clamps a requested value into the range and snaps it to `step`.
    ///
    /// Non-finite requests resolve to the lower bound. Never panics, even
    /// on an inverted or NaN-bounded range.
    pub fn clamp(&self, value: f64) -> f64 {
        let lo = self.min.min(self.max);
        let hi = self.max.max(self.min);
        if !value.is_finite() {
            return lo;
        }
        let clamped = value.max(lo).min(hi);
        if self.step.is_finite() && self.step > 0.0 {
            let steps = ((clamped - lo) / self.step).round();
            (lo + steps * self.step).min(hi)
        } else {
            clamped
        }
    }
}

/// Focus behaviour of the camera.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FocusMode {
    /// Device refocuses continuously.
    Continuous,
    /// Focus is held at a fixed distance.
    Manual,
}

impl std::fmt::Display for FocusMode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            FocusMode::Continuous => write!(f, "continuous"),
            FocusMode::Manual => write!(f, "manual"),
        }
    }
}

/// Controls the active camera track advertises.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct CameraCapabilities {
    /// Zoom range, if the device supports zoom.
    pub zoom: Option<RangeCapability>,
    /// Manual focus distance range, if supported.
    pub focus_distance: Option<RangeCapability>,
    /// Supported focus modes (empty when focus is not controllable).
    pub focus_modes: Vec<FocusMode>,
}

impl CameraCapabilities {
    /// Returns true if the device supports the given focus mode.
    pub fn supports_focus_mode(&self, mode: FocusMode) -> bool {
        self.focus_modes.contains(&mode)
    }
}

/// A single constraint update applied to a live track.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum CameraConstraint {
    /// Set the zoom level.
    Zoom(f64),
    /// Switch focus mode.
    FocusMode(FocusMode),
    /// Hold focus at the given distance (implies manual focus).
    FocusDistance(f64),
}

/// Current values of the camera controls.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct CameraSettings {
    /// Current zoom level, when zoom is supported.
    pub zoom: Option<f64>,
    /// Current focus mode.
    pub focus_mode: FocusMode,
    /// Current manual focus distance, when supported.
    pub focus_distance: Option<f64>,
}

impl CameraSettings {
    /// Initial settings for a freshly acquired track.
    pub fn initial(capabilities: &CameraCapabilities) -> Self {
        Self {
            zoom: capabilities.zoom.map(|r| r.min),
            focus_mode: FocusMode::Continuous,
            focus_distance: capabilities.focus_distance.map(|r| r.min),
        }
    }
}

impl Default for CameraSettings {
    fn default() -> Self {
        Self::initial(&CameraCapabilities::default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_clamp_to_range() {
        let zoom = RangeCapability::new(1.0, 5.0, 0.0);
        assert_eq!(zoom.clamp(0.2), 1.0);
        assert_eq!(zoom.clamp(7.5), 5.0);
        assert_eq!(zoom.clamp(2.25), 2.25);
    }

    #[test]
    fn test_clamp_snaps_to_step() {
        let zoom = RangeCapability::new(1.0, 4.0, 0.5);
        assert_eq!(zoom.clamp(2.2), 2.0);
        assert_eq!(zoom.clamp(2.3), 2.5);
        assert_eq!(zoom.clamp(f64::NAN), 1.0);
    }

    #[test]
    fn test_inverted_range_is_ordered() {
        let zoom = RangeCapability::new(4.0, 1.0, 0.0);
        assert_eq!((zoom.min, zoom.max), (1.0, 4.0));
        assert_eq!(zoom.clamp(2.0), 2.0);
        assert_eq!(zoom.clamp(9.0), 4.0);

        let raw = RangeCapability {
            min: 4.0,
            max: 1.0,
            step: 0.5,
        };
        assert_eq!(raw.clamp(0.0), 1.0);
        assert_eq!(raw.clamp(2.2), 2.0);
    }

    #[test]
    fn test_nan_bounds_do_not_panic() {
        assert_eq!(RangeCapability::new(f64::NAN, 4.0, 0.0).clamp(2.0), 4.0);
        assert!(RangeCapability::from_reported(f64::NAN, 4.0, 0.0).is_none());
        assert!(RangeCapability::from_reported(0.0, f64::INFINITY, 1.0).is_none());

        let focus = RangeCapability::from_reported(10.0, 0.0, f64::NAN).unwrap();
        assert_eq!((focus.min, focus.max, focus.step), (0.0, 10.0, 0.0));
    }

    #[test]
    fn test_initial_settings_follow_capabilities() {
        let caps = CameraCapabilities {
            zoom: Some(RangeCapability::new(1.0, 8.0, 0.1)),
            focus_distance: None,
            focus_modes: vec![FocusMode::Continuous],
        };
        let settings = CameraSettings::initial(&caps);
        assert_eq!(settings.zoom, Some(1.0));
        assert_eq!(settings.focus_distance, None);
        assert_eq!(settings.focus_mode, FocusMode::Continuous);
        assert!(!caps.supports_focus_mode(FocusMode::Manual));
    }
}
