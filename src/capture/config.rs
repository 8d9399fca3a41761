//! Camera acquisition configuration.
//!
//! The monitor asks for a rear-facing device at a high ideal resolution.
//! These are preferences: the device picks the closest mode it supports.

use serde::{Deserialize, Serialize};

/// Which way the requested camera should face.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum FacingMode {
    /// Rear-facing camera pointed at the experiment.
    #[default]
    Environment,
    /// Front-facing camera.
    User,
}

/// Configuration for acquiring a camera stream.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct CaptureConfig {
    /// Camera device index used when several devices are present.
    pub device_id: u32,
    /// Preferred facing direction.
    pub facing: FacingMode,
    /// Ideal frame width in pixels.
    pub ideal_width: u32,
    /// Ideal frame height in pixels.
    pub ideal_height: u32,
    /// Target frames per second.
    pub fps: u32,
    /// JPEG quality used when encoding captured camera frames.
    pub jpeg_quality: u8,
}

impl Default for CaptureConfig {
    fn default() -> Self {
        Self {
            device_id: 0,
            facing: FacingMode::Environment,
            ideal_width: 1920,
            ideal_height: 1080,
            fps: 30,
            jpeg_quality: 92,
        }
    }
}

impl CaptureConfig {
    /// Creates a new configuration with the specified ideal dimensions.
    pub fn with_dimensions(width: u32, height: u32) -> Self {
        Self {
            ideal_width: width,
            ideal_height: height,
            ..Default::default()
        }
    }

    /// Validates the configuration parameters.
    pub fn validate(&self) -> Result<(), CaptureConfigError> {
        if self.ideal_width == 0 || self.ideal_height == 0 {
            return Err(CaptureConfigError::InvalidDimensions);
        }
        if self.fps == 0 || self.fps > 120 {
            return Err(CaptureConfigError::InvalidFrameRate);
        }
        if self.jpeg_quality == 0 || self.jpeg_quality > 100 {
            return Err(CaptureConfigError::InvalidQuality(self.jpeg_quality));
        }
        Ok(())
    }
}

/// Capture configuration validation errors.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum CaptureConfigError {
    #[error("invalid frame dimensions")]
    InvalidDimensions,
    #[error("invalid frame rate (must be 1-120 fps)")]
    InvalidFrameRate,
    #[error("invalid jpeg quality {0} (must be 1-100)")]
    InvalidQuality(u8),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config_valid() {
        let config = CaptureConfig::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.facing, FacingMode::Environment);
        assert_eq!((config.ideal_width, config.ideal_height), (1920, 1080));
    }

    #[test]
    fn test_zero_dimensions_invalid() {
        let config = CaptureConfig::with_dimensions(0, 720);
        assert_eq!(
            config.validate(),
            Err(CaptureConfigError::InvalidDimensions)
        );
    }

    #[test]
    fn test_quality_out_of_range() {
        let config = CaptureConfig {
            jpeg_quality: 0,
            ..Default::default()
        };
        assert_eq!(config.validate(), Err(CaptureConfigError::InvalidQuality(0)));
    }
}
