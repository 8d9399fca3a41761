//! Contrast / saturation / denoise pass applied before submission.

use crate::capture::{encode_jpeg, Frame};
use image::imageops::{self, FilterType};
use image::{DynamicImage, ImageFormat, Rgb, RgbImage};
use serde::{Deserialize, Serialize};

/// Enhancement parameters.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct PreprocessConfig {
    /// Skip enhancement entirely and submit frames as captured.
    pub enabled: bool,
    /// Contrast adjustment in percent (positive boosts).
    pub contrast: f32,
    /// Saturation multiplier (1.0 leaves colour unchanged).
    pub saturation: f32,
    /// Gaussian blur sigma in pixels (0 disables).
    pub blur_sigma: f32,
    /// JPEG quality for the re-encoded frame (1-100).
    pub jpeg_quality: u8,
    /// Longest edge after downscaling (0 keeps the original size).
    pub max_dimension: u32,
}

impl Default for PreprocessConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            contrast: 20.0,
            saturation: 1.1,
            blur_sigma: 0.5,
            jpeg_quality: 90,
            max_dimension: 1920,
        }
    }
}

/// Why an enhancement pass fell back to the original frame.
#[derive(Debug, thiserror::Error)]
pub enum PreprocessError {
    /// Frame bytes are not a decodable image.
    #[error("failed to decode frame: {0}")]
    Decode(#[source] image::ImageError),
    /// JPEG encoding failed.
    #[error("failed to encode frame: {0}")]
    Encode(#[source] image::ImageError),
}

/// Deterministic best-effort frame enhancer.
///
/// [`Preprocessor::enhance`] never fails: if the frame cannot be decoded
/// or re-encoded the original is returned untouched.
#[derive(Debug, Clone, Default)]
pub struct Preprocessor {
    config: PreprocessConfig,
}

impl Preprocessor {
    /// Creates a preprocessor.
    pub fn new(config: PreprocessConfig) -> Self {
        Self { config }
    }

    /// Returns the active configuration.
    pub fn config(&self) -> &PreprocessConfig {
        &self.config
    }

    /// Enhances a frame, falling back to the input on any failure.
    pub fn enhance(&self, frame: &Frame) -> Frame {
        if !self.config.enabled {
            return frame.clone();
        }
        match self.try_enhance(frame) {
            Ok(enhanced) => enhanced,
            Err(e) => {
                tracing::debug!(
                    sequence = frame.sequence(),
                    error = %e,
                    "preprocessing failed, submitting original frame"
                );
                frame.clone()
            }
        }
    }

    /// Enhances a frame, reporting failures.
    pub fn try_enhance(&self, frame: &Frame) -> Result<Frame, PreprocessError> {
        let decoded = image::load_from_memory(frame.data()).map_err(PreprocessError::Decode)?;
        let decoded = self.downscale(decoded);
        let enhanced = self.apply_filters(&decoded.to_rgb8());

        let data = encode_jpeg(&enhanced, self.config.jpeg_quality).map_err(PreprocessError::Encode)?;
        Ok(Frame::from_encoded(
            data,
            ImageFormat::Jpeg,
            enhanced.width(),
            enhanced.height(),
            frame.sequence(),
        ))
    }

    fn downscale(&self, image: DynamicImage) -> DynamicImage {
        let max = self.config.max_dimension;
        if max == 0 || (image.width() <= max && image.height() <= max) {
            return image;
        }
        image.resize(max, max, FilterType::Triangle)
    }

    /// Applies contrast, saturation and blur in that order.
    pub fn apply_filters(&self, image: &RgbImage) -> RgbImage {
        let mut out = if self.config.contrast != 0.0 {
            imageops::contrast(image, self.config.contrast)
        } else {
            image.clone()
        };

        if (self.config.saturation - 1.0).abs() > f32::EPSILON {
            saturate(&mut out, self.config.saturation);
        }

        if self.config.blur_sigma > 0.0 {
            out = imageops::blur(&out, self.config.blur_sigma);
        }
        out
    }
}

/// Scales each pixel's distance from its luma by `factor`.
fn saturate(image: &mut RgbImage, factor: f32) {
    for pixel in image.pixels_mut() {
        let Rgb([r, g, b]) = *pixel;
        let (r, g, b) = (r as f32, g as f32, b as f32);
        let luma = 0.299 * r + 0.587 * g + 0.114 * b;
        let adjust = |c: f32| (luma + (c - luma) * factor).round().clamp(0.0, 255.0) as u8;
        *pixel = Rgb([adjust(r), adjust(g), adjust(b)]);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn gradient_frame(width: u32, height: u32) -> Frame {
        let image = RgbImage::from_fn(width, height, |x, y| {
            Rgb([(x * 8 % 256) as u8, (y * 8 % 256) as u8, 128])
        });
        Frame::from_rgb(&image, 95, 7).unwrap()
    }

    #[test]
    fn test_enhance_reencodes_as_jpeg() {
        let frame = gradient_frame(32, 16);
        let enhanced = Preprocessor::default().enhance(&frame);

        assert_eq!(enhanced.format(), ImageFormat::Jpeg);
        assert_eq!(enhanced.sequence(), 7);
        assert_eq!((enhanced.width(), enhanced.height()), (32, 16));
        assert!(image::load_from_memory(enhanced.data()).is_ok());
    }

    #[test]
    fn test_enhance_is_deterministic() {
        let frame = gradient_frame(24, 24);
        let pre = Preprocessor::default();
        assert_eq!(pre.enhance(&frame).data(), pre.enhance(&frame).data());
    }

    #[test]
    fn test_undecodable_frame_passes_through() {
        let frame = Frame::from_encoded(vec![0xde, 0xad, 0xbe, 0xef], ImageFormat::Png, 2, 2, 1);
        let out = Preprocessor::default().enhance(&frame);
        assert_eq!(out.data(), frame.data());
        assert_eq!(out.format(), ImageFormat::Png);
    }

    #[test]
    fn test_disabled_passes_through() {
        let frame = gradient_frame(8, 8);
        let pre = Preprocessor::new(PreprocessConfig {
            enabled: false,
            ..Default::default()
        });
        assert_eq!(pre.enhance(&frame).data(), frame.data());
    }

    #[test]
    fn test_downscale_keeps_aspect() {
        let frame = gradient_frame(64, 32);
        let pre = Preprocessor::new(PreprocessConfig {
            max_dimension: 16,
            ..Default::default()
        });
        let out = pre.enhance(&frame);
        assert_eq!((out.width(), out.height()), (16, 8));
    }

    #[test]
    fn test_saturation_leaves_grey_alone() {
        let mut image = RgbImage::from_pixel(2, 2, Rgb([90, 90, 90]));
        saturate(&mut image, 1.5);
        assert_eq!(image.get_pixel(0, 0), &Rgb([90, 90, 90]));

        let mut image = RgbImage::from_pixel(1, 1, Rgb([200, 100, 100]));
        saturate(&mut image, 1.5);
        let Rgb([r, g, _]) = *image.get_pixel(0, 0);
        assert!(r > 200 && g < 100);
    }

    #[test]
    fn test_contrast_spreads_values() {
        let pre = Preprocessor::new(PreprocessConfig {
            saturation: 1.0,
            blur_sigma: 0.0,
            ..Default::default()
        });
        let image = RgbImage::from_fn(2, 1, |x, _| if x == 0 { Rgb([60; 3]) } else { Rgb([190; 3]) });
        let out = pre.apply_filters(&image);
        assert!(out.get_pixel(0, 0)[0] < 60);
        assert!(out.get_pixel(1, 0)[0] > 190);
    }
}
