//! Frame type representing one encoded still image with metadata.

use base64::{engine::general_purpose::STANDARD, Engine as _};
use image::codecs::jpeg::JpegEncoder;
use image::{ExtendedColorType, ImageEncoder, ImageFormat, ImageResult, RgbImage};
use std::sync::Arc;

/// A single still frame obtained from a frame source.
///
/// The pixel data is kept in its encoded form (JPEG, PNG, ...). Sources
/// that produce raw pixels encode them on capture so every downstream
/// stage sees the same shape of data.
#[derive(Clone)]
pub struct Frame {
    /// Encoded image bytes, shared between clones.
    data: Arc<[u8]>,
    /// Container format of `data`.
    format: ImageFormat,
    /// Frame width in pixels.
    width: u32,
    /// Frame height in pixels.
    height: u32,
    /// Monotonic sequence number assigned by the producing source.
    sequence: u64,
}

impl Frame {
    /// Creates a frame from already-encoded image bytes.
    pub fn from_encoded(
        data: impl Into<Arc<[u8]>>,
        format: ImageFormat,
        width: u32,
        height: u32,
        sequence: u64,
    ) -> Self {
        Self {
            data: data.into(),
            format,
            width,
            height,
            sequence,
        }
    }

    /// Encodes raw RGB pixels as JPEG and wraps them in a frame.
    pub fn from_rgb(image: &RgbImage, quality: u8, sequence: u64) -> ImageResult<Self> {
        let data = encode_jpeg(image, quality)?;
        Ok(Self::from_encoded(
            data,
            ImageFormat::Jpeg,
            image.width(),
            image.height(),
            sequence,
        ))
    }

    /// Returns the encoded bytes.
    #[inline]
    pub fn data(&self) -> &[u8] {
        &self.data
    }

    /// Returns the container format.
    #[inline]
    pub fn format(&self) -> ImageFormat {
        self.format
    }

    /// Returns the MIME type of the encoded bytes.
    pub fn mime_type(&self) -> &'static str {
        self.format.to_mime_type()
    }

    /// Returns the frame width.
    #[inline]
    pub fn width(&self) -> u32 {
        self.width
    }

    /// Returns the frame height.
    #[inline]
    pub fn height(&self) -> u32 {
        self.height
    }

    /// Returns the sequence number.
    #[inline]
    pub fn sequence(&self) -> u64 {
        self.sequence
    }

    /// Returns the encoded bytes as standard base64.
    pub fn to_base64(&self) -> String {
        STANDARD.encode(&self.data)
    }
}

impl std::fmt::Debug for Frame {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Frame")
            .field("format", &self.format)
            .field("width", &self.width)
            .field("height", &self.height)
            .field("sequence", &self.sequence)
            .field("encoded_bytes", &self.data.len())
            .finish()
    }
}

/// Encodes RGB pixels as JPEG at the given quality (1-100).
pub fn encode_jpeg(image: &RgbImage, quality: u8) -> ImageResult<Vec<u8>> {
    let mut out = Vec::new();
    JpegEncoder::new_with_quality(&mut out, quality.clamp(1, 100)).write_image(
        image.as_raw(),
        image.width(),
        image.height(),
        ExtendedColorType::Rgb8,
    )?;
    Ok(out)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_frame_from_rgb() {
        let image = RgbImage::from_pixel(16, 8, image::Rgb([120, 80, 40]));
        let frame = Frame::from_rgb(&image, 90, 3).unwrap();

        assert_eq!(frame.width(), 16);
        assert_eq!(frame.height(), 8);
        assert_eq!(frame.sequence(), 3);
        assert_eq!(frame.format(), ImageFormat::Jpeg);
        assert_eq!(frame.mime_type(), "image/jpeg");

        let decoded = image::load_from_memory(frame.data()).unwrap();
        assert_eq!(decoded.width(), 16);
    }

    #[test]
    fn test_base64_matches_data() {
        let frame = Frame::from_encoded(vec![1u8, 2, 3], ImageFormat::Png, 1, 1, 1);
        assert_eq!(frame.to_base64(), "AQID");
    }
}
