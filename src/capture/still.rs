//! Uploaded still image source.

use super::source::{CaptureError, FrameSource, SourceKind};
use super::{Frame, Upload};
use async_trait::async_trait;
use image::ImageFormat;
use std::sync::Arc;

/// Frame source for a single uploaded image.
///
/// Capturing does no work beyond handing back the loaded image, so the
/// source cannot drive auto-monitoring.
pub struct StillImageSource {
    name: String,
    data: Arc<[u8]>,
    loaded: Option<Loaded>,
    captures: u64,
}

#[derive(Clone, Copy)]
struct Loaded {
    format: ImageFormat,
    width: u32,
    height: u32,
}

impl StillImageSource {
    /// Wraps an image upload; decoding is deferred to activation.
    pub fn new(upload: Upload) -> Self {
        Self {
            name: upload.name,
            data: upload.data.into(),
            loaded: None,
            captures: 0,
        }
    }

}

#[async_trait]
impl FrameSource for StillImageSource {
    fn kind(&self) -> SourceKind {
        SourceKind::StillImage
    }

    fn supports_repeated_capture(&self) -> bool {
        false
    }

    async fn activate(&mut self) -> Result<(), CaptureError> {
        if self.loaded.is_some() {
            return Ok(());
        }

        let format = image::guess_format(&self.data)
            .map_err(|e| CaptureError::UnsupportedMedia(format!("{}: {}", self.name, e)))?;
        let decoded = image::load_from_memory_with_format(&self.data, format)
            .map_err(|e| CaptureError::Decode(format!("{}: {}", self.name, e)))?;

        tracing::debug!(
            name = %self.name,
            ?format,
            width = decoded.width(),
            height = decoded.height(),
            "still image loaded"
        );
        self.loaded = Some(Loaded {
            format,
            width: decoded.width(),
            height: decoded.height(),
        });
        Ok(())
    }

    async fn capture(&mut self) -> Result<Option<Frame>, CaptureError> {
        let Some(loaded) = self.loaded else {
            return Ok(None);
        };
        self.captures += 1;
        Ok(Some(Frame::from_encoded(
            Arc::clone(&self.data),
            loaded.format,
            loaded.width,
            loaded.height,
            self.captures,
        )))
    }

    fn is_active(&self) -> bool {
        self.loaded.is_some()
    }

    fn release(&mut self) {
        self.loaded = None;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::{Rgb, RgbImage};
    use std::io::Cursor;

    fn png_upload() -> Upload {
        let image = RgbImage::from_pixel(12, 6, Rgb([10, 200, 30]));
        let mut bytes = Cursor::new(Vec::new());
        image.write_to(&mut bytes, ImageFormat::Png).unwrap();
        Upload::new("sample.png", "image/png", bytes.into_inner())
    }

    #[tokio::test]
    async fn test_capture_returns_loaded_image() {
        let upload = png_upload();
        let original = upload.data.clone();
        let mut source = StillImageSource::new(upload);

        // Not loaded yet
        assert!(source.capture().await.unwrap().is_none());

        source.activate().await.unwrap();
        assert!(!source.supports_repeated_capture());

        let frame = source.capture().await.unwrap().unwrap();
        assert_eq!((frame.width(), frame.height()), (12, 6));
        assert_eq!(frame.data(), original.as_slice());
        assert_eq!(frame.format(), ImageFormat::Png);
    }

    #[tokio::test]
    async fn test_garbage_rejected() {
        let mut source = StillImageSource::new(Upload::new("x.png", "image/png", vec![0u8; 16]));
        assert!(source.activate().await.is_err());
        assert!(!source.is_active());
    }
}
