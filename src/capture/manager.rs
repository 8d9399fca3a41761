//! Input-mode switching over the concrete frame sources.

use super::camera_source::CameraSource;
use super::source::{CaptureError, FrameSource, SourceKind};
use super::still::StillImageSource;
use super::upload::{MediaKind, Upload};
use super::video::{VideoDecoder, VideoSource};
use super::Frame;
use serde::Serialize;
use std::sync::Arc;

/// Which input surface is selected.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum InputMode {
    /// Uploaded image or video.
    #[default]
    Upload,
    /// Live camera.
    Camera,
}

impl std::fmt::Display for InputMode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            InputMode::Upload => write!(f, "upload"),
            InputMode::Camera => write!(f, "camera"),
        }
    }
}

/// Kind of the currently loaded upload.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum UploadType {
    /// A still image.
    Image,
    /// A video file.
    Video,
}

/// The loaded upload, one of the two upload-backed sources.
pub enum UploadSource {
    /// Still image.
    Still(StillImageSource),
    /// Video file.
    Video(VideoSource),
}

impl UploadSource {
    fn as_source(&self) -> &dyn FrameSource {
        match self {
            UploadSource::Still(s) => s,
            UploadSource::Video(v) => v,
        }
    }

    fn as_source_mut(&mut self) -> &mut dyn FrameSource {
        match self {
            UploadSource::Still(s) => s,
            UploadSource::Video(v) => v,
        }
    }

    /// Upload type of this source.
    pub fn upload_type(&self) -> UploadType {
        match self {
            UploadSource::Still(_) => UploadType::Image,
            UploadSource::Video(_) => UploadType::Video,
        }
    }
}

/// Owns every frame source and routes capture to the selected one.
///
/// Leaving a mode tears its source down before the next one is activated.
/// The upload survives a trip through camera mode; only loading another
/// upload replaces it.
pub struct FrameSourceManager {
    mode: InputMode,
    camera: CameraSource,
    upload: Option<UploadSource>,
    video_decoder: Arc<dyn VideoDecoder>,
    jpeg_quality: u8,
}

impl FrameSourceManager {
    /// Creates a manager in upload mode with nothing loaded.
    pub fn new(camera: CameraSource, video_decoder: Arc<dyn VideoDecoder>, jpeg_quality: u8) -> Self {
        Self {
            mode: InputMode::Upload,
            camera,
            upload: None,
            video_decoder,
            jpeg_quality,
        }
    }

    /// Selected input mode.
    pub fn mode(&self) -> InputMode {
        self.mode
    }

    /// Type of the loaded upload, if any.
    pub fn upload_type(&self) -> Option<UploadType> {
        self.upload.as_ref().map(UploadSource::upload_type)
    }

    /// Kind of the source capture currently reads from.
    pub fn active_kind(&self) -> Option<SourceKind> {
        match self.mode {
            InputMode::Camera => Some(SourceKind::Camera),
            InputMode::Upload => self.upload.as_ref().map(|u| u.as_source().kind()),
        }
    }

    /// Selects the camera and acquires its stream.
    ///
    /// The mode switches even if acquisition fails, leaving the camera
    /// inactive; the error is returned for the caller to surface.
    pub async fn switch_to_camera(&mut self) -> Result<(), CaptureError> {
        if self.mode != InputMode::Camera {
            tracing::info!(from = %self.mode, "switching input to camera");
            self.mode = InputMode::Camera;
        }
        self.camera.activate().await
    }

    /// Selects upload mode, releasing the camera if it was active.
    pub fn switch_to_upload(&mut self) {
        if self.mode == InputMode::Camera {
            tracing::info!("switching input to upload");
        }
        self.camera.release();
        self.mode = InputMode::Upload;
    }

    /// Replaces the upload and selects upload mode.
    ///
    /// The previous upload is released first. On failure nothing is loaded.
    pub async fn load_upload(&mut self, upload: Upload) -> Result<UploadType, CaptureError> {
        let kind = upload.kind()?;
        self.switch_to_upload();
        if let Some(mut previous) = self.upload.take() {
            previous.as_source_mut().release();
        }

        let name = upload.name.clone();
        let mut source = match kind {
            MediaKind::Image => UploadSource::Still(StillImageSource::new(upload)),
            MediaKind::Video => UploadSource::Video(VideoSource::new(
                upload,
                Arc::clone(&self.video_decoder),
                self.jpeg_quality,
            )),
        };
        source.as_source_mut().activate().await?;

        let upload_type = source.upload_type();
        tracing::info!(%name, ?upload_type, "upload loaded");
        self.upload = Some(source);
        Ok(upload_type)
    }

    /// Captures from the selected source.
    pub async fn capture(&mut self) -> Result<Option<Frame>, CaptureError> {
        match self.mode {
            InputMode::Camera => self.camera.capture().await,
            InputMode::Upload => match self.upload.as_mut() {
                Some(source) => source.as_source_mut().capture().await,
                None => Ok(None),
            },
        }
    }

    /// True when the selected source is live and can yield new frames.
    pub fn capture_capable(&self) -> bool {
        match self.mode {
            InputMode::Camera => self.camera.is_active(),
            InputMode::Upload => self.upload.as_ref().is_some_and(|u| {
                let source = u.as_source();
                source.is_active() && source.supports_repeated_capture()
            }),
        }
    }

    /// The camera source.
    pub fn camera(&self) -> &CameraSource {
        &self.camera
    }

    /// The camera source, for control updates.
    pub fn camera_mut(&mut self) -> &mut CameraSource {
        &mut self.camera
    }

    /// The loaded video, for playback control.
    pub fn video_mut(&mut self) -> Option<&mut VideoSource> {
        match self.upload.as_mut() {
            Some(UploadSource::Video(video)) => Some(video),
            _ => None,
        }
    }

    /// Live camera tracks.
    pub fn active_camera_tracks(&self) -> usize {
        self.camera.active_tracks()
    }

    /// Releases the camera and the upload.
    pub fn release_all(&mut self) {
        self.camera.release();
        if let Some(upload) = self.upload.as_mut() {
            upload.as_source_mut().release();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::capture::video::AnimatedImageDecoder;
    use crate::capture::{CaptureConfig, MockCamera, MockCameraProbe};
    use image::{ImageFormat, Rgb, RgbImage};
    use std::io::Cursor;

    fn manager() -> (FrameSourceManager, MockCameraProbe) {
        let camera = MockCamera::new().with_resolution(8, 8);
        let probe = camera.probe();
        let source = CameraSource::new(Box::new(camera), CaptureConfig::default());
        (
            FrameSourceManager::new(source, Arc::new(AnimatedImageDecoder), 90),
            probe,
        )
    }

    fn png_bytes() -> Vec<u8> {
        let mut out = Cursor::new(Vec::new());
        RgbImage::from_pixel(4, 4, Rgb([1, 2, 3]))
            .write_to(&mut out, ImageFormat::Png)
            .unwrap();
        out.into_inner()
    }

    #[tokio::test]
    async fn test_starts_in_upload_mode_without_source() {
        let (mut manager, _) = manager();
        assert_eq!(manager.mode(), InputMode::Upload);
        assert!(!manager.capture_capable());
        assert!(manager.capture().await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_leaving_camera_releases_tracks() {
        let (mut manager, probe) = manager();
        manager.switch_to_camera().await.unwrap();
        assert_eq!(probe.active_tracks(), 1);
        assert!(manager.capture_capable());

        manager.switch_to_upload();
        assert_eq!(probe.active_tracks(), 0);
        assert_eq!(manager.active_camera_tracks(), 0);
        assert_eq!(manager.mode(), InputMode::Upload);
    }

    #[tokio::test]
    async fn test_loading_upload_from_camera_releases_tracks() {
        let (mut manager, probe) = manager();
        manager.switch_to_camera().await.unwrap();

        let upload_type = manager
            .load_upload(Upload::new("a.png", "image/png", png_bytes()))
            .await
            .unwrap();
        assert_eq!(upload_type, UploadType::Image);
        assert_eq!(probe.active_tracks(), 0);
        assert!(!manager.capture_capable());
        assert!(manager.capture().await.unwrap().is_some());
    }

    #[tokio::test]
    async fn test_upload_survives_camera_round_trip() {
        let (mut manager, _) = manager();
        manager
            .load_upload(Upload::new("a.png", "image/png", png_bytes()))
            .await
            .unwrap();
        manager.switch_to_camera().await.unwrap();
        assert_eq!(manager.active_kind(), Some(SourceKind::Camera));

        manager.switch_to_upload();
        assert_eq!(manager.active_kind(), Some(SourceKind::StillImage));
        assert_eq!(manager.upload_type(), Some(UploadType::Image));
    }

    #[tokio::test]
    async fn test_rejects_unknown_media() {
        let (mut manager, _) = manager();
        let result = manager
            .load_upload(Upload::new("a.txt", "text/plain", vec![1, 2, 3]))
            .await;
        assert!(matches!(result, Err(CaptureError::UnsupportedMedia(_))));
        assert_eq!(manager.upload_type(), None);
    }

    #[tokio::test]
    async fn test_failed_camera_stays_inactive() {
        let camera = MockCamera::new().denying_permission();
        let source = CameraSource::new(Box::new(camera), CaptureConfig::default());
        let mut manager = FrameSourceManager::new(source, Arc::new(AnimatedImageDecoder), 90);

        assert!(manager.switch_to_camera().await.is_err());
        assert_eq!(manager.mode(), InputMode::Camera);
        assert!(!manager.capture_capable());
    }
}
