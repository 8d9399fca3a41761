//! Frame sources and input-mode handling.
//!
//! A frame is captured from exactly one selected source: a live camera,
//! an uploaded still image, or the current position of an uploaded video.
//! [`FrameSourceManager`] owns all of them and guarantees that leaving a
//! mode releases that mode's resources before anything else is acquired.

mod camera;
mod camera_source;
mod config;
#[cfg(feature = "video")]
mod container;
mod controls;
mod frame;
mod manager;
#[cfg(feature = "camera")]
mod native;
mod source;
mod still;
mod upload;
mod video;

pub use camera::{CameraDevice, CameraError, MockCamera, MockCameraProbe};
pub use camera_source::CameraSource;
pub use config::{CaptureConfig, CaptureConfigError, FacingMode};
#[cfg(feature = "video")]
pub use container::OpenCvDecoder;
pub use controls::{
    CameraCapabilities, CameraConstraint, CameraSettings, FocusMode, RangeCapability,
};
pub use frame::{encode_jpeg, Frame};
pub use manager::{FrameSourceManager, InputMode, UploadSource, UploadType};
#[cfg(feature = "camera")]
pub use native::NokhwaCamera;
pub use source::{CaptureError, FrameSource, SourceKind};
pub use still::StillImageSource;
pub use upload::{mime_for_path, MediaKind, Upload};
pub use video::{AnimatedImageDecoder, DecodedVideo, VideoDecoder, VideoFrame, VideoSource};

/// The most capable video decoder this build carries.
///
/// With the `video` feature that is [`OpenCvDecoder`]; otherwise only
/// animated images (GIF, APNG, WebP) can be played.
pub fn default_video_decoder() -> std::sync::Arc<dyn VideoDecoder> {
    #[cfg(feature = "video")]
    {
        std::sync::Arc::new(OpenCvDecoder::default())
    }
    #[cfg(not(feature = "video"))]
    {
        std::sync::Arc::new(AnimatedImageDecoder)
    }
}
