//! The common "capture a still frame" interface.

use super::camera::CameraError;
use super::Frame;
use async_trait::async_trait;
use thiserror::Error;

/// Errors raised by frame sources.
#[derive(Debug, Error)]
pub enum CaptureError {
    #[error(transparent)]
    Camera(#[from] CameraError),
    #[error("unsupported media type: {0}")]
    UnsupportedMedia(String),
    #[error("failed to decode upload: {0}")]
    Decode(String),
    #[error("frame source is not active")]
    Inactive,
}

/// What kind of input a source reads from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SourceKind {
    /// Live camera stream.
    Camera,
    /// Uploaded still image.
    StillImage,
    /// Uploaded video file.
    Video,
}

impl std::fmt::Display for SourceKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            SourceKind::Camera => write!(f, "camera"),
            SourceKind::StillImage => write!(f, "image"),
            SourceKind::Video => write!(f, "video"),
        }
    }
}

/// A source of still frames.
///
/// `capture` returns `Ok(None)` when the source is live but has nothing
/// decodable yet. That is an expected startup condition and callers retry
/// on their next cycle rather than reporting it.
#[async_trait]
pub trait FrameSource: Send {
    /// The kind of input behind this source.
    fn kind(&self) -> SourceKind;

    /// Whether repeated captures can yield new content.
    fn supports_repeated_capture(&self) -> bool;

    /// Acquires whatever the source needs before it can capture.
    async fn activate(&mut self) -> Result<(), CaptureError>;

    /// Captures the current frame.
    async fn capture(&mut self) -> Result<Option<Frame>, CaptureError>;

    /// Returns true between a successful `activate` and `release`.
    fn is_active(&self) -> bool;

    /// Releases held resources. A no-op when not active.
    fn release(&mut self);
}
