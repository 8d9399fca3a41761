//! Uploaded video source.
//!
//! A loaded video plays on the tokio clock; capturing reads whichever
//! decoded frame is showing at the current playback position.

use super::source::{CaptureError, FrameSource, SourceKind};
use super::{Frame, Upload};
use async_trait::async_trait;
use image::codecs::gif::GifDecoder;
use image::codecs::png::PngDecoder;
use image::codecs::webp::WebPDecoder;
use image::{AnimationDecoder, DynamicImage, ImageFormat, RgbImage};
use std::io::Cursor;
use std::sync::Arc;
use std::time::Duration;
use tokio::time::Instant;

/// Frames shorter than this are shown for [`DEFAULT_FRAME_DELAY`] instead.
const MIN_FRAME_DELAY: Duration = Duration::from_millis(10);
const DEFAULT_FRAME_DELAY: Duration = Duration::from_millis(100);

/// One decoded video frame and the time it starts showing.
#[derive(Debug, Clone)]
pub struct VideoFrame {
    /// Offset from the start of the video.
    pub start: Duration,
    /// Decoded pixels.
    pub image: RgbImage,
}

/// A fully decoded video held in memory.
#[derive(Debug, Clone, Default)]
pub struct DecodedVideo {
    frames: Vec<VideoFrame>,
    duration: Duration,
}

impl DecodedVideo {
    /// Builds a video from `(display duration, image)` pairs in play order.
    pub fn from_frames(frames: impl IntoIterator<Item = (Duration, RgbImage)>) -> Self {
        let mut start = Duration::ZERO;
        let frames: Vec<VideoFrame> = frames
            .into_iter()
            .map(|(delay, image)| {
                let delay = if delay < MIN_FRAME_DELAY {
                    DEFAULT_FRAME_DELAY
                } else {
                    delay
                };
                let frame = VideoFrame { start, image };
                start += delay;
                frame
            })
            .collect();
        Self {
            frames,
            duration: start,
        }
    }

    /// Total play length.
    pub fn duration(&self) -> Duration {
        self.duration
    }

    /// Number of frames.
    pub fn len(&self) -> usize {
        self.frames.len()
    }

    /// True when nothing was decoded.
    pub fn is_empty(&self) -> bool {
        self.frames.is_empty()
    }

    /// Index of the frame showing at `position`.
    pub fn index_at(&self, position: Duration) -> Option<usize> {
        if self.frames.is_empty() {
            return None;
        }
        let idx = self.frames.partition_point(|f| f.start <= position);
        Some(idx.saturating_sub(1))
    }

    /// Frame showing at `position`; positions past the end show the last frame.
    pub fn frame_at(&self, position: Duration) -> Option<&VideoFrame> {
        self.index_at(position).map(|i| &self.frames[i])
    }
}

/// Turns uploaded bytes into decoded frames.
pub trait VideoDecoder: Send + Sync {
    /// Decodes the whole video. Called on the blocking pool.
    fn decode(&self, data: &[u8]) -> Result<DecodedVideo, CaptureError>;
}

/// Decoder for animated image containers (GIF, APNG, animated WebP).
///
/// A non-animated PNG or WebP decodes as a one-frame video.
#[derive(Debug, Clone, Copy, Default)]
pub struct AnimatedImageDecoder;

impl AnimatedImageDecoder {
    fn collect(frames: image::Frames<'_>) -> Result<DecodedVideo, CaptureError> {
        let frames = frames
            .collect_frames()
            .map_err(|e| CaptureError::Decode(e.to_string()))?;
        Ok(DecodedVideo::from_frames(frames.into_iter().map(|f| {
            let delay = Duration::from(f.delay());
            (delay, DynamicImage::ImageRgba8(f.into_buffer()).to_rgb8())
        })))
    }

    fn single(data: &[u8]) -> Result<DecodedVideo, CaptureError> {
        let image = image::load_from_memory(data).map_err(|e| CaptureError::Decode(e.to_string()))?;
        Ok(DecodedVideo::from_frames([(DEFAULT_FRAME_DELAY, image.to_rgb8())]))
    }
}

impl VideoDecoder for AnimatedImageDecoder {
    fn decode(&self, data: &[u8]) -> Result<DecodedVideo, CaptureError> {
        let format = image::guess_format(data).map_err(|_| {
            CaptureError::UnsupportedMedia(
                "no decoder for this video container (container formats need the `video` feature)"
                    .to_string(),
            )
        })?;
        let decode_err = |e: image::ImageError| CaptureError::Decode(e.to_string());

        match format {
            ImageFormat::Gif => {
                let decoder = GifDecoder::new(Cursor::new(data)).map_err(decode_err)?;
                Self::collect(decoder.into_frames())
            }
            ImageFormat::Png => {
                let decoder = PngDecoder::new(Cursor::new(data)).map_err(decode_err)?;
                if decoder.is_apng().map_err(decode_err)? {
                    let apng = decoder.apng().map_err(decode_err)?;
                    Self::collect(apng.into_frames())
                } else {
                    Self::single(data)
                }
            }
            ImageFormat::WebP => {
                let decoder = WebPDecoder::new(Cursor::new(data)).map_err(decode_err)?;
                if decoder.has_animation() {
                    Self::collect(decoder.into_frames())
                } else {
                    Self::single(data)
                }
            }
            other => Err(CaptureError::UnsupportedMedia(format!(
                "{} is not a video container",
                other.to_mime_type()
            ))),
        }
    }
}

#[derive(Debug, Clone, Copy)]
struct Playback {
    origin: Instant,
    paused_at: Option<Duration>,
}

impl Playback {
    fn start() -> Self {
        Self {
            origin: Instant::now(),
            paused_at: None,
        }
    }

    fn elapsed(&self) -> Duration {
        self.paused_at.unwrap_or_else(|| self.origin.elapsed())
    }

    fn seek(&mut self, position: Duration) {
        if self.paused_at.is_some() {
            self.paused_at = Some(position);
        } else {
            let now = Instant::now();
            self.origin = now.checked_sub(position).unwrap_or(now);
        }
    }
}

/// Frame source for an uploaded video.
pub struct VideoSource {
    name: String,
    data: Arc<[u8]>,
    decoder: Arc<dyn VideoDecoder>,
    video: Option<Arc<DecodedVideo>>,
    playback: Playback,
    looping: bool,
    jpeg_quality: u8,
    sequence: u64,
}

impl VideoSource {
    /// Wraps a video upload with the given decoder.
    pub fn new(upload: Upload, decoder: Arc<dyn VideoDecoder>, jpeg_quality: u8) -> Self {
        Self {
            name: upload.name,
            data: upload.data.into(),
            decoder,
            video: None,
            playback: Playback::start(),
            looping: true,
            jpeg_quality,
            sequence: 0,
        }
    }

    /// Whether playback restarts after the last frame (default true).
    pub fn set_looping(&mut self, looping: bool) {
        self.looping = looping;
    }

    /// Current playback position.
    pub fn position(&self) -> Duration {
        let elapsed = self.playback.elapsed();
        match self.video.as_deref() {
            Some(video) if self.looping && !video.duration().is_zero() => {
                let nanos = elapsed.as_nanos() % video.duration().as_nanos();
                Duration::from_nanos(nanos as u64)
            }
            Some(video) => elapsed.min(video.duration()),
            None => Duration::ZERO,
        }
    }

    /// Pauses playback at the current position.
    pub fn pause(&mut self) {
        if self.playback.paused_at.is_none() {
            self.playback.paused_at = Some(self.position());
        }
    }

    /// Resumes playback from the paused position.
    pub fn play(&mut self) {
        if let Some(position) = self.playback.paused_at.take() {
            self.playback.seek(position);
        }
    }

    /// Moves playback to `position`.
    pub fn seek(&mut self, position: Duration) {
        self.playback.seek(position);
    }
}

#[async_trait]
impl FrameSource for VideoSource {
    fn kind(&self) -> SourceKind {
        SourceKind::Video
    }

    fn supports_repeated_capture(&self) -> bool {
        true
    }

    async fn activate(&mut self) -> Result<(), CaptureError> {
        if self.video.is_some() {
            return Ok(());
        }

        let data = Arc::clone(&self.data);
        let decoder = Arc::clone(&self.decoder);
        let video = tokio::task::spawn_blocking(move || decoder.decode(&data))
            .await
            .map_err(|e| CaptureError::Decode(format!("decoder task failed: {e}")))??;

        tracing::info!(
            name = %self.name,
            frames = video.len(),
            duration_ms = video.duration().as_millis() as u64,
            "video loaded"
        );
        self.video = Some(Arc::new(video));
        self.playback = Playback::start();
        self.sequence = 0;
        Ok(())
    }

    async fn capture(&mut self) -> Result<Option<Frame>, CaptureError> {
        let position = self.position();
        let Some(video) = self.video.as_ref().map(Arc::clone) else {
            return Ok(None);
        };

        let quality = self.jpeg_quality;
        let sequence = self.sequence + 1;
        let encoded = tokio::task::spawn_blocking(move || {
            video
                .frame_at(position)
                .map(|current| Frame::from_rgb(&current.image, quality, sequence))
        })
        .await
        .map_err(|e| CaptureError::Decode(format!("encoder task failed: {e}")))?;
        let Some(frame) = encoded
            .transpose()
            .map_err(|e| CaptureError::Decode(e.to_string()))?
        else {
            return Ok(None);
        };

        self.sequence = sequence;
        tracing::trace!(
            position_ms = position.as_millis() as u64,
            sequence,
            "video frame captured"
        );
        Ok(Some(frame))
    }

    fn is_active(&self) -> bool {
        self.video.is_some()
    }

    fn release(&mut self) {
        self.video = None;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::Rgb;

    fn solid(value: u8) -> RgbImage {
        RgbImage::from_pixel(4, 4, Rgb([value, value, value]))
    }

    struct FixedDecoder(DecodedVideo);

    impl VideoDecoder for FixedDecoder {
        fn decode(&self, _data: &[u8]) -> Result<DecodedVideo, CaptureError> {
            Ok(self.0.clone())
        }
    }

    fn three_frame_source() -> VideoSource {
        let video = DecodedVideo::from_frames([
            (Duration::from_millis(100), solid(0)),
            (Duration::from_millis(100), solid(128)),
            (Duration::from_millis(100), solid(255)),
        ]);
        VideoSource::new(
            Upload::new("clip.gif", "video/gif", vec![]),
            Arc::new(FixedDecoder(video)),
            90,
        )
    }

    #[test]
    fn test_frame_lookup() {
        let video = DecodedVideo::from_frames([
            (Duration::from_millis(50), solid(1)),
            (Duration::ZERO, solid(2)),
        ]);
        // Zero delay falls back to the default display time
        assert_eq!(video.duration(), Duration::from_millis(150));
        assert_eq!(video.index_at(Duration::ZERO), Some(0));
        assert_eq!(video.index_at(Duration::from_millis(49)), Some(0));
        assert_eq!(video.index_at(Duration::from_millis(50)), Some(1));
        assert_eq!(video.index_at(Duration::from_secs(9)), Some(1));
        assert_eq!(DecodedVideo::default().index_at(Duration::ZERO), None);
    }

    #[tokio::test(start_paused = true)]
    async fn test_not_ready_before_activation() {
        let mut source = three_frame_source();
        assert!(source.capture().await.unwrap().is_none());
        assert!(!source.is_active());
    }

    #[tokio::test(start_paused = true)]
    async fn test_capture_follows_playback() {
        let mut source = three_frame_source();
        source.activate().await.unwrap();

        tokio::time::advance(Duration::from_millis(150)).await;
        assert_eq!(source.position(), Duration::from_millis(150));
        let frame = source.capture().await.unwrap().unwrap();
        assert_eq!(frame.sequence(), 1);

        // Loops back to the start
        tokio::time::advance(Duration::from_millis(200)).await;
        assert_eq!(source.position(), Duration::from_millis(50));
    }

    #[tokio::test(start_paused = true)]
    async fn test_pause_and_seek() {
        let mut source = three_frame_source();
        source.activate().await.unwrap();

        source.seek(Duration::from_millis(120));
        source.pause();
        tokio::time::advance(Duration::from_millis(500)).await;
        assert_eq!(source.position(), Duration::from_millis(120));

        source.play();
        tokio::time::advance(Duration::from_millis(30)).await;
        assert_eq!(source.position(), Duration::from_millis(150));
    }

    #[tokio::test(start_paused = true)]
    async fn test_non_looping_holds_last_frame() {
        let mut source = three_frame_source();
        source.set_looping(false);
        source.activate().await.unwrap();

        tokio::time::advance(Duration::from_secs(5)).await;
        assert_eq!(source.position(), Duration::from_millis(300));
        assert!(source.capture().await.unwrap().is_some());
    }

    #[test]
    fn test_decode_gif() {
        use image::codecs::gif::GifEncoder;
        use image::{Delay, RgbaImage};

        let mut bytes = Vec::new();
        {
            let mut encoder = GifEncoder::new(&mut bytes);
            for value in [0u8, 255] {
                let buffer = RgbaImage::from_pixel(4, 4, image::Rgba([value, 0, 0, 255]));
                let frame = image::Frame::from_parts(
                    buffer,
                    0,
                    0,
                    Delay::from_numer_denom_ms(200, 1),
                );
                encoder.encode_frame(frame).unwrap();
            }
        }

        let video = AnimatedImageDecoder.decode(&bytes).unwrap();
        assert_eq!(video.len(), 2);
        assert_eq!(video.duration(), Duration::from_millis(400));
    }

    #[test]
    fn test_decode_rejects_jpeg() {
        let image = solid(9);
        let data = crate::capture::frame::encode_jpeg(&image, 80).unwrap();
        assert!(matches!(
            AnimatedImageDecoder.decode(&data),
            Err(CaptureError::UnsupportedMedia(_))
        ));
    }
}
