//! Container video decoding (MP4, WebM, MOV, MKV, AVI) through OpenCV.
//!
//! OpenCV only reads from a path, so the upload is written to a temporary
//! file for the duration of the decode. Frames are sampled rather than kept
//! at the native rate: the monitor reads one frame every few seconds and a
//! full-rate 1080p clip would not fit in memory.

use super::source::CaptureError;
use super::video::{AnimatedImageDecoder, DecodedVideo, VideoDecoder};
use image::{ImageFormat, RgbImage};
use opencv::{
    core::Mat,
    imgproc,
    prelude::*,
    videoio::{self, VideoCapture},
};
use std::io::Write;
use std::time::Duration;

/// Used when the container does not report a usable frame rate.
const FALLBACK_FPS: f64 = 30.0;

/// Decoder for real video containers.
///
/// Animated images are handed to [`AnimatedImageDecoder`]; everything else
/// goes through OpenCV's video backends.
#[derive(Debug, Clone)]
pub struct OpenCvDecoder {
    sample_interval: Duration,
    max_frames: usize,
}

impl Default for OpenCvDecoder {
    fn default() -> Self {
        Self {
            sample_interval: Duration::from_millis(500),
            max_frames: 120,
        }
    }
}

impl OpenCvDecoder {
    /// Creates a decoder with the default sampling.
    pub fn new() -> Self {
        Self::default()
    }

    /// Keeps at most one frame per `interval` of play time.
    pub fn with_sample_interval(mut self, interval: Duration) -> Self {
        self.sample_interval = interval;
        self
    }

    /// Upper bound on frames held in memory. Long clips are sampled more
    /// sparsely to stay under it.
    pub fn with_max_frames(mut self, max_frames: usize) -> Self {
        self.max_frames = max_frames.max(1);
        self
    }
}

fn cv_err(e: opencv::Error) -> CaptureError {
    CaptureError::Decode(e.to_string())
}

fn io_err(e: std::io::Error) -> CaptureError {
    CaptureError::Decode(format!("failed to stage video: {e}"))
}

/// File extension hint for the backend, from the container magic bytes.
fn container_suffix(data: &[u8]) -> &'static str {
    match data {
        [_, _, _, _, b'f', b't', b'y', b'p', ..] => ".mp4",
        [0x1a, 0x45, 0xdf, 0xa3, ..] => ".mkv",
        [b'R', b'I', b'F', b'F', _, _, _, _, b'A', b'V', b'I', b' ', ..] => ".avi",
        _ => ".bin",
    }
}

/// Number of native frames between two kept frames.
fn sample_step(fps: f64, frame_count: f64, interval: Duration, max_frames: usize) -> u64 {
    let by_interval = (interval.as_secs_f64() * fps).round().max(1.0);
    let by_budget = if frame_count.is_finite() && frame_count > 0.0 {
        (frame_count / max_frames.max(1) as f64).ceil().max(1.0)
    } else {
        1.0
    };
    by_interval.max(by_budget) as u64
}

fn to_rgb(bgr: &Mat) -> Result<RgbImage, CaptureError> {
    let mut rgb = Mat::default();
    imgproc::cvt_color(bgr, &mut rgb, imgproc::COLOR_BGR2RGB, 0).map_err(cv_err)?;
    let (width, height) = (rgb.cols().max(0) as u32, rgb.rows().max(0) as u32);
    let bytes = rgb.data_bytes().map_err(cv_err)?.to_vec();
    RgbImage::from_raw(width, height, bytes)
        .ok_or_else(|| CaptureError::Decode("frame buffer does not match its size".to_string()))
}

impl VideoDecoder for OpenCvDecoder {
    fn decode(&self, data: &[u8]) -> Result<DecodedVideo, CaptureError> {
        if matches!(
            image::guess_format(data),
            Ok(ImageFormat::Gif | ImageFormat::Png | ImageFormat::WebP)
        ) {
            return AnimatedImageDecoder.decode(data);
        }

        let mut staged = tempfile::Builder::new()
            .prefix("lab-monitor-")
            .suffix(container_suffix(data))
            .tempfile()
            .map_err(io_err)?;
        staged.write_all(data).map_err(io_err)?;
        staged.flush().map_err(io_err)?;
        let path = staged
            .path()
            .to_str()
            .ok_or_else(|| CaptureError::Decode("temporary path is not UTF-8".to_string()))?;

        let mut capture = VideoCapture::from_file(path, videoio::CAP_ANY).map_err(cv_err)?;
        if !capture.is_opened().map_err(cv_err)? {
            return Err(CaptureError::UnsupportedMedia(
                "no decoder for this video container".to_string(),
            ));
        }

        let fps = capture.get(videoio::CAP_PROP_FPS).map_err(cv_err)?;
        let fps = if fps.is_finite() && fps > 0.0 { fps } else { FALLBACK_FPS };
        let frame_count = capture.get(videoio::CAP_PROP_FRAME_COUNT).unwrap_or(0.0);
        let step = sample_step(fps, frame_count, self.sample_interval, self.max_frames);

        let mut kept = Vec::new();
        let mut bgr = Mat::default();
        let mut index = 0u64;
        while capture.read(&mut bgr).map_err(cv_err)? {
            if bgr.empty() {
                break;
            }
            if index % step == 0 {
                kept.push(to_rgb(&bgr)?);
                if kept.len() >= self.max_frames {
                    break;
                }
            }
            index += 1;
        }
        if let Err(e) = capture.release() {
            tracing::debug!(error = %e, "failed to release video capture");
        }

        if kept.is_empty() {
            return Err(CaptureError::Decode("video contains no frames".to_string()));
        }
        tracing::debug!(fps, step, native_frames = index, kept = kept.len(), "video decoded");

        let delay = Duration::from_secs_f64(step as f64 / fps);
        Ok(DecodedVideo::from_frames(kept.into_iter().map(|image| (delay, image))))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use opencv::core::{Scalar, Size, CV_8UC3};
    use opencv::videoio::VideoWriter;

    fn mjpeg_clip(frames: i32, fps: f64) -> Vec<u8> {
        let file = tempfile::Builder::new().suffix(".avi").tempfile().unwrap();
        let path = file.path().to_str().unwrap().to_string();
        let fourcc = VideoWriter::fourcc('M', 'J', 'P', 'G').unwrap();
        let mut writer = VideoWriter::new(&path, fourcc, fps, Size::new(32, 24), true).unwrap();
        assert!(writer.is_opened().unwrap());
        for i in 0..frames {
            let value = f64::from(i * 10);
            let frame =
                Mat::new_rows_cols_with_default(24, 32, CV_8UC3, Scalar::all(value)).unwrap();
            writer.write(&frame).unwrap();
        }
        writer.release().unwrap();
        std::fs::read(&path).unwrap()
    }

    #[test]
    fn test_sample_step() {
        // Two frames per second of a 30 fps clip
        assert_eq!(sample_step(30.0, 300.0, Duration::from_millis(500), 120), 15);
        // Long clip is thinned to the frame budget
        assert_eq!(sample_step(30.0, 36_000.0, Duration::from_millis(500), 120), 300);
        // Unknown length and a tiny interval still step by at least one
        assert_eq!(sample_step(30.0, f64::NAN, Duration::ZERO, 120), 1);
    }

    #[test]
    fn test_container_suffix() {
        assert_eq!(container_suffix(b"\0\0\0\x18ftypisom"), ".mp4");
        assert_eq!(container_suffix(&[0x1a, 0x45, 0xdf, 0xa3, 0x01]), ".mkv");
        assert_eq!(container_suffix(b"RIFF\0\0\0\0AVI LIST"), ".avi");
        assert_eq!(container_suffix(b"xx"), ".bin");
    }

    #[test]
    fn test_decode_mjpeg_avi() {
        let data = mjpeg_clip(20, 10.0);
        let video = OpenCvDecoder::new().decode(&data).unwrap();

        // 20 frames at 10 fps sampled every 500 ms
        assert_eq!(video.len(), 4);
        assert!((video.duration().as_secs_f64() - 2.0).abs() < 0.01);
        let first = video.frame_at(Duration::ZERO).unwrap();
        assert_eq!(first.image.dimensions(), (32, 24));
    }

    #[test]
    fn test_frame_budget_caps_memory() {
        let data = mjpeg_clip(20, 10.0);
        let video = OpenCvDecoder::new()
            .with_sample_interval(Duration::ZERO)
            .with_max_frames(5)
            .decode(&data)
            .unwrap();
        assert_eq!(video.len(), 5);
    }

    #[test]
    fn test_garbage_rejected() {
        let result = OpenCvDecoder::new().decode(b"\0\0\0\x18ftypisom not really a movie");
        assert!(result.is_err());
    }

    #[test]
    fn test_animated_images_still_supported() {
        use image::codecs::gif::GifEncoder;
        use image::{Delay, Rgba, RgbaImage};

        let mut bytes = Vec::new();
        {
            let mut encoder = GifEncoder::new(&mut bytes);
            let buffer = RgbaImage::from_pixel(4, 4, Rgba([0, 0, 255, 255]));
            let frame = image::Frame::from_parts(buffer, 0, 0, Delay::from_numer_denom_ms(100, 1));
            encoder.encode_frame(frame).unwrap();
        }
        assert_eq!(OpenCvDecoder::new().decode(&bytes).unwrap().len(), 1);
    }
}
