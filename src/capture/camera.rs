//! Camera device abstraction.
//!
//! This module provides a trait-based abstraction over camera hardware,
//! allowing for both real camera input and mock implementations for testing.

use super::controls::{CameraCapabilities, CameraConstraint};
use super::CaptureConfig;
use image::{Rgb, RgbImage};
use parking_lot::Mutex;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use thiserror::Error;

/// Errors that can occur during camera operations.
#[derive(Debug, Error)]
pub enum CameraError {
    #[error("camera permission denied: {0}")]
    PermissionDenied(String),
    #[error("camera device not found: {0}")]
    DeviceNotFound(String),
    #[error("failed to open camera: {0}")]
    OpenFailed(String),
    #[error("constraint rejected: {0}")]
    ConstraintRejected(String),
    #[error("control not supported: {0}")]
    Unsupported(&'static str),
    #[error("failed to capture frame: {0}")]
    CaptureFailed(String),
    #[error("camera not initialized")]
    NotInitialized,
}

/// Trait for camera implementations.
///
/// A device is opened once per stay in camera mode and closed on every
/// path out of it. `grab` returning `Ok(None)` means the stream is live
/// but has not produced a decodable frame yet.
pub trait CameraDevice: Send {
    /// Acquires the stream and reports the controls the track exposes.
    fn open(&mut self, config: &CaptureConfig) -> Result<CameraCapabilities, CameraError>;

    /// Reads the most recent frame from the stream.
    fn grab(&mut self) -> Result<Option<RgbImage>, CameraError>;

    /// Applies a constraint update to the live track.
    fn apply(&mut self, constraint: CameraConstraint) -> Result<(), CameraError>;

    /// Number of live media tracks held by this device.
    fn active_tracks(&self) -> usize;

    /// Checks if the camera is currently open.
    fn is_open(&self) -> bool {
        self.active_tracks() > 0
    }

    /// Stops all tracks and releases the device.
    fn close(&mut self);
}

/// Shared view into a [`MockCamera`] that survives moving the camera into
/// a monitor.
#[derive(Debug, Clone, Default)]
pub struct MockCameraProbe {
    tracks: Arc<AtomicUsize>,
    applied: Arc<Mutex<Vec<CameraConstraint>>>,
    opens: Arc<AtomicUsize>,
}

impl MockCameraProbe {
    /// Live tracks currently held by the camera.
    pub fn active_tracks(&self) -> usize {
        self.tracks.load(Ordering::SeqCst)
    }

    /// Every constraint the camera accepted, in order.
    pub fn applied(&self) -> Vec<CameraConstraint> {
        self.applied.lock().clone()
    }

    /// How many times the camera was opened.
    pub fn open_count(&self) -> usize {
        self.opens.load(Ordering::SeqCst)
    }
}

/// Mock camera for testing that generates synthetic frames.
#[derive(Debug)]
pub struct MockCamera {
    capabilities: CameraCapabilities,
    width: u32,
    height: u32,
    warmup_frames: u32,
    warmup_remaining: u32,
    deny_permission: bool,
    reject_constraints: bool,
    open: bool,
    sequence: u64,
    probe: MockCameraProbe,
}

impl Default for MockCamera {
    fn default() -> Self {
        Self {
            capabilities: CameraCapabilities::default(),
            width: 320,
            height: 240,
            warmup_frames: 0,
            warmup_remaining: 0,
            deny_permission: false,
            reject_constraints: false,
            open: false,
            sequence: 0,
            probe: MockCameraProbe::default(),
        }
    }
}

impl MockCamera {
    pub fn new() -> Self {
        Self::default()
    }

    /// Reports the given capabilities when opened.
    pub fn with_capabilities(mut self, capabilities: CameraCapabilities) -> Self {
        self.capabilities = capabilities;
        self
    }

    /// Native resolution of the synthetic stream.
    pub fn with_resolution(mut self, width: u32, height: u32) -> Self {
        self.width = width.max(1);
        self.height = height.max(1);
        self
    }

    /// Number of grabs after each open that return no frame.
    pub fn with_warmup(mut self, frames: u32) -> Self {
        self.warmup_frames = frames;
        self
    }

    /// Simulates the user refusing camera access.
    pub fn denying_permission(mut self) -> Self {
        self.deny_permission = true;
        self
    }

    /// Simulates a track that rejects every constraint update.
    pub fn rejecting_constraints(mut self) -> Self {
        self.reject_constraints = true;
        self
    }

    /// Returns a probe for observing the camera after it has been moved.
    pub fn probe(&self) -> MockCameraProbe {
        self.probe.clone()
    }

    fn synthesize(&self) -> RgbImage {
        let shift = (self.sequence * 7) as u32;
        RgbImage::from_fn(self.width, self.height, |x, y| {
            Rgb([
                ((x + shift) % 256) as u8,
                ((y + shift / 2) % 256) as u8,
                ((x ^ y) % 256) as u8,
            ])
        })
    }
}

impl CameraDevice for MockCamera {
    fn open(&mut self, config: &CaptureConfig) -> Result<CameraCapabilities, CameraError> {
        if self.deny_permission {
            return Err(CameraError::PermissionDenied(
                "user dismissed the camera prompt".to_string(),
            ));
        }
        config
            .validate()
            .map_err(|e| CameraError::OpenFailed(e.to_string()))?;

        self.open = true;
        self.sequence = 0;
        self.warmup_remaining = self.warmup_frames;
        self.probe.tracks.store(1, Ordering::SeqCst);
        self.probe.opens.fetch_add(1, Ordering::SeqCst);
        tracing::info!(
            facing = ?config.facing,
            width = self.width,
            height = self.height,
            "MockCamera opened"
        );
        Ok(self.capabilities.clone())
    }

    fn grab(&mut self) -> Result<Option<RgbImage>, CameraError> {
        if !self.open {
            return Err(CameraError::NotInitialized);
        }
        if self.warmup_remaining > 0 {
            self.warmup_remaining -= 1;
            return Ok(None);
        }
        self.sequence += 1;
        Ok(Some(self.synthesize()))
    }

    fn apply(&mut self, constraint: CameraConstraint) -> Result<(), CameraError> {
        if !self.open {
            return Err(CameraError::NotInitialized);
        }
        if self.reject_constraints {
            return Err(CameraError::ConstraintRejected(format!("{constraint:?}")));
        }
        self.probe.applied.lock().push(constraint);
        Ok(())
    }

    fn active_tracks(&self) -> usize {
        self.probe.active_tracks()
    }

    fn close(&mut self) {
        if self.open {
            self.open = false;
            self.probe.tracks.store(0, Ordering::SeqCst);
            tracing::info!("MockCamera closed");
        }
    }
}
