//! Native camera device backed by `nokhwa`.
//!
//! Platform camera handles are not always `Send`, so the stream lives on a
//! dedicated thread and the device talks to it over channels.

use super::camera::{CameraDevice, CameraError};
use super::controls::{CameraCapabilities, CameraConstraint, FocusMode, RangeCapability};
use super::CaptureConfig;
use image::RgbImage;
use nokhwa::pixel_format::RgbFormat;
use nokhwa::utils::{
    CameraFormat, CameraIndex, ControlValueDescription, ControlValueSetter, FrameFormat,
    KnownCameraControl, RequestedFormat, RequestedFormatType, Resolution,
};
use nokhwa::Camera;
use std::sync::mpsc;
use std::thread::JoinHandle;

type Reply<T> = mpsc::Sender<Result<T, CameraError>>;

enum Command {
    Grab(Reply<Option<RgbImage>>),
    Apply(CameraConstraint, Reply<()>),
    Close,
}

struct Worker {
    commands: mpsc::Sender<Command>,
    thread: JoinHandle<()>,
}

/// A physical camera opened through the platform backend.
#[derive(Default)]
pub struct NokhwaCamera {
    worker: Option<Worker>,
}

impl NokhwaCamera {
    pub fn new() -> Self {
        Self::default()
    }

    fn request<T>(&self, build: impl FnOnce(Reply<T>) -> Command) -> Result<T, CameraError> {
        let worker = self.worker.as_ref().ok_or(CameraError::NotInitialized)?;
        let (tx, rx) = mpsc::channel();
        worker
            .commands
            .send(build(tx))
            .map_err(|_| CameraError::CaptureFailed("camera thread stopped".to_string()))?;
        rx.recv()
            .map_err(|_| CameraError::CaptureFailed("camera thread stopped".to_string()))?
    }
}

impl CameraDevice for NokhwaCamera {
    fn open(&mut self, config: &CaptureConfig) -> Result<CameraCapabilities, CameraError> {
        self.close();

        let (commands, inbox) = mpsc::channel();
        let (ready_tx, ready_rx) = mpsc::channel();
        let config = config.clone();
        let thread = std::thread::Builder::new()
            .name("camera".to_string())
            .spawn(move || run(config, inbox, ready_tx))
            .map_err(|e| CameraError::OpenFailed(e.to_string()))?;

        let capabilities = ready_rx
            .recv()
            .map_err(|_| CameraError::OpenFailed("camera thread exited".to_string()))?;
        match capabilities {
            Ok(capabilities) => {
                self.worker = Some(Worker { commands, thread });
                Ok(capabilities)
            }
            Err(e) => {
                let _ = thread.join();
                Err(e)
            }
        }
    }

    fn grab(&mut self) -> Result<Option<RgbImage>, CameraError> {
        self.request(Command::Grab)
    }

    fn apply(&mut self, constraint: CameraConstraint) -> Result<(), CameraError> {
        self.request(|reply| Command::Apply(constraint, reply))
    }

    fn active_tracks(&self) -> usize {
        usize::from(self.worker.is_some())
    }

    fn close(&mut self) {
        if let Some(worker) = self.worker.take() {
            let _ = worker.commands.send(Command::Close);
            if worker.thread.join().is_err() {
                tracing::warn!("camera thread panicked during shutdown");
            }
            tracing::info!("native camera closed");
        }
    }
}

impl Drop for NokhwaCamera {
    fn drop(&mut self) {
        self.close();
    }
}

fn run(
    config: CaptureConfig,
    inbox: mpsc::Receiver<Command>,
    ready: mpsc::Sender<Result<CameraCapabilities, CameraError>>,
) {
    let mut camera = match open_camera(&config) {
        Ok(camera) => camera,
        Err(e) => {
            let _ = ready.send(Err(e));
            return;
        }
    };
    if ready.send(Ok(probe_capabilities(&camera))).is_err() {
        let _ = camera.stop_stream();
        return;
    }

    while let Ok(command) = inbox.recv() {
        match command {
            Command::Grab(reply) => {
                let _ = reply.send(grab(&mut camera));
            }
            Command::Apply(constraint, reply) => {
                let _ = reply.send(apply(&mut camera, constraint));
            }
            Command::Close => break,
        }
    }

    if let Err(e) = camera.stop_stream() {
        tracing::warn!(error = %e, "failed to stop camera stream");
    }
}

fn open_error(e: nokhwa::NokhwaError) -> CameraError {
    classify_open_error(e.to_string())
}

fn classify_open_error(message: String) -> CameraError {
    let lower = message.to_ascii_lowercase();
    if lower.contains("permission") || lower.contains("denied") || lower.contains("not authorized") {
        CameraError::PermissionDenied(message)
    } else if lower.contains("not found") || lower.contains("no device") || lower.contains("out of range") {
        CameraError::DeviceNotFound(message)
    } else {
        CameraError::OpenFailed(message)
    }
}

fn open_camera(config: &CaptureConfig) -> Result<Camera, CameraError> {
    let format = RequestedFormat::new::<RgbFormat>(RequestedFormatType::Closest(
        CameraFormat::new(
            Resolution::new(config.ideal_width, config.ideal_height),
            FrameFormat::MJPEG,
            config.fps,
        ),
    ));

    // Facing is advisory: platform backends only expose device indices
    tracing::debug!(device = config.device_id, facing = ?config.facing, "opening native camera");
    let mut camera = Camera::new(CameraIndex::Index(config.device_id), format).map_err(open_error)?;
    camera.open_stream().map_err(open_error)?;
    Ok(camera)
}

fn range_of(camera: &Camera, control: KnownCameraControl) -> Option<RangeCapability> {
    let control = camera.camera_control(control).ok()?;
    match control.description() {
        ControlValueDescription::IntegerRange { min, max, step, .. } => {
            RangeCapability::from_reported(*min as f64, *max as f64, *step as f64)
        }
        ControlValueDescription::FloatRange { min, max, step, .. } => {
            RangeCapability::from_reported(*min, *max, *step)
        }
        _ => None,
    }
}

fn probe_capabilities(camera: &Camera) -> CameraCapabilities {
    let focus_distance = range_of(camera, KnownCameraControl::Focus);
    let mut focus_modes = vec![FocusMode::Continuous];
    if focus_distance.is_some() {
        focus_modes.push(FocusMode::Manual);
    }
    CameraCapabilities {
        zoom: range_of(camera, KnownCameraControl::Zoom),
        focus_distance,
        focus_modes,
    }
}

fn grab(camera: &mut Camera) -> Result<Option<RgbImage>, CameraError> {
    let buffer = camera
        .frame()
        .map_err(|e| CameraError::CaptureFailed(e.to_string()))?;
    if buffer.buffer().is_empty() {
        return Ok(None);
    }
    let decoded = buffer
        .decode_image::<RgbFormat>()
        .map_err(|e| CameraError::CaptureFailed(e.to_string()))?;
    let (width, height) = (decoded.width(), decoded.height());
    Ok(RgbImage::from_raw(width, height, decoded.into_raw()))
}

fn apply(camera: &mut Camera, constraint: CameraConstraint) -> Result<(), CameraError> {
    let (control, value) = match constraint {
        CameraConstraint::Zoom(value) => (KnownCameraControl::Zoom, value),
        CameraConstraint::FocusDistance(value) => (KnownCameraControl::Focus, value),
        CameraConstraint::FocusMode(FocusMode::Manual) => return Ok(()),
        CameraConstraint::FocusMode(FocusMode::Continuous) => {
            return Err(CameraError::Unsupported("autofocus toggle"))
        }
    };
    camera
        .set_camera_control(control, ControlValueSetter::Integer(value.round() as i64))
        .map_err(|e| CameraError::ConstraintRejected(e.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_open_errors_classified() {
        assert!(matches!(
            classify_open_error("Permission denied by user".to_string()),
            CameraError::PermissionDenied(_)
        ));
        assert!(matches!(
            classify_open_error("Could not open device 3: No device found".to_string()),
            CameraError::DeviceNotFound(_)
        ));
        assert!(matches!(
            classify_open_error("stream busy".to_string()),
            CameraError::OpenFailed(_)
        ));
    }
}
