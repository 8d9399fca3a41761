//! Live camera frame source.

use super::camera::{CameraDevice, CameraError};
use super::controls::{CameraCapabilities, CameraConstraint, CameraSettings, FocusMode};
use super::source::{CaptureError, FrameSource, SourceKind};
use super::{CaptureConfig, Frame};
use async_trait::async_trait;
use parking_lot::Mutex;
use std::sync::Arc;

type SharedDevice = Arc<Mutex<Box<dyn CameraDevice>>>;

/// Runs a device call on the blocking pool.
///
/// Opening a stream, grabbing a frame and applying a constraint all wait on
/// the platform backend.
async fn on_device<T, F>(device: &SharedDevice, call: F) -> Result<T, CameraError>
where
    T: Send + 'static,
    F: FnOnce(&mut Box<dyn CameraDevice>) -> Result<T, CameraError> + Send + 'static,
{
    let device = Arc::clone(device);
    tokio::task::spawn_blocking(move || {
        let mut device = device.lock();
        call(&mut device)
    })
    .await
    .map_err(|e| CameraError::CaptureFailed(format!("camera task failed: {e}")))?
}

/// Frame source backed by a camera device.
///
/// Owns the device exclusively. Capability and control state only exist
/// while the stream is acquired and are dropped on release. Dropping the
/// source releases the device as well.
pub struct CameraSource {
    device: SharedDevice,
    config: CaptureConfig,
    capabilities: Option<CameraCapabilities>,
    settings: Option<CameraSettings>,
    sequence: u64,
}

impl CameraSource {
    /// Wraps a device; nothing is acquired until [`FrameSource::activate`].
    pub fn new(device: Box<dyn CameraDevice>, config: CaptureConfig) -> Self {
        Self {
            device: Arc::new(Mutex::new(device)),
            config,
            capabilities: None,
            settings: None,
            sequence: 0,
        }
    }

    /// Capabilities of the live track, if acquired.
    pub fn capabilities(&self) -> Option<&CameraCapabilities> {
        self.capabilities.as_ref()
    }

    /// Current control values, if acquired.
    pub fn settings(&self) -> Option<CameraSettings> {
        self.settings
    }

    /// Live media tracks held by the device.
    pub fn active_tracks(&self) -> usize {
        self.device.lock().active_tracks()
    }

    /// Sets the zoom level, clamped to the advertised range.
    ///
    /// Returns the value now shown for the control, or `None` when the
    /// camera is not acquired or has no zoom. A rejected constraint keeps
    /// the new value but has no effect on the stream.
    pub async fn set_zoom(&mut self, zoom: f64) -> Option<f64> {
        let range = self.capabilities.as_ref()?.zoom;
        let Some(range) = range else {
            tracing::warn!("zoom requested but the camera does not support it");
            return None;
        };

        let value = range.clamp(zoom);
        self.apply_or_warn(CameraConstraint::Zoom(value)).await;
        if let Some(settings) = self.settings.as_mut() {
            settings.zoom = Some(value);
        }
        Some(value)
    }

    /// Switches between continuous and manual focus.
    pub async fn set_focus_mode(&mut self, mode: FocusMode) -> Option<FocusMode> {
        let supported = self.capabilities.as_ref()?.supports_focus_mode(mode);
        if !supported {
            tracing::warn!(%mode, "focus mode not supported by the camera");
            return None;
        }

        self.apply_or_warn(CameraConstraint::FocusMode(mode)).await;
        if let Some(settings) = self.settings.as_mut() {
            settings.focus_mode = mode;
        }
        Some(mode)
    }

    /// Holds focus at the given distance, switching to manual focus.
    pub async fn set_focus_distance(&mut self, distance: f64) -> Option<f64> {
        let range = self.capabilities.as_ref()?.focus_distance;
        let Some(range) = range else {
            tracing::warn!("manual focus requested but the camera does not support it");
            return None;
        };

        let value = range.clamp(distance);
        self.apply_or_warn(CameraConstraint::FocusDistance(value)).await;
        if let Some(settings) = self.settings.as_mut() {
            settings.focus_mode = FocusMode::Manual;
            settings.focus_distance = Some(value);
        }
        Some(value)
    }

    async fn apply_or_warn(&mut self, constraint: CameraConstraint) {
        if let Err(e) = on_device(&self.device, move |device| device.apply(constraint)).await {
            tracing::warn!(?constraint, error = %e, "camera constraint not applied");
        }
    }
}

#[async_trait]
impl FrameSource for CameraSource {
    fn kind(&self) -> SourceKind {
        SourceKind::Camera
    }

    fn supports_repeated_capture(&self) -> bool {
        true
    }

    async fn activate(&mut self) -> Result<(), CaptureError> {
        if self.is_active() {
            return Ok(());
        }

        let config = self.config.clone();
        let capabilities = on_device(&self.device, move |device| device.open(&config)).await?;
        tracing::info!(
            zoom = capabilities.zoom.is_some(),
            focus_distance = capabilities.focus_distance.is_some(),
            focus_modes = capabilities.focus_modes.len(),
            "camera stream acquired"
        );
        self.settings = Some(CameraSettings::initial(&capabilities));
        self.capabilities = Some(capabilities);
        self.sequence = 0;
        Ok(())
    }

    async fn capture(&mut self) -> Result<Option<Frame>, CaptureError> {
        if !self.is_active() {
            return Err(CaptureError::Inactive);
        }

        // Grab and encode together; a 1080p JPEG encode is not cheap
        let quality = self.config.jpeg_quality;
        let sequence = self.sequence + 1;
        let frame = on_device(&self.device, move |device| {
            let Some(image) = device.grab()? else {
                return Ok(None);
            };
            Frame::from_rgb(&image, quality, sequence)
                .map(Some)
                .map_err(|e| CameraError::CaptureFailed(e.to_string()))
        })
        .await?;

        if frame.is_some() {
            self.sequence = sequence;
        }
        Ok(frame)
    }

    fn is_active(&self) -> bool {
        self.capabilities.is_some() && self.device.lock().is_open()
    }

    fn release(&mut self) {
        let mut device = self.device.lock();
        if device.is_open() {
            device.close();
            tracing::info!("camera stream released");
        }
        drop(device);
        self.capabilities = None;
        self.settings = None;
    }
}

impl Drop for CameraSource {
    fn drop(&mut self) {
        self.release();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::capture::controls::RangeCapability;
    use crate::capture::MockCamera;

    fn full_caps() -> CameraCapabilities {
        CameraCapabilities {
            zoom: Some(RangeCapability::new(1.0, 4.0, 0.5)),
            focus_distance: Some(RangeCapability::new(0.0, 10.0, 0.0)),
            focus_modes: vec![FocusMode::Continuous, FocusMode::Manual],
        }
    }

    #[tokio::test]
    async fn test_activate_capture_release() {
        let camera = MockCamera::new().with_resolution(16, 16).with_warmup(1);
        let probe = camera.probe();
        let mut source = CameraSource::new(Box::new(camera), CaptureConfig::default());

        source.activate().await.unwrap();
        assert!(source.is_active());

        // Warm-up frame is not an error
        assert!(source.capture().await.unwrap().is_none());
        let frame = source.capture().await.unwrap().unwrap();
        assert_eq!(frame.sequence(), 1);
        assert_eq!(frame.mime_type(), "image/jpeg");

        source.release();
        assert!(!source.is_active());
        assert!(source.capabilities().is_none());
        assert_eq!(probe.active_tracks(), 0);

        // Releasing twice is harmless
        source.release();
    }

    #[tokio::test]
    async fn test_capture_inactive() {
        let mut source = CameraSource::new(Box::new(MockCamera::new()), CaptureConfig::default());
        assert!(matches!(source.capture().await, Err(CaptureError::Inactive)));
    }

    #[tokio::test]
    async fn test_zoom_clamped_and_applied() {
        let camera = MockCamera::new().with_capabilities(full_caps());
        let probe = camera.probe();
        let mut source = CameraSource::new(Box::new(camera), CaptureConfig::default());
        source.activate().await.unwrap();

        assert_eq!(source.set_zoom(9.0).await, Some(4.0));
        assert_eq!(source.settings().unwrap().zoom, Some(4.0));
        assert_eq!(probe.applied(), vec![CameraConstraint::Zoom(4.0)]);
    }

    #[tokio::test]
    async fn test_focus_distance_switches_to_manual() {
        let camera = MockCamera::new().with_capabilities(full_caps());
        let mut source = CameraSource::new(Box::new(camera), CaptureConfig::default());
        source.activate().await.unwrap();

        assert_eq!(source.set_focus_distance(3.5).await, Some(3.5));
        let settings = source.settings().unwrap();
        assert_eq!(settings.focus_mode, FocusMode::Manual);
        assert_eq!(settings.focus_distance, Some(3.5));
    }

    #[tokio::test]
    async fn test_constraint_failure_is_not_fatal() {
        let camera = MockCamera::new()
            .with_capabilities(full_caps())
            .rejecting_constraints()
            .with_resolution(8, 8);
        let mut source = CameraSource::new(Box::new(camera), CaptureConfig::default());
        source.activate().await.unwrap();

        assert_eq!(source.set_zoom(2.0).await, Some(2.0));
        assert_eq!(source.set_focus_mode(FocusMode::Manual).await, Some(FocusMode::Manual));
        assert!(source.capture().await.unwrap().is_some());
    }

    #[tokio::test]
    async fn test_unsupported_controls() {
        let mut source = CameraSource::new(Box::new(MockCamera::new()), CaptureConfig::default());
        assert_eq!(source.set_zoom(2.0).await, None);

        source.activate().await.unwrap();
        assert_eq!(source.set_zoom(2.0).await, None);
        assert_eq!(source.set_focus_mode(FocusMode::Manual).await, None);
        assert_eq!(source.set_focus_distance(1.0).await, None);
    }

    /// A device whose grabs take real wall-clock time.
    struct SluggishCamera(MockCamera);

    impl CameraDevice for SluggishCamera {
        fn open(&mut self, config: &CaptureConfig) -> Result<CameraCapabilities, CameraError> {
            self.0.open(config)
        }

        fn grab(&mut self) -> Result<Option<image::RgbImage>, CameraError> {
            std::thread::sleep(std::time::Duration::from_millis(200));
            self.0.grab()
        }

        fn apply(&mut self, constraint: CameraConstraint) -> Result<(), CameraError> {
            self.0.apply(constraint)
        }

        fn active_tracks(&self) -> usize {
            self.0.active_tracks()
        }

        fn close(&mut self) {
            self.0.close()
        }
    }

    #[tokio::test]
    async fn test_slow_grab_leaves_runtime_free() {
        use std::sync::atomic::{AtomicUsize, Ordering};

        let camera = SluggishCamera(MockCamera::new().with_resolution(8, 8));
        let mut source = CameraSource::new(Box::new(camera), CaptureConfig::default());
        source.activate().await.unwrap();

        let ticks = Arc::new(AtomicUsize::new(0));
        let counter = {
            let ticks = Arc::clone(&ticks);
            tokio::spawn(async move {
                loop {
                    ticks.fetch_add(1, Ordering::SeqCst);
                    tokio::time::sleep(std::time::Duration::from_millis(10)).await;
                }
            })
        };

        // Single-threaded runtime: the counter only runs if the grab is off-thread
        assert!(source.capture().await.unwrap().is_some());
        counter.abort();
        assert!(ticks.load(Ordering::SeqCst) >= 3);
    }

    #[tokio::test]
    async fn test_drop_releases_device() {
        let camera = MockCamera::new();
        let probe = camera.probe();
        {
            let mut source = CameraSource::new(Box::new(camera), CaptureConfig::default());
            source.activate().await.unwrap();
            assert_eq!(probe.active_tracks(), 1);
        }
        assert_eq!(probe.active_tracks(), 0);
    }
}
