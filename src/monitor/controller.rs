//! The monitoring loop.
//!
//! One [`Monitor`] owns the frame sources, telemetry, history and the
//! recurring task. A cycle runs capture, preprocessing, composition and
//! analysis in that order. At most one cycle is past the in-flight guard at
//! any time, so history order equals cycle start order.

use super::clock::{Clock, SystemClock};
use super::config::MonitorConfig;
use super::events::{CycleOutcome, MonitorEvent, Publication, SkipReason, Trigger};
use super::session::MonitoringSession;
use crate::analysis::{
    compose_augmented_context, AnalysisClient, ImagePayload, MockAnalysisClient, ReasoningDepth,
};
use crate::capture::{
    default_video_decoder, CameraCapabilities, CameraDevice, CameraError, CameraSettings,
    CameraSource, CaptureConfig, CaptureError, FocusMode, Frame, FrameSourceManager, InputMode,
    MediaKind, MockCamera, Upload, UploadType, VideoDecoder,
};
use crate::history::{HistoryEntry, HistoryLedger, StatusCounts, TrendPoint};
use crate::metrics::MetricsSnapshot;
use crate::preprocess::{PreprocessConfig, Preprocessor};
use crate::telemetry::{TelemetryConfig, TelemetryGenerator};
use parking_lot::{Mutex, RwLock};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Weak};
use std::time::Duration;
use thiserror::Error;
use tokio::sync::broadcast;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;

/// Errors returned to the operator by source selection.
#[derive(Debug, Error)]
pub enum MonitorError {
    #[error("camera unavailable: {0}")]
    Camera(#[source] CameraError),
    #[error(transparent)]
    Capture(CaptureError),
}

impl From<CaptureError> for MonitorError {
    fn from(err: CaptureError) -> Self {
        match err {
            CaptureError::Camera(e) => MonitorError::Camera(e),
            other => MonitorError::Capture(other),
        }
    }
}

#[derive(Default)]
struct LoopState {
    session: MonitoringSession,
    capture_capable: bool,
    // Bumped on every arm and disarm; cycles carry the value they were
    // scheduled under and give up when it no longer matches.
    epoch: u64,
    ticker: Option<JoinHandle<()>>,
}

#[derive(Default)]
struct LoopStats {
    started: AtomicU64,
    completed: AtomicU64,
    failed: AtomicU64,
    skipped: AtomicU64,
}

struct Inner {
    state: Mutex<LoopState>,
    sources: tokio::sync::Mutex<FrameSourceManager>,
    telemetry: TelemetryGenerator,
    preprocessor: Preprocessor,
    client: Arc<dyn AnalysisClient>,
    clock: Arc<dyn Clock>,
    history: RwLock<HistoryLedger>,
    publication: Mutex<Option<Publication>>,
    context: RwLock<String>,
    depth: Mutex<ReasoningDepth>,
    events: broadcast::Sender<MonitorEvent>,
    stats: LoopStats,
    config: MonitorConfig,
}

/// Clears `is_loading` when the cycle ends, on every path.
struct InFlightGuard<'a> {
    inner: &'a Inner,
}

impl Drop for InFlightGuard<'_> {
    fn drop(&mut self) {
        self.inner.state.lock().session.is_loading = false;
    }
}

impl Inner {
    fn emit(&self, event: MonitorEvent) {
        // No subscribers is fine
        let _ = self.events.send(event);
    }

    fn try_begin(&self, epoch: Option<u64>) -> Result<InFlightGuard<'_>, SkipReason> {
        let mut state = self.state.lock();
        if let Some(epoch) = epoch {
            if !state.session.is_auto_monitoring || state.epoch != epoch {
                return Err(SkipReason::Stale);
            }
        }
        if state.session.is_loading {
            return Err(SkipReason::InFlight);
        }
        state.session.is_loading = true;
        Ok(InFlightGuard { inner: self })
    }

    fn is_current(&self, epoch: u64) -> bool {
        let state = self.state.lock();
        state.session.is_auto_monitoring && state.epoch == epoch
    }

    fn skip(&self, trigger: Trigger, reason: SkipReason) -> CycleOutcome {
        self.stats.skipped.fetch_add(1, Ordering::Relaxed);
        tracing::debug!(%trigger, %reason, "cycle skipped");
        self.emit(MonitorEvent::CycleSkipped { trigger, reason });
        CycleOutcome::Skipped(reason)
    }

    /// Returns true if the loop was armed.
    fn disarm(state: &mut LoopState) -> bool {
        state.epoch = state.epoch.wrapping_add(1);
        if let Some(handle) = state.ticker.take() {
            handle.abort();
        }
        std::mem::replace(&mut state.session.is_auto_monitoring, false)
    }

    fn disarm_now(&self) {
        let was_armed = Self::disarm(&mut self.state.lock());
        if was_armed {
            tracing::info!("auto-monitoring stopped");
            self.emit(MonitorEvent::AutoMonitoringChanged(false));
        }
    }

    /// Mirrors the source manager into the session.
    ///
    /// The loop stays armed only if asked to and the new source can still
    /// produce frames.
    fn refresh_session(&self, sources: &FrameSourceManager, keep_armed: bool) -> MonitoringSession {
        let (session, disarmed) = {
            let mut state = self.state.lock();
            state.session.input_mode = sources.mode();
            state.session.upload_type = sources.upload_type();
            state.capture_capable = sources.capture_capable();
            let disarmed = (!keep_armed || !state.capture_capable) && Self::disarm(&mut state);
            (state.session, disarmed)
        };
        if disarmed {
            tracing::info!("auto-monitoring stopped");
            self.emit(MonitorEvent::AutoMonitoringChanged(false));
        }
        session
    }

    fn announce_source(&self, session: MonitoringSession) {
        tracing::info!(
            mode = %session.input_mode,
            upload_type = ?session.upload_type,
            "input source changed"
        );
        self.emit(MonitorEvent::InputModeChanged {
            mode: session.input_mode,
            upload_type: session.upload_type,
        });
    }

    async fn preprocess(&self, frame: Frame) -> Frame {
        if !self.preprocessor.config().enabled {
            return frame;
        }
        let preprocessor = self.preprocessor.clone();
        let original = frame.clone();
        match tokio::task::spawn_blocking(move || preprocessor.enhance(&original)).await {
            Ok(enhanced) => enhanced,
            Err(e) => {
                tracing::warn!(error = %e, "preprocessing task failed, submitting original frame");
                frame
            }
        }
    }

    async fn run_cycle(&self, trigger: Trigger, epoch: Option<u64>) -> CycleOutcome {
        let guard = match self.try_begin(epoch) {
            Ok(guard) => guard,
            Err(reason) => return self.skip(trigger, reason),
        };

        let context = self.context.read().clone();
        if context.trim().is_empty() {
            return self.skip(trigger, SkipReason::MissingContext);
        }

        let captured = {
            let mut sources = self.sources.lock().await;
            // The source may have changed while waiting for the lock
            if epoch.is_some_and(|e| !self.is_current(e)) {
                return self.skip(trigger, SkipReason::Stale);
            }
            sources.capture().await
        };
        let frame = match captured {
            Ok(Some(frame)) => frame,
            Ok(None) => return self.skip(trigger, SkipReason::NoFrame),
            Err(e) => {
                tracing::debug!(%trigger, error = %e, "capture failed");
                return self.skip(trigger, SkipReason::NoFrame);
            }
        };

        let frame = self.preprocess(frame).await;
        let payload = ImagePayload::from_frame(&frame);
        let telemetry = self.telemetry.snapshot();
        let augmented = compose_augmented_context(&context, &telemetry, self.clock.now());
        let depth = *self.depth.lock();

        self.stats.started.fetch_add(1, Ordering::Relaxed);
        tracing::info!(
            %trigger,
            sequence = frame.sequence(),
            width = frame.width(),
            height = frame.height(),
            %depth,
            "submitting frame for analysis"
        );

        let (outcome, event) = match self.client.analyze(&augmented, &payload, depth).await {
            Ok(result) => {
                let mut entry = HistoryEntry {
                    timestamp: self.clock.now().timestamp_millis(),
                    telemetry,
                    analysis: result.clone(),
                };
                entry.timestamp = self.history.write().append(entry.clone());
                *self.publication.lock() = Some(Publication::Result(result));
                self.stats.completed.fetch_add(1, Ordering::Relaxed);
                tracing::info!(
                    %trigger,
                    status = %entry.analysis.status,
                    timestamp = entry.timestamp,
                    "analysis published"
                );
                let event = MonitorEvent::ResultPublished {
                    trigger,
                    entry: entry.clone(),
                };
                (CycleOutcome::Published(entry), event)
            }
            Err(e) => {
                let message = e.to_string();
                *self.publication.lock() = Some(Publication::Error(message.clone()));
                self.stats.failed.fetch_add(1, Ordering::Relaxed);
                tracing::warn!(%trigger, error = %e, "analysis failed");
                let event = MonitorEvent::AnalysisFailed {
                    trigger,
                    message: message.clone(),
                };
                (CycleOutcome::Failed(message), event)
            }
        };

        drop(guard);
        self.emit(event);
        outcome
    }
}

impl Drop for Inner {
    fn drop(&mut self) {
        if let Some(handle) = self.state.get_mut().ticker.take() {
            handle.abort();
        }
    }
}

async fn run_loop(inner: Weak<Inner>, epoch: u64, period: Duration) {
    let mut interval = tokio::time::interval(period);
    interval.set_missed_tick_behavior(MissedTickBehavior::Skip);
    loop {
        interval.tick().await;
        let Some(inner) = inner.upgrade() else {
            break;
        };
        // Each cycle runs on its own task so ticks keep coming while a
        // request is outstanding; the guard turns them into skips.
        tokio::spawn(async move {
            inner.run_cycle(Trigger::Automatic, Some(epoch)).await;
        });
    }
}

/// Handle to the monitoring engine.
///
/// Cheap to clone; every clone drives the same session. Dropping the last
/// clone aborts the loop and releases every source.
#[derive(Clone)]
pub struct Monitor {
    inner: Arc<Inner>,
}

impl Monitor {
    /// Starts configuring a monitor.
    pub fn builder() -> MonitorBuilder {
        MonitorBuilder::default()
    }

    // ---- source selection ----

    /// Selects the camera and acquires its stream.
    ///
    /// Disarms the loop unless the camera is already live. On failure the
    /// mode is still CAMERA, with no active source.
    pub async fn select_camera(&self) -> Result<(), MonitorError> {
        let mut sources = self.inner.sources.lock().await;
        if sources.mode() == InputMode::Camera && sources.capture_capable() {
            return Ok(());
        }

        self.inner.disarm_now();
        let result = sources.switch_to_camera().await;
        let session = self.inner.refresh_session(&sources, false);
        self.inner.announce_source(session);

        result.map_err(|e| {
            tracing::warn!(error = %e, "camera activation failed");
            MonitorError::from(e)
        })
    }

    /// Selects upload mode, releasing the camera.
    pub async fn select_upload_mode(&self) {
        let mut sources = self.inner.sources.lock().await;
        if sources.mode() == InputMode::Upload {
            return;
        }

        self.inner.disarm_now();
        sources.switch_to_upload();
        let session = self.inner.refresh_session(&sources, false);
        self.inner.announce_source(session);
    }

    /// Selects an input mode.
    pub async fn select_input_mode(&self, mode: InputMode) -> Result<(), MonitorError> {
        match mode {
            InputMode::Camera => self.select_camera().await,
            InputMode::Upload => {
                self.select_upload_mode().await;
                Ok(())
            }
        }
    }

    /// Loads an uploaded image or video and selects upload mode.
    ///
    /// Replacing a video with another video while armed keeps the loop
    /// running; any other upload disarms it. Unsupported media is rejected
    /// before anything changes.
    pub async fn select_upload(&self, upload: Upload) -> Result<UploadType, MonitorError> {
        let kind = upload.kind()?;
        let mut sources = self.inner.sources.lock().await;

        let keep_armed = kind == MediaKind::Video
            && sources.mode() == InputMode::Upload
            && sources.upload_type() == Some(UploadType::Video)
            && self.inner.state.lock().session.is_auto_monitoring;
        if !keep_armed {
            self.inner.disarm_now();
        }

        let result = sources.load_upload(upload).await;
        let session = self.inner.refresh_session(&sources, keep_armed);
        self.inner.announce_source(session);
        Ok(result?)
    }

    // ---- loop control ----

    /// Arms or disarms the recurring loop and returns the resulting state.
    ///
    /// Arming requires a live camera or a loaded video and starts the
    /// first cycle immediately. Disarming never cancels an in-flight
    /// analysis; it still publishes when it completes.
    ///
    /// Arming spawns the loop task, so it must be called within a tokio
    /// runtime.
    pub fn set_auto_monitoring(&self, enabled: bool) -> bool {
        let changed = {
            let mut state = self.inner.state.lock();
            if enabled {
                if state.session.is_auto_monitoring {
                    return true;
                }
                if !state.capture_capable {
                    tracing::debug!(
                        mode = %state.session.input_mode,
                        upload_type = ?state.session.upload_type,
                        "auto-monitoring needs a live camera or a loaded video"
                    );
                    return false;
                }
                self.arm(&mut state);
                true
            } else {
                Inner::disarm(&mut state)
            }
        };

        if changed {
            tracing::info!(
                enabled,
                interval_secs = self.inner.config.interval().as_secs(),
                "auto-monitoring toggled"
            );
            self.inner.emit(MonitorEvent::AutoMonitoringChanged(enabled));
        }
        enabled
    }

    fn arm(&self, state: &mut LoopState) {
        state.epoch = state.epoch.wrapping_add(1);
        state.session.is_auto_monitoring = true;
        let task = run_loop(
            Arc::downgrade(&self.inner),
            state.epoch,
            self.inner.config.interval(),
        );
        state.ticker = Some(tokio::spawn(task));
    }

    /// Runs one cycle now.
    ///
    /// Rejected while another analysis is in flight. A missing context or
    /// frame makes it a no-op.
    pub async fn analyze_now(&self) -> CycleOutcome {
        self.inner.run_cycle(Trigger::Manual, None).await
    }

    // ---- camera and video controls ----

    /// Sets the camera zoom; see [`CameraSource::set_zoom`].
    pub async fn set_zoom(&self, zoom: f64) -> Option<f64> {
        self.inner.sources.lock().await.camera_mut().set_zoom(zoom).await
    }

    /// Sets the camera focus mode.
    pub async fn set_focus_mode(&self, mode: FocusMode) -> Option<FocusMode> {
        self.inner
            .sources
            .lock()
            .await
            .camera_mut()
            .set_focus_mode(mode)
            .await
    }

    /// Sets a manual focus distance, switching focus to manual.
    pub async fn set_focus_distance(&self, distance: f64) -> Option<f64> {
        self.inner
            .sources
            .lock()
            .await
            .camera_mut()
            .set_focus_distance(distance)
            .await
    }

    /// Capabilities of the live camera track.
    pub async fn camera_capabilities(&self) -> Option<CameraCapabilities> {
        self.inner.sources.lock().await.camera().capabilities().cloned()
    }

    /// Current camera control values.
    pub async fn camera_settings(&self) -> Option<CameraSettings> {
        self.inner.sources.lock().await.camera().settings()
    }

    /// Live camera tracks.
    pub async fn active_camera_tracks(&self) -> usize {
        self.inner.sources.lock().await.active_camera_tracks()
    }

    /// Pauses the loaded video. Returns false when no video is loaded.
    pub async fn pause_video(&self) -> bool {
        let mut sources = self.inner.sources.lock().await;
        sources.video_mut().map(|v| v.pause()).is_some()
    }

    /// Resumes the loaded video.
    pub async fn play_video(&self) -> bool {
        let mut sources = self.inner.sources.lock().await;
        sources.video_mut().map(|v| v.play()).is_some()
    }

    /// Moves the loaded video's playback position.
    pub async fn seek_video(&self, position: Duration) -> bool {
        let mut sources = self.inner.sources.lock().await;
        sources.video_mut().map(|v| v.seek(position)).is_some()
    }

    // ---- context and telemetry ----

    /// Replaces the experiment context.
    pub fn set_context(&self, context: impl Into<String>) {
        *self.inner.context.write() = context.into();
    }

    /// Current experiment context.
    pub fn context(&self) -> String {
        self.inner.context.read().clone()
    }

    /// Sets the reasoning depth for subsequent requests.
    pub fn set_reasoning_depth(&self, depth: ReasoningDepth) {
        *self.inner.depth.lock() = depth;
    }

    /// Reasoning depth for subsequent requests.
    pub fn reasoning_depth(&self) -> ReasoningDepth {
        *self.inner.depth.lock()
    }

    /// The telemetry feed.
    pub fn telemetry(&self) -> &TelemetryGenerator {
        &self.inner.telemetry
    }

    // ---- observation ----

    /// Current session state.
    pub fn session(&self) -> MonitoringSession {
        self.inner.state.lock().session
    }

    /// What the operator should currently see.
    pub fn publication(&self) -> Option<Publication> {
        self.inner.publication.lock().clone()
    }

    /// Full log, newest first.
    pub fn history_log(&self) -> Vec<HistoryEntry> {
        self.inner.history.read().newest_first().cloned().collect()
    }

    /// Recent window, oldest first.
    pub fn recent_history(&self) -> Vec<HistoryEntry> {
        self.inner
            .history
            .read()
            .recent_window(self.inner.config.history_window)
            .to_vec()
    }

    /// Trend points for the recent window.
    pub fn trend(&self) -> Vec<TrendPoint> {
        self.inner.history.read().trend(self.inner.config.history_window)
    }

    /// Most recent history entry.
    pub fn latest_entry(&self) -> Option<HistoryEntry> {
        self.inner.history.read().latest().cloned()
    }

    /// Number of history entries.
    pub fn history_len(&self) -> usize {
        self.inner.history.read().len()
    }

    /// History tally by status.
    pub fn status_counts(&self) -> StatusCounts {
        self.inner.history.read().status_counts()
    }

    /// Subscribes to monitor events.
    pub fn subscribe(&self) -> broadcast::Receiver<MonitorEvent> {
        self.inner.events.subscribe()
    }

    /// Loop statistics and live values for the metrics exporter.
    pub fn metrics_snapshot(&self) -> MetricsSnapshot {
        let session = self.session();
        let reading = self.inner.telemetry.snapshot();
        let history = self.inner.history.read();
        let stats = &self.inner.stats;
        MetricsSnapshot {
            cycles_started: stats.started.load(Ordering::Relaxed),
            cycles_completed: stats.completed.load(Ordering::Relaxed),
            cycles_failed: stats.failed.load(Ordering::Relaxed),
            cycles_skipped: stats.skipped.load(Ordering::Relaxed),
            analysis_in_flight: session.is_loading,
            auto_monitoring: session.is_auto_monitoring,
            history_entries: history.len(),
            temperature: reading.temperature,
            pressure: reading.pressure,
            last_status: history.latest().map(|e| e.analysis.status),
        }
    }

    /// Disarms the loop, stops telemetry and releases every source.
    ///
    /// An in-flight analysis still completes and is recorded.
    pub async fn shutdown(&self) {
        self.inner.disarm_now();
        self.inner.telemetry.stop();
        let mut sources = self.inner.sources.lock().await;
        sources.release_all();
        self.inner.refresh_session(&sources, false);
        tracing::info!("monitor shut down");
    }
}

/// Configures and builds a [`Monitor`].
#[derive(Default)]
pub struct MonitorBuilder {
    monitor: MonitorConfig,
    telemetry: TelemetryConfig,
    capture: CaptureConfig,
    preprocess: PreprocessConfig,
    client: Option<Arc<dyn AnalysisClient>>,
    camera: Option<Box<dyn CameraDevice>>,
    video_decoder: Option<Arc<dyn VideoDecoder>>,
    clock: Option<Arc<dyn Clock>>,
}

impl MonitorBuilder {
    /// Loop settings.
    pub fn monitor_config(mut self, config: MonitorConfig) -> Self {
        self.monitor = config;
        self
    }

    /// Telemetry settings.
    pub fn telemetry_config(mut self, config: TelemetryConfig) -> Self {
        self.telemetry = config;
        self
    }

    /// Camera settings.
    pub fn capture_config(mut self, config: CaptureConfig) -> Self {
        self.capture = config;
        self
    }

    /// Preprocessing settings.
    pub fn preprocess_config(mut self, config: PreprocessConfig) -> Self {
        self.preprocess = config;
        self
    }

    /// Analysis service. Defaults to the offline analyzer.
    pub fn client(mut self, client: Arc<dyn AnalysisClient>) -> Self {
        self.client = Some(client);
        self
    }

    /// Camera device. Defaults to a synthetic camera.
    pub fn camera(mut self, device: Box<dyn CameraDevice>) -> Self {
        self.camera = Some(device);
        self
    }

    /// Video decoder. Defaults to [`default_video_decoder`].
    pub fn video_decoder(mut self, decoder: Arc<dyn VideoDecoder>) -> Self {
        self.video_decoder = Some(decoder);
        self
    }

    /// Timestamp source. Defaults to [`SystemClock`].
    pub fn clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = Some(clock);
        self
    }

    /// Builds the monitor and applies the configured telemetry mode.
    ///
    /// Must be called within a tokio runtime when telemetry starts in
    /// automatic mode.
    pub fn build(self) -> Monitor {
        let device = self.camera.unwrap_or_else(|| Box::new(MockCamera::new()));
        let jpeg_quality = self.capture.jpeg_quality;
        let camera = CameraSource::new(device, self.capture);
        let decoder = self.video_decoder.unwrap_or_else(default_video_decoder);
        let sources = FrameSourceManager::new(camera, decoder, jpeg_quality);

        let telemetry = TelemetryGenerator::new(&self.telemetry);
        telemetry.set_mode(self.telemetry.mode);

        let (events, _) = broadcast::channel(self.monitor.event_capacity.max(1));

        Monitor {
            inner: Arc::new(Inner {
                state: Mutex::new(LoopState::default()),
                sources: tokio::sync::Mutex::new(sources),
                telemetry,
                preprocessor: Preprocessor::new(self.preprocess),
                client: self
                    .client
                    .unwrap_or_else(|| Arc::new(MockAnalysisClient::new())),
                clock: self.clock.unwrap_or_else(|| Arc::new(SystemClock)),
                history: RwLock::new(HistoryLedger::new()),
                publication: Mutex::new(None),
                context: RwLock::new(self.monitor.context.clone()),
                depth: Mutex::new(self.monitor.reasoning_depth),
                events,
                stats: LoopStats::default(),
                config: self.monitor,
            }),
        }
    }
}
