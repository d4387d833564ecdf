//! Recording state machine.
//!
//! Start, Stop and ApplySettings are serialized through one async mutex.
//! The producer loop runs on a blocking thread outside that lock, and the
//! duration normalizer runs after the lock has been released, so a new
//! session can start while the previous one is still being converted.

use crate::common::file_utils;
use crate::common::timestamp_utils::DEFAULT_FILENAME_TIMESTAMP_FORMAT;
use crate::core::capture_source::CameraProvider;
use crate::core::clock::{Clock, StopSignal, SystemClock};
use crate::core::normalizer::{DurationNormalizer, RecordingTimeline};
use crate::core::producer::{run_producer_loop, ProducerContext};
use crate::core::registry::{LogRegistry, RecordingRegistry};
use crate::core::session::{
    EnginePhase, EngineStatus, LoopReport, RecordingSession, SessionId, StopReport, StopTrigger,
};
use crate::core::settings::{RecordingSettings, SettingsUpdate};
use crate::core::video_writer::WriterFactory;
use crate::errors::EngineError;
use log::{debug, error, info, warn};
use parking_lot::RwLock;
use std::path::PathBuf;
use std::sync::{Arc, Weak};
use std::time::{Duration, Instant};
use tokio::sync::{oneshot, Mutex};
use tokio::task::JoinHandle;

/// Handle to the recording engine. Cheap to clone; all clones drive the
/// same state machine.
#[derive(Clone)]
pub struct RecordingEngine {
    inner: Arc<EngineInner>,
}

struct EngineInner {
    camera: Arc<dyn CameraProvider>,
    writers: Arc<dyn WriterFactory>,
    normalizer: DurationNormalizer,
    registry: Arc<dyn RecordingRegistry>,
    clock: Arc<dyn Clock>,
    timestamp_format: String,
    control: Mutex<ControlState>,
    status: RwLock<StatusCell>,
    abort_handoff: parking_lot::Mutex<AbortHandoff>,
}

/// Hands the report of a session that ended on its own to the next idle
/// Stop. Only ever locked briefly, never across normalization.
#[derive(Default)]
struct AbortHandoff {
    /// Session finalized implicitly whose report is still being produced.
    awaiting: Option<SessionId>,
    report: Option<StopReport>,
}

impl AbortHandoff {
    fn await_session(&mut self, session_id: SessionId) {
        self.awaiting = Some(session_id);
        self.report = None;
    }

    /// Stores `report` unless a newer session has started since its session
    /// ended. Returns whether it was kept.
    fn deliver(&mut self, report: StopReport) -> bool {
        if self.awaiting != Some(report.session_id) {
            return false;
        }
        self.awaiting = None;
        self.report = Some(report);
        true
    }

    fn discard(&mut self) -> bool {
        self.awaiting = None;
        self.report.take().is_some()
    }
}

struct ControlState {
    settings: RecordingSettings,
    active: Option<ActiveSession>,
}

struct ActiveSession {
    session: RecordingSession,
    stop: StopSignal,
    producer: JoinHandle<LoopReport>,
}

impl Drop for ActiveSession {
    fn drop(&mut self) {
        // Never leave a producer thread running without an owner.
        self.stop.trigger();
    }
}

#[derive(Default)]
struct StatusCell {
    phase: EnginePhase,
    started_at: Option<Duration>,
    output_path: Option<PathBuf>,
}

pub struct EngineBuilder {
    camera: Arc<dyn CameraProvider>,
    writers: Arc<dyn WriterFactory>,
    normalizer: DurationNormalizer,
    registry: Arc<dyn RecordingRegistry>,
    clock: Arc<dyn Clock>,
    settings: RecordingSettings,
    timestamp_format: String,
}

impl EngineBuilder {
    pub fn settings(mut self, settings: RecordingSettings) -> Self {
        self.settings = settings;
        self
    }

    pub fn clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    pub fn registry(mut self, registry: Arc<dyn RecordingRegistry>) -> Self {
        self.registry = registry;
        self
    }

    pub fn timestamp_format(mut self, format: impl Into<String>) -> Self {
        self.timestamp_format = format.into();
        self
    }

    pub fn build(self) -> Result<RecordingEngine, EngineError> {
        self.settings.validate()?;
        debug!("🛠️ Building RecordingEngine with settings {:?}", self.settings);
        Ok(RecordingEngine {
            inner: Arc::new(EngineInner {
                camera: self.camera,
                writers: self.writers,
                normalizer: self.normalizer,
                registry: self.registry,
                clock: self.clock,
                timestamp_format: self.timestamp_format,
                control: Mutex::new(ControlState {
                    settings: self.settings,
                    active: None,
                }),
                status: RwLock::new(StatusCell::default()),
                abort_handoff: parking_lot::Mutex::new(AbortHandoff::default()),
            }),
        })
    }
}

impl RecordingEngine {
    pub fn builder(
        camera: Arc<dyn CameraProvider>,
        writers: Arc<dyn WriterFactory>,
        normalizer: DurationNormalizer,
    ) -> EngineBuilder {
        EngineBuilder {
            camera,
            writers,
            normalizer,
            registry: Arc::new(LogRegistry),
            clock: Arc::new(SystemClock::new()),
            settings: RecordingSettings::default(),
            timestamp_format: DEFAULT_FILENAME_TIMESTAMP_FORMAT.to_string(),
        }
    }

    /// Starts a session with `update` merged over the current settings and
    /// returns the path being recorded to.
    pub async fn start(&self, update: SettingsUpdate) -> Result<PathBuf, EngineError> {
        let start_time = Instant::now();
        let mut control = self.inner.control.lock().await;
        if let Some(active) = &control.active {
            warn!("⚠️ Start rejected: session {} is still recording.", active.session.id);
            return Err(EngineError::AlreadyRecording);
        }

        let settings = control.settings.merged(&update)?;
        self.set_status(EnginePhase::Starting, None, None);

        let active = match self.open_session(settings.clone()).await {
            Ok(active) => active,
            Err(e) => {
                error!("❌ Failed to start recording after {:?}: {}", start_time.elapsed(), e);
                self.set_status(EnginePhase::Idle, None, None);
                return Err(e);
            }
        };

        if self.inner.abort_handoff.lock().discard() {
            info!("Discarding unclaimed report of a previously aborted session.");
        }

        let output_path = active.session.output_path.clone();
        self.set_status(
            EnginePhase::Active,
            Some(active.session.started_at_monotonic),
            Some(output_path.clone()),
        );
        info!(
            "🔴 Recording {} started: {} ({}x{} @ {} fps, normalize: {}) in {:?}.",
            active.session.id,
            output_path.display(),
            settings.width,
            settings.height,
            settings.fps,
            settings.normalize,
            start_time.elapsed()
        );
        control.settings = settings;
        control.active = Some(active);
        Ok(output_path)
    }

    /// Ends the active session, waits for its file to be closed and, when
    /// requested, normalizes it to one minute.
    ///
    /// While idle this fails with `NotRecording` without waiting on anything,
    /// unless a session ended on its own since the last Start and its report
    /// is complete; that report is returned instead, flagged `aborted`.
    pub async fn stop(&self) -> Result<StopReport, EngineError> {
        let mut control = self.inner.control.lock().await;
        let mut active = match control.active.take() {
            Some(active) => active,
            None => {
                drop(control);
                if let Some(report) = self.inner.abort_handoff.lock().report.take() {
                    info!("Returning report of aborted session {}.", report.session_id);
                    return Ok(report);
                }
                debug!("Stop requested while idle.");
                return Err(EngineError::NotRecording);
            }
        };

        let loop_report = self.finalize(&mut active, StopTrigger::Requested).await;
        let session = active.session.clone();
        drop(active);
        drop(control);

        let report = self.complete(session, loop_report).await;
        self.inner.registry.record_completed(&report);
        Ok(report)
    }

    /// Replaces the settings used by the next Start. Rejected while a
    /// session is active; the previous settings then stay in effect.
    pub async fn apply_settings(
        &self,
        update: SettingsUpdate,
    ) -> Result<RecordingSettings, EngineError> {
        let mut control = self.inner.control.lock().await;
        if control.active.is_some() {
            warn!("⚠️ Settings change rejected while recording.");
            return Err(EngineError::RecordingInProgress);
        }
        let settings = control.settings.merged(&update)?;
        info!("⚙️ Settings updated: {:?}", settings);
        control.settings = settings.clone();
        Ok(settings)
    }

    pub async fn settings(&self) -> RecordingSettings {
        self.inner.control.lock().await.settings.clone()
    }

    /// Current phase and, while active, the time since start. Never waits on
    /// a transition in progress.
    pub fn status(&self) -> EngineStatus {
        let cell = self.inner.status.read();
        let elapsed_seconds = match (cell.phase, cell.started_at) {
            (EnginePhase::Active, Some(started)) => Some(
                self.inner
                    .clock
                    .monotonic()
                    .saturating_sub(started)
                    .as_secs_f64(),
            ),
            _ => None,
        };
        EngineStatus {
            recording: cell.phase == EnginePhase::Active,
            phase: cell.phase,
            elapsed_seconds,
            output_path: cell.output_path.clone(),
        }
    }

    async fn open_session(&self, settings: RecordingSettings) -> Result<ActiveSession, EngineError> {
        let output_dir = file_utils::ensure_output_directory(&settings.output_dir)
            .map_err(|e| EngineError::InvalidSettings(e.to_string()))?;

        let open_start = Instant::now();
        let camera = Arc::clone(&self.inner.camera);
        let source_settings = settings.clone();
        let source = tokio::task::spawn_blocking(move || camera.open(&source_settings))
            .await?
            .map_err(|e| EngineError::DeviceUnavailable(e.to_string()))?;
        debug!("  Frame source '{}' opened in {:?}.", source.name(), open_start.elapsed());

        let started_at_wall = self.inner.clock.wall();
        let output_path = file_utils::unique_recording_path(
            &output_dir,
            &started_at_wall,
            &self.inner.timestamp_format,
            self.inner.writers.container_extension(),
        );

        let writers = Arc::clone(&self.inner.writers);
        let writer_path = output_path.clone();
        let (width, height, fps) = (settings.width, settings.height, settings.fps);
        let writer = tokio::task::spawn_blocking(move || writers.open(&writer_path, width, height, fps))
            .await?
            .map_err(EngineError::from)?;
        debug!("  ✍️ Video writer opened for {}.", output_path.display());

        let session = RecordingSession {
            id: SessionId::new(),
            settings,
            output_path,
            started_at_monotonic: self.inner.clock.monotonic(),
            started_at_wall,
        };

        let stop = StopSignal::new();
        let (fault_tx, fault_rx) = oneshot::channel();
        let ctx = ProducerContext {
            session_id: session.id,
            fps: session.settings.fps,
            source,
            writer,
            clock: Arc::clone(&self.inner.clock),
            stop: stop.clone(),
            fault_tx: Some(fault_tx),
        };
        let producer = tokio::task::spawn_blocking(move || run_producer_loop(ctx));
        tokio::spawn(watch_for_fault(Arc::downgrade(&self.inner), fault_rx));

        Ok(ActiveSession {
            session,
            stop,
            producer,
        })
    }

    /// Signals the producer and waits until it has closed the writer. The
    /// caller holds the control lock.
    async fn finalize(&self, active: &mut ActiveSession, trigger: StopTrigger) -> LoopReport {
        let stop_start = Instant::now();
        self.set_status(EnginePhase::Stopping, None, Some(active.session.output_path.clone()));
        info!("⏹️ Stopping recording {} ({:?}).", active.session.id, trigger);

        active.stop.trigger();
        let report = match (&mut active.producer).await {
            Ok(report) => report,
            Err(e) => {
                error!("💀 Producer task for {} failed: {}", active.session.id, e);
                let file_size_bytes = std::fs::metadata(&active.session.output_path)
                    .map(|m| m.len())
                    .unwrap_or(0);
                LoopReport {
                    frames_written: 0,
                    file_size_bytes,
                    ended_at_monotonic: self.inner.clock.monotonic(),
                    abort_reason: Some(format!("producer task failed: {}", e)),
                }
            }
        };

        self.set_status(EnginePhase::Idle, None, None);
        debug!("Producer for {} joined in {:?}.", active.session.id, stop_start.elapsed());
        report
    }

    /// Post-processing that runs without the control lock.
    async fn complete(&self, session: RecordingSession, loop_report: LoopReport) -> StopReport {
        let mut report = StopReport::new(&session, &loop_report);
        if report.empty {
            warn!("⚠️ Recording {} contains no frames: {}", session.id, session.output_path.display());
        }
        info!(
            "📼 Recording {} closed: {:.2}s, {} frames, {} bytes.",
            session.id, report.duration_seconds, report.frame_count, report.file_size_bytes
        );

        if session.settings.normalize {
            let outcome = self
                .inner
                .normalizer
                .normalize(
                    &session.output_path,
                    RecordingTimeline::from_capture(
                        report.duration_seconds,
                        report.frame_count,
                        session.settings.fps,
                    ),
                )
                .await;
            report = report.with_normalization(outcome);
        }
        report
    }

    async fn implicit_stop(&self, session_id: SessionId) {
        let mut control = self.inner.control.lock().await;
        let is_current = control
            .active
            .as_ref()
            .map(|a| a.session.id == session_id)
            .unwrap_or(false);
        if !is_current {
            debug!("Ignoring stale fault from session {}.", session_id);
            return;
        }
        let Some(mut active) = control.active.take() else {
            return;
        };

        warn!("⚠️ Session {} ended on its own; finalizing.", session_id);
        let loop_report = self.finalize(&mut active, StopTrigger::Implicit).await;
        self.inner.abort_handoff.lock().await_session(session_id);
        let session = active.session.clone();
        drop(active);
        drop(control);

        let report = self.complete(session, loop_report).await;
        if !self.inner.abort_handoff.lock().deliver(report.clone()) {
            debug!("A newer session started; dropping the report of aborted session {}.", session_id);
        }
        self.inner.registry.record_completed(&report);
    }

    fn set_status(&self, phase: EnginePhase, started_at: Option<Duration>, output_path: Option<PathBuf>) {
        let mut cell = self.inner.status.write();
        cell.phase = phase;
        cell.started_at = started_at;
        cell.output_path = output_path;
    }
}

async fn watch_for_fault(engine: Weak<EngineInner>, fault_rx: oneshot::Receiver<SessionId>) {
    // A closed channel means the loop ended because Stop asked it to.
    let Ok(session_id) = fault_rx.await else {
        return;
    };
    let Some(inner) = engine.upgrade() else {
        return;
    };
    RecordingEngine { inner }.implicit_stop(session_id).await;
}
