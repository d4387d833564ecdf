// Shared doubles for the integration tests: a manual clock, scripted
// cameras, an on-disk stub writer and a fake transcoder.
#![allow(dead_code)]

use async_trait::async_trait;
use chrono::{DateTime, Local, TimeZone};
use lockin::core::capture_source::{CameraProvider, Frame, FrameSource};
use lockin::core::clock::{Clock, StopSignal};
use lockin::core::engine::RecordingEngine;
use lockin::core::normalizer::{DurationNormalizer, TranscodeJob, Transcoder};
use lockin::core::registry::RecordingRegistry;
use lockin::core::session::StopReport;
use lockin::core::settings::RecordingSettings;
use lockin::core::video_writer::{VideoWriter, WriterFactory};
use lockin::errors::{SourceError, TranscodeError, WriterError};
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

// --- Clock ---

/// Simulated monotonic clock. Sleeping advances simulated time instantly
/// until `limit` is reached; a sleep that would cross it parks the clock at
/// `limit` and blocks until the stop signal fires.
pub struct ManualClock {
    now: Mutex<Duration>,
    limit: Option<Duration>,
    wall: DateTime<Local>,
}

impl ManualClock {
    pub fn new(limit: Option<Duration>) -> Arc<Self> {
        Arc::new(ManualClock {
            now: Mutex::new(Duration::ZERO),
            limit,
            wall: Local.with_ymd_and_hms(2024, 5, 1, 9, 30, 0).unwrap(),
        })
    }

    pub fn advance(&self, by: Duration) {
        *self.now.lock().unwrap() += by;
    }
}

impl Clock for ManualClock {
    fn monotonic(&self) -> Duration {
        *self.now.lock().unwrap()
    }

    fn wall(&self) -> DateTime<Local> {
        self.wall
    }

    fn sleep_or_stop(&self, timeout: Duration, stop: &StopSignal) -> bool {
        if stop.is_triggered() {
            return true;
        }
        let frozen = {
            let mut now = self.now.lock().unwrap();
            match self.limit {
                Some(limit) if *now + timeout > limit => {
                    if *now < limit {
                        *now = limit;
                    }
                    true
                }
                _ => {
                    *now += timeout;
                    false
                }
            }
        };
        if !frozen {
            std::thread::yield_now();
            return stop.is_triggered();
        }
        while !stop.wait_timeout(Duration::from_millis(5)) {}
        true
    }
}

// --- Camera ---

#[derive(Default)]
pub struct CameraStats {
    pub opened: AtomicUsize,
    pub frames_served: AtomicU64,
}

/// Camera that serves solid frames, optionally failing to open or
/// disconnecting after a fixed number of frames.
pub struct FakeCamera {
    pub fail_open: bool,
    pub disconnect_after: Option<u64>,
    /// How many opened sources get `disconnect_after`; later ones stay healthy.
    pub faulty_opens: usize,
    /// Simulated time each capture takes.
    pub capture_cost: Option<(Arc<ManualClock>, Duration)>,
    pub stats: Arc<CameraStats>,
}

impl FakeCamera {
    pub fn healthy() -> Self {
        FakeCamera {
            fail_open: false,
            disconnect_after: None,
            faulty_opens: usize::MAX,
            capture_cost: None,
            stats: Arc::new(CameraStats::default()),
        }
    }
}

impl CameraProvider for FakeCamera {
    fn open(&self, settings: &RecordingSettings) -> Result<Box<dyn FrameSource>, SourceError> {
        if self.fail_open {
            return Err(SourceError::Disconnected("fake camera unplugged".into()));
        }
        let previously_opened = self.stats.opened.fetch_add(1, Ordering::SeqCst);
        Ok(Box::new(FakeSource {
            width: settings.width,
            height: settings.height,
            disconnect_after: self
                .disconnect_after
                .filter(|_| previously_opened < self.faulty_opens),
            capture_cost: self.capture_cost.clone(),
            stats: Arc::clone(&self.stats),
            served: 0,
        }))
    }
}

pub struct FakeSource {
    width: u32,
    height: u32,
    disconnect_after: Option<u64>,
    capture_cost: Option<(Arc<ManualClock>, Duration)>,
    stats: Arc<CameraStats>,
    served: u64,
}

impl FrameSource for FakeSource {
    fn name(&self) -> String {
        "fake".into()
    }

    fn next_frame(&mut self) -> Result<Frame, SourceError> {
        if let Some(limit) = self.disconnect_after {
            if self.served >= limit {
                return Err(SourceError::Disconnected("fake camera unplugged".into()));
            }
        }
        if let Some((clock, cost)) = &self.capture_cost {
            clock.advance(*cost);
        }
        self.served += 1;
        self.stats.frames_served.fetch_add(1, Ordering::SeqCst);
        Ok(Frame::new(
            self.width,
            self.height,
            vec![0; Frame::byte_len(self.width, self.height)],
        ))
    }
}

/// Source that records the clock reading at the start of every capture.
/// Capture `n` takes `costs[n]` of simulated time (the last entry repeats),
/// and `stop` is triggered once `stop_after` frames have been served.
pub struct TimedSource {
    pub clock: Arc<ManualClock>,
    pub costs: Vec<Duration>,
    pub starts: Arc<Mutex<Vec<Duration>>>,
    pub stop_after: usize,
    pub stop: StopSignal,
}

impl FrameSource for TimedSource {
    fn name(&self) -> String {
        "timed".into()
    }

    fn next_frame(&mut self) -> Result<Frame, SourceError> {
        let mut starts = self.starts.lock().unwrap();
        let n = starts.len();
        starts.push(self.clock.monotonic());
        let cost = self
            .costs
            .get(n)
            .or(self.costs.last())
            .copied()
            .unwrap_or_default();
        self.clock.advance(cost);
        if starts.len() >= self.stop_after {
            self.stop.trigger();
        }
        Ok(Frame::new(1, 1, vec![0, 0, 0]))
    }
}

// --- Writer ---

#[derive(Default)]
pub struct WriterStats {
    pub open_now: AtomicUsize,
    pub max_open: AtomicUsize,
    pub opened_total: AtomicUsize,
    pub frames_written: AtomicU64,
}

/// Writes one byte per frame to a real file so tests can observe it on disk.
pub struct StubWriterFactory {
    pub fail_open: bool,
    pub fail_after: Option<u64>,
    pub stats: Arc<WriterStats>,
}

impl StubWriterFactory {
    pub fn healthy() -> Self {
        StubWriterFactory {
            fail_open: false,
            fail_after: None,
            stats: Arc::new(WriterStats::default()),
        }
    }
}

impl WriterFactory for StubWriterFactory {
    fn container_extension(&self) -> &str {
        "avi"
    }

    fn open(
        &self,
        path: &Path,
        _width: u32,
        _height: u32,
        _fps: u32,
    ) -> Result<Box<dyn VideoWriter>, WriterError> {
        if self.fail_open {
            return Err(WriterError::Open("codec unavailable".into()));
        }
        let file = std::fs::File::create(path).map_err(|e| WriterError::Open(e.to_string()))?;
        let open_now = self.stats.open_now.fetch_add(1, Ordering::SeqCst) + 1;
        self.stats.max_open.fetch_max(open_now, Ordering::SeqCst);
        self.stats.opened_total.fetch_add(1, Ordering::SeqCst);
        Ok(Box::new(StubWriter {
            file: Some(file),
            path: path.to_path_buf(),
            fail_after: self.fail_after,
            written: 0,
            stats: Arc::clone(&self.stats),
        }))
    }
}

pub struct StubWriter {
    file: Option<std::fs::File>,
    path: PathBuf,
    fail_after: Option<u64>,
    written: u64,
    stats: Arc<WriterStats>,
}

impl VideoWriter for StubWriter {
    fn write(&mut self, _frame: &Frame) -> Result<(), WriterError> {
        if let Some(limit) = self.fail_after {
            if self.written >= limit {
                return Err(WriterError::Write("disk full".into()));
            }
        }
        let file = self
            .file
            .as_mut()
            .ok_or_else(|| WriterError::Write("closed".into()))?;
        file.write_all(b"f").map_err(|e| WriterError::Write(e.to_string()))?;
        self.written += 1;
        self.stats.frames_written.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }

    fn close(mut self: Box<Self>) -> Result<u64, WriterError> {
        let file = self
            .file
            .take()
            .ok_or_else(|| WriterError::Close("closed twice".into()))?;
        file.sync_all().map_err(|e| WriterError::Close(e.to_string()))?;
        drop(file);
        self.stats.open_now.fetch_sub(1, Ordering::SeqCst);
        std::fs::metadata(&self.path)
            .map(|m| m.len())
            .map_err(|e| WriterError::Close(e.to_string()))
    }
}

// --- Transcoder ---

#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub enum TranscodeMode {
    Succeed,
    /// Writes half a file, then reports a non-zero exit.
    FailAfterPartialWrite,
    /// Reports success without writing anything.
    SucceedEmpty,
}

pub struct FakeTranscoder {
    pub mode: TranscodeMode,
    pub jobs: Mutex<Vec<TranscodeJob>>,
    /// When set, each transcode waits for a permit before finishing.
    gate: Option<tokio::sync::Semaphore>,
}

impl FakeTranscoder {
    pub fn new(mode: TranscodeMode) -> Arc<Self> {
        Arc::new(FakeTranscoder {
            mode,
            jobs: Mutex::new(Vec::new()),
            gate: None,
        })
    }

    /// A transcoder whose jobs block until `release` is called.
    pub fn gated(mode: TranscodeMode) -> Arc<Self> {
        Arc::new(FakeTranscoder {
            mode,
            jobs: Mutex::new(Vec::new()),
            gate: Some(tokio::sync::Semaphore::new(0)),
        })
    }

    pub fn release(&self, jobs: usize) {
        if let Some(gate) = &self.gate {
            gate.add_permits(jobs);
        }
    }

    pub fn job_count(&self) -> usize {
        self.jobs.lock().unwrap().len()
    }

    pub fn speed_factors(&self) -> Vec<f64> {
        self.jobs.lock().unwrap().iter().map(|j| j.speed_factor).collect()
    }
}

#[async_trait]
impl Transcoder for FakeTranscoder {
    async fn transcode(&self, job: &TranscodeJob) -> Result<(), TranscodeError> {
        self.jobs.lock().unwrap().push(job.clone());
        if let Some(gate) = &self.gate {
            gate.acquire().await.unwrap().forget();
        }
        match self.mode {
            TranscodeMode::Succeed => {
                let body = format!("converted x{}", job.speed_factor);
                std::fs::write(&job.destination, body).map_err(|e| TranscodeError::Io(e.to_string()))
            }
            TranscodeMode::FailAfterPartialWrite => {
                std::fs::write(&job.destination, b"trunc").map_err(|e| TranscodeError::Io(e.to_string()))?;
                Err(TranscodeError::NonZeroExit {
                    code: Some(1),
                    stderr: "Conversion failed!".into(),
                })
            }
            TranscodeMode::SucceedEmpty => Ok(()),
        }
    }
}

// --- Registry ---

#[derive(Default)]
pub struct CollectingRegistry {
    pub reports: Mutex<Vec<StopReport>>,
}

impl RecordingRegistry for CollectingRegistry {
    fn record_completed(&self, report: &StopReport) {
        self.reports.lock().unwrap().push(report.clone());
    }
}

// --- Engine wiring ---

pub struct Harness {
    pub engine: RecordingEngine,
    pub clock: Arc<ManualClock>,
    pub camera: Arc<CameraStats>,
    pub writer: Arc<WriterStats>,
    pub transcoder: Arc<FakeTranscoder>,
    pub registry: Arc<CollectingRegistry>,
    pub dir: tempfile::TempDir,
}

pub fn settings_in(dir: &Path, fps: u32, normalize: bool) -> RecordingSettings {
    RecordingSettings {
        fps,
        width: 4,
        height: 2,
        output_dir: dir.join("rec"),
        normalize,
    }
}

pub fn harness(
    camera: FakeCamera,
    writers: StubWriterFactory,
    mode: TranscodeMode,
    clock: Arc<ManualClock>,
    fps: u32,
    normalize: bool,
) -> Harness {
    harness_with_transcoder(camera, writers, FakeTranscoder::new(mode), clock, fps, normalize)
}

pub fn harness_with_transcoder(
    camera: FakeCamera,
    writers: StubWriterFactory,
    transcoder: Arc<FakeTranscoder>,
    clock: Arc<ManualClock>,
    fps: u32,
    normalize: bool,
) -> Harness {
    let dir = tempfile::tempdir().unwrap();
    let camera_stats = Arc::clone(&camera.stats);
    let writer_stats = Arc::clone(&writers.stats);
    let registry = Arc::new(CollectingRegistry::default());
    let normalizer = DurationNormalizer::new(transcoder.clone(), Duration::from_secs(30));
    let engine = RecordingEngine::builder(Arc::new(camera), Arc::new(writers), normalizer)
        .settings(settings_in(dir.path(), fps, normalize))
        .clock(clock.clone())
        .registry(registry.clone())
        .build()
        .unwrap();
    Harness {
        engine,
        clock,
        camera: camera_stats,
        writer: writer_stats,
        transcoder,
        registry,
        dir,
    }
}

pub fn default_harness(normalize: bool) -> Harness {
    harness(
        FakeCamera::healthy(),
        StubWriterFactory::healthy(),
        TranscodeMode::Succeed,
        ManualClock::new(Some(Duration::ZERO)),
        2,
        normalize,
    )
}

/// Polls `cond` until it holds or five seconds pass.
pub async fn wait_for(mut cond: impl FnMut() -> bool) -> bool {
    for _ in 0..500 {
        if cond() {
            return true;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    cond()
}

pub fn files_in(dir: &Path) -> Vec<String> {
    let mut names: Vec<String> = std::fs::read_dir(dir)
        .map(|rd| {
            rd.flatten()
                .map(|e| e.file_name().to_string_lossy().into_owned())
                .collect()
        })
        .unwrap_or_default();
    names.sort();
    names
}
