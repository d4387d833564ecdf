//! Session bookkeeping shared by the engine and the producer loop.

use crate::core::normalizer::NormalizationOutcome;
use crate::core::settings::RecordingSettings;
use chrono::{DateTime, Local};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::PathBuf;
use std::time::Duration;
use uuid::Uuid;

/// Opaque per-session token.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct SessionId(Uuid);

impl SessionId {
    pub fn new() -> Self {
        SessionId(Uuid::new_v4())
    }
}

impl Default for SessionId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for SessionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Phase of the recording state machine.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EnginePhase {
    Idle,
    Starting,
    Active,
    Stopping,
}

impl Default for EnginePhase {
    fn default() -> Self {
        Self::Idle
    }
}

/// Immutable facts about one session, fixed at start.
#[derive(Debug, Clone)]
pub struct RecordingSession {
    pub id: SessionId,
    pub settings: RecordingSettings,
    pub output_path: PathBuf,
    /// Monotonic reading at start, used for every duration computation.
    pub started_at_monotonic: Duration,
    /// Wall-clock time at start, used for naming and display only.
    pub started_at_wall: DateTime<Local>,
}

/// What the producer loop hands back once it has exited and closed its writer.
#[derive(Debug, Clone)]
pub struct LoopReport {
    pub frames_written: u64,
    pub file_size_bytes: u64,
    pub ended_at_monotonic: Duration,
    /// Set when the loop ended on its own because of a device or writer failure.
    pub abort_reason: Option<String>,
}

/// Who asked for a session to end.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StopTrigger {
    Requested,
    Implicit,
}

/// Result of a completed Stop.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct StopReport {
    pub session_id: SessionId,
    pub output_path: PathBuf,
    pub duration_seconds: f64,
    pub frame_count: u64,
    pub file_size_bytes: u64,
    /// No frames reached the file.
    pub empty: bool,
    pub aborted: bool,
    pub abort_reason: Option<String>,
    pub conversion_attempted: bool,
    pub converted: bool,
    pub converted_path: Option<PathBuf>,
    pub normalization: Option<NormalizationOutcome>,
}

impl StopReport {
    pub fn new(session: &RecordingSession, report: &LoopReport) -> Self {
        let elapsed = report
            .ended_at_monotonic
            .saturating_sub(session.started_at_monotonic);
        StopReport {
            session_id: session.id,
            output_path: session.output_path.clone(),
            duration_seconds: elapsed.as_secs_f64(),
            frame_count: report.frames_written,
            file_size_bytes: report.file_size_bytes,
            empty: report.frames_written == 0,
            aborted: report.abort_reason.is_some(),
            abort_reason: report.abort_reason.clone(),
            conversion_attempted: false,
            converted: false,
            converted_path: None,
            normalization: None,
        }
    }

    pub fn with_normalization(mut self, outcome: NormalizationOutcome) -> Self {
        self.conversion_attempted = outcome.was_attempted();
        self.converted_path = outcome.converted_path().cloned();
        self.converted = self.converted_path.is_some();
        self.normalization = Some(outcome);
        self
    }
}

/// Snapshot returned by Status.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct EngineStatus {
    pub recording: bool,
    pub phase: EnginePhase,
    pub elapsed_seconds: Option<f64>,
    pub output_path: Option<PathBuf>,
}
