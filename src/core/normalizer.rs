//! Re-times a finished recording so it plays back in exactly one minute.

use crate::errors::TranscodeError;
use async_trait::async_trait;
use log::{debug, error, info, warn};
use serde::Serialize;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::{Duration, Instant};

pub const TARGET_DURATION_SECS: f64 = 60.0;
pub const CONVERTED_SUFFIX: &str = "_1min";

/// `actual / 60`. Above 1 the clip gets sped up, below 1 slowed down.
/// Returns `None` for durations that cannot be normalized.
pub fn speed_factor(actual_duration_secs: f64) -> Option<f64> {
    if !actual_duration_secs.is_finite() || actual_duration_secs <= 0.0 {
        return None;
    }
    Some(actual_duration_secs / TARGET_DURATION_SECS)
}

/// `rec/lockin-x.avi` -> `rec/lockin-x_1min.avi`
pub fn converted_path_for(source: &Path) -> PathBuf {
    let stem = source
        .file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_default();
    let file_name = match source.extension() {
        Some(ext) => format!("{}{}.{}", stem, CONVERTED_SUFFIX, ext.to_string_lossy()),
        None => format!("{}{}", stem, CONVERTED_SUFFIX),
    };
    source.with_file_name(file_name)
}

/// How long a finished recording ran and how much video its file holds.
///
/// The two differ when capture fell behind and slots were skipped: the file
/// then plays back for `frame_count / fps`, shorter than the time measured.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RecordingTimeline {
    /// Monotonic time between start and stop.
    pub measured_secs: f64,
    /// Playback length of the file as written.
    pub content_secs: f64,
    pub frame_count: u64,
    pub fps: u32,
}

impl RecordingTimeline {
    pub fn from_capture(measured_secs: f64, frame_count: u64, fps: u32) -> Self {
        RecordingTimeline {
            measured_secs,
            content_secs: frame_count as f64 / fps.max(1) as f64,
            frame_count,
            fps,
        }
    }

    /// For an existing file of known length whose frames were not counted.
    pub fn from_duration(secs: f64, fps: u32) -> Self {
        RecordingTimeline {
            measured_secs: secs,
            content_secs: secs,
            frame_count: (secs * fps as f64).round().max(0.0) as u64,
            fps,
        }
    }
}

#[derive(Debug, Clone)]
pub struct TranscodeJob {
    pub source: PathBuf,
    pub destination: PathBuf,
    /// Measured duration over the target, as reported to callers.
    pub speed_factor: f64,
    /// Playback length of `source`; the re-timing is derived from this.
    pub content_secs: f64,
    /// Frame rate for the output stream, if the transcoder should set one.
    pub output_fps: Option<f64>,
    pub timeout: Duration,
}

impl TranscodeJob {
    /// Multiplier for presentation timestamps that makes `source` play for
    /// exactly the target duration.
    pub fn pts_scale(&self) -> f64 {
        TARGET_DURATION_SECS / self.content_secs
    }
}

/// External re-timing tool. Implementations write `job.destination` and
/// nothing else.
#[async_trait]
pub trait Transcoder: Send + Sync {
    async fn transcode(&self, job: &TranscodeJob) -> Result<(), TranscodeError>;
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum NormalizationOutcome {
    Converted {
        converted_path: PathBuf,
        speed_factor: f64,
    },
    SkippedEmptyRecording,
    ConversionFailed {
        kind: String,
        reason: String,
    },
}

impl NormalizationOutcome {
    pub fn was_attempted(&self) -> bool {
        !matches!(self, NormalizationOutcome::SkippedEmptyRecording)
    }

    pub fn converted_path(&self) -> Option<&PathBuf> {
        match self {
            NormalizationOutcome::Converted { converted_path, .. } => Some(converted_path),
            _ => None,
        }
    }

    fn failed(kind: &str, reason: impl Into<String>) -> Self {
        NormalizationOutcome::ConversionFailed {
            kind: kind.to_string(),
            reason: reason.into(),
        }
    }
}

#[derive(Clone)]
pub struct DurationNormalizer {
    transcoder: Arc<dyn Transcoder>,
    timeout: Duration,
}

impl DurationNormalizer {
    pub fn new(transcoder: Arc<dyn Transcoder>, timeout: Duration) -> Self {
        DurationNormalizer { transcoder, timeout }
    }

    /// Produces `<stem>_1min.<ext>` next to `source`. The source file is
    /// never modified; the destination only appears once the transcode has
    /// fully succeeded.
    pub async fn normalize(&self, source: &Path, timeline: RecordingTimeline) -> NormalizationOutcome {
        let start_time = Instant::now();
        let factor = match speed_factor(timeline.measured_secs) {
            Some(f) if timeline.frame_count > 0 && timeline.content_secs > 0.0 => f,
            _ => {
                info!(
                    "⏭️ Skipping normalization of {}: empty recording ({:.3}s, {} frames).",
                    source.display(),
                    timeline.measured_secs,
                    timeline.frame_count
                );
                return NormalizationOutcome::SkippedEmptyRecording;
            }
        };

        let destination = converted_path_for(source);
        let dest_dir = match destination.parent() {
            Some(p) if !p.as_os_str().is_empty() => p.to_path_buf(),
            _ => PathBuf::from("."),
        };
        let extension = source
            .extension()
            .map(|e| format!(".{}", e.to_string_lossy()))
            .unwrap_or_default();

        let partial = match tempfile::Builder::new()
            .prefix(".lockin-partial-")
            .suffix(&extension)
            .tempfile_in(&dest_dir)
        {
            Ok(file) => file.into_temp_path(),
            Err(e) => {
                error!("❌ Cannot create temporary output in {}: {}", dest_dir.display(), e);
                return NormalizationOutcome::failed("IO_ERROR", e.to_string());
            }
        };
        debug!("Normalizing {} -> {} via {}", source.display(), destination.display(), partial.display());

        if (timeline.content_secs - TARGET_DURATION_SECS).abs() < f64::EPSILON {
            info!("⏱️ {} already plays for {}s; copying instead of transcoding.", source.display(), TARGET_DURATION_SECS);
            if let Err(e) = tokio::fs::copy(source, &partial).await {
                error!("❌ Copy of {} failed: {}", source.display(), e);
                return NormalizationOutcome::failed("IO_ERROR", e.to_string());
            }
        } else {
            let job = TranscodeJob {
                source: source.to_path_buf(),
                destination: partial.to_path_buf(),
                speed_factor: factor,
                content_secs: timeline.content_secs,
                output_fps: Some(timeline.fps as f64 * timeline.content_secs / TARGET_DURATION_SECS),
                timeout: self.timeout,
            };
            info!(
                "🎞️ Normalizing {} ({:.2}s measured, {:.2}s of video) to {}s with speed factor {:.4}.",
                source.display(),
                timeline.measured_secs,
                timeline.content_secs,
                TARGET_DURATION_SECS,
                factor
            );
            if let Err(e) = self.transcoder.transcode(&job).await {
                warn!("⚠️ Conversion of {} failed after {:?}: {}", source.display(), start_time.elapsed(), e);
                return NormalizationOutcome::failed(e.kind(), e.to_string());
            }
        }

        match tokio::fs::metadata(&partial).await {
            Ok(meta) if meta.len() > 0 => {}
            Ok(_) => {
                warn!("⚠️ Transcoder reported success but produced an empty file for {}.", source.display());
                return NormalizationOutcome::failed("EMPTY_OUTPUT", "transcoder produced an empty file");
            }
            Err(e) => {
                warn!("⚠️ Transcoder output for {} is missing: {}", source.display(), e);
                return NormalizationOutcome::failed("EMPTY_OUTPUT", e.to_string());
            }
        }

        if let Err(e) = partial.persist(&destination) {
            error!("❌ Could not move converted file into place at {}: {}", destination.display(), e.error);
            return NormalizationOutcome::failed("IO_ERROR", e.error.to_string());
        }

        info!("✅ Normalized recording written to {} in {:?}.", destination.display(), start_time.elapsed());
        NormalizationOutcome::Converted {
            converted_path: destination,
            speed_factor: factor,
        }
    }
}
