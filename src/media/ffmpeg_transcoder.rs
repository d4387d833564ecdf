use crate::core::normalizer::{TranscodeJob, Transcoder};
use crate::errors::TranscodeError;
use async_trait::async_trait;
use log::{debug, info};
use std::io::ErrorKind;
use std::path::PathBuf;
use std::process::Stdio;
use std::time::Instant;
use tokio::process::Command;

/// Re-times a clip with ffmpeg's `setpts` filter and re-encodes it as H.264.
pub struct FfmpegTranscoder {
    ffmpeg_path: PathBuf,
}

impl FfmpegTranscoder {
    pub fn new(ffmpeg_path: impl Into<PathBuf>) -> Self {
        FfmpegTranscoder {
            ffmpeg_path: ffmpeg_path.into(),
        }
    }

    pub fn build_args(job: &TranscodeJob) -> Vec<String> {
        let mut args = vec![
            "-y".to_string(),
            "-loglevel".to_string(),
            "error".to_string(),
            "-i".to_string(),
            job.source.to_string_lossy().into_owned(),
            "-filter:v".to_string(),
            format!("setpts={}*PTS", job.pts_scale()),
        ];
        if let Some(fps) = job.output_fps {
            args.push("-r".to_string());
            args.push(format!("{}", fps));
        }
        args.extend([
            "-an".to_string(),
            "-c:v".to_string(),
            "libx264".to_string(),
            "-preset".to_string(),
            "medium".to_string(),
            "-crf".to_string(),
            "23".to_string(),
            job.destination.to_string_lossy().into_owned(),
        ]);
        args
    }
}

#[async_trait]
impl Transcoder for FfmpegTranscoder {
    async fn transcode(&self, job: &TranscodeJob) -> Result<(), TranscodeError> {
        let start_time = Instant::now();
        let args = Self::build_args(job);
        debug!("Running {} {}", self.ffmpeg_path.display(), args.join(" "));

        let child = Command::new(&self.ffmpeg_path)
            .args(&args)
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .spawn()
            .map_err(|e| match e.kind() {
                ErrorKind::NotFound => TranscodeError::ToolMissing(self.ffmpeg_path.display().to_string()),
                _ => TranscodeError::Io(e.to_string()),
            })?;

        // Dropping the child on timeout kills it.
        let output = tokio::time::timeout(job.timeout, child.wait_with_output())
            .await
            .map_err(|_| TranscodeError::Timeout(job.timeout))?
            .map_err(|e| TranscodeError::Io(e.to_string()))?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            return Err(TranscodeError::NonZeroExit {
                code: output.status.code(),
                stderr: stderr.trim().to_string(),
            });
        }
        info!("🎞️ ffmpeg finished {} in {:?}.", job.destination.display(), start_time.elapsed());
        Ok(())
    }
}
