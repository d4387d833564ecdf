//! Video writer that pipes raw BGR frames into an ffmpeg child process.

use crate::core::capture_source::Frame;
use crate::core::video_writer::{VideoWriter, WriterFactory};
use crate::errors::WriterError;
use log::{debug, info, warn};
use std::io::{Read, Write};
use std::path::{Path, PathBuf};
use std::process::{Child, ChildStdin, Command, Stdio};
use std::thread::JoinHandle;

pub struct FfmpegWriterFactory {
    ffmpeg_path: PathBuf,
    container: String,
}

impl FfmpegWriterFactory {
    pub fn new(ffmpeg_path: impl Into<PathBuf>, container: impl Into<String>) -> Self {
        FfmpegWriterFactory {
            ffmpeg_path: ffmpeg_path.into(),
            container: container.into(),
        }
    }

    fn codec_args(&self) -> Vec<String> {
        match self.container.to_lowercase().as_str() {
            "mp4" | "mkv" | "mov" => vec![
                "-c:v".into(),
                "libx264".into(),
                "-preset".into(),
                "veryfast".into(),
                "-pix_fmt".into(),
                "yuv420p".into(),
            ],
            // XVID-compatible MPEG-4 Part 2, what the AVI recordings have always used.
            _ => vec![
                "-c:v".into(),
                "mpeg4".into(),
                "-vtag".into(),
                "XVID".into(),
                "-q:v".into(),
                "5".into(),
            ],
        }
    }
}

impl WriterFactory for FfmpegWriterFactory {
    fn container_extension(&self) -> &str {
        &self.container
    }

    fn open(
        &self,
        path: &Path,
        width: u32,
        height: u32,
        fps: u32,
    ) -> Result<Box<dyn VideoWriter>, WriterError> {
        let output = path
            .to_str()
            .ok_or_else(|| WriterError::Open(format!("Invalid output path (not UTF-8): {}", path.display())))?;

        let mut args: Vec<String> = vec![
            "-y".into(),
            "-loglevel".into(),
            "error".into(),
            "-f".into(),
            "rawvideo".into(),
            "-pix_fmt".into(),
            "bgr24".into(),
            "-s".into(),
            format!("{}x{}", width, height),
            "-r".into(),
            fps.to_string(),
            "-i".into(),
            "-".into(),
        ];
        args.extend(self.codec_args());
        args.push(output.to_string());
        debug!("Spawning {} {}", self.ffmpeg_path.display(), args.join(" "));

        let mut process = Command::new(&self.ffmpeg_path)
            .args(&args)
            .stdin(Stdio::piped())
            .stdout(Stdio::null())
            .stderr(Stdio::piped())
            .spawn()
            .map_err(|e| WriterError::Open(format!("Failed to start {}: {}", self.ffmpeg_path.display(), e)))?;

        let stdin = process
            .stdin
            .take()
            .ok_or_else(|| WriterError::Open("Failed to capture ffmpeg stdin".to_string()))?;
        // Drained continuously so a chatty encoder cannot fill the pipe and stall writes.
        let stderr_drain = process.stderr.take().map(|mut stderr| {
            std::thread::spawn(move || {
                let mut text = String::new();
                let _ = stderr.read_to_string(&mut text);
                text
            })
        });

        info!("✍️ ffmpeg writer opened for {} ({}x{} @ {} fps)", path.display(), width, height, fps);
        Ok(Box::new(FfmpegPipeWriter {
            process: Some(process),
            stdin: Some(stdin),
            stderr_drain,
            path: path.to_path_buf(),
            width,
            height,
            frames: 0,
        }))
    }
}

struct FfmpegPipeWriter {
    process: Option<Child>,
    stdin: Option<ChildStdin>,
    stderr_drain: Option<JoinHandle<String>>,
    path: PathBuf,
    width: u32,
    height: u32,
    frames: u64,
}

impl VideoWriter for FfmpegPipeWriter {
    fn write(&mut self, frame: &Frame) -> Result<(), WriterError> {
        if frame.width != self.width || frame.height != self.height || !frame.is_well_formed() {
            return Err(WriterError::Write(format!(
                "frame is {}x{} ({} bytes), writer expects {}x{}",
                frame.width,
                frame.height,
                frame.bgr_data.len(),
                self.width,
                self.height
            )));
        }
        let stdin = self
            .stdin
            .as_mut()
            .ok_or_else(|| WriterError::Write("ffmpeg stdin already closed".to_string()))?;
        stdin
            .write_all(&frame.bgr_data)
            .map_err(|e| WriterError::Write(format!("Failed to write frame {} to ffmpeg: {}", self.frames, e)))?;
        self.frames += 1;
        Ok(())
    }

    fn close(mut self: Box<Self>) -> Result<u64, WriterError> {
        // EOF on stdin tells ffmpeg to write the trailer and exit.
        drop(self.stdin.take());
        let mut process = self
            .process
            .take()
            .ok_or_else(|| WriterError::Close("ffmpeg process already reaped".to_string()))?;
        let status = process
            .wait()
            .map_err(|e| WriterError::Close(format!("Failed to wait for ffmpeg: {}", e)))?;
        let stderr = self
            .stderr_drain
            .take()
            .and_then(|drain| drain.join().ok())
            .unwrap_or_default();
        if !status.success() {
            return Err(WriterError::Close(format!("ffmpeg exited with {}: {}", status, stderr.trim())));
        }
        let size = std::fs::metadata(&self.path)
            .map(|m| m.len())
            .map_err(|e| WriterError::Close(format!("Cannot stat {}: {}", self.path.display(), e)))?;
        debug!("ffmpeg writer closed {} after {} frames ({} bytes).", self.path.display(), self.frames, size);
        Ok(size)
    }
}

impl Drop for FfmpegPipeWriter {
    fn drop(&mut self) {
        drop(self.stdin.take());
        if let Some(mut process) = self.process.take() {
            warn!("ffmpeg writer for {} dropped without close; waiting for it to exit.", self.path.display());
            let _ = process.wait();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn avi_uses_xvid_tag_and_mp4_uses_h264() {
        let avi = FfmpegWriterFactory::new("ffmpeg", "avi").codec_args();
        assert!(avi.windows(2).any(|w| w[0] == "-vtag" && w[1] == "XVID"));
        let mp4 = FfmpegWriterFactory::new("ffmpeg", "MP4").codec_args();
        assert!(mp4.windows(2).any(|w| w[0] == "-c:v" && w[1] == "libx264"));
    }

    #[test]
    fn missing_binary_is_an_open_error() {
        let dir = tempfile::tempdir().unwrap();
        let factory = FfmpegWriterFactory::new(dir.path().join("no-such-ffmpeg"), "avi");
        let result = factory.open(&dir.path().join("out.avi"), 4, 2, 2);
        assert!(matches!(result, Err(WriterError::Open(_))));
        assert_eq!(factory.container_extension(), "avi");
    }

    /// Installs a shell script standing in for ffmpeg. It sees the same
    /// arguments; the output path is the last one.
    #[cfg(unix)]
    fn fake_encoder(dir: &Path, body: &str) -> PathBuf {
        use std::os::unix::fs::PermissionsExt;
        let script = dir.join("fake-ffmpeg");
        std::fs::write(&script, format!("#!/bin/sh\nfor last; do :; done\n{}\n", body)).unwrap();
        std::fs::set_permissions(&script, std::fs::Permissions::from_mode(0o755)).unwrap();
        script
    }

    #[cfg(unix)]
    #[test]
    fn encoder_noise_on_stderr_does_not_stall_frame_writes() {
        let dir = tempfile::tempdir().unwrap();
        // 256 KiB of diagnostics before the encoder reads any input.
        let script = fake_encoder(
            dir.path(),
            "head -c 262144 /dev/zero | tr '\\0' e >&2\ncat > \"$last\"",
        );
        let factory = FfmpegWriterFactory::new(script, "avi");
        let mut writer = factory.open(&dir.path().join("out.avi"), 640, 480, 2).unwrap();

        let frame = Frame::new(640, 480, vec![7; Frame::byte_len(640, 480)]);
        for _ in 0..3 {
            writer.write(&frame).unwrap();
        }
        let size = writer.close().unwrap();
        assert_eq!(size, 3 * Frame::byte_len(640, 480) as u64);
    }

    #[cfg(unix)]
    #[test]
    fn encoder_failure_reports_its_stderr() {
        let dir = tempfile::tempdir().unwrap();
        let script = fake_encoder(dir.path(), "cat > /dev/null\necho 'muxer exploded' >&2\nexit 3");
        let factory = FfmpegWriterFactory::new(script, "avi");
        let writer = factory.open(&dir.path().join("out.avi"), 4, 2, 2).unwrap();

        match writer.close() {
            Err(WriterError::Close(msg)) => assert!(msg.contains("muxer exploded"), "{}", msg),
            other => panic!("expected a close error, got {:?}", other.map(|_| ())),
        }
    }
}
