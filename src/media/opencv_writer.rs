use crate::core::capture_source::Frame;
use crate::core::video_writer::{VideoWriter, WriterFactory};
use crate::errors::WriterError;
use log::{debug, error, info, warn};
use opencv::prelude::*;
use opencv::{core as opencv_core, videoio};
use std::path::{Path, PathBuf};

/// Container writer backed by OpenCV's `VideoWriter`.
pub struct OpenCvWriterFactory {
    container: String,
    codec: String,
}

impl OpenCvWriterFactory {
    pub fn new(container: impl Into<String>, codec: impl Into<String>) -> Self {
        OpenCvWriterFactory {
            container: container.into(),
            codec: codec.into(),
        }
    }

    fn fourcc(&self) -> &'static str {
        match self.codec.to_lowercase().as_str() {
            "mjpg" | "mjpeg" => "MJPG",
            "xvid" => "XVID",
            "mp4v" => "MP4V",
            "h264" if self.container.to_lowercase() == "mp4" => "avc1",
            "h264" => "H264",
            codec_val => {
                warn!("⚠️ Unsupported video codec '{}' for container '{}'. Defaulting to XVID.", codec_val, self.container);
                "XVID"
            }
        }
    }
}

impl WriterFactory for OpenCvWriterFactory {
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
        let fourcc_str: Vec<char> = self.fourcc().chars().collect();
        let fourcc = videoio::VideoWriter::fourcc(fourcc_str[0], fourcc_str[1], fourcc_str[2], fourcc_str[3])
            .map_err(|e| WriterError::Open(format!("OpenCV: invalid fourcc: {}", e)))?;
        let output = path
            .to_str()
            .ok_or_else(|| WriterError::Open(format!("Invalid output path (not UTF-8): {}", path.display())))?;

        let writer = videoio::VideoWriter::new(
            output,
            fourcc,
            fps as f64,
            opencv_core::Size::new(width as i32, height as i32),
            true,
        )
        .map_err(|e| WriterError::Open(format!("OpenCV: {}", e)))?;

        if !videoio::VideoWriter::is_opened(&writer).unwrap_or(false) {
            error!("❌ OpenCV: Failed to open VideoWriter at '{}'", path.display());
            if path.exists() {
                if let Err(del_err) = std::fs::remove_file(path) {
                    warn!("Failed to delete empty file {} after VideoWriter open error: {}", path.display(), del_err);
                }
            }
            return Err(WriterError::Open(format!("OpenCV: VideoWriter refused '{}'", path.display())));
        }
        info!("✍️ OpenCV: VideoWriter opened for {} ({}x{} @ {} fps)", path.display(), width, height, fps);

        Ok(Box::new(OpenCvVideoWriter {
            writer,
            path: path.to_path_buf(),
            width,
            height,
        }))
    }
}

struct OpenCvVideoWriter {
    writer: videoio::VideoWriter,
    path: PathBuf,
    width: u32,
    height: u32,
}

impl VideoWriter for OpenCvVideoWriter {
    fn write(&mut self, frame: &Frame) -> Result<(), WriterError> {
        if frame.width != self.width || frame.height != self.height || !frame.is_well_formed() {
            return Err(WriterError::Write(format!(
                "frame is {}x{}, writer expects {}x{}",
                frame.width, frame.height, self.width, self.height
            )));
        }
        let flat = opencv_core::Mat::from_slice(&frame.bgr_data)
            .map_err(|e| WriterError::Write(format!("OpenCV: {}", e)))?;
        let image = flat
            .reshape(3, frame.height as i32)
            .map_err(|e| WriterError::Write(format!("OpenCV: {}", e)))?;
        self.writer
            .write(&*image)
            .map_err(|e| WriterError::Write(format!("OpenCV: write to '{}' failed: {}", self.path.display(), e)))
    }

    fn close(mut self: Box<Self>) -> Result<u64, WriterError> {
        self.writer
            .release()
            .map_err(|e| WriterError::Close(format!("OpenCV: release failed: {}", e)))?;
        let size = std::fs::metadata(&self.path)
            .map(|m| m.len())
            .map_err(|e| WriterError::Close(format!("Cannot stat {}: {}", self.path.display(), e)))?;
        debug!("OpenCV: VideoWriter released {} ({} bytes).", self.path.display(), size);
        Ok(size)
    }
}
