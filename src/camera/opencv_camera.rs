use crate::core::capture_source::{CameraProvider, Frame, FrameSource};
use crate::core::settings::RecordingSettings;
use crate::errors::SourceError;
use log::{debug, info, warn};
use opencv::prelude::*;
use opencv::{core as opencv_core, imgproc, videoio};
use std::time::Instant;

/// Opens a local capture device (`/dev/videoN`, DirectShow index, ...) by index.
pub struct OpenCvCameraProvider {
    device_index: i32,
}

impl OpenCvCameraProvider {
    pub fn new(device_index: i32) -> Self {
        OpenCvCameraProvider { device_index }
    }
}

impl CameraProvider for OpenCvCameraProvider {
    fn open(&self, settings: &RecordingSettings) -> Result<Box<dyn FrameSource>, SourceError> {
        let name = format!("camera{}", self.device_index);
        let open_start = Instant::now();
        let mut cap = videoio::VideoCapture::new(self.device_index, videoio::CAP_ANY)
            .map_err(|e| SourceError::Disconnected(format!("OpenCV: cannot create capture for '{}': {}", name, e)))?;

        let opened = videoio::VideoCapture::is_opened(&cap)
            .map_err(|e| SourceError::Backend(format!("OpenCV: is_opened failed for '{}': {}", name, e)))?;
        if !opened {
            return Err(SourceError::Disconnected(format!(
                "OpenCV: failed to open '{}' - check that the device is connected and not in use",
                name
            )));
        }

        // Drivers may ignore these; frames are resized on read if they do.
        for (prop, value) in [
            (videoio::CAP_PROP_FRAME_WIDTH, settings.width as f64),
            (videoio::CAP_PROP_FRAME_HEIGHT, settings.height as f64),
        ] {
            if let Err(e) = cap.set(prop, value) {
                warn!("⚠️ OpenCV: could not set property {} on '{}': {}", prop, name, e);
            }
        }
        info!("👍 Capture device '{}' opened in {:?}", name, open_start.elapsed());

        Ok(Box::new(OpenCvCamera {
            name,
            cap,
            width: settings.width,
            height: settings.height,
        }))
    }
}

struct OpenCvCamera {
    name: String,
    cap: videoio::VideoCapture,
    width: u32,
    height: u32,
}

impl FrameSource for OpenCvCamera {
    fn name(&self) -> String {
        self.name.clone()
    }

    fn next_frame(&mut self) -> Result<Frame, SourceError> {
        let mut raw = opencv_core::Mat::default();
        let ok = self
            .cap
            .read(&mut raw)
            .map_err(|e| SourceError::Disconnected(format!("OpenCV: read failed for '{}': {}", self.name, e)))?;
        if !ok || raw.empty() {
            return Err(SourceError::EmptyFrame(self.name.clone()));
        }
        if raw.channels() != 3 {
            return Err(SourceError::Backend(format!(
                "'{}' delivered {} channel frames, expected BGR",
                self.name,
                raw.channels()
            )));
        }

        let target = opencv_core::Size::new(self.width as i32, self.height as i32);
        let frame_mat = if raw.size().map_err(|e| SourceError::Backend(e.to_string()))? != target {
            debug!("Resizing frame from '{}' to {}x{}", self.name, self.width, self.height);
            let mut resized = opencv_core::Mat::default();
            imgproc::resize(&raw, &mut resized, target, 0.0, 0.0, imgproc::INTER_LINEAR)
                .map_err(|e| SourceError::Backend(format!("OpenCV: resize failed: {}", e)))?;
            resized
        } else {
            raw
        };

        let data = frame_mat
            .data_bytes()
            .map_err(|e| SourceError::Backend(format!("OpenCV: frame is not contiguous: {}", e)))?;
        Ok(Frame::new(self.width, self.height, data.to_vec()))
    }
}
