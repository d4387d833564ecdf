use crate::core::capture_source::{CameraProvider, Frame, FrameSource};
use crate::core::settings::RecordingSettings;
use crate::errors::SourceError;

/// Synthetic camera: a diagonal gradient with a bar that sweeps across the
/// frame, one step per frame. Useful without a device attached.
#[derive(Debug, Default, Clone, Copy)]
pub struct TestPatternProvider;

impl CameraProvider for TestPatternProvider {
    fn open(&self, settings: &RecordingSettings) -> Result<Box<dyn FrameSource>, SourceError> {
        Ok(Box::new(TestPatternSource::new(settings.width, settings.height)))
    }
}

pub struct TestPatternSource {
    width: u32,
    height: u32,
    frame_index: u64,
}

impl TestPatternSource {
    pub fn new(width: u32, height: u32) -> Self {
        TestPatternSource {
            width,
            height,
            frame_index: 0,
        }
    }
}

impl FrameSource for TestPatternSource {
    fn name(&self) -> String {
        "test-pattern".to_string()
    }

    fn next_frame(&mut self) -> Result<Frame, SourceError> {
        let (w, h) = (self.width as usize, self.height as usize);
        let bar_width = (w / 16).max(1);
        let bar_x = (self.frame_index as usize * bar_width) % w.max(1);
        let mut data = Vec::with_capacity(Frame::byte_len(self.width, self.height));
        for y in 0..h {
            for x in 0..w {
                if x >= bar_x && x < bar_x + bar_width {
                    data.extend_from_slice(&[255, 255, 255]);
                } else {
                    let b = (x * 255 / w.max(1)) as u8;
                    let g = (y * 255 / h.max(1)) as u8;
                    data.extend_from_slice(&[b, g, 64]);
                }
            }
        }
        self.frame_index += 1;
        Ok(Frame::new(self.width, self.height, data))
    }
}
