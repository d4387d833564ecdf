use crate::core::settings::RecordingSettings;
use crate::errors::SourceError;

// --- Frame data ---

/// One captured image, packed BGR8 rows with no padding.
#[derive(Debug, Clone)]
pub struct Frame {
    pub width: u32,
    pub height: u32,
    pub bgr_data: Vec<u8>,
}

impl Frame {
    pub fn new(width: u32, height: u32, bgr_data: Vec<u8>) -> Self {
        Frame { width, height, bgr_data }
    }

    pub fn byte_len(width: u32, height: u32) -> usize {
        width as usize * height as usize * 3
    }

    pub fn is_well_formed(&self) -> bool {
        self.bgr_data.len() == Self::byte_len(self.width, self.height)
    }
}

// --- The FrameSource trait ---

/// A camera that hands out frames on demand. Calls are blocking and are
/// only ever made from the producer thread.
pub trait FrameSource: Send {
    fn name(&self) -> String;

    fn next_frame(&mut self) -> Result<Frame, SourceError>;
}

/// Opens a frame source configured for a session's settings. Failing here
/// surfaces as `DeviceUnavailable` from Start.
pub trait CameraProvider: Send + Sync {
    fn open(&self, settings: &RecordingSettings) -> Result<Box<dyn FrameSource>, SourceError>;
}
