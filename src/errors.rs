use thiserror::Error;

/// Errors surfaced by the recording engine to its callers.
#[derive(Error, Debug)]
pub enum EngineError {
    #[error("Invalid settings: {0}")]
    InvalidSettings(String),

    #[error("Already recording")]
    AlreadyRecording,

    #[error("Not recording")]
    NotRecording,

    #[error("Cannot change settings while recording")]
    RecordingInProgress,

    #[error("Camera device unavailable: {0}")]
    DeviceUnavailable(String),

    #[error("Failed to open video writer: {0}")]
    WriterOpen(String),

    #[error("Failed to write video frame: {0}")]
    WriterWrite(String),

    #[error("File I/O Error: {0}")]
    Io(String),

    #[error("Task Execution Error: {0}")]
    Task(String),
}

impl EngineError {
    /// Stable machine-readable code for this error.
    pub fn kind(&self) -> &'static str {
        match self {
            EngineError::InvalidSettings(_) => "INVALID_SETTINGS",
            EngineError::AlreadyRecording => "ALREADY_RECORDING",
            EngineError::NotRecording => "NOT_RECORDING",
            EngineError::RecordingInProgress => "RECORDING_IN_PROGRESS",
            EngineError::DeviceUnavailable(_) => "DEVICE_UNAVAILABLE",
            EngineError::WriterOpen(_) => "WRITER_OPEN_ERROR",
            EngineError::WriterWrite(_) => "WRITER_WRITE_ERROR",
            EngineError::Io(_) => "IO_ERROR",
            EngineError::Task(_) => "TASK_ERROR",
        }
    }
}

impl From<tokio::task::JoinError> for EngineError {
    fn from(err: tokio::task::JoinError) -> Self {
        EngineError::Task(err.to_string())
    }
}

/// Failures reported by a frame source.
#[derive(Error, Debug, Clone)]
pub enum SourceError {
    /// The device is gone; no further frames will arrive.
    #[error("Device disconnected: {0}")]
    Disconnected(String),

    /// The device answered but handed back nothing usable this time.
    #[error("Empty frame from {0}")]
    EmptyFrame(String),

    #[error("Capture backend error: {0}")]
    Backend(String),
}

impl SourceError {
    pub fn is_transient(&self) -> bool {
        matches!(self, SourceError::EmptyFrame(_))
    }
}

#[derive(Error, Debug, Clone)]
pub enum WriterError {
    #[error("Writer open failed: {0}")]
    Open(String),

    #[error("Writer write failed: {0}")]
    Write(String),

    #[error("Writer close failed: {0}")]
    Close(String),
}

impl From<WriterError> for EngineError {
    fn from(err: WriterError) -> Self {
        match err {
            WriterError::Open(msg) => EngineError::WriterOpen(msg),
            WriterError::Write(msg) | WriterError::Close(msg) => EngineError::WriterWrite(msg),
        }
    }
}

#[derive(Error, Debug, Clone)]
pub enum TranscodeError {
    #[error("Transcoder binary not found: {0}")]
    ToolMissing(String),

    #[error("Transcoder exited with status {code:?}: {stderr}")]
    NonZeroExit { code: Option<i32>, stderr: String },

    #[error("Transcoder timed out after {0:?}")]
    Timeout(std::time::Duration),

    #[error("Transcoder I/O Error: {0}")]
    Io(String),
}

impl TranscodeError {
    pub fn kind(&self) -> &'static str {
        match self {
            TranscodeError::ToolMissing(_) => "TOOL_MISSING",
            TranscodeError::NonZeroExit { .. } => "NON_ZERO_EXIT",
            TranscodeError::Timeout(_) => "TIMEOUT",
            TranscodeError::Io(_) => "IO_ERROR",
        }
    }
}
