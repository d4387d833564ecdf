use crate::core::capture_source::Frame;
use crate::errors::WriterError;
use std::path::Path;

/// An open container file accepting frames in arrival order.
///
/// `close` consumes the writer, so a closed writer cannot be written to or
/// closed a second time.
pub trait VideoWriter: Send {
    fn write(&mut self, frame: &Frame) -> Result<(), WriterError>;

    /// Flushes and finalizes the container, returning the file size in bytes.
    fn close(self: Box<Self>) -> Result<u64, WriterError>;
}

pub trait WriterFactory: Send + Sync {
    /// File extension of the containers this factory produces, without the dot.
    fn container_extension(&self) -> &str;

    fn open(
        &self,
        path: &Path,
        width: u32,
        height: u32,
        fps: u32,
    ) -> Result<Box<dyn VideoWriter>, WriterError>;
}
