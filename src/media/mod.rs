pub mod ffmpeg_transcoder;
pub mod ffmpeg_writer;
#[cfg(feature = "opencv")]
pub mod opencv_writer;
