#[cfg(feature = "opencv")]
pub mod opencv_camera;
pub mod test_pattern;
