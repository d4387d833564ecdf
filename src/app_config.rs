use crate::common::timestamp_utils::DEFAULT_FILENAME_TIMESTAMP_FORMAT;
use crate::core::settings::RecordingSettings;
use serde::Deserialize;
use std::path::PathBuf;
use std::time::Duration;

#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct ApplicationConfig {
    pub output_directory: String,
    pub fps: u32,
    pub width: u32,
    pub height: u32,
    pub convert_to_one_minute: bool,
    pub camera_index: i32,
    pub video_container: String, // e.g., "avi", "mp4"
    pub video_codec: String,     // OpenCV writer only, e.g., "xvid", "mjpg"
    pub ffmpeg_path: String,
    pub transcode_timeout_secs: u64,
    pub filename_timestamp_format: String, // strftime format string
    pub log_level: Option<String>, // CLI --debug takes precedence
}

impl Default for ApplicationConfig {
    fn default() -> Self {
        ApplicationConfig {
            output_directory: "recordings".to_string(),
            fps: 2,
            width: 640,
            height: 480,
            convert_to_one_minute: true,
            camera_index: 0,
            video_container: "avi".to_string(),
            video_codec: "xvid".to_string(),
            ffmpeg_path: "ffmpeg".to_string(),
            transcode_timeout_secs: 600,
            filename_timestamp_format: DEFAULT_FILENAME_TIMESTAMP_FORMAT.to_string(),
            log_level: Some("info".to_string()),
        }
    }
}

impl ApplicationConfig {
    pub fn recording_settings(&self) -> RecordingSettings {
        RecordingSettings {
            fps: self.fps,
            width: self.width,
            height: self.height,
            output_dir: PathBuf::from(&self.output_directory),
            normalize: self.convert_to_one_minute,
        }
    }

    pub fn transcode_timeout(&self) -> Duration {
        Duration::from_secs(self.transcode_timeout_secs)
    }
}
