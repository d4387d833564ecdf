use crate::errors::EngineError;
use log::debug;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

pub const MIN_FPS: u32 = 1;
pub const MAX_FPS: u32 = 30;

/// Immutable capture settings. A session snapshots one of these at start.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RecordingSettings {
    pub fps: u32,
    pub width: u32,
    pub height: u32,
    pub output_dir: PathBuf,
    pub normalize: bool,
}

impl Default for RecordingSettings {
    fn default() -> Self {
        RecordingSettings {
            fps: 2,
            width: 640,
            height: 480,
            output_dir: PathBuf::from("recordings"),
            normalize: true,
        }
    }
}

impl RecordingSettings {
    /// Checks the value ranges. Does not touch the filesystem.
    pub fn validate(&self) -> Result<(), EngineError> {
        if !(MIN_FPS..=MAX_FPS).contains(&self.fps) {
            return Err(EngineError::InvalidSettings(format!(
                "fps must be between {} and {}, got {}",
                MIN_FPS, MAX_FPS, self.fps
            )));
        }
        if self.width == 0 || self.height == 0 {
            return Err(EngineError::InvalidSettings(format!(
                "resolution must be positive, got {}x{}",
                self.width, self.height
            )));
        }
        if self.output_dir.as_os_str().is_empty() {
            return Err(EngineError::InvalidSettings(
                "output directory cannot be empty".to_string(),
            ));
        }
        Ok(())
    }

    /// Applies the fields present in `update` and validates the result.
    /// `self` is left untouched when validation fails.
    pub fn merged(&self, update: &SettingsUpdate) -> Result<RecordingSettings, EngineError> {
        let merged = RecordingSettings {
            fps: update.fps.unwrap_or(self.fps),
            width: update.width.unwrap_or(self.width),
            height: update.height.unwrap_or(self.height),
            output_dir: update
                .output_directory
                .clone()
                .unwrap_or_else(|| self.output_dir.clone()),
            normalize: update.convert_to_one_minute.unwrap_or(self.normalize),
        };
        merged.validate()?;
        debug!("Merged settings: {:?}", merged);
        Ok(merged)
    }
}

/// Partial settings as sent by an external caller. Missing fields keep
/// their current value.
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct SettingsUpdate {
    pub fps: Option<u32>,
    pub width: Option<u32>,
    pub height: Option<u32>,
    pub output_directory: Option<PathBuf>,
    pub convert_to_one_minute: Option<bool>,
}
