use crate::common::timestamp_utils;
use crate::errors::EngineError;
use chrono::{DateTime, Local};
use log::debug;
use std::path::{Path, PathBuf};

pub const RECORDING_PREFIX: &str = "lockin";

pub fn generate_timestamped_filename(
    prefix: &str,             // e.g., "lockin"
    when: &DateTime<Local>,   // wall-clock start of the session
    timestamp_format: &str,   // e.g., "%Y%m%d-%H%M%S"
    extension: &str,          // e.g., "avi", "mp4"
) -> String {
    let timestamp = timestamp_utils::format_local_timestamp(when, timestamp_format);
    format!("{}-{}.{}", prefix, timestamp, extension)
}

/// `<dir>/lockin-<timestamp>.<ext>`, with `-1`, `-2`, ... appended to the
/// stem when that name is already taken.
pub fn unique_recording_path(
    dir: &Path,
    when: &DateTime<Local>,
    timestamp_format: &str,
    extension: &str,
) -> PathBuf {
    let candidate = dir.join(generate_timestamped_filename(RECORDING_PREFIX, when, timestamp_format, extension));
    if !candidate.exists() {
        return candidate;
    }
    let stem = format!(
        "{}-{}",
        RECORDING_PREFIX,
        timestamp_utils::format_local_timestamp(when, timestamp_format)
    );
    let mut n: u32 = 1;
    loop {
        let path = dir.join(format!("{}-{}.{}", stem, n, extension));
        if !path.exists() {
            debug!("'{}' already exists, using '{}'.", candidate.display(), path.display());
            return path;
        }
        n += 1;
    }
}

/// Creates `dir_path` if needed and checks that files can be created in it.
pub fn ensure_output_directory(dir_path: &Path) -> Result<PathBuf, EngineError> {
    if !dir_path.exists() {
        debug!("Output directory '{}' does not exist, attempting to create it.", dir_path.display());
        std::fs::create_dir_all(dir_path).map_err(|e| {
            EngineError::Io(format!(
                "Failed to create output directory '{}': {}",
                dir_path.display(),
                e
            ))
        })?;
    } else if !dir_path.is_dir() {
        return Err(EngineError::Io(format!(
            "Output path '{}' exists but is not a directory.",
            dir_path.display()
        )));
    }
    tempfile::tempfile_in(dir_path).map_err(|e| {
        EngineError::Io(format!(
            "Output directory '{}' is not writable: {}",
            dir_path.display(),
            e
        ))
    })?;
    Ok(dir_path.to_path_buf())
}
