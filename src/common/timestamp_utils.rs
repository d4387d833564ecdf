use chrono::{DateTime, Local};

pub const DEFAULT_FILENAME_TIMESTAMP_FORMAT: &str = "%Y%m%d-%H%M%S";

// Format a local timestamp for use in file names
pub fn format_local_timestamp(when: &DateTime<Local>, format_str: &str) -> String {
    when.format(format_str).to_string()
}
