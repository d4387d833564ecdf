use crate::core::session::StopReport;
use log::info;

/// Receives metadata about finished recordings. Owned by whoever lists
/// recordings; the engine only reports into it.
pub trait RecordingRegistry: Send + Sync {
    fn record_completed(&self, report: &StopReport);
}

/// Registry that only writes completed recordings to the log.
#[derive(Debug, Default, Clone, Copy)]
pub struct LogRegistry;

impl RecordingRegistry for LogRegistry {
    fn record_completed(&self, report: &StopReport) {
        info!(
            "🗂️ Recording {} -> {} ({:.1}s, {} frames{}{})",
            report.session_id,
            report.output_path.display(),
            report.duration_seconds,
            report.frame_count,
            if report.aborted { ", aborted" } else { "" },
            report
                .converted_path
                .as_ref()
                .map(|p| format!(", converted: {}", p.display()))
                .unwrap_or_default()
        );
    }
}
