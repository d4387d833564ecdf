use crate::config_loader::MasterConfig;
use crate::core::normalizer::{NormalizationOutcome, RecordingTimeline};
use crate::operations::op_helper;
use anyhow::{anyhow, bail, Result};
use clap::ArgMatches;
use log::{debug, info};
use std::path::PathBuf;
use std::time::Instant;

pub async fn handle_normalize_cli(master_config: &MasterConfig, args: &ArgMatches) -> Result<()> {
    let op_start_time = Instant::now();
    let input = args
        .get_one::<String>("input")
        .map(PathBuf::from)
        .ok_or_else(|| anyhow!("--input is required"))?;
    let duration = args
        .get_one::<f64>("duration")
        .copied()
        .ok_or_else(|| anyhow!("--duration is required"))?;
    let fps = args
        .get_one::<u32>("fps")
        .copied()
        .unwrap_or(master_config.app_settings.fps);
    debug!("Normalize CLI: input: {}, duration: {}s, fps: {}", input.display(), duration, fps);

    if !input.is_file() {
        bail!("❌ Input recording '{}' does not exist.", input.display());
    }

    let normalizer = op_helper::build_normalizer(master_config);
    let outcome = normalizer
        .normalize(&input, RecordingTimeline::from_duration(duration, fps))
        .await;

    match outcome {
        NormalizationOutcome::Converted { converted_path, speed_factor } => {
            info!(
                "✅ Wrote {} (speed x{:.3}) in {:?}.",
                converted_path.display(),
                speed_factor,
                op_start_time.elapsed()
            );
            println!("{}", converted_path.display());
            Ok(())
        }
        NormalizationOutcome::SkippedEmptyRecording => {
            bail!("Nothing to convert: duration must be positive, got {}s", duration)
        }
        NormalizationOutcome::ConversionFailed { kind, reason } => {
            bail!("Conversion failed [{}]: {}", kind, reason)
        }
    }
}
