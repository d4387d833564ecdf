use crate::config_loader::MasterConfig;
use crate::core::session::StopReport;
use crate::operations::op_helper;
use anyhow::{anyhow, Context, Result};
use clap::ArgMatches;
use log::{debug, error, info, warn};
use std::time::{Duration, Instant};

const STATUS_LOG_INTERVAL: Duration = Duration::from_secs(10);

pub async fn handle_record_video_cli(master_config: &MasterConfig, args: &ArgMatches) -> Result<()> {
    let op_start_time = Instant::now();
    let duration = args.get_one::<u64>("duration").copied().map(Duration::from_secs);
    debug!(
        "Record video CLI: duration_arg: {:?}, output_arg: {:?}, test_pattern: {}",
        duration,
        args.get_one::<String>("output"),
        args.get_flag("test-pattern")
    );

    let engine = op_helper::build_engine(master_config, args.get_flag("test-pattern"))?;
    let update = op_helper::settings_update_from_args(args);

    let output_path = engine
        .start(update)
        .await
        .map_err(|e| anyhow!("[{}] {}", e.kind(), e))
        .context("Failed to start recording")?;
    match duration {
        Some(d) => info!("📹 Recording to {} for {:?} (Ctrl-C stops early).", output_path.display(), d),
        None => info!("📹 Recording to {} until Ctrl-C.", output_path.display()),
    }

    let deadline = duration.map(|d| tokio::time::Instant::now() + d);
    let mut status_ticker = tokio::time::interval(STATUS_LOG_INTERVAL);
    status_ticker.tick().await;

    loop {
        tokio::select! {
            _ = tokio::signal::ctrl_c() => {
                info!("🛑 Ctrl-C received, stopping.");
                break;
            }
            _ = sleep_until_deadline(deadline) => {
                info!("⏰ Requested duration reached, stopping.");
                break;
            }
            _ = status_ticker.tick() => {
                let status = engine.status();
                if !status.recording {
                    warn!("⚠️ Recording ended on its own.");
                    break;
                }
                info!("  ⏺️ {:.0}s recorded.", status.elapsed_seconds.unwrap_or_default());
            }
        }
    }

    let report = engine
        .stop()
        .await
        .map_err(|e| anyhow!("[{}] {}", e.kind(), e))
        .context("Failed to stop recording")?;
    log_report(&report);

    let summary = serde_yaml::to_string(&report).context("Failed to serialize stop report")?;
    println!("{}", summary);

    info!("📹 Recording operation completed in {:?}.", op_start_time.elapsed());
    if report.aborted {
        return Err(anyhow!(
            "Recording aborted: {}",
            report.abort_reason.as_deref().unwrap_or("unknown reason")
        ));
    }
    Ok(())
}

async fn sleep_until_deadline(deadline: Option<tokio::time::Instant>) {
    match deadline {
        Some(at) => tokio::time::sleep_until(at).await,
        None => std::future::pending::<()>().await,
    }
}

fn log_report(report: &StopReport) {
    info!(
        "✅ Saved {} ({:.1}s, {} frames, {} bytes).",
        report.output_path.display(),
        report.duration_seconds,
        report.frame_count,
        report.file_size_bytes
    );
    if report.empty {
        warn!("⚠️ The recording contains no frames.");
    }
    match (&report.converted_path, report.conversion_attempted) {
        (Some(path), _) => info!("  -> one-minute version: {}", path.display()),
        (None, true) => error!("❌ One-minute conversion failed; the original recording is kept: {:?}", report.normalization),
        (None, false) => debug!("No conversion attempted: {:?}", report.normalization),
    }
}
