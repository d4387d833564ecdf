use lockin::common::logging_setup;
use lockin::{cli, config_loader, operations};
use log::{info, error, debug};
use anyhow::{Context, Result, bail};
use std::time::Instant;

#[tokio::main]
async fn main() -> Result<()> {
    let main_start_time = Instant::now();
    let matches = cli::build_cli().get_matches();

    let explicit_config = matches.get_one::<String>("config");
    let config_path = explicit_config
        .map(|s| s.as_str())
        .unwrap_or(config_loader::DEFAULT_CONFIG_PATH);

    let config_load_start_time = Instant::now();
    let master_config = match config_loader::load_or_default(config_path, explicit_config.is_some()) {
        Ok(cfg) => {
            logging_setup::initialize_logging(Some(&cfg), &matches);
            debug!("Configuration ready in {:?}", config_load_start_time.elapsed());
            cfg
        }
        Err(e) => {
            logging_setup::initialize_logging(None, &matches);
            error!("❌ Failed to load configuration from '{}': {:#}. Exiting.", config_path, e);
            return Err(e.context(format!("Failed to load configuration from '{}'", config_path)));
        }
    };

    info!("🚀 lockin starting (output: {}).", master_config.app_settings.output_directory);

    let Some((operation_name, sub_matches)) = matches.subcommand() else {
        info!("🤔 No subcommand provided. Try `lockin record --duration 90`.");
        return Ok(());
    };
    debug!("🎬 Dispatching to subcommand: {}", operation_name);
    let op_start_time = Instant::now();

    let op_result: Result<()> = match operation_name {
        "record" => operations::video_record_op::handle_record_video_cli(&master_config, sub_matches)
            .await
            .context("Recording failed"),
        "normalize" => operations::normalize_op::handle_normalize_cli(&master_config, sub_matches)
            .await
            .context("Normalization failed"),
        other => bail!("Subcommand '{}' not implemented.", other),
    };

    if let Err(e) = op_result {
        error!("❌ Operation '{}' failed after {:?}: {:#}", operation_name, op_start_time.elapsed(), e);
        return Err(e);
    }
    info!("✅ Operation '{}' completed successfully in {:?}.", operation_name, op_start_time.elapsed());
    info!("🏁 lockin finished in {:?}.", main_start_time.elapsed());
    Ok(())
}
