use serde::Deserialize;
use std::fs;
use std::path::Path;
use crate::app_config::ApplicationConfig;
use anyhow::{Result, Context, bail};
use log::{debug, info};
use std::time::Instant;

pub const DEFAULT_CONFIG_PATH: &str = "config/lockin.yaml";

#[derive(Debug, Deserialize, Clone, Default)]
pub struct MasterConfig {
    #[serde(rename = "application", default)]
    pub app_settings: ApplicationConfig,
}

pub fn load_config(path: &str) -> Result<MasterConfig> {
    debug!("📄 Attempting to load config from: {}", path);
    let start_time = Instant::now();

    let config_str = fs::read_to_string(path)
        .with_context(|| format!("Failed to read configuration file '{}'. 📖", path))?;
    debug!("Read config file in {:?}", start_time.elapsed());

    let config = parse_config(&config_str)
        .with_context(|| format!("Invalid configuration in '{}'", path))?;

    info!("✅ Successfully loaded and validated configuration from '{}' in {:?}", path, start_time.elapsed());
    Ok(config)
}

/// Loads `path` if it exists. A missing default config is not an error;
/// a missing file the user named explicitly is.
pub fn load_or_default(path: &str, explicitly_requested: bool) -> Result<MasterConfig> {
    if !explicitly_requested && !Path::new(path).exists() {
        debug!("No config at '{}', using built-in defaults.", path);
        let config = MasterConfig::default();
        validate_master_config(&config)?;
        return Ok(config);
    }
    load_config(path)
}

pub fn parse_config(config_str: &str) -> Result<MasterConfig> {
    let config: MasterConfig = serde_yaml::from_str(config_str)
        .context("Failed to parse YAML configuration. 💔")?;
    validate_master_config(&config).context("Master configuration validation failed 👎")?;
    Ok(config)
}

fn validate_master_config(config: &MasterConfig) -> Result<()> {
    debug!("🕵️ Validating master configuration...");
    let app = &config.app_settings;
    if app.output_directory.is_empty() {
        bail!("❌ Application output_directory cannot be empty.");
    }
    let output_path = Path::new(&app.output_directory);
    if output_path.exists() && !output_path.is_dir() {
        bail!("❌ Output directory '{}' exists but is not a directory.", app.output_directory);
    }
    if app.video_container.is_empty() {
        bail!("❌ Application video_container cannot be empty.");
    }
    if app.filename_timestamp_format.is_empty() {
        bail!("❌ Application filename_timestamp_format cannot be empty.");
    }
    if app.ffmpeg_path.is_empty() {
        bail!("❌ Application ffmpeg_path cannot be empty.");
    }
    if app.transcode_timeout_secs == 0 {
        bail!("❌ Application transcode_timeout_secs must be positive.");
    }
    app.recording_settings()
        .validate()
        .map_err(|e| anyhow::anyhow!("❌ {}", e))?;
    debug!("👍 Master configuration validated.");
    Ok(())
}
