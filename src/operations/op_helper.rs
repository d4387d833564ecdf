use crate::camera::test_pattern::TestPatternProvider;
use crate::config_loader::MasterConfig;
use crate::core::capture_source::CameraProvider;
use crate::core::engine::RecordingEngine;
use crate::core::normalizer::DurationNormalizer;
use crate::core::settings::SettingsUpdate;
use crate::core::video_writer::WriterFactory;
use crate::media::ffmpeg_transcoder::FfmpegTranscoder;
use anyhow::{Context, Result};
use clap::ArgMatches;
use log::{debug, info};
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Instant;

/// Builds the normalizer from the application settings.
pub fn build_normalizer(master_config: &MasterConfig) -> DurationNormalizer {
    let app = &master_config.app_settings;
    DurationNormalizer::new(
        Arc::new(FfmpegTranscoder::new(&app.ffmpeg_path)),
        app.transcode_timeout(),
    )
}

/// Wires a recording engine for the configured camera, or for the synthetic
/// test pattern when `use_test_pattern` is set.
pub fn build_engine(master_config: &MasterConfig, use_test_pattern: bool) -> Result<RecordingEngine> {
    let start_time = Instant::now();
    let app = &master_config.app_settings;

    let camera = camera_provider(master_config, use_test_pattern);
    let writers = writer_factory(master_config);

    let engine = RecordingEngine::builder(camera, writers, build_normalizer(master_config))
        .settings(app.recording_settings())
        .timestamp_format(app.filename_timestamp_format.clone())
        .build()
        .context("Failed to initialize the recording engine")?;
    debug!("✅ RecordingEngine initialized in {:?}.", start_time.elapsed());
    Ok(engine)
}

#[cfg(feature = "opencv")]
fn camera_provider(master_config: &MasterConfig, use_test_pattern: bool) -> Arc<dyn CameraProvider> {
    if use_test_pattern {
        info!("🧪 Using synthetic test pattern instead of a camera.");
        return Arc::new(TestPatternProvider);
    }
    let index = master_config.app_settings.camera_index;
    info!("📷 Using capture device #{}.", index);
    Arc::new(crate::camera::opencv_camera::OpenCvCameraProvider::new(index))
}

#[cfg(not(feature = "opencv"))]
fn camera_provider(_master_config: &MasterConfig, use_test_pattern: bool) -> Arc<dyn CameraProvider> {
    if !use_test_pattern {
        log::warn!("⚠️ Built without the `opencv` feature; recording the synthetic test pattern.");
    } else {
        info!("🧪 Using synthetic test pattern instead of a camera.");
    }
    Arc::new(TestPatternProvider)
}

#[cfg(feature = "opencv")]
fn writer_factory(master_config: &MasterConfig) -> Arc<dyn WriterFactory> {
    let app = &master_config.app_settings;
    Arc::new(crate::media::opencv_writer::OpenCvWriterFactory::new(
        app.video_container.clone(),
        app.video_codec.clone(),
    ))
}

#[cfg(not(feature = "opencv"))]
fn writer_factory(master_config: &MasterConfig) -> Arc<dyn WriterFactory> {
    let app = &master_config.app_settings;
    Arc::new(crate::media::ffmpeg_writer::FfmpegWriterFactory::new(&app.ffmpeg_path, app.video_container.clone()))
}

/// Collects the recording overrides given on the command line.
pub fn settings_update_from_args(args: &ArgMatches) -> SettingsUpdate {
    let update = SettingsUpdate {
        fps: args.get_one::<u32>("fps").copied(),
        width: args.get_one::<u32>("width").copied(),
        height: args.get_one::<u32>("height").copied(),
        output_directory: args.get_one::<String>("output").map(PathBuf::from),
        convert_to_one_minute: if args.get_flag("no-normalize") { Some(false) } else { None },
    };
    debug!("Settings overrides from CLI: {:?}", update);
    update
}
