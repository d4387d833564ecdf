//! Camera recorder that captures at a fixed frame rate and can re-time each
//! session to exactly one minute of playback.

pub mod app_config;
pub mod camera;
pub mod cli;
pub mod common;
pub mod config_loader;
pub mod core;
pub mod errors;
pub mod media;
pub mod operations;

pub use crate::core::engine::RecordingEngine;
pub use crate::core::settings::{RecordingSettings, SettingsUpdate};
pub use crate::errors::EngineError;
