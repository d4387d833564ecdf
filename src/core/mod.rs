pub mod capture_source;
pub mod clock;
pub mod engine;
pub mod normalizer;
pub mod producer;
pub mod registry;
pub mod session;
pub mod settings;
pub mod video_writer;
