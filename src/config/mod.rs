//! Configuration for both voicebridge processes.
//!
//! Provides `AppConfig` (top-level settings with per-subsystem sections),
//! `AppPaths` for cross-platform directories, and TOML persistence via
//! `AppConfig::load` / `AppConfig::save`.

pub mod paths;
pub mod settings;

pub use paths::AppPaths;
pub use settings::{AppConfig, AudioConfig, ChannelConfig, SttConfig, VadSettings};
