//! Cross-platform application paths using the `dirs` crate.
//!
//! Layout:
//!
//! Config dir (settings):
//!   Windows: %APPDATA%\voicebridge\
//!   macOS:   ~/Library/Application Support/voicebridge/
//!   Linux:   ~/.config/voicebridge/
//!
//! Data dir (models):
//!   Windows: %LOCALAPPDATA%\voicebridge\
//!   macOS:   ~/Library/Application Support/voicebridge/
//!   Linux:   ~/.local/share/voicebridge/
//!
//! Channel dir (shared request/result exchange) lives under the runtime dir
//! when the platform has one (XDG_RUNTIME_DIR) so both processes of the same
//! user resolve the same directory, with the data dir as fallback.

use std::path::PathBuf;

/// Holds all resolved application directory/file paths.
#[derive(Debug, Clone)]
pub struct AppPaths {
    /// Directory for `settings.toml`.
    pub config_dir: PathBuf,
    /// Full path to `settings.toml`.
    pub settings_file: PathBuf,
    /// Directory for GGML model files.
    pub models_dir: PathBuf,
    /// Shared channel directory both processes exchange records through.
    pub channel_dir: PathBuf,
}

impl AppPaths {
    const APP_NAME: &'static str = "voicebridge";

    /// Resolve all paths, falling back to the current directory when the
    /// platform cannot provide a standard one.
    pub fn new() -> Self {
        let config_dir = dirs::config_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join(Self::APP_NAME);

        let data_dir = dirs::data_local_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join(Self::APP_NAME);

        let channel_dir = dirs::runtime_dir()
            .unwrap_or_else(|| data_dir.clone())
            .join(Self::APP_NAME)
            .join("channel");

        Self {
            settings_file: config_dir.join("settings.toml"),
            models_dir: data_dir.join("models"),
            config_dir,
            channel_dir,
        }
    }
}

impl Default for AppPaths {
    fn default() -> Self {
        Self::new()
    }
}
