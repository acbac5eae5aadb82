//! Application settings structs, defaults and TOML persistence.
//!
//! All structs implement `Serialize`, `Deserialize`, `Default` and `Clone`
//! so they can be round-tripped through TOML files and shared across
//! threads.  Both binaries read the same `settings.toml`.

use std::path::PathBuf;
use std::time::Duration;

use anyhow::Result;
use serde::{Deserialize, Serialize};

use crate::audio::vad::{VadConfig, VadPreset};

use super::AppPaths;

// ---------------------------------------------------------------------------
// AudioConfig
// ---------------------------------------------------------------------------

/// Capture-side audio settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AudioConfig {
    /// Rate the pipeline (and the Whisper engine) consumes, in Hz.
    pub sample_rate: u32,
    /// Channel count after conversion; the pipeline is mono.
    pub channels: u16,
    /// Recordings shorter than this are rejected as empty captures, and the
    /// silence auto-stop is not consulted before this much has elapsed.
    pub min_recording_secs: f32,
    /// Hard ceiling; the recording stops automatically at this length.
    pub max_recording_secs: f32,
}

impl Default for AudioConfig {
    fn default() -> Self {
        Self {
            sample_rate: 16_000,
            channels: 1,
            min_recording_secs: 0.5,
            max_recording_secs: 60.0,
        }
    }
}

// ---------------------------------------------------------------------------
// VadSettings
// ---------------------------------------------------------------------------

/// Voice-activity-detection settings.
///
/// A preset picks all thresholds; `silence_duration_secs` optionally
/// overrides how long a pause ends the recording.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VadSettings {
    pub preset: VadPreset,
    /// Override for the preset's silence duration, in seconds.
    pub silence_duration_secs: Option<f32>,
}

impl Default for VadSettings {
    fn default() -> Self {
        Self {
            preset: VadPreset::Default,
            silence_duration_secs: None,
        }
    }
}

impl VadSettings {
    /// Resolve into concrete detector parameters.
    pub fn vad_config(&self, sample_rate: u32) -> VadConfig {
        let mut config = self.preset.config(sample_rate);
        if let Some(secs) = self.silence_duration_secs {
            config.silence_duration = Duration::from_secs_f32(secs.max(0.0));
        }
        config
    }
}

// ---------------------------------------------------------------------------
// ChannelConfig
// ---------------------------------------------------------------------------

/// Cross-process channel settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChannelConfig {
    /// Channel directory override; `None` resolves via [`AppPaths`].
    pub dir: Option<PathBuf>,
    /// Result-slot polling cadence while a request is in flight.
    pub poll_interval_ms: u64,
    /// Ceiling on the poll loop; past it the client synthesizes a local
    /// timeout error regardless of whether the host ever ran.
    pub poll_timeout_secs: f32,
    /// How long a terminal result or error stays on screen before the
    /// client reverts to idle.
    pub status_display_secs: f32,
}

impl Default for ChannelConfig {
    fn default() -> Self {
        Self {
            dir: None,
            poll_interval_ms: 500,
            poll_timeout_secs: 30.0,
            status_display_secs: 3.0,
        }
    }
}

impl ChannelConfig {
    /// The channel directory both processes agree on.
    pub fn resolve_dir(&self) -> PathBuf {
        self.dir
            .clone()
            .unwrap_or_else(|| AppPaths::new().channel_dir)
    }
}

// ---------------------------------------------------------------------------
// SttConfig
// ---------------------------------------------------------------------------

/// Settings for the Whisper engine on the host side.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SttConfig {
    /// GGML model file stem under the models directory (e.g. `"ggml-base"`).
    pub model: String,
    /// ISO-639-1 code sent with each request, or `"auto"` for Whisper's
    /// built-in language detection.
    pub language: String,
}

impl Default for SttConfig {
    fn default() -> Self {
        Self {
            model: "ggml-base".into(),
            language: "auto".into(),
        }
    }
}

// ---------------------------------------------------------------------------
// AppConfig  (top-level)
// ---------------------------------------------------------------------------

/// Top-level configuration, serialised as `settings.toml`.
///
/// # Persistence
///
/// ```rust,no_run
/// use voicebridge::config::AppConfig;
///
/// // Load (returns Default when the file is missing)
/// let config = AppConfig::load().unwrap();
/// // config.save().unwrap();
/// ```
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AppConfig {
    /// Audio capture settings.
    pub audio: AudioConfig,
    /// Voice-activity detection settings.
    pub vad: VadSettings,
    /// Cross-process channel settings.
    pub channel: ChannelConfig,
    /// Whisper engine settings.
    pub stt: SttConfig,
}

impl AppConfig {
    /// Load configuration from the platform `settings.toml`.
    ///
    /// Returns `Ok(AppConfig::default())` when the file does not exist yet,
    /// so callers never special-case a first run.
    pub fn load() -> Result<Self> {
        Self::load_from(&AppPaths::new().settings_file)
    }

    /// Load from an explicit path (useful for tests).
    pub fn load_from(path: &std::path::Path) -> Result<Self> {
        if !path.exists() {
            return Ok(Self::default());
        }
        let content = std::fs::read_to_string(path)?;
        let config: Self = toml::from_str(&content)?;
        Ok(config)
    }

    /// Save to the platform `settings.toml`, creating parent directories.
    pub fn save(&self) -> Result<()> {
        self.save_to(&AppPaths::new().settings_file)
    }

    /// Save to an explicit path (useful for tests).
    pub fn save_to(&self, path: &std::path::Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let content = toml::to_string_pretty(self)?;
        std::fs::write(path, content)?;
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
