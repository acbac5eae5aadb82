//! Full-capability process binary — engine owner and request processor.
//!
//! Runs until killed.  The Whisper model is loaded lazily on the first
//! request so startup stays instant.

use std::sync::Arc;

use anyhow::{Context, Result};

use voicebridge::channel::{self, Notification, NotifyListener, Role, TranscriptionChannel};
use voicebridge::config::{AppConfig, AppPaths};
use voicebridge::host::HostService;
use voicebridge::stt::{SttEngine, TranscribeParams, WhisperEngine};

fn main() -> Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();
    log::info!("voicebridge host starting up");

    let config = AppConfig::load().unwrap_or_else(|e| {
        log::warn!("failed to load config ({e}); using defaults");
        AppConfig::default()
    });

    let channel = TranscriptionChannel::create(config.channel.resolve_dir())
        .context("failed to open channel directory")?;
    channel::announce(&channel, Role::Host).context("failed to announce host presence")?;
    let new_audio = NotifyListener::register(Notification::NewAudio)
        .context("failed to register NewAudio listener")?;

    let model_path = AppPaths::new()
        .models_dir
        .join(format!("{}.bin", config.stt.model));
    log::info!("host: model file {}", model_path.display());

    let loader = Box::new(move || {
        WhisperEngine::load(&model_path, TranscribeParams::default())
            .map(|engine| Arc::new(engine) as Arc<dyn SttEngine>)
    });

    HostService::new(channel, new_audio, loader).run();
    unreachable!("host service loop never returns");
}
