//! Constrained-process binary — capture, status display, channel client.
//!
//! Line-oriented front end: Enter toggles recording, `c` cancels, `q`
//! quits.  A status thread prints phase transitions as the orchestrator
//! moves through them.

use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};

use voicebridge::audio::{shared_ring, AudioCapture};
use voicebridge::channel::{self, Notification, NotifyListener, Role, TranscriptionChannel};
use voicebridge::client::{new_shared_state, ClientCommand, ClientOrchestrator, ClientPhase};
use voicebridge::config::AppConfig;

fn main() -> Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();
    log::info!("voicebridge client starting up");

    let config = AppConfig::load().unwrap_or_else(|e| {
        log::warn!("failed to load config ({e}); using defaults");
        AppConfig::default()
    });

    let channel = TranscriptionChannel::create(config.channel.resolve_dir())
        .context("failed to open channel directory")?;
    channel::announce(&channel, Role::Client).context("failed to announce client presence")?;
    let done = NotifyListener::register(Notification::Done)
        .context("failed to register Done listener")?;

    let capture = AudioCapture::new().context("microphone unavailable")?;

    let state = new_shared_state();
    let ring = shared_ring(
        config.audio.sample_rate,
        config.audio.max_recording_secs,
        config.audio.channels,
    );

    let orchestrator = ClientOrchestrator::new(
        Arc::clone(&state),
        ring,
        Box::new(capture),
        channel.clone(),
        done,
        config,
    );

    let rt = tokio::runtime::Builder::new_multi_thread()
        .worker_threads(2)
        .enable_all()
        .build()
        .context("failed to create tokio runtime")?;

    let (command_tx, command_rx) = tokio::sync::mpsc::channel::<ClientCommand>(16);
    rt.spawn(orchestrator.run(command_rx));

    // Status thread: print every phase transition.
    {
        let state = Arc::clone(&state);
        std::thread::Builder::new()
            .name("status".into())
            .spawn(move || {
                let mut last = ClientPhase::Idle;
                loop {
                    std::thread::sleep(Duration::from_millis(200));
                    let st = state.lock().unwrap();
                    if st.phase != last {
                        match st.phase {
                            ClientPhase::Result => {
                                println!("[{}] {}", st.phase.label(), st.last_text.as_deref().unwrap_or(""));
                            }
                            ClientPhase::Error => {
                                println!("[{}] {}", st.phase.label(), st.error_message.as_deref().unwrap_or(""));
                            }
                            phase => println!("[{}]", phase.label()),
                        }
                        last = st.phase;
                    }
                }
            })
            .context("failed to spawn status thread")?;
    }

    println!("voicebridge — Enter: start/stop, c: cancel, q: quit");
    let stdin = std::io::stdin();
    loop {
        let mut line = String::new();
        if stdin.read_line(&mut line).unwrap_or(0) == 0 {
            break; // EOF
        }
        let command = match line.trim() {
            "q" => break,
            "c" => ClientCommand::Cancel,
            // Toggle on the *observed* phase — the orchestrator may have
            // auto-stopped on silence since the last keypress.
            _ => {
                if state.lock().unwrap().phase == ClientPhase::Recording {
                    ClientCommand::StopRecording
                } else {
                    ClientCommand::StartRecording
                }
            }
        };
        if command_tx.blocking_send(command).is_err() {
            break;
        }
    }

    drop(command_tx); // closes the channel; the orchestrator tears down
    channel::withdraw(&channel, Role::Client);
    log::info!("voicebridge client shut down");
    Ok(())
}
