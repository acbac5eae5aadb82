//! Client orchestrator — drives capture, VAD auto-stop and the shared
//! channel from the constrained process.
//!
//! [`ClientOrchestrator`] owns the session state machine and responds to
//! [`ClientCommand`]s received over a `tokio::sync::mpsc` channel, with a
//! 100 ms tick driving the per-phase work:
//!
//! ```text
//! ClientCommand::StartRecording
//!   └─▶ clear ring + stale result, fresh blob name, start capture   [Recording]
//!
//! tick while Recording
//!   └─▶ drain ring → RecordingSession::observe
//!         ├─ SilenceTimeout / MaxDuration / user stop
//!         └─▶ stop capture, validate blob, submit request,
//!             post NewAudio                                         [Processing]
//!
//! tick while Processing
//!   └─▶ Done flag or 500 ms cadence → consume_result (idempotent)
//!         ├─ completed → clear slot, show text                      [Result]
//!         ├─ failed / local timeout                                 [Error]
//!         └─ pending / processing → keep waiting
//!
//! Result / Error display interval over                              [Idle]
//! ```
//!
//! Notification delivery is best-effort, so the Done flag and the poll
//! cadence funnel into the same idempotent consume; both paths may fire for
//! the same result and the second read finds the slot already cleared.

use std::sync::Arc;
use std::time::{Duration, Instant};

use thiserror::Error;
use tokio::sync::mpsc;

use crate::audio::buffer::SharedRingBuffer;
use crate::audio::capture::{CaptureBackend, CaptureError, CaptureSession};
use crate::channel::store::ChannelError;
use crate::channel::{
    self, Notification, NotifyListener, ResultStatus, TranscriptionChannel, TranscriptionRequest,
};
use crate::config::AppConfig;

use super::session::{RecordingSession, StopReason};
use super::state::{ClientPhase, SharedClientState};

/// Cadence of the orchestrator's internal tick.
const TICK: Duration = Duration::from_millis(100);

// ---------------------------------------------------------------------------
// ClientCommand / ClientError
// ---------------------------------------------------------------------------

/// Commands from the front end.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ClientCommand {
    /// Begin a recording session.  Debounced while one is in flight.
    StartRecording,
    /// End the current recording and submit it.
    StopRecording,
    /// Abort whatever is in progress and return to idle.
    Cancel,
}

/// Errors surfaced on the client's status line.
#[derive(Debug, Error)]
pub enum ClientError {
    #[error("no speech captured — recording was too short")]
    EmptyCapture,

    #[error("timed out waiting for the transcription host")]
    Timeout,

    #[error(transparent)]
    Capture(#[from] CaptureError),

    #[error(transparent)]
    Channel(#[from] ChannelError),
}

// ---------------------------------------------------------------------------
// ClientOrchestrator
// ---------------------------------------------------------------------------

/// A request waiting on the host.
struct InFlight {
    request_timestamp: u64,
    started: Instant,
    last_poll: Instant,
}

/// Drives the constrained-process pipeline.
///
/// Create with [`ClientOrchestrator::new`], then spawn
/// [`run`](Self::run) as a tokio task.
pub struct ClientOrchestrator {
    state: SharedClientState,
    ring: SharedRingBuffer,
    capture: Box<dyn CaptureBackend>,
    channel: TranscriptionChannel,
    /// Raised by the host's Done signal; checked every tick.
    done: NotifyListener,
    config: AppConfig,
    session: Option<RecordingSession>,
    in_flight: Option<InFlight>,
    /// While `Some`, a Result/Error status is on display.
    display_until: Option<Instant>,
}

impl ClientOrchestrator {
    pub fn new(
        state: SharedClientState,
        ring: SharedRingBuffer,
        capture: Box<dyn CaptureBackend>,
        channel: TranscriptionChannel,
        done: NotifyListener,
        config: AppConfig,
    ) -> Self {
        Self {
            state,
            ring,
            capture,
            channel,
            done,
            config,
            session: None,
            in_flight: None,
            display_until: None,
        }
    }

    // -----------------------------------------------------------------------
    // Main async loop
    // -----------------------------------------------------------------------

    /// Run until `commands` is closed, then tear down.
    pub async fn run(mut self, mut commands: mpsc::Receiver<ClientCommand>) {
        let mut tick = tokio::time::interval(TICK);
        tick.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);

        loop {
            tokio::select! {
                cmd = commands.recv() => match cmd {
                    Some(cmd) => self.handle_command(cmd),
                    None => break,
                },
                _ = tick.tick() => self.handle_tick(),
            }
        }

        self.teardown();
        log::info!("client: command channel closed, orchestrator shutting down");
    }

    fn handle_command(&mut self, cmd: ClientCommand) {
        match cmd {
            ClientCommand::StartRecording => self.start_recording(),
            ClientCommand::StopRecording => {
                if self.phase() == ClientPhase::Recording {
                    self.finish_recording(StopReason::UserRequested);
                } else {
                    log::debug!("client: stop ignored outside Recording");
                }
            }
            ClientCommand::Cancel => self.cancel(),
        }
    }

    fn handle_tick(&mut self) {
        match self.phase() {
            ClientPhase::Recording => self.recording_tick(),
            ClientPhase::Processing => self.processing_tick(),
            ClientPhase::Result | ClientPhase::Error => self.display_tick(),
            ClientPhase::Idle => {}
        }
    }

    // -----------------------------------------------------------------------
    // Recording
    // -----------------------------------------------------------------------

    fn start_recording(&mut self) {
        let phase = self.phase();
        if phase.is_busy() {
            // Debounced: a second mic activation mid-session is a no-op.
            log::debug!("client: start ignored while {phase:?}");
            return;
        }

        if let Err(e) = self.capture.check_permission() {
            self.fail(e.into());
            return;
        }

        self.ring.lock().unwrap().clear();
        // Drop any unconsumed result and stale Done flags from an earlier
        // (possibly cancelled) session.
        if let Err(e) = self.channel.clear_result() {
            log::warn!("client: could not clear stale result: {e}");
        }
        self.done.take();

        let blob_name = self.channel.unique_blob_name();
        let vad_config = self.config.vad.vad_config(self.config.audio.sample_rate);
        let session = RecordingSession::new(vad_config, &self.config.audio, blob_name.clone());

        if let Err(e) = self.capture.start(CaptureSession {
            ring: Arc::clone(&self.ring),
            sink_path: self.channel.blob_path(&blob_name),
            target_rate: self.config.audio.sample_rate,
        }) {
            self.fail(e.into());
            return;
        }

        self.session = Some(session);
        {
            let mut st = self.state.lock().unwrap();
            st.phase = ClientPhase::Recording;
            st.recording_secs = 0.0;
            st.error_message = None;
        }
        log::info!("client: recording started → {blob_name}");
    }

    fn recording_tick(&mut self) {
        if let Some(e) = self.capture.take_error() {
            // Mid-capture failure: abort the session, surface, never crash.
            self.capture.stop();
            if let Some(session) = self.session.take() {
                let _ = self.channel.remove_blob(session.blob_name());
            }
            self.fail(e.into());
            return;
        }

        let window = self.ring.lock().unwrap().drain();
        let Some(session) = self.session.as_mut() else {
            return;
        };

        let stop = session.observe(&window);
        let elapsed = session.elapsed().as_secs_f32();
        self.state.lock().unwrap().recording_secs = elapsed;

        if let Some(reason) = stop {
            self.finish_recording(reason);
        }
    }

    fn finish_recording(&mut self, reason: StopReason) {
        log::info!("client: recording stopped ({reason:?})");
        self.capture.stop();
        // Leave the ring empty for the next session.
        let _ = self.ring.lock().unwrap().drain();

        let Some(session) = self.session.take() else {
            return;
        };
        let blob_name = session.blob_name().to_string();

        // Validate the streamed blob before involving the host.
        let blob_samples = std::fs::metadata(self.channel.blob_path(&blob_name))
            .map(|m| m.len() / 4)
            .unwrap_or(0);
        if blob_samples < session.min_samples() {
            let _ = self.channel.remove_blob(&blob_name);
            self.fail(ClientError::EmptyCapture);
            return;
        }

        let request = TranscriptionRequest::new(
            blob_name,
            self.config.stt.language.clone(),
            self.config.audio.sample_rate,
        );
        let request_timestamp = request.timestamp;
        if let Err(e) = self.channel.submit_request(&request) {
            self.fail(e.into());
            return;
        }

        let delivered = channel::post(&self.channel, Notification::NewAudio);
        log::debug!("client: request submitted (signal delivered: {delivered})");

        self.done.take();
        self.in_flight = Some(InFlight {
            request_timestamp,
            started: Instant::now(),
            last_poll: Instant::now(),
        });
        self.state.lock().unwrap().phase = ClientPhase::Processing;
    }

    // -----------------------------------------------------------------------
    // Processing
    // -----------------------------------------------------------------------

    fn processing_tick(&mut self) {
        let Some(flight) = self.in_flight.as_ref() else {
            return;
        };
        let request_timestamp = flight.request_timestamp;
        let started = flight.started;
        let poll_due =
            flight.last_poll.elapsed() >= Duration::from_millis(self.config.channel.poll_interval_ms);

        // The Done notification and the poll cadence converge on the same
        // idempotent consume.
        if self.done.take() || poll_due {
            if let Some(flight) = self.in_flight.as_mut() {
                flight.last_poll = Instant::now();
            }
            if self.consume_result(request_timestamp) {
                return;
            }
        }

        if started.elapsed() >= Duration::from_secs_f32(self.config.channel.poll_timeout_secs) {
            // Client-local deadline; says nothing about whether the host ran.
            self.in_flight = None;
            self.fail(ClientError::Timeout);
        }
    }

    /// One idempotent read of the result slot.  Returns `true` when a
    /// terminal result was consumed.
    fn consume_result(&mut self, request_timestamp: u64) -> bool {
        let result = match self.channel.read_result() {
            Ok(Some(result)) => result,
            Ok(None) => return false,
            Err(e) => {
                log::warn!("client: result read failed: {e}");
                return false;
            }
        };

        if result.request_timestamp != request_timestamp {
            // Leftover from an earlier exchange; clear so it cannot be
            // mistaken for an answer to the current request.
            log::debug!(
                "client: clearing stale result for request {}",
                result.request_timestamp
            );
            let _ = self.channel.clear_result();
            return false;
        }

        match result.status {
            ResultStatus::Pending | ResultStatus::Processing => {
                log::debug!("client: host acknowledged request");
                false
            }
            ResultStatus::Completed => {
                let _ = self.channel.clear_result();
                self.in_flight = None;
                {
                    let mut st = self.state.lock().unwrap();
                    st.phase = ClientPhase::Result;
                    st.last_text = Some(result.text);
                }
                self.begin_display();
                log::info!("client: transcription completed");
                true
            }
            ResultStatus::Failed => {
                let _ = self.channel.clear_result();
                self.in_flight = None;
                let message = result
                    .error
                    .unwrap_or_else(|| "transcription failed".to_string());
                self.set_error(message);
                true
            }
        }
    }

    // -----------------------------------------------------------------------
    // Display / cancel / teardown
    // -----------------------------------------------------------------------

    fn display_tick(&mut self) {
        let Some(until) = self.display_until else {
            return;
        };
        if Instant::now() >= until {
            self.display_until = None;
            let mut st = self.state.lock().unwrap();
            st.phase = ClientPhase::Idle;
            st.error_message = None;
        }
    }

    fn cancel(&mut self) {
        match self.phase() {
            ClientPhase::Recording => {
                log::info!("client: recording cancelled");
                self.capture.stop();
                if let Some(session) = self.session.take() {
                    let _ = self.channel.remove_blob(session.blob_name());
                }
                self.ring.lock().unwrap().clear();
            }
            ClientPhase::Processing => {
                // Stop polling; the host may still finish, but its result is
                // simply never read (and is cleared at the next start).
                log::info!("client: processing cancelled");
                self.in_flight = None;
            }
            _ => {}
        }

        self.display_until = None;
        let mut st = self.state.lock().unwrap();
        st.phase = ClientPhase::Idle;
        st.error_message = None;
    }

    fn teardown(&mut self) {
        self.capture.stop();
        self.session = None;
        self.in_flight = None;
        self.display_until = None;
    }

    // -----------------------------------------------------------------------
    // Helpers
    // -----------------------------------------------------------------------

    fn phase(&self) -> ClientPhase {
        self.state.lock().unwrap().phase
    }

    fn begin_display(&mut self) {
        self.display_until = Some(
            Instant::now() + Duration::from_secs_f32(self.config.channel.status_display_secs),
        );
    }

    fn fail(&mut self, err: ClientError) {
        self.set_error(err.to_string());
    }

    fn set_error(&mut self, message: String) {
        log::error!("client: {message}");
        {
            let mut st = self.state.lock().unwrap();
            st.phase = ClientPhase::Error;
            st.error_message = Some(message);
        }
        self.begin_display();
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
