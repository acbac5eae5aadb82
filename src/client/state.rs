//! Client-side state machine and shared status.
//!
//! [`ClientPhase`] drives the orchestrator's state machine; the front end
//! reads it through [`SharedClientState`] to render the current status line.

use std::sync::{Arc, Mutex};

// ---------------------------------------------------------------------------
// ClientPhase
// ---------------------------------------------------------------------------

/// States of the constrained-process pipeline.
///
/// ```text
/// Idle ──start──▶ Recording ──silence / max length / stop──▶ Processing
///                  Processing ──completed──▶ Result ──display over──▶ Idle
///                  Processing ──failed / timeout──▶ Error ──display over──▶ Idle
/// any state ──cancel──▶ Idle
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ClientPhase {
    /// Waiting for the user to start a recording.
    Idle,

    /// Microphone is live; audio flows into the ring buffer and sink file.
    Recording,

    /// The request has been handed to the shared channel; the poll/observe
    /// loop is waiting for the host.
    Processing,

    /// A completed transcript is on display.
    Result,

    /// A terminal error is on display; reverts to `Idle` automatically.
    Error,
}

impl ClientPhase {
    /// `true` while a session is in flight — a second start is debounced.
    pub fn is_busy(self) -> bool {
        matches!(self, ClientPhase::Recording | ClientPhase::Processing)
    }

    /// Short status-line label.
    pub fn label(self) -> &'static str {
        match self {
            ClientPhase::Idle => "Idle",
            ClientPhase::Recording => "Recording",
            ClientPhase::Processing => "Processing",
            ClientPhase::Result => "Done",
            ClientPhase::Error => "Error",
        }
    }
}

impl Default for ClientPhase {
    fn default() -> Self {
        ClientPhase::Idle
    }
}

// ---------------------------------------------------------------------------
// ClientState / SharedClientState
// ---------------------------------------------------------------------------

/// Everything the front end needs: current phase, last transcript, error
/// text, and the live recording length.
#[derive(Debug, Default)]
pub struct ClientState {
    pub phase: ClientPhase,

    /// Most recent completed transcript.  `None` until one completes.
    pub last_text: Option<String>,

    /// Message to display while `phase == Error`.
    pub error_message: Option<String>,

    /// Length of the in-progress recording in seconds; live-updated.
    pub recording_secs: f32,
}

/// Thread-safe handle to [`ClientState`].
///
/// Cheap to clone.  Lock briefly; never across an `.await`.
pub type SharedClientState = Arc<Mutex<ClientState>>;

/// Construct a fresh [`SharedClientState`] in the `Idle` phase.
pub fn new_shared_state() -> SharedClientState {
    Arc::new(Mutex::new(ClientState::default()))
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn busy_phases() {
        assert!(!ClientPhase::Idle.is_busy());
        assert!(ClientPhase::Recording.is_busy());
        assert!(ClientPhase::Processing.is_busy());
        assert!(!ClientPhase::Result.is_busy());
        assert!(!ClientPhase::Error.is_busy());
    }

    #[test]
    fn labels() {
        assert_eq!(ClientPhase::Idle.label(), "Idle");
        assert_eq!(ClientPhase::Recording.label(), "Recording");
        assert_eq!(ClientPhase::Processing.label(), "Processing");
        assert_eq!(ClientPhase::Result.label(), "Done");
        assert_eq!(ClientPhase::Error.label(), "Error");
    }

    #[test]
    fn default_state_is_idle() {
        let state = ClientState::default();
        assert_eq!(state.phase, ClientPhase::Idle);
        assert!(state.last_text.is_none());
        assert!(state.error_message.is_none());
    }

    #[test]
    fn shared_state_is_send_sync() {
        fn assert_send_sync<T: Send + Sync>() {}
        assert_send_sync::<SharedClientState>();
    }

    #[test]
    fn shared_state_clone_sees_mutation() {
        let state = new_shared_state();
        let state2 = Arc::clone(&state);
        state.lock().unwrap().phase = ClientPhase::Recording;
        assert_eq!(state2.lock().unwrap().phase, ClientPhase::Recording);
    }
}
