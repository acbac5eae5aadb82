//! Constrained-process orchestration.
//!
//! The client process captures audio, shows status, and never loads the
//! recognition engine — its memory ceiling rules that out.  Everything heavy
//! happens on the other side of the [`crate::channel`].
//!
//! # Architecture
//!
//! ```text
//! ClientCommand (mpsc)          100 ms tick
//!        │                          │
//!        ▼                          ▼
//!      ClientOrchestrator::run()  ← async tokio task
//!        │
//!        ├─ Recording:  ring → RecordingSession (VAD, guards)
//!        ├─ Processing: Done flag + poll cadence → consume result
//!        └─ Result/Error: display interval → Idle
//!
//! SharedClientState (Arc<Mutex<…>>) ←── read by the front end
//! ```

pub mod orchestrator;
pub mod session;
pub mod state;

pub use orchestrator::{ClientCommand, ClientError, ClientOrchestrator};
pub use session::{RecordingSession, StopReason};
pub use state::{new_shared_state, ClientPhase, ClientState, SharedClientState};
