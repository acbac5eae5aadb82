//! Cross-process transcription channel.
//!
//! A directory of overwritable files plus an unreliable signal substitutes
//! for a real IPC channel between the constrained client and the host.  The
//! protocol is idempotent, overwrite-based (no queues) and self-healing via
//! polling, because the notification primitive guarantees neither payload,
//! ordering, nor delivery.
//!
//! # Exchange
//!
//! ```text
//! client                         shared directory                      host
//! ──────                         ────────────────                      ────
//! write rec-….pcm  ──────────▶   blob pool
//! write request    ──────────▶   request.json
//! post NewAudio    ─ SIGUSR1 ─▶                                 flag raised
//!                                request.json   ◀──────────────  read
//!                                result.json    ◀──────────────  processing
//!                                                                transcribe
//!                                result.json    ◀──────────────  completed
//!                                request.json   ◀──────────────  delete
//! flag raised      ◀─ SIGUSR2 ─                                 post Done
//! read result      ◀──────────   result.json
//! clear result     ──────────▶   (slot removed)
//! ```
//!
//! The client additionally polls `result.json` on a fixed interval with a
//! hard deadline, so the exchange converges even when every signal is lost
//! or either process restarts.

pub mod notify;
pub mod records;
pub mod store;

pub use notify::{announce, post, withdraw, Notification, NotifyListener, Role};
pub use records::{ResultStatus, TranscriptionRequest, TranscriptionResult};
pub use store::{ChannelError, TranscriptionChannel, REQUEST_FILE, RESULT_FILE};
