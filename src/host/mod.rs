//! Full-capability process orchestration.
//!
//! The host owns the Whisper engine, observes NewAudio notifications (with a
//! reconciliation poll as backstop), and answers through the result slot.

pub mod service;

pub use service::{EngineLoader, HostService};
