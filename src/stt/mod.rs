//! Speech-to-text collaborator boundary.
//!
//! The host orchestrator owns an `Arc<dyn SttEngine>`: mono `f32` PCM plus a
//! language hint in, plain transcript text out.  Model loading is slow
//! (seconds), so the host loads lazily on the first request and reuses the
//! handle.

pub mod engine;
pub mod transcribe;

pub use engine::{SttEngine, SttError, WhisperEngine, MAX_AUDIO_SAMPLES, MIN_AUDIO_SAMPLES};
pub use transcribe::{SamplingStrategy, TranscribeParams};

// test-only re-export so host tests can import the double directly
#[cfg(test)]
pub use engine::MockSttEngine;
