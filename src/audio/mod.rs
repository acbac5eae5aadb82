//! Audio path — capture → format conversion → ring buffer → VAD.
//!
//! # Pipeline
//!
//! ```text
//! Microphone → cpal callback → chunk (mpsc) → capture worker
//!            → stereo_to_mono → resample ┬→ SharedRingBuffer → VAD polling
//!                                        └→ sink file (audio blob hand-off)
//! ```
//!
//! The ring buffer is the only structure shared between threads inside one
//! process; everything else flows through channels.

pub mod buffer;
pub mod capture;
pub mod resample;
pub mod vad;

pub use buffer::{shared_ring, RingBuffer, SharedRingBuffer};
pub use capture::{AudioCapture, CaptureBackend, CaptureError, CaptureSession};
pub use resample::{resample, stereo_to_mono};
pub use vad::{VadConfig, VadPreset, VadReport, VadState, VoiceActivityDetector};

// test-only re-export so orchestrator tests can script the capture seam
#[cfg(test)]
pub use capture::MockCapture;
