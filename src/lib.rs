//! voicebridge — a local voice-transcription pipeline split across two
//! cooperating processes.
//!
//! A severely memory-constrained **client** captures microphone audio,
//! detects speech/silence to auto-stop, and displays status.  A
//! full-capability **host** owns the heavy Whisper engine.  The two
//! coordinate through a shared filesystem directory and a payload-less,
//! best-effort Unix signal — there is no socket between them.
//!
//! # Subsystems
//!
//! * [`audio`] — lock-protected ring buffer, energy-based VAD, cpal capture
//!   with format conversion and a streaming file sink.
//! * [`channel`] — the cross-process request/result protocol: overwritable
//!   single slots, an audio blob pool, atomic whole-file replacement, and
//!   the notify+poll reconciliation.
//! * [`client`] — the constrained-process state machine
//!   (Idle → Recording → Processing → Result/Error).
//! * [`host`] — the singleton service that lazily loads the engine and
//!   never leaves a request stranded.
//! * [`stt`] — the recognition-engine boundary (`whisper-rs` behind an
//!   object-safe trait).
//! * [`config`] — TOML settings and platform paths shared by both binaries.

pub mod audio;
pub mod channel;
pub mod client;
pub mod config;
pub mod host;
pub mod stt;
