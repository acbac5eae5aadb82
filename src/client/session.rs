//! Per-recording session bookkeeping.
//!
//! [`RecordingSession`] owns the session's voice-activity detector and
//! decides when a recording ends.  Elapsed time is derived from the sample
//! count rather than the wall clock, so the stop conditions are exact with
//! respect to the audio actually captured.

use std::time::Duration;

use crate::audio::vad::{VadConfig, VadReport, VoiceActivityDetector};
use crate::config::AudioConfig;

// ---------------------------------------------------------------------------
// StopReason
// ---------------------------------------------------------------------------

/// Why a recording session ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StopReason {
    /// Sustained silence after speech crossed the configured duration.
    SilenceTimeout,
    /// The hard maximum-duration ceiling was hit.
    MaxDuration,
    /// Explicit user stop.
    UserRequested,
}

// ---------------------------------------------------------------------------
// RecordingSession
// ---------------------------------------------------------------------------

/// State for one capture session, created fresh on every start.
pub struct RecordingSession {
    vad: VoiceActivityDetector,
    blob_name: String,
    sample_rate: u32,
    samples_seen: u64,
    min_samples: u64,
    max_samples: u64,
    last_report: Option<VadReport>,
}

impl RecordingSession {
    /// Begin a session with a fresh detector.  Constructing a new session is
    /// the "reset VAD at session start" operation — no stale energy history
    /// can leak in.
    pub fn new(vad_config: VadConfig, audio: &AudioConfig, blob_name: String) -> Self {
        let sample_rate = audio.sample_rate;
        Self {
            vad: VoiceActivityDetector::new(vad_config),
            blob_name,
            sample_rate,
            samples_seen: 0,
            min_samples: (audio.min_recording_secs * sample_rate as f32).ceil() as u64,
            max_samples: (audio.max_recording_secs * sample_rate as f32).ceil() as u64,
            last_report: None,
        }
    }

    /// Feed one drained window of samples; returns a reason when the
    /// session should end.
    ///
    /// The silence auto-stop is only consulted after the minimum
    /// elapsed-recording guard, so startup silence can never end a session
    /// instantly.
    pub fn observe(&mut self, window: &[f32]) -> Option<StopReason> {
        self.samples_seen += window.len() as u64;
        let report = self.vad.process(window);
        log::trace!(
            "session: {:?} energy={:.6} elapsed={:.2}s",
            report.state,
            report.smoothed_energy,
            self.elapsed().as_secs_f32()
        );
        self.last_report = Some(report);

        if self.samples_seen >= self.max_samples {
            return Some(StopReason::MaxDuration);
        }
        if self.samples_seen >= self.min_samples && self.vad.should_stop_recording().is_some() {
            return Some(StopReason::SilenceTimeout);
        }
        None
    }

    /// Audio captured so far, by sample count.
    pub fn elapsed(&self) -> Duration {
        if self.sample_rate == 0 {
            return Duration::ZERO;
        }
        Duration::from_secs_f64(self.samples_seen as f64 / self.sample_rate as f64)
    }

    /// Minimum sample count below which the capture counts as empty.
    pub fn min_samples(&self) -> u64 {
        self.min_samples
    }

    /// Name of the audio blob this session streams into.
    pub fn blob_name(&self) -> &str {
        &self.blob_name
    }

    /// The detector's latest per-window report, for status display.
    pub fn last_report(&self) -> Option<&VadReport> {
        self.last_report.as_ref()
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
