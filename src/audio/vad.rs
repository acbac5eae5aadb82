//! Energy-based voice-activity detection.
//!
//! [`VoiceActivityDetector`] classifies polled sample windows as speech or
//! silence and tells the recording session when the speaker has stopped
//! talking.  Energy is the mean squared amplitude of a window; the last
//! [`ENERGY_HISTORY_LEN`] window energies are averaged before thresholding so
//! a single transient spike cannot flip the state.
//!
//! Two thresholds give the state machine hysteresis:
//!
//! * Silence → Speech requires the smoothed energy to *exceed*
//!   `speech_threshold` (the higher bar, suppressing noise-floor false
//!   positives).
//! * Speech → Silence requires it to *fall below* `silence_threshold` (the
//!   lower bar, avoiding flapping at the boundary).
//!
//! Energy between the two thresholds keeps whatever state the last
//! transition established.

use std::collections::VecDeque;
use std::time::{Duration, Instant};

use serde::{Deserialize, Serialize};

/// Number of window energies averaged before thresholding.
pub const ENERGY_HISTORY_LEN: usize = 10;

// ---------------------------------------------------------------------------
// VadState
// ---------------------------------------------------------------------------

/// Detector state.
///
/// `Transitioning` is reserved for a future hysteresis band between the two
/// thresholds; the current transition logic jumps directly between `Silence`
/// and `Speech` and never enters it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum VadState {
    Silence,
    Speech,
    Transitioning,
}

// ---------------------------------------------------------------------------
// VadPreset / VadConfig
// ---------------------------------------------------------------------------

/// Named threshold presets.  Presets vary only the [`VadConfig`] values.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum VadPreset {
    /// Trips on quiet speech; stops sooner.  For quiet rooms and soft talkers.
    Sensitive,
    /// Balanced thresholds for a typical environment.
    Default,
    /// Needs louder speech and a longer pause.  For noisy environments.
    Conservative,
}

impl VadPreset {
    /// Resolve the preset into concrete detector parameters.
    pub fn config(self, sample_rate: u32) -> VadConfig {
        match self {
            VadPreset::Sensitive => VadConfig {
                silence_threshold: 1.5e-4,
                speech_threshold: 5.0e-4,
                silence_duration: Duration::from_millis(1_500),
                speech_duration: Duration::from_millis(200),
                sample_rate,
            },
            VadPreset::Default => VadConfig {
                silence_threshold: 3.0e-4,
                speech_threshold: 1.0e-3,
                silence_duration: Duration::from_millis(2_000),
                speech_duration: Duration::from_millis(300),
                sample_rate,
            },
            VadPreset::Conservative => VadConfig {
                silence_threshold: 6.0e-4,
                speech_threshold: 2.0e-3,
                silence_duration: Duration::from_millis(2_500),
                speech_duration: Duration::from_millis(500),
                sample_rate,
            },
        }
    }
}

/// Detector parameters, immutable for the lifetime of a session.
///
/// Swap in a different config (or preset) between sessions by constructing a
/// fresh [`VoiceActivityDetector`].
#[derive(Debug, Clone)]
pub struct VadConfig {
    /// Smoothed energy below this level counts as silence (mean-square
    /// amplitude, not RMS).
    pub silence_threshold: f32,
    /// Smoothed energy above this level counts as speech.  Must be ≥
    /// `silence_threshold` for the hysteresis to make sense.
    pub speech_threshold: f32,
    /// How long silence must persist after speech before
    /// [`VoiceActivityDetector::should_stop_recording`] fires.
    pub silence_duration: Duration,
    /// Minimum cumulative speech time before silence can trigger auto-stop.
    /// A session that never contained speech is left to the max-duration
    /// timer instead.
    pub speech_duration: Duration,
    /// Sample rate of the windows handed to `process`, in Hz.
    pub sample_rate: u32,
}

impl Default for VadConfig {
    fn default() -> Self {
        VadPreset::Default.config(16_000)
    }
}

// ---------------------------------------------------------------------------
// VadReport
// ---------------------------------------------------------------------------

/// Per-window output of [`VoiceActivityDetector::process`].
#[derive(Debug, Clone)]
pub struct VadReport {
    /// `true` while the detector is in the `Speech` state.
    pub is_voice: bool,
    /// Mean of the last [`ENERGY_HISTORY_LEN`] window energies.
    pub smoothed_energy: f32,
    /// State after processing this window.
    pub state: VadState,
    /// Elapsed time since speech last gave way to silence.  Zero while
    /// speaking or before any speech has been heard.
    pub silence_duration: Duration,
}

// ---------------------------------------------------------------------------
// VoiceActivityDetector
// ---------------------------------------------------------------------------

type EdgeCallback = Box<dyn FnMut(VadState, VadState) + Send>;

/// Energy-threshold state machine over polled sample windows.
pub struct VoiceActivityDetector {
    config: VadConfig,
    state: VadState,
    history: VecDeque<f32>,
    /// Set when the detector entered `Silence` after having heard speech.
    silence_since: Option<Instant>,
    /// Set while the detector is in `Speech`.
    speech_since: Option<Instant>,
    /// Total time spent in `Speech` this session.
    speech_accum: Duration,
    on_edge: Option<EdgeCallback>,
}

impl VoiceActivityDetector {
    pub fn new(config: VadConfig) -> Self {
        Self {
            config,
            state: VadState::Silence,
            history: VecDeque::with_capacity(ENERGY_HISTORY_LEN),
            silence_since: None,
            speech_since: None,
            speech_accum: Duration::ZERO,
            on_edge: None,
        }
    }

    /// Register a callback invoked exactly once per state transition
    /// (old state, new state) — not once per window.
    pub fn set_edge_callback(&mut self, cb: impl FnMut(VadState, VadState) + Send + 'static) {
        self.on_edge = Some(Box::new(cb));
    }

    /// Current detector state.
    pub fn state(&self) -> VadState {
        self.state
    }

    /// Parameters this detector was constructed with.
    pub fn config(&self) -> &VadConfig {
        &self.config
    }

    /// Total time spent in `Speech` since the last [`reset`](Self::reset).
    pub fn total_speech(&self) -> Duration {
        match self.speech_since {
            Some(since) => self.speech_accum + since.elapsed(),
            None => self.speech_accum,
        }
    }

    /// Classify one window of samples and update the state machine.
    ///
    /// An empty window leaves the detector untouched and reports the current
    /// state.
    pub fn process(&mut self, window: &[f32]) -> VadReport {
        if window.is_empty() {
            return self.report();
        }

        let energy = window.iter().map(|s| s * s).sum::<f32>() / window.len() as f32;
        if self.history.len() == ENERGY_HISTORY_LEN {
            self.history.pop_front();
        }
        self.history.push_back(energy);

        let smoothed = self.smoothed_energy();

        match self.state {
            VadState::Silence if smoothed > self.config.speech_threshold => {
                self.transition(VadState::Speech);
            }
            VadState::Speech if smoothed < self.config.silence_threshold => {
                self.transition(VadState::Silence);
            }
            _ => {}
        }

        self.report()
    }

    /// Once sustained silence has followed real speech, returns how long the
    /// silence has lasted; the caller finalizes the recording.
    pub fn should_stop_recording(&self) -> Option<Duration> {
        if self.state != VadState::Silence {
            return None;
        }
        if self.speech_accum < self.config.speech_duration {
            return None;
        }
        let elapsed = self.silence_since?.elapsed();
        (elapsed >= self.config.silence_duration).then_some(elapsed)
    }

    /// Clear state, energy history and timers.
    ///
    /// Must run at the start of every session — stale history otherwise
    /// biases the first seconds of a new recording.  A registered edge
    /// callback survives the reset.
    pub fn reset(&mut self) {
        self.state = VadState::Silence;
        self.history.clear();
        self.silence_since = None;
        self.speech_since = None;
        self.speech_accum = Duration::ZERO;
    }

    fn smoothed_energy(&self) -> f32 {
        if self.history.is_empty() {
            return 0.0;
        }
        self.history.iter().sum::<f32>() / self.history.len() as f32
    }

    fn transition(&mut self, next: VadState) {
        let prev = self.state;
        match next {
            VadState::Speech => {
                self.silence_since = None;
                self.speech_since = Some(Instant::now());
            }
            VadState::Silence => {
                if let Some(since) = self.speech_since.take() {
                    self.speech_accum += since.elapsed();
                }
                self.silence_since = Some(Instant::now());
            }
            VadState::Transitioning => {}
        }
        self.state = next;
        if let Some(cb) = self.on_edge.as_mut() {
            cb(prev, next);
        }
    }

    fn report(&self) -> VadReport {
        VadReport {
            is_voice: self.state == VadState::Speech,
            smoothed_energy: self.smoothed_energy(),
            state: self.state,
            silence_duration: self
                .silence_since
                .map(|s| s.elapsed())
                .unwrap_or(Duration::ZERO),
        }
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
