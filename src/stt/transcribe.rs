//! Parameters for a Whisper inference run.

// ---------------------------------------------------------------------------
// SamplingStrategy
// ---------------------------------------------------------------------------

/// Mirrors `whisper_rs::SamplingStrategy` but is owned and `Clone`.
///
/// Greedy single-pass decoding keeps latency low for dictation; beam search
/// trades 2-4× latency for slightly better accuracy.
#[derive(Debug, Clone, PartialEq)]
pub enum SamplingStrategy {
    Greedy {
        /// Candidate tokens evaluated per step.  1 is fastest.
        best_of: i32,
    },
    BeamSearch {
        beam_size: i32,
        /// Patience factor (≥ 1.0 = standard beam search).
        patience: f32,
    },
}

impl Default for SamplingStrategy {
    fn default() -> Self {
        Self::Greedy { best_of: 1 }
    }
}

// ---------------------------------------------------------------------------
// TranscribeParams
// ---------------------------------------------------------------------------

/// Engine-level settings, fixed when the model loads.  The language hint is
/// *not* here — it arrives with each request.
#[derive(Debug, Clone)]
pub struct TranscribeParams {
    /// Decoding strategy.
    pub strategy: SamplingStrategy,

    /// CPU threads handed to Whisper.  Defaults to [`optimal_threads()`].
    pub n_threads: i32,

    /// Suppress Whisper's progress output to stderr.
    pub suppress_progress: bool,
}

impl Default for TranscribeParams {
    fn default() -> Self {
        Self {
            strategy: SamplingStrategy::default(),
            n_threads: optimal_threads(),
            suppress_progress: true,
        }
    }
}

/// Number of CPU threads to use for inference, capped at 8 — Whisper sees
/// diminishing returns beyond that.
pub(crate) fn optimal_threads() -> i32 {
    std::thread::available_parallelism()
        .map(|n| n.get().min(8) as i32)
        .unwrap_or(4)
}
