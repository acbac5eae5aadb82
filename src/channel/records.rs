//! Wire records exchanged through the shared directory.
//!
//! Field names are serialized in camelCase so the on-disk JSON matches the
//! channel's record format (`audioFileName`, `requestTimestamp`, …).
//! Timestamps are epoch seconds.

use serde::{Deserialize, Serialize};
use std::time::{SystemTime, UNIX_EPOCH};

/// Seconds since the Unix epoch.
pub(crate) fn now_epoch_secs() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs())
        .unwrap_or(0)
}

// ---------------------------------------------------------------------------
// ResultStatus
// ---------------------------------------------------------------------------

/// Lifecycle of a transcription result.
///
/// Transitions are monotonic: `pending → processing → {completed | failed}`,
/// never backwards.  [`rank`](Self::rank) encodes that ordering.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ResultStatus {
    Pending,
    Processing,
    Completed,
    Failed,
}

impl ResultStatus {
    /// `true` once no further transition can occur.
    pub fn is_terminal(self) -> bool {
        matches!(self, ResultStatus::Completed | ResultStatus::Failed)
    }

    /// Position in the monotonic lifecycle; a status may only be replaced by
    /// one of equal or higher rank.
    pub fn rank(self) -> u8 {
        match self {
            ResultStatus::Pending => 0,
            ResultStatus::Processing => 1,
            ResultStatus::Completed | ResultStatus::Failed => 2,
        }
    }

    /// Whether `next` is a legal successor of `self`.
    pub fn may_follow(self, next: ResultStatus) -> bool {
        next.rank() >= self.rank()
    }
}

// ---------------------------------------------------------------------------
// TranscriptionRequest
// ---------------------------------------------------------------------------

/// One transcription request: written once by the client, consumed once by
/// the host, then deleted.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TranscriptionRequest {
    /// Name of the audio blob inside the channel directory (raw LE `f32`
    /// samples, no header).
    pub audio_file_name: String,
    /// ISO-639-1 language hint, or `"auto"`.
    pub language: String,
    /// Sample rate of the blob in Hz.
    pub sample_rate: u32,
    /// Submission time, epoch seconds.  Also correlates the result.
    pub timestamp: u64,
}

impl TranscriptionRequest {
    pub fn new(
        audio_file_name: impl Into<String>,
        language: impl Into<String>,
        sample_rate: u32,
    ) -> Self {
        Self {
            audio_file_name: audio_file_name.into(),
            language: language.into(),
            sample_rate,
            timestamp: now_epoch_secs(),
        }
    }
}

// ---------------------------------------------------------------------------
// TranscriptionResult
// ---------------------------------------------------------------------------

/// The host's answer, written to the result slot and cleared by the client
/// after consumption.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TranscriptionResult {
    /// Transcript text; empty until `completed`.
    pub text: String,
    pub status: ResultStatus,
    /// `timestamp` of the request this result answers.
    pub request_timestamp: u64,
    /// Epoch seconds of terminal resolution; zero while non-terminal.
    pub completed_timestamp: u64,
    /// Failure description when `status == failed`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl TranscriptionResult {
    /// Receipt acknowledgement written before inference starts, so a
    /// concurrently polling client observes that the host picked up the
    /// request.
    pub fn processing(request_timestamp: u64) -> Self {
        Self {
            text: String::new(),
            status: ResultStatus::Processing,
            request_timestamp,
            completed_timestamp: 0,
            error: None,
        }
    }

    pub fn completed(request_timestamp: u64, text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            status: ResultStatus::Completed,
            request_timestamp,
            completed_timestamp: now_epoch_secs(),
            error: None,
        }
    }

    pub fn failed(request_timestamp: u64, error: impl Into<String>) -> Self {
        Self {
            text: String::new(),
            status: ResultStatus::Failed,
            request_timestamp,
            completed_timestamp: now_epoch_secs(),
            error: Some(error.into()),
        }
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    // ---- Status lifecycle ---

    #[test]
    fn terminal_statuses() {
        assert!(!ResultStatus::Pending.is_terminal());
        assert!(!ResultStatus::Processing.is_terminal());
        assert!(ResultStatus::Completed.is_terminal());
        assert!(ResultStatus::Failed.is_terminal());
    }

    #[test]
    fn status_ordering_is_monotonic() {
        use ResultStatus::*;
        assert!(Pending.may_follow(Processing));
        assert!(Processing.may_follow(Completed));
        assert!(Processing.may_follow(Failed));
        assert!(!Completed.may_follow(Processing));
        assert!(!Processing.may_follow(Pending));
        // Terminal states share a rank; a rewrite of the same rank is legal
        // (idempotent re-publication), regression is not.
        assert!(Completed.may_follow(Failed));
    }

    // ---- Wire format ---

    #[test]
    fn request_serializes_with_camel_case_keys() {
        let req = TranscriptionRequest {
            audio_file_name: "a.pcm".into(),
            language: "auto".into(),
            sample_rate: 16_000,
            timestamp: 1_700_000_000,
        };
        let json = serde_json::to_string(&req).unwrap();
        assert!(json.contains("\"audioFileName\":\"a.pcm\""));
        assert!(json.contains("\"sampleRate\":16000"));
        assert!(json.contains("\"timestamp\":1700000000"));
    }

    #[test]
    fn result_round_trips() {
        let res = TranscriptionResult::completed(42, "hello world");
        let json = serde_json::to_string(&res).unwrap();
        assert!(json.contains("\"status\":\"completed\""));
        assert!(json.contains("\"requestTimestamp\":42"));
        // No error key when there is no error.
        assert!(!json.contains("\"error\""));

        let back: TranscriptionResult = serde_json::from_str(&json).unwrap();
        assert_eq!(back, res);
    }

    #[test]
    fn failed_result_carries_error() {
        let res = TranscriptionResult::failed(1, "model exploded");
        assert_eq!(res.status, ResultStatus::Failed);
        assert_eq!(res.error.as_deref(), Some("model exploded"));
        assert!(res.completed_timestamp > 0);
    }

    #[test]
    fn processing_result_is_not_terminal() {
        let res = TranscriptionResult::processing(7);
        assert!(!res.status.is_terminal());
        assert_eq!(res.completed_timestamp, 0);
        assert!(res.text.is_empty());
    }

    #[test]
    fn request_new_stamps_current_time() {
        let req = TranscriptionRequest::new("b.pcm", "en", 16_000);
        assert!(req.timestamp > 0);
    }
}
