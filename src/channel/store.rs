//! Directory-backed request/result exchange between the two processes.
//!
//! The transport is a shared directory, not a socket: one overwritable slot
//! for the current request (`request.json`), one for the current result
//! (`result.json`), and a pool of audio blobs named by unique, caller-chosen
//! filenames referenced from the request record.
//!
//! There is no cross-process locking.  Correctness relies on two rules:
//!
//! * **Single writer per slot** — only the client writes the request slot,
//!   only the host writes the result slot.
//! * **Atomic whole-file replacement** — every record write lands in a
//!   temporary sibling first and is renamed into place, so a reader never
//!   observes a half-written record.
//!
//! A new request *overwrites* the slot, never queues; unreadable or corrupt
//! records are treated as absent rather than crashing the reader.

use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use serde::de::DeserializeOwned;
use serde::Serialize;
use thiserror::Error;

use super::records::{TranscriptionRequest, TranscriptionResult};

/// Request slot file name.
pub const REQUEST_FILE: &str = "request.json";
/// Result slot file name.
pub const RESULT_FILE: &str = "result.json";

// ---------------------------------------------------------------------------
// ChannelError
// ---------------------------------------------------------------------------

/// Errors from the shared-directory transport.
#[derive(Debug, Error)]
pub enum ChannelError {
    #[error("channel I/O error: {0}")]
    Io(#[from] io::Error),

    #[error("failed to encode record: {0}")]
    Encode(#[from] serde_json::Error),

    #[error("audio blob not found: {0}")]
    MissingBlob(String),
}

// ---------------------------------------------------------------------------
// TranscriptionChannel
// ---------------------------------------------------------------------------

/// Handle to the shared channel directory.
///
/// Cheap to clone; both processes construct one over the same path.
#[derive(Debug, Clone)]
pub struct TranscriptionChannel {
    dir: PathBuf,
}

impl TranscriptionChannel {
    /// Open the channel at `dir`, creating the directory if needed.
    pub fn create(dir: impl Into<PathBuf>) -> Result<Self, ChannelError> {
        let dir = dir.into();
        fs::create_dir_all(&dir)?;
        Ok(Self { dir })
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    // -----------------------------------------------------------------------
    // Audio blobs
    // -----------------------------------------------------------------------

    /// A fresh blob name, unique across processes and recordings.
    pub fn unique_blob_name(&self) -> String {
        let millis = std::time::SystemTime::now()
            .duration_since(std::time::UNIX_EPOCH)
            .map(|d| d.as_millis())
            .unwrap_or(0);
        format!("rec-{}-{millis}.pcm", std::process::id())
    }

    pub fn blob_path(&self, name: &str) -> PathBuf {
        self.dir.join(name)
    }

    /// Write `samples` as a raw little-endian `f32` blob (no header).
    pub fn write_audio_blob(&self, name: &str, samples: &[f32]) -> Result<PathBuf, ChannelError> {
        let path = self.blob_path(name);
        let mut bytes = Vec::with_capacity(samples.len() * 4);
        for sample in samples {
            bytes.extend_from_slice(&sample.to_le_bytes());
        }
        fs::write(&path, bytes)?;
        Ok(path)
    }

    /// Read a blob back into samples.  A trailing partial sample (torn
    /// write) is dropped rather than reported.
    pub fn read_audio_blob(&self, name: &str) -> Result<Vec<f32>, ChannelError> {
        let path = self.blob_path(name);
        let bytes = match fs::read(&path) {
            Ok(b) => b,
            Err(e) if e.kind() == io::ErrorKind::NotFound => {
                return Err(ChannelError::MissingBlob(name.to_string()));
            }
            Err(e) => return Err(e.into()),
        };
        Ok(bytes
            .chunks_exact(4)
            .map(|c| f32::from_le_bytes([c[0], c[1], c[2], c[3]]))
            .collect())
    }

    /// Delete a blob; missing is fine.
    pub fn remove_blob(&self, name: &str) -> Result<(), ChannelError> {
        remove_if_exists(&self.blob_path(name))
    }

    // -----------------------------------------------------------------------
    // Request slot  (written by the client, consumed by the host)
    // -----------------------------------------------------------------------

    /// Publish a request, overwriting whatever is in the slot.
    ///
    /// If an unconsumed request referencing a different blob is being
    /// superseded, its blob is deleted — the host will never see it.
    pub fn submit_request(&self, request: &TranscriptionRequest) -> Result<(), ChannelError> {
        if let Some(stale) = self.read_request()? {
            if stale.audio_file_name != request.audio_file_name {
                log::debug!(
                    "channel: superseding unconsumed request, dropping blob {}",
                    stale.audio_file_name
                );
                self.remove_blob(&stale.audio_file_name)?;
            }
        }
        self.write_atomic(REQUEST_FILE, request)
    }

    /// Read the current request, if any.  Corrupt records count as absent.
    pub fn read_request(&self) -> Result<Option<TranscriptionRequest>, ChannelError> {
        self.read_slot(REQUEST_FILE)
    }

    /// Delete the consumed request; missing is fine.
    pub fn remove_request(&self) -> Result<(), ChannelError> {
        remove_if_exists(&self.dir.join(REQUEST_FILE))
    }

    // -----------------------------------------------------------------------
    // Result slot  (written by the host, consumed by the client)
    // -----------------------------------------------------------------------

    /// Publish a result, overwriting the slot.
    ///
    /// Guards the monotonic status lifecycle: an attempt to regress the
    /// status of the *same* request (e.g. a late `processing` landing after
    /// `completed`) is dropped with a warning.
    pub fn write_result(&self, result: &TranscriptionResult) -> Result<(), ChannelError> {
        if let Some(existing) = self.read_result()? {
            if existing.request_timestamp == result.request_timestamp
                && !existing.status.may_follow(result.status)
            {
                log::warn!(
                    "channel: refusing status regression {:?} → {:?}",
                    existing.status,
                    result.status
                );
                return Ok(());
            }
        }
        self.write_atomic(RESULT_FILE, result)
    }

    /// Read the current result, if any.  Idempotent: reading twice without
    /// an intervening write returns the same value.
    pub fn read_result(&self) -> Result<Option<TranscriptionResult>, ChannelError> {
        self.read_slot(RESULT_FILE)
    }

    /// Clear the result slot after consumption so a stale result is never
    /// re-read; missing is fine.
    pub fn clear_result(&self) -> Result<(), ChannelError> {
        remove_if_exists(&self.dir.join(RESULT_FILE))
    }

    // -----------------------------------------------------------------------
    // Slot plumbing
    // -----------------------------------------------------------------------

    /// Atomic whole-file replacement: serialize into a temporary sibling,
    /// then rename into place.
    fn write_atomic<T: Serialize>(&self, file: &str, record: &T) -> Result<(), ChannelError> {
        let json = serde_json::to_vec_pretty(record)?;
        let tmp = self.dir.join(format!("{file}.tmp-{}", std::process::id()));
        fs::write(&tmp, json)?;
        fs::rename(&tmp, self.dir.join(file))?;
        Ok(())
    }

    fn read_slot<T: DeserializeOwned>(&self, file: &str) -> Result<Option<T>, ChannelError> {
        let path = self.dir.join(file);
        let content = match fs::read_to_string(&path) {
            Ok(c) => c,
            Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(e.into()),
        };
        match serde_json::from_str(&content) {
            Ok(record) => Ok(Some(record)),
            Err(e) => {
                // Malformed records are treated as absent, never a crash.
                log::warn!("channel: ignoring malformed {file}: {e}");
                Ok(None)
            }
        }
    }
}

fn remove_if_exists(path: &Path) -> Result<(), ChannelError> {
    match fs::remove_file(path) {
        Ok(()) => Ok(()),
        Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(()),
        Err(e) => Err(e.into()),
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use crate::channel::records::ResultStatus;
    use tempfile::tempdir;

    fn channel() -> (tempfile::TempDir, TranscriptionChannel) {
        let dir = tempdir().expect("temp dir");
        let ch = TranscriptionChannel::create(dir.path()).expect("create channel");
        (dir, ch)
    }

    // ---- Slots -------------------------------------------------------------

    #[test]
    fn empty_channel_has_no_request_or_result() {
        let (_dir, ch) = channel();
        assert!(ch.read_request().unwrap().is_none());
        assert!(ch.read_result().unwrap().is_none());
    }

    #[test]
    fn request_round_trip() {
        let (_dir, ch) = channel();
        let req = TranscriptionRequest::new("a.pcm", "auto", 16_000);
        ch.submit_request(&req).unwrap();
        assert_eq!(ch.read_request().unwrap(), Some(req));
    }

    #[test]
    fn second_request_overwrites_first() {
        let (_dir, ch) = channel();
        ch.write_audio_blob("one.pcm", &[0.0; 8]).unwrap();
        ch.write_audio_blob("two.pcm", &[0.0; 8]).unwrap();

        ch.submit_request(&TranscriptionRequest::new("one.pcm", "auto", 16_000))
            .unwrap();
        ch.submit_request(&TranscriptionRequest::new("two.pcm", "auto", 16_000))
            .unwrap();

        let current = ch.read_request().unwrap().unwrap();
        assert_eq!(current.audio_file_name, "two.pcm");
        // The superseded blob is gone; only the live one remains.
        assert!(!ch.blob_path("one.pcm").exists());
        assert!(ch.blob_path("two.pcm").exists());
    }

    #[test]
    fn result_read_is_idempotent() {
        let (_dir, ch) = channel();
        let res = TranscriptionResult::completed(5, "hello");
        ch.write_result(&res).unwrap();

        assert_eq!(ch.read_result().unwrap(), Some(res.clone()));
        assert_eq!(ch.read_result().unwrap(), Some(res));
    }

    #[test]
    fn clear_then_read_returns_none() {
        let (_dir, ch) = channel();
        ch.write_result(&TranscriptionResult::completed(5, "hello"))
            .unwrap();
        ch.clear_result().unwrap();
        assert!(ch.read_result().unwrap().is_none());
        // Clearing an empty slot is fine too.
        ch.clear_result().unwrap();
    }

    #[test]
    fn status_regression_is_refused() {
        let (_dir, ch) = channel();
        ch.write_result(&TranscriptionResult::completed(9, "done"))
            .unwrap();
        ch.write_result(&TranscriptionResult::processing(9)).unwrap();

        let current = ch.read_result().unwrap().unwrap();
        assert_eq!(current.status, ResultStatus::Completed);
        assert_eq!(current.text, "done");
    }

    #[test]
    fn new_request_may_reset_result_lifecycle() {
        let (_dir, ch) = channel();
        ch.write_result(&TranscriptionResult::completed(9, "done"))
            .unwrap();
        // A different request timestamp starts a fresh lifecycle.
        ch.write_result(&TranscriptionResult::processing(10)).unwrap();
        let current = ch.read_result().unwrap().unwrap();
        assert_eq!(current.status, ResultStatus::Processing);
    }

    // ---- Malformed records -------------------------------------------------

    #[test]
    fn malformed_request_counts_as_absent() {
        let (_dir, ch) = channel();
        fs::write(ch.dir().join(REQUEST_FILE), b"{not json").unwrap();
        assert!(ch.read_request().unwrap().is_none());
    }

    #[test]
    fn malformed_result_counts_as_absent() {
        let (_dir, ch) = channel();
        fs::write(ch.dir().join(RESULT_FILE), b"").unwrap();
        assert!(ch.read_result().unwrap().is_none());
    }

    // ---- Blobs -------------------------------------------------------------

    #[test]
    fn blob_round_trip() {
        let (_dir, ch) = channel();
        let samples: Vec<f32> = (0..100).map(|i| i as f32 / 100.0).collect();
        ch.write_audio_blob("clip.pcm", &samples).unwrap();
        assert_eq!(ch.read_audio_blob("clip.pcm").unwrap(), samples);
    }

    #[test]
    fn missing_blob_is_an_error() {
        let (_dir, ch) = channel();
        assert!(matches!(
            ch.read_audio_blob("ghost.pcm"),
            Err(ChannelError::MissingBlob(_))
        ));
    }

    #[test]
    fn torn_blob_tail_is_dropped() {
        let (_dir, ch) = channel();
        let mut bytes = Vec::new();
        bytes.extend_from_slice(&1.0_f32.to_le_bytes());
        bytes.extend_from_slice(&[0xAA, 0xBB]); // partial trailing sample
        fs::write(ch.blob_path("torn.pcm"), bytes).unwrap();

        let samples = ch.read_audio_blob("torn.pcm").unwrap();
        assert_eq!(samples, vec![1.0]);
    }

    #[test]
    fn unique_blob_names_differ() {
        let (_dir, ch) = channel();
        let a = ch.unique_blob_name();
        std::thread::sleep(std::time::Duration::from_millis(2));
        let b = ch.unique_blob_name();
        assert_ne!(a, b);
    }

    // ---- Atomic write ------------------------------------------------------

    #[test]
    fn no_temp_files_left_behind() {
        let (_dir, ch) = channel();
        ch.submit_request(&TranscriptionRequest::new("a.pcm", "auto", 16_000))
            .unwrap();
        ch.write_result(&TranscriptionResult::processing(1)).unwrap();

        let leftovers: Vec<_> = fs::read_dir(ch.dir())
            .unwrap()
            .filter_map(|e| e.ok())
            .filter(|e| e.file_name().to_string_lossy().contains(".tmp-"))
            .collect();
        assert!(leftovers.is_empty(), "stray temp files: {leftovers:?}");
    }
}
