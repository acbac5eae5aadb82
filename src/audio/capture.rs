//! Microphone capture via `cpal`.
//!
//! The cpal callback runs on a real-time audio thread and must never block:
//! it only forwards raw sample chunks over an mpsc channel.  A dedicated
//! capture worker thread downmixes to mono, resamples to the pipeline rate,
//! appends to the shared ring buffer (for VAD polling) and streams raw
//! little-endian `f32` bytes to the session's sink file (for hand-off to the
//! transcription channel).
//!
//! `cpal::Stream` is not `Send` on every platform, so the stream itself lives
//! on its own thread for the duration of a session; [`AudioCapture`] holds
//! only `Send` handles and can sit behind `Box<dyn CaptureBackend>` inside
//! the tokio-driven orchestrator.

use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::PathBuf;
use std::sync::mpsc;
use std::sync::{Arc, Mutex};
use std::thread::JoinHandle;

use cpal::traits::{DeviceTrait, HostTrait, StreamTrait};
use thiserror::Error;

use super::buffer::SharedRingBuffer;
use super::resample::{resample, stereo_to_mono};

// ---------------------------------------------------------------------------
// CaptureError
// ---------------------------------------------------------------------------

/// Errors from the capture subsystem.
///
/// `PermissionDenied` is terminal and user-actionable; the device and stream
/// setup variants are retryable; `Stream` and `SinkWrite` abort the running
/// session and are surfaced on the orchestrator's next poll.
#[derive(Debug, Error)]
pub enum CaptureError {
    #[error("microphone access denied — grant the permission and retry")]
    PermissionDenied,

    #[error("no input device found on the default audio host")]
    NoDevice,

    #[error("failed to query default input config: {0}")]
    DefaultConfig(#[from] cpal::DefaultStreamConfigError),

    #[error("failed to build input stream: {0}")]
    BuildStream(#[from] cpal::BuildStreamError),

    #[error("failed to start audio stream: {0}")]
    PlayStream(#[from] cpal::PlayStreamError),

    #[error("audio stream error: {0}")]
    Stream(String),

    #[error("failed to write captured audio: {0}")]
    SinkWrite(String),
}

// ---------------------------------------------------------------------------
// CaptureSession / CaptureBackend
// ---------------------------------------------------------------------------

/// Everything one recording session needs from its capture backend.
#[derive(Clone)]
pub struct CaptureSession {
    /// Shared buffer the orchestrator polls for VAD windows.
    pub ring: SharedRingBuffer,
    /// Destination for the streamed raw `f32` LE audio blob.
    pub sink_path: PathBuf,
    /// Rate the pipeline consumes, in Hz (16 kHz by default).
    pub target_rate: u32,
}

/// Object-safe seam between the orchestrator and the platform microphone.
///
/// The production implementation is [`AudioCapture`]; tests drive the
/// orchestrator with a scripted backend instead of real hardware.
pub trait CaptureBackend: Send {
    /// Resolve microphone availability before the first `start`.
    fn check_permission(&self) -> Result<(), CaptureError>;

    /// Prompt for microphone access where the platform supports it.
    ///
    /// With cpal the OS raises its consent dialog on first device access,
    /// so probing the default config doubles as the request.
    fn request_permission(&self) -> Result<(), CaptureError> {
        self.check_permission()
    }

    /// Begin capturing into `session`.  Fails when a session is already
    /// running or the platform rejects the stream.
    fn start(&mut self, session: CaptureSession) -> Result<(), CaptureError>;

    /// Tear down the capture path and close the sink.  Idempotent when not
    /// capturing.
    fn stop(&mut self);

    /// Surface a mid-capture failure (device loss, sink write error)
    /// recorded since the last call.
    fn take_error(&mut self) -> Option<CaptureError>;
}

// ---------------------------------------------------------------------------
// AudioCapture
// ---------------------------------------------------------------------------

/// cpal-backed [`CaptureBackend`].
pub struct AudioCapture {
    stop_tx: Option<mpsc::Sender<()>>,
    stream_thread: Option<JoinHandle<()>>,
    worker_thread: Option<JoinHandle<()>>,
    session_error: Arc<Mutex<Option<CaptureError>>>,
}

impl AudioCapture {
    /// Probe the default input device so setup failures surface at
    /// construction rather than on the first recording.
    pub fn new() -> Result<Self, CaptureError> {
        let capture = Self {
            stop_tx: None,
            stream_thread: None,
            worker_thread: None,
            session_error: Arc::new(Mutex::new(None)),
        };
        capture.check_permission()?;
        Ok(capture)
    }

    fn record_error(slot: &Arc<Mutex<Option<CaptureError>>>, err: CaptureError) {
        log::error!("capture: {err}");
        let mut guard = slot.lock().unwrap();
        // Keep the first error; later ones are usually consequences.
        if guard.is_none() {
            *guard = Some(err);
        }
    }
}

impl CaptureBackend for AudioCapture {
    fn check_permission(&self) -> Result<(), CaptureError> {
        let host = cpal::default_host();
        let device = host.default_input_device().ok_or(CaptureError::NoDevice)?;
        match device.default_input_config() {
            Ok(config) => {
                log::debug!(
                    "capture: default input {} Hz, {} ch",
                    config.sample_rate().0,
                    config.channels()
                );
                Ok(())
            }
            // Platforms report a denied microphone as an unavailable device.
            Err(cpal::DefaultStreamConfigError::DeviceNotAvailable) => {
                Err(CaptureError::PermissionDenied)
            }
            Err(e) => Err(CaptureError::DefaultConfig(e)),
        }
    }

    fn start(&mut self, session: CaptureSession) -> Result<(), CaptureError> {
        if self.stop_tx.is_some() {
            log::warn!("capture: start while already capturing — ignored");
            return Ok(());
        }
        self.session_error.lock().unwrap().take();

        let (chunk_tx, chunk_rx) = mpsc::channel::<Vec<f32>>();
        let (stop_tx, stop_rx) = mpsc::channel::<()>();
        let (ready_tx, ready_rx) = mpsc::channel::<Result<(u32, u16), CaptureError>>();

        let error_slot = Arc::clone(&self.session_error);

        // The stream lives on this thread; it is dropped (stopping the
        // hardware) when the stop signal arrives.
        let stream_thread = std::thread::Builder::new()
            .name("capture-stream".into())
            .spawn(move || {
                let host = cpal::default_host();
                let device = match host.default_input_device() {
                    Some(d) => d,
                    None => {
                        let _ = ready_tx.send(Err(CaptureError::NoDevice));
                        return;
                    }
                };
                let supported = match device.default_input_config() {
                    Ok(c) => c,
                    Err(e) => {
                        let _ = ready_tx.send(Err(e.into()));
                        return;
                    }
                };
                let native_rate = supported.sample_rate().0;
                let channels = supported.channels();
                let config: cpal::StreamConfig = supported.into();

                let err_slot = Arc::clone(&error_slot);
                let stream = match device.build_input_stream(
                    &config,
                    move |data: &[f32], _: &cpal::InputCallbackInfo| {
                        // Real-time thread: forward only, never block.
                        let _ = chunk_tx.send(data.to_vec());
                    },
                    move |err: cpal::StreamError| {
                        Self::record_error(&err_slot, CaptureError::Stream(err.to_string()));
                    },
                    None,
                ) {
                    Ok(s) => s,
                    Err(e) => {
                        let _ = ready_tx.send(Err(e.into()));
                        return;
                    }
                };

                if let Err(e) = stream.play() {
                    let _ = ready_tx.send(Err(e.into()));
                    return;
                }
                let _ = ready_tx.send(Ok((native_rate, channels)));

                // Park until the session ends; dropping the stream (and with
                // it the callback's chunk sender) stops the capture path.
                let _ = stop_rx.recv();
            })
            .map_err(|e| CaptureError::Stream(e.to_string()))?;

        let (native_rate, channels) = match ready_rx.recv() {
            Ok(Ok(meta)) => meta,
            Ok(Err(e)) => {
                let _ = stream_thread.join();
                return Err(e);
            }
            Err(_) => {
                let _ = stream_thread.join();
                return Err(CaptureError::Stream("capture thread died".into()));
            }
        };

        let sink = File::create(&session.sink_path)
            .map_err(|e| CaptureError::SinkWrite(e.to_string()))?;
        let target_rate = session.target_rate;

        let error_slot = Arc::clone(&self.session_error);
        let worker_thread = std::thread::Builder::new()
            .name("capture-convert".into())
            .spawn(move || {
                let mut sink = BufWriter::new(sink);
                while let Ok(chunk) = chunk_rx.recv() {
                    let mono = stereo_to_mono(&chunk, channels);
                    let converted = resample(&mono, native_rate, session.target_rate);

                    session.ring.lock().unwrap().push_slice(&converted);

                    for sample in &converted {
                        if let Err(e) = sink.write_all(&sample.to_le_bytes()) {
                            Self::record_error(
                                &error_slot,
                                CaptureError::SinkWrite(e.to_string()),
                            );
                            return;
                        }
                    }
                }
                if let Err(e) = sink.flush() {
                    Self::record_error(&error_slot, CaptureError::SinkWrite(e.to_string()));
                }
            })
            .map_err(|e| CaptureError::Stream(e.to_string()))?;

        log::info!("capture: started ({native_rate} Hz, {channels} ch → {target_rate} Hz mono)");
        self.stop_tx = Some(stop_tx);
        self.stream_thread = Some(stream_thread);
        self.worker_thread = Some(worker_thread);
        Ok(())
    }

    fn stop(&mut self) {
        let Some(stop_tx) = self.stop_tx.take() else {
            return; // not capturing
        };
        let _ = stop_tx.send(());
        if let Some(t) = self.stream_thread.take() {
            let _ = t.join();
        }
        // The worker drains remaining chunks and flushes the sink once the
        // stream (and its sender) is gone.
        if let Some(t) = self.worker_thread.take() {
            let _ = t.join();
        }
        log::info!("capture: stopped");
    }

    fn take_error(&mut self) -> Option<CaptureError> {
        self.session_error.lock().unwrap().take()
    }
}

impl Drop for AudioCapture {
    fn drop(&mut self) {
        self.stop();
    }
}

// ---------------------------------------------------------------------------
// MockCapture  (test-only)
// ---------------------------------------------------------------------------

/// Scripted [`CaptureBackend`] for orchestrator tests: writes a canned blob
/// to the sink on `start` and records lifecycle calls.
///
/// The error slot is shared, so a test can keep an [`error_handle`] and
/// inject a mid-capture failure after the mock has been boxed away.
///
/// [`error_handle`]: Self::error_handle
#[cfg(test)]
pub struct MockCapture {
    /// Samples written to the sink file when a session starts.
    pub sink_samples: Vec<f32>,
    /// Error returned by `start`, if any.
    pub fail_start: Option<CaptureError>,
    error_slot: Arc<Mutex<Option<CaptureError>>>,
    started: Arc<std::sync::atomic::AtomicUsize>,
    stopped: Arc<std::sync::atomic::AtomicUsize>,
}

#[cfg(test)]
impl MockCapture {
    pub fn with_sink_samples(samples: Vec<f32>) -> Self {
        Self {
            sink_samples: samples,
            fail_start: None,
            error_slot: Arc::new(Mutex::new(None)),
            started: Arc::new(std::sync::atomic::AtomicUsize::new(0)),
            stopped: Arc::new(std::sync::atomic::AtomicUsize::new(0)),
        }
    }

    /// Shared slot for injecting a mid-capture failure.
    pub fn error_handle(&self) -> Arc<Mutex<Option<CaptureError>>> {
        Arc::clone(&self.error_slot)
    }

    /// Shared start/stop counters, surviving the move into the orchestrator.
    pub fn counters(
        &self,
    ) -> (
        Arc<std::sync::atomic::AtomicUsize>,
        Arc<std::sync::atomic::AtomicUsize>,
    ) {
        (Arc::clone(&self.started), Arc::clone(&self.stopped))
    }
}

#[cfg(test)]
impl CaptureBackend for MockCapture {
    fn check_permission(&self) -> Result<(), CaptureError> {
        Ok(())
    }

    fn start(&mut self, session: CaptureSession) -> Result<(), CaptureError> {
        if let Some(e) = self.fail_start.take() {
            return Err(e);
        }
        self.started
            .fetch_add(1, std::sync::atomic::Ordering::SeqCst);
        let mut sink = BufWriter::new(
            File::create(&session.sink_path)
                .map_err(|e| CaptureError::SinkWrite(e.to_string()))?,
        );
        for sample in &self.sink_samples {
            sink.write_all(&sample.to_le_bytes())
                .map_err(|e| CaptureError::SinkWrite(e.to_string()))?;
        }
        sink.flush()
            .map_err(|e| CaptureError::SinkWrite(e.to_string()))?;
        Ok(())
    }

    fn stop(&mut self) {
        self.stopped
            .fetch_add(1, std::sync::atomic::Ordering::SeqCst);
    }

    fn take_error(&mut self) -> Option<CaptureError> {
        self.error_slot.lock().unwrap().take()
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use crate::audio::buffer::shared_ring;

    #[test]
    fn audio_capture_is_send() {
        fn assert_send<T: Send>() {}
        assert_send::<AudioCapture>();
    }

    #[test]
    fn capture_error_classifies_permission() {
        let e = CaptureError::PermissionDenied;
        assert!(e.to_string().contains("denied"));
    }

    #[test]
    fn mock_capture_writes_sink_blob() {
        let dir = tempfile::tempdir().unwrap();
        let sink_path = dir.path().join("session.pcm");
        let mut mock = MockCapture::with_sink_samples(vec![0.25_f32; 100]);

        mock.start(CaptureSession {
            ring: shared_ring(16_000, 1.0, 1),
            sink_path: sink_path.clone(),
            target_rate: 16_000,
        })
        .unwrap();

        let bytes = std::fs::read(&sink_path).unwrap();
        assert_eq!(bytes.len(), 100 * 4);
        let first = f32::from_le_bytes([bytes[0], bytes[1], bytes[2], bytes[3]]);
        assert!((first - 0.25).abs() < 1e-6);
    }

    #[test]
    fn mock_capture_counters_survive_the_move() {
        let mut mock = MockCapture::with_sink_samples(Vec::new());
        let (started, stopped) = mock.counters();
        mock.stop();
        mock.stop();
        assert_eq!(started.load(std::sync::atomic::Ordering::SeqCst), 0);
        assert_eq!(stopped.load(std::sync::atomic::Ordering::SeqCst), 2);
    }

    #[test]
    fn mock_capture_error_handle_feeds_take_error() {
        let mut mock = MockCapture::with_sink_samples(Vec::new());
        let handle = mock.error_handle();
        assert!(mock.take_error().is_none());

        handle
            .lock()
            .unwrap()
            .replace(CaptureError::SinkWrite("disk full".into()));
        assert!(matches!(
            mock.take_error(),
            Some(CaptureError::SinkWrite(_))
        ));
        assert!(mock.take_error().is_none(), "error is consumed");
    }
}
