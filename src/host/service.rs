//! Host orchestrator — owns the recognition engine and answers requests.
//!
//! One [`HostService`] exists per host-process lifetime, constructed
//! explicitly and handed to whoever runs it — no ambient singleton.  The
//! engine loads lazily on the first request (model loading takes seconds)
//! and is reused afterwards.
//!
//! The NewAudio signal handler only raises a flag; the service's own loop
//! does the work, so the notification path never blocks.  Because the
//! request slot is single-slot/overwrite, a notification arriving
//! mid-transcription does not queue anything: the flag stays raised and the
//! next pass simply sees the most recent request.  At most one inference
//! runs at a time.

use std::sync::Arc;
use std::time::{Duration, Instant};

use crate::channel::store::ChannelError;
use crate::channel::{
    self, Notification, NotifyListener, TranscriptionChannel, TranscriptionRequest,
    TranscriptionResult,
};
use crate::stt::{SttEngine, SttError};

/// How the service obtains its engine on first use.
pub type EngineLoader = Box<dyn FnMut() -> Result<Arc<dyn SttEngine>, SttError> + Send>;

/// Cadence of the service loop's flag check.
const TICK: Duration = Duration::from_millis(100);
/// Reconciliation poll: the request slot is re-read at this cadence even
/// when no signal arrived, covering lost notifications and host restarts.
const RECONCILE_INTERVAL: Duration = Duration::from_secs(1);

// ---------------------------------------------------------------------------
// HostService
// ---------------------------------------------------------------------------

/// Single-instance request processor for the full-capability process.
pub struct HostService {
    channel: TranscriptionChannel,
    /// Raised by the client's NewAudio signal.
    new_audio: NotifyListener,
    loader: EngineLoader,
    engine: Option<Arc<dyn SttEngine>>,
}

impl HostService {
    pub fn new(channel: TranscriptionChannel, new_audio: NotifyListener, loader: EngineLoader) -> Self {
        Self {
            channel,
            new_audio,
            loader,
            engine: None,
        }
    }

    /// The lazily loaded engine handle.
    fn engine(&mut self) -> Result<Arc<dyn SttEngine>, SttError> {
        if let Some(engine) = &self.engine {
            return Ok(Arc::clone(engine));
        }
        log::info!("host: loading recognition engine");
        let engine = (self.loader)()?;
        self.engine = Some(Arc::clone(&engine));
        Ok(engine)
    }

    /// One idempotent pass over the request slot.
    ///
    /// Reads the current request (absent or malformed means nothing to do),
    /// immediately publishes a `processing` result so a polling client sees
    /// receipt, runs the engine, publishes the terminal result, deletes the
    /// consumed request and blob, and posts Done.  Engine failures become a
    /// `failed` result — a request is never left stranded in `processing`.
    ///
    /// Returns whether a request was processed.
    pub fn process_pending(&mut self) -> Result<bool, ChannelError> {
        let Some(request) = self.channel.read_request()? else {
            return Ok(false);
        };
        log::info!(
            "host: processing {} ({} Hz, language {})",
            request.audio_file_name,
            request.sample_rate,
            request.language
        );

        self.channel
            .write_result(&TranscriptionResult::processing(request.timestamp))?;

        let started = Instant::now();
        let result = match self.transcribe(&request) {
            Ok(text) => {
                log::info!(
                    "host: completed in {:.1} s ({} chars)",
                    started.elapsed().as_secs_f32(),
                    text.len()
                );
                TranscriptionResult::completed(request.timestamp, text)
            }
            Err(message) => {
                log::error!("host: transcription failed: {message}");
                TranscriptionResult::failed(request.timestamp, message)
            }
        };

        self.channel.write_result(&result)?;
        self.channel.remove_request()?;
        if let Err(e) = self.channel.remove_blob(&request.audio_file_name) {
            log::warn!("host: could not remove consumed blob: {e}");
        }

        let delivered = channel::post(&self.channel, Notification::Done);
        log::debug!("host: done (signal delivered: {delivered})");
        Ok(true)
    }

    fn transcribe(&mut self, request: &TranscriptionRequest) -> Result<String, String> {
        let engine = self.engine().map_err(|e| e.to_string())?;
        let samples = self
            .channel
            .read_audio_blob(&request.audio_file_name)
            .map_err(|e| e.to_string())?;
        engine
            .transcribe(&samples, &request.language)
            .map_err(|e| e.to_string())
    }

    /// Serve forever: wake on the NewAudio flag, reconcile on a slow poll.
    ///
    /// Blocking loop; requests are handled strictly one after another, so
    /// at most one inference is ever in flight.
    pub fn run(mut self) {
        log::info!("host: serving on {}", self.channel.dir().display());
        let mut last_reconcile = Instant::now();

        loop {
            let woken = self.new_audio.take();
            let reconcile = last_reconcile.elapsed() >= RECONCILE_INTERVAL;

            if woken || reconcile {
                last_reconcile = Instant::now();
                // Drain: the slot may hold a newer request that arrived
                // mid-inference.
                loop {
                    match self.process_pending() {
                        Ok(true) => continue,
                        Ok(false) => break,
                        Err(e) => {
                            log::error!("host: channel error: {e}");
                            break;
                        }
                    }
                }
            }

            std::thread::sleep(TICK);
        }
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use crate::channel::records::ResultStatus;
    use crate::stt::{MockSttEngine, MIN_AUDIO_SAMPLES};
    use std::sync::atomic::{AtomicUsize, Ordering};
    use tempfile::tempdir;

    fn channel() -> (tempfile::TempDir, TranscriptionChannel) {
        let dir = tempdir().expect("temp dir");
        let ch = TranscriptionChannel::create(dir.path()).expect("create channel");
        (dir, ch)
    }

    fn service_with(ch: &TranscriptionChannel, engine: MockSttEngine) -> HostService {
        let engine: Arc<dyn SttEngine> = Arc::new(engine);
        HostService::new(
            ch.clone(),
            NotifyListener::manual(),
            Box::new(move || Ok(Arc::clone(&engine))),
        )
    }

    fn submit(ch: &TranscriptionChannel, blob: &str, samples: usize) -> TranscriptionRequest {
        ch.write_audio_blob(blob, &vec![0.1; samples]).unwrap();
        let req = TranscriptionRequest::new(blob, "auto", 16_000);
        ch.submit_request(&req).unwrap();
        req
    }

    #[test]
    fn no_request_means_nothing_to_do() {
        let (_dir, ch) = channel();
        let mut service = service_with(&ch, MockSttEngine::ok("unused"));
        assert!(!service.process_pending().unwrap());
        assert!(ch.read_result().unwrap().is_none());
    }

    #[test]
    fn successful_request_completes_and_cleans_up() {
        let (_dir, ch) = channel();
        let mut service = service_with(&ch, MockSttEngine::ok("hello world"));
        let request = submit(&ch, "a.pcm", MIN_AUDIO_SAMPLES);

        assert!(service.process_pending().unwrap());

        let result = ch.read_result().unwrap().expect("terminal result");
        assert_eq!(result.status, ResultStatus::Completed);
        assert_eq!(result.text, "hello world");
        assert_eq!(result.request_timestamp, request.timestamp);
        assert!(result.completed_timestamp > 0);

        // Request and blob are consumed.
        assert!(ch.read_request().unwrap().is_none());
        assert!(!ch.blob_path("a.pcm").exists());
    }

    #[test]
    fn engine_failure_maps_to_failed_result() {
        let (_dir, ch) = channel();
        let mut service =
            service_with(&ch, MockSttEngine::err(SttError::Transcription("boom".into())));
        submit(&ch, "b.pcm", MIN_AUDIO_SAMPLES);

        assert!(service.process_pending().unwrap());

        let result = ch.read_result().unwrap().unwrap();
        assert_eq!(result.status, ResultStatus::Failed);
        assert!(result.error.as_deref().unwrap().contains("boom"));
        // Never stranded in `processing`; the request is still consumed.
        assert!(ch.read_request().unwrap().is_none());
    }

    #[test]
    fn missing_blob_maps_to_failed_result() {
        let (_dir, ch) = channel();
        let mut service = service_with(&ch, MockSttEngine::ok("unused"));
        // Request references a blob that was never written.
        ch.submit_request(&TranscriptionRequest::new("ghost.pcm", "auto", 16_000))
            .unwrap();

        assert!(service.process_pending().unwrap());
        let result = ch.read_result().unwrap().unwrap();
        assert_eq!(result.status, ResultStatus::Failed);
    }

    #[test]
    fn engine_loads_once_and_is_reused() {
        let (_dir, ch) = channel();
        let loads = Arc::new(AtomicUsize::new(0));
        let counter = Arc::clone(&loads);

        let mut service = HostService::new(
            ch.clone(),
            NotifyListener::manual(),
            Box::new(move || {
                counter.fetch_add(1, Ordering::SeqCst);
                Ok(Arc::new(MockSttEngine::ok("text")) as Arc<dyn SttEngine>)
            }),
        );

        submit(&ch, "a.pcm", MIN_AUDIO_SAMPLES);
        assert!(service.process_pending().unwrap());
        submit(&ch, "b.pcm", MIN_AUDIO_SAMPLES);
        assert!(service.process_pending().unwrap());

        assert_eq!(loads.load(Ordering::SeqCst), 1, "engine must be reused");
    }

    #[test]
    fn engine_load_failure_still_resolves_the_request() {
        let (_dir, ch) = channel();
        let mut service = HostService::new(
            ch.clone(),
            NotifyListener::manual(),
            Box::new(|| Err(SttError::ModelNotFound("/nope.bin".into()))),
        );

        submit(&ch, "a.pcm", MIN_AUDIO_SAMPLES);
        assert!(service.process_pending().unwrap());

        let result = ch.read_result().unwrap().unwrap();
        assert_eq!(result.status, ResultStatus::Failed);
        assert!(result.error.as_deref().unwrap().contains("/nope.bin"));
    }

    #[test]
    fn only_most_recent_request_is_processed() {
        let (_dir, ch) = channel();
        let mut service = service_with(&ch, MockSttEngine::ok("latest"));

        submit(&ch, "first.pcm", MIN_AUDIO_SAMPLES);
        let second = submit(&ch, "second.pcm", MIN_AUDIO_SAMPLES);

        // One pass handles the surviving request; a second pass finds none.
        assert!(service.process_pending().unwrap());
        assert!(!service.process_pending().unwrap());

        let result = ch.read_result().unwrap().unwrap();
        assert_eq!(result.request_timestamp, second.timestamp);
    }
}
