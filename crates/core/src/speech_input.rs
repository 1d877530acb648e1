use crate::answer::{AnswerBuffer, lock};
use crate::capability::Capability;
use crate::error::SpeechError;
use crate::notice::NoticeSink;
use std::collections::HashSet;
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio::time::{Instant, MissedTickBehavior};

/// Error conditions reported by a recognition engine, named after the
/// platform's error codes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RecognitionFault {
    NoSpeech,
    Aborted,
    NotAllowed,
    AudioCapture,
    Network,
    Other(String),
}

impl RecognitionFault {
    /// Parses a platform error code such as `"no-speech"` or `"not-allowed"`.
    pub fn from_code(code: &str) -> Self {
        match code {
            "no-speech" => RecognitionFault::NoSpeech,
            "aborted" => RecognitionFault::Aborted,
            "not-allowed" | "service-not-allowed" => RecognitionFault::NotAllowed,
            "audio-capture" => RecognitionFault::AudioCapture,
            "network" => RecognitionFault::Network,
            other => RecognitionFault::Other(other.to_string()),
        }
    }

    fn into_error(self) -> SpeechError {
        match self {
            RecognitionFault::NotAllowed => SpeechError::PermissionDenied,
            RecognitionFault::AudioCapture => SpeechError::AudioCapture,
            RecognitionFault::Network => SpeechError::Network,
            RecognitionFault::NoSpeech => SpeechError::Engine("no-speech".to_string()),
            RecognitionFault::Aborted => SpeechError::Engine("aborted".to_string()),
            RecognitionFault::Other(code) => SpeechError::Engine(code),
        }
    }
}

/// Events a recognition engine delivers to its single subscriber.
#[derive(Debug, Clone, PartialEq)]
pub enum RecognitionEvent {
    /// The engine began capturing audio for a pass.
    Started,
    /// A transcript for the result at `index` within the current pass.
    Result {
        index: usize,
        transcript: String,
        is_final: bool,
    },
    Error(RecognitionFault),
    /// The pass is over, whether stopped, aborted, or timed out.
    Ended,
}

/// A continuous, interim-result-emitting speech-to-text engine.
///
/// Every `subscribe` is paired with exactly one `unsubscribe` by the adapter.
pub trait RecognitionEngine: Send + Sync {
    fn subscribe(&self, sink: mpsc::UnboundedSender<RecognitionEvent>);
    fn unsubscribe(&self);
    /// Begins a pass in `lang`. Fails synchronously when the platform refuses.
    fn start(&self, lang: &str) -> Result<(), RecognitionFault>;
    /// Ends the pass gracefully, flushing pending results.
    fn stop(&self);
    /// Ends the pass immediately, discarding pending results.
    fn abort(&self);
}

#[derive(Debug, Clone)]
pub struct RecognitionConfig {
    pub lang: String,
    /// How often the engine is cycled while recording, to outlive its silent timeout.
    pub restart_interval: Duration,
}

impl Default for RecognitionConfig {
    fn default() -> Self {
        Self {
            lang: "en-US".to_string(),
            restart_interval: Duration::from_secs(10),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RecordingState {
    pub is_recording: bool,
    pub is_listening: bool,
    pub interim_preview: String,
}

#[derive(Default)]
struct Inner {
    state: RecordingState,
    // Result indices already appended during the current pass.
    finalized: HashSet<usize>,
}

#[derive(Default)]
struct Tasks {
    pump: Option<JoinHandle<()>>,
    ticker: Option<JoinHandle<()>>,
}

impl Tasks {
    fn cancel(&mut self) {
        if let Some(pump) = self.pump.take() {
            pump.abort();
        }
        if let Some(ticker) = self.ticker.take() {
            ticker.abort();
        }
    }
}

/// Owns the recognition engine's lifecycle and feeds final transcripts into
/// the answer buffer.
///
/// Must be started from within a Tokio runtime.
pub struct SpeechInputAdapter {
    engine: Capability<Arc<dyn RecognitionEngine>>,
    config: RecognitionConfig,
    answer: AnswerBuffer,
    notices: NoticeSink,
    inner: Arc<Mutex<Inner>>,
    tasks: Mutex<Tasks>,
}

impl SpeechInputAdapter {
    pub fn new(
        engine: Capability<Arc<dyn RecognitionEngine>>,
        config: RecognitionConfig,
        answer: AnswerBuffer,
        notices: NoticeSink,
    ) -> Self {
        Self {
            engine,
            config,
            answer,
            notices,
            inner: Arc::new(Mutex::new(Inner::default())),
            tasks: Mutex::new(Tasks::default()),
        }
    }

    pub fn is_available(&self) -> bool {
        self.engine.is_available()
    }

    pub fn is_recording(&self) -> bool {
        lock(&self.inner).state.is_recording
    }

    pub fn state(&self) -> RecordingState {
        lock(&self.inner).state.clone()
    }

    pub fn start(&self) -> Result<(), SpeechError> {
        let Some(engine) = self.engine.as_available().cloned() else {
            let err = SpeechError::Unavailable;
            self.notices.emit(err.class(), err.user_message());
            return Err(err);
        };

        {
            let mut inner = lock(&self.inner);
            if inner.state.is_recording {
                return Err(SpeechError::AlreadyActive);
            }
            inner.state = RecordingState {
                is_recording: true,
                is_listening: true,
                interim_preview: String::new(),
            };
            inner.finalized.clear();
        }

        let (tx, rx) = mpsc::unbounded_channel();
        engine.subscribe(tx);
        if let Err(fault) = engine.start(&self.config.lang) {
            engine.unsubscribe();
            lock(&self.inner).state = RecordingState::default();
            let err = fault.into_error();
            tracing::error!("Speech recognition failed to start: {err}");
            self.notices.emit(err.class(), err.user_message());
            return Err(err);
        }
        tracing::info!(lang = %self.config.lang, "Speech recording started");

        let pump = tokio::spawn(pump_events(
            rx,
            engine.clone(),
            self.config.lang.clone(),
            self.inner.clone(),
            self.answer.clone(),
            self.notices.clone(),
        ));
        let ticker = tokio::spawn(restart_ticker(
            engine,
            self.inner.clone(),
            self.config.restart_interval,
        ));

        let mut tasks = lock(&self.tasks);
        tasks.cancel();
        tasks.pump = Some(pump);
        tasks.ticker = Some(ticker);
        Ok(())
    }

    /// Stops recording. Safe to call when not recording.
    pub fn stop(&self) {
        self.release(false);
    }

    fn release(&self, discard_pending: bool) {
        let was_recording = {
            let mut inner = lock(&self.inner);
            let was = inner.state.is_recording;
            inner.state = RecordingState::default();
            inner.finalized.clear();
            was
        };
        lock(&self.tasks).cancel();

        if !was_recording {
            return;
        }
        if let Some(engine) = self.engine.as_available() {
            if discard_pending {
                engine.abort();
            } else {
                engine.stop();
            }
            engine.unsubscribe();
        }
        tracing::info!("Speech recording stopped");
    }

    /// Flips recording on or off; returns whether it is now recording.
    pub fn toggle(&self) -> Result<bool, SpeechError> {
        if self.is_recording() {
            self.stop();
            Ok(false)
        } else {
            self.start().map(|_| true)
        }
    }
}

impl Drop for SpeechInputAdapter {
    fn drop(&mut self) {
        self.release(true);
    }
}

async fn pump_events(
    mut rx: mpsc::UnboundedReceiver<RecognitionEvent>,
    engine: Arc<dyn RecognitionEngine>,
    lang: String,
    inner: Arc<Mutex<Inner>>,
    answer: AnswerBuffer,
    notices: NoticeSink,
) {
    while let Some(event) = rx.recv().await {
        let mut guard = lock(&inner);
        if !guard.state.is_recording {
            break;
        }
        match event {
            RecognitionEvent::Started => guard.state.is_listening = true,
            RecognitionEvent::Result {
                transcript,
                is_final: false,
                ..
            } => guard.state.interim_preview = transcript,
            RecognitionEvent::Result {
                index,
                transcript,
                is_final: true,
            } => {
                if guard.finalized.insert(index) {
                    answer.append_transcript(&transcript);
                    guard.state.interim_preview.clear();
                } else {
                    tracing::debug!(index, "Ignoring repeated final transcript");
                }
            }
            RecognitionEvent::Error(RecognitionFault::NoSpeech) => {
                tracing::debug!("No speech detected; still listening");
            }
            RecognitionEvent::Error(RecognitionFault::Aborted) => {
                tracing::debug!("Speech recognition aborted");
                guard.state = RecordingState::default();
                drop(guard);
                engine.unsubscribe();
                break;
            }
            RecognitionEvent::Error(fault) => {
                let err = fault.into_error();
                tracing::error!("Speech recognition error: {err}");
                notices.emit(err.class(), err.user_message());
                guard.state = RecordingState::default();
                drop(guard);
                engine.unsubscribe();
                break;
            }
            RecognitionEvent::Ended => {
                // The engine timed out or was cycled by the ticker; keep the
                // preview and begin a fresh pass without surfacing anything.
                // The lock stays held until the new pass is running so that
                // a concurrent stop() always lands after it.
                guard.state.is_listening = false;
                guard.finalized.clear();
                if let Err(fault) = engine.start(&lang) {
                    let err = fault.into_error();
                    tracing::error!("Speech recognition failed to restart: {err}");
                    notices.emit(err.class(), err.user_message());
                    guard.state = RecordingState::default();
                    drop(guard);
                    engine.unsubscribe();
                    break;
                }
                tracing::debug!("Speech recognition pass restarted");
            }
        }
    }
}

async fn restart_ticker(
    engine: Arc<dyn RecognitionEngine>,
    inner: Arc<Mutex<Inner>>,
    period: Duration,
) {
    let mut ticker = tokio::time::interval_at(Instant::now() + period, period);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
    loop {
        ticker.tick().await;
        if !lock(&inner).state.is_recording {
            break;
        }
        tracing::debug!("Cycling speech recognition engine");
        engine.stop();
    }
}
