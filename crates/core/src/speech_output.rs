use crate::answer::lock;
use crate::capability::Capability;
use crate::notice::{FailureClass, NoticeSink};
#[cfg(test)]
use mockall::automock;
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::sync::oneshot;
use tokio::task::JoinHandle;

#[derive(Debug, Clone, PartialEq)]
pub struct Utterance {
    pub text: String,
    pub lang: String,
    pub rate: f32,
    pub pitch: f32,
}

/// How a narration ended.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum UtteranceOutcome {
    Completed,
    Cancelled,
    Failed(String),
}

/// A text-to-speech engine that narrates one utterance at a time.
#[cfg_attr(test, automock)]
pub trait SynthesisEngine: Send + Sync {
    /// Begins narrating. `done` receives the outcome when narration ends;
    /// dropping it unsent counts as cancellation.
    fn speak(&self, utterance: Utterance, done: oneshot::Sender<UtteranceOutcome>);
    /// Cancels whatever is being narrated.
    fn cancel(&self);
}

#[derive(Debug, Clone)]
pub struct NarrationConfig {
    pub lang: String,
    pub rate: f32,
    pub pitch: f32,
    /// Pause between a question being displayed and its narration.
    pub delay: Duration,
    pub auto_narrate: bool,
}

impl Default for NarrationConfig {
    fn default() -> Self {
        Self {
            lang: "en-US".to_string(),
            rate: 0.9,
            pitch: 1.0,
            delay: Duration::from_millis(500),
            auto_narrate: true,
        }
    }
}

#[derive(Default)]
struct OutputState {
    narrating: bool,
    // Bumped on every speak/stop so that a stale completion cannot clear
    // the flag of a newer utterance.
    generation: u64,
    watcher: Option<JoinHandle<()>>,
    pending: Option<JoinHandle<()>>,
}

struct Shared {
    engine: Capability<Arc<dyn SynthesisEngine>>,
    config: NarrationConfig,
    notices: NoticeSink,
    state: Mutex<OutputState>,
}

impl Shared {
    fn speak(self: &Arc<Self>, text: &str) {
        let Some(engine) = self.engine.as_available() else {
            tracing::debug!("Speech output unavailable; not narrating");
            return;
        };

        let mut state = lock(&self.state);
        if state.narrating {
            engine.cancel();
        }
        if let Some(watcher) = state.watcher.take() {
            watcher.abort();
        }
        state.generation += 1;
        state.narrating = true;
        let generation = state.generation;

        let (done_tx, done_rx) = oneshot::channel();
        engine.speak(
            Utterance {
                text: text.to_string(),
                lang: self.config.lang.clone(),
                rate: self.config.rate,
                pitch: self.config.pitch,
            },
            done_tx,
        );
        tracing::debug!(generation, "Narration started");

        let shared = Arc::clone(self);
        state.watcher = Some(tokio::spawn(async move {
            let outcome = done_rx.await.unwrap_or(UtteranceOutcome::Cancelled);
            {
                let mut state = lock(&shared.state);
                if state.generation == generation {
                    state.narrating = false;
                }
            }
            match outcome {
                UtteranceOutcome::Completed => tracing::debug!(generation, "Narration finished"),
                UtteranceOutcome::Cancelled => tracing::debug!(generation, "Narration cancelled"),
                UtteranceOutcome::Failed(reason) => {
                    tracing::error!("Narration failed: {reason}");
                    shared.notices.emit(
                        FailureClass::CapabilityUnavailable,
                        "The question could not be read aloud.",
                    );
                }
            }
        }));
    }

    fn cancel_pending(&self) {
        if let Some(pending) = lock(&self.state).pending.take() {
            pending.abort();
        }
    }
}

/// Narrates questions through the platform's speech synthesis engine.
pub struct SpeechOutputAdapter {
    shared: Arc<Shared>,
}

impl SpeechOutputAdapter {
    pub fn new(
        engine: Capability<Arc<dyn SynthesisEngine>>,
        config: NarrationConfig,
        notices: NoticeSink,
    ) -> Self {
        Self {
            shared: Arc::new(Shared {
                engine,
                config,
                notices,
                state: Mutex::new(OutputState::default()),
            }),
        }
    }

    pub fn is_available(&self) -> bool {
        self.shared.engine.is_available()
    }

    pub fn is_narrating(&self) -> bool {
        lock(&self.shared.state).narrating
    }

    /// Narrates `text` now, preempting any narration in progress.
    pub fn speak(&self, text: &str) {
        self.shared.cancel_pending();
        self.shared.speak(text);
    }

    /// Narrates `text` after the configured delay, if auto-narration is on.
    /// A later call replaces an announcement that has not started yet.
    pub fn announce(&self, text: &str) {
        if !self.shared.config.auto_narrate || !self.is_available() {
            return;
        }
        self.shared.cancel_pending();

        let shared = Arc::clone(&self.shared);
        let text = text.to_string();
        let delay = self.shared.config.delay;
        let pending = tokio::spawn(async move {
            tokio::time::sleep(delay).await;
            shared.speak(&text);
        });
        lock(&self.shared.state).pending = Some(pending);
    }

    /// Cancels pending and active narration. Safe to call when silent.
    pub fn stop(&self) {
        self.shared.cancel_pending();

        let mut state = lock(&self.shared.state);
        if let Some(watcher) = state.watcher.take() {
            watcher.abort();
        }
        state.generation += 1;
        if !state.narrating {
            return;
        }
        state.narrating = false;
        if let Some(engine) = self.shared.engine.as_available() {
            engine.cancel();
        }
        tracing::debug!("Narration stopped");
    }
}

impl Drop for SpeechOutputAdapter {
    fn drop(&mut self) {
        self.stop();
    }
}
