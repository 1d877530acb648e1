//! Hand-written platform doubles shared by the unit tests.

use crate::answer::lock;
use crate::camera::{DisplaySurface, MediaConstraints, MediaDevices, MediaFault, MediaStream};
use crate::speech_input::{RecognitionEngine, RecognitionEvent, RecognitionFault};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use async_trait::async_trait;
use tokio::sync::{Notify, mpsc};

/// Lets spawned tasks run until they block again.
pub async fn settle() {
    for _ in 0..16 {
        tokio::task::yield_now().await;
    }
}

/// A recognition engine driven by the test through `emit`.
///
/// A graceful `stop` ends the pass, like a browser engine does after
/// flushing its results.
#[derive(Default)]
pub struct FakeRecognizer {
    sink: Mutex<Option<mpsc::UnboundedSender<RecognitionEvent>>>,
    pub start_fault: Mutex<Option<RecognitionFault>>,
    /// When set, `start` does not report `Started` by itself.
    pub quiet_starts: AtomicBool,
    pub starts: AtomicUsize,
    pub stops: AtomicUsize,
    pub aborts: AtomicUsize,
    pub unsubscribes: AtomicUsize,
}

impl FakeRecognizer {
    pub fn emit(&self, event: RecognitionEvent) {
        if let Some(sink) = lock(&self.sink).as_ref() {
            let _ = sink.send(event);
        }
    }

    pub fn is_subscribed(&self) -> bool {
        lock(&self.sink).is_some()
    }
}

impl RecognitionEngine for FakeRecognizer {
    fn subscribe(&self, sink: mpsc::UnboundedSender<RecognitionEvent>) {
        *lock(&self.sink) = Some(sink);
    }

    fn unsubscribe(&self) {
        self.unsubscribes.fetch_add(1, Ordering::SeqCst);
        *lock(&self.sink) = None;
    }

    fn start(&self, _lang: &str) -> Result<(), RecognitionFault> {
        if let Some(fault) = lock(&self.start_fault).take() {
            return Err(fault);
        }
        self.starts.fetch_add(1, Ordering::SeqCst);
        if !self.quiet_starts.load(Ordering::SeqCst) {
            self.emit(RecognitionEvent::Started);
        }
        Ok(())
    }

    fn stop(&self) {
        self.stops.fetch_add(1, Ordering::SeqCst);
        self.emit(RecognitionEvent::Ended);
    }

    fn abort(&self) {
        self.aborts.fetch_add(1, Ordering::SeqCst);
        self.emit(RecognitionEvent::Error(RecognitionFault::Aborted));
        self.emit(RecognitionEvent::Ended);
    }
}

/// Records how often its tracks were stopped.
pub struct FakeStream {
    id: String,
    pub stops: AtomicUsize,
}

impl FakeStream {
    pub fn new(id: &str) -> Self {
        Self {
            id: id.to_string(),
            stops: AtomicUsize::new(0),
        }
    }

    /// An owned stream that reports back to this fake.
    pub fn handle(self: &Arc<Self>) -> SharedStream {
        SharedStream(Arc::clone(self))
    }
}

pub struct SharedStream(Arc<FakeStream>);

impl MediaStream for SharedStream {
    fn id(&self) -> String {
        self.0.id.clone()
    }

    fn stop_tracks(&self) {
        self.0.stops.fetch_add(1, Ordering::SeqCst);
    }
}

/// Media devices whose capture request stays pending until `gate` is notified,
/// like a permission prompt left open.
pub struct GatedDevices {
    pub gate: Notify,
    stream: Arc<FakeStream>,
}

impl GatedDevices {
    pub fn new(stream: Arc<FakeStream>) -> Self {
        Self {
            gate: Notify::new(),
            stream,
        }
    }
}

#[async_trait]
impl MediaDevices for GatedDevices {
    async fn get_user_media(
        &self,
        _constraints: MediaConstraints,
    ) -> Result<Box<dyn MediaStream>, MediaFault> {
        self.gate.notified().await;
        Ok(Box::new(self.stream.handle()))
    }
}

#[derive(Default)]
pub struct FakeSurface {
    bound: Mutex<Option<String>>,
}

impl FakeSurface {
    pub fn attached(&self) -> Option<String> {
        lock(&self.bound).clone()
    }
}

impl DisplaySurface for FakeSurface {
    fn attach(&self, stream: &dyn MediaStream) {
        *lock(&self.bound) = Some(stream.id());
    }

    fn detach(&self) {
        *lock(&self.bound) = None;
    }
}
