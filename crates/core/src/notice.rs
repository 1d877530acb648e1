use tokio::sync::mpsc;

/// Coarse classification shared by every error the core can surface.
///
/// The presentation layer only needs to know how bad a failure is and which
/// feature it touches; the concrete error enums map onto these classes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FailureClass {
    /// The platform lacks the capability; the feature stays hidden.
    CapabilityUnavailable,
    /// The user (or a policy) refused access to a device.
    PermissionDenied,
    /// No usable camera/microphone hardware, or it is held elsewhere.
    DeviceUnavailable,
    /// A silence gap during recognition. Never surfaced to the user.
    TransientRecognitionGap,
    /// The backend was unreachable or answered with a failure.
    NetworkFailure,
    /// A request rejected locally before reaching the backend.
    InvalidInput,
}

/// A one-shot, user-visible message emitted by the controller or an adapter.
#[derive(Debug, Clone, PartialEq)]
pub struct Notice {
    pub class: FailureClass,
    pub message: String,
}

impl Notice {
    pub fn new(class: FailureClass, message: impl Into<String>) -> Self {
        Self {
            class,
            message: message.into(),
        }
    }
}

/// Sending half of the notice channel.
///
/// Cloned into every adapter so that failures raised on background tasks
/// (a recognition error, a narration failure) reach the same receiver as
/// failures raised by the controller itself.
#[derive(Debug, Clone)]
pub struct NoticeSink {
    tx: mpsc::UnboundedSender<Notice>,
}

impl NoticeSink {
    pub fn channel() -> (Self, mpsc::UnboundedReceiver<Notice>) {
        let (tx, rx) = mpsc::unbounded_channel();
        (Self { tx }, rx)
    }

    /// Logs the notice and forwards it to the presentation layer.
    pub fn publish(&self, notice: Notice) {
        tracing::warn!(class = ?notice.class, "{}", notice.message);
        if self.tx.send(notice).is_err() {
            tracing::debug!("Notice receiver dropped; notice was only logged.");
        }
    }

    pub fn emit(&self, class: FailureClass, message: impl Into<String>) {
        self.publish(Notice::new(class, message));
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn emitted_notices_reach_the_receiver_in_order() {
        let (sink, mut rx) = NoticeSink::channel();
        sink.emit(FailureClass::NetworkFailure, "first");
        sink.emit(FailureClass::PermissionDenied, "second");

        assert_eq!(rx.try_recv().unwrap().message, "first");
        let second = rx.try_recv().unwrap();
        assert_eq!(second.class, FailureClass::PermissionDenied);
        assert!(rx.try_recv().is_err());
    }

    #[test]
    fn publishing_without_a_receiver_does_not_panic() {
        let (sink, rx) = NoticeSink::channel();
        drop(rx);
        sink.emit(FailureClass::InvalidInput, "nobody is listening");
    }
}
