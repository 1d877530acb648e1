use crate::answer::lock;
use crate::capability::Capability;
use crate::error::CameraError;
use crate::notice::NoticeSink;
use async_trait::async_trait;
#[cfg(test)]
use mockall::automock;
use std::sync::{Arc, Mutex};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MediaConstraints {
    pub video: bool,
    pub audio: bool,
}

impl MediaConstraints {
    pub const VIDEO_ONLY: Self = Self {
        video: true,
        audio: false,
    };
}

/// A live capture stream. Its tracks keep the device busy until stopped.
pub trait MediaStream: Send + Sync {
    fn id(&self) -> String;
    fn stop_tracks(&self);
}

/// A capture failure as the platform reports it: an exception name and text.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MediaFault {
    pub name: String,
    pub message: String,
}

impl MediaFault {
    pub fn new(name: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            message: message.into(),
        }
    }
}

impl From<MediaFault> for CameraError {
    fn from(fault: MediaFault) -> Self {
        match fault.name.as_str() {
            "NotAllowedError" | "SecurityError" | "PermissionDeniedError" => CameraError::Denied,
            "NotFoundError" | "OverconstrainedError" | "DevicesNotFoundError" => {
                CameraError::NotFound
            }
            "NotReadableError" | "AbortError" | "TrackStartError" => CameraError::InUse,
            "NotSupportedError" | "TypeError" => CameraError::Unsupported,
            other => {
                tracing::warn!(name = other, message = %fault.message, "Unrecognised capture failure");
                CameraError::Unsupported
            }
        }
    }
}

#[cfg_attr(test, automock)]
#[async_trait]
pub trait MediaDevices: Send + Sync {
    async fn get_user_media(
        &self,
        constraints: MediaConstraints,
    ) -> Result<Box<dyn MediaStream>, MediaFault>;
}

/// Where the live preview is shown.
pub trait DisplaySurface: Send + Sync {
    fn attach(&self, stream: &dyn MediaStream);
    fn detach(&self);
}

/// Identifies the stream the adapter currently holds.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StreamHandle {
    pub id: String,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CameraState {
    pub enabled: bool,
    pub stream: Option<StreamHandle>,
}

#[derive(Default)]
struct CameraInner {
    surface: Option<Arc<dyn DisplaySurface>>,
    stream: Option<Box<dyn MediaStream>>,
    // Bumped by every disable, so a capture that resolves afterwards is
    // known to be stale.
    generation: u64,
}

impl CameraInner {
    fn bind(&self) -> Option<StreamHandle> {
        let stream = self.stream.as_ref()?;
        if let Some(surface) = &self.surface {
            surface.attach(stream.as_ref());
        }
        Some(StreamHandle { id: stream.id() })
    }
}

/// Owns at most one camera stream and keeps the display surface bound to it.
///
/// The lock is never held while a capture request is pending, so `disable`
/// does not wait on an open permission prompt.
pub struct CameraAdapter {
    devices: Capability<Arc<dyn MediaDevices>>,
    inner: Mutex<CameraInner>,
    notices: NoticeSink,
}

impl CameraAdapter {
    pub fn new(devices: Capability<Arc<dyn MediaDevices>>, notices: NoticeSink) -> Self {
        Self {
            devices,
            inner: Mutex::new(CameraInner::default()),
            notices,
        }
    }

    pub fn is_available(&self) -> bool {
        self.devices.is_available()
    }

    pub fn state(&self) -> CameraState {
        let inner = lock(&self.inner);
        CameraState {
            enabled: inner.stream.is_some(),
            stream: inner
                .stream
                .as_ref()
                .map(|stream| StreamHandle { id: stream.id() }),
        }
    }

    /// Sets the preview surface, binding it to the active stream if any.
    pub fn set_surface(&self, surface: Arc<dyn DisplaySurface>) {
        let mut inner = lock(&self.inner);
        if let Some(stream) = &inner.stream {
            surface.attach(stream.as_ref());
        }
        if let Some(previous) = inner.surface.replace(surface) {
            previous.detach();
        }
    }

    pub async fn enable(&self) -> Result<StreamHandle, CameraError> {
        let ticket = {
            let inner = lock(&self.inner);
            if let Some(handle) = inner.bind() {
                return Ok(handle);
            }
            inner.generation
        };

        let Some(devices) = self.devices.as_available() else {
            return Err(self.report(CameraError::Unsupported));
        };
        let stream = match devices.get_user_media(MediaConstraints::VIDEO_ONLY).await {
            Ok(stream) => stream,
            Err(fault) => {
                tracing::error!(name = %fault.name, "Error accessing camera: {}", fault.message);
                return Err(self.report(fault.into()));
            }
        };

        let mut inner = lock(&self.inner);
        if inner.generation != ticket {
            stream.stop_tracks();
            tracing::info!(stream = %stream.id(), "Camera disabled while the request was pending");
            return Err(CameraError::Cancelled);
        }
        if let Some(handle) = inner.bind() {
            // A concurrent enable won; keep its stream.
            stream.stop_tracks();
            return Ok(handle);
        }
        inner.stream = Some(stream);
        let handle = inner.bind().ok_or(CameraError::Cancelled)?;
        tracing::info!(stream = %handle.id, "Camera enabled");
        Ok(handle)
    }

    /// Stops every track and unbinds the surface. Safe with no active stream,
    /// and cancels a capture request still in flight.
    pub fn disable(&self) {
        let mut inner = lock(&self.inner);
        inner.generation += 1;
        let Some(stream) = inner.stream.take() else {
            return;
        };
        stream.stop_tracks();
        if let Some(surface) = &inner.surface {
            surface.detach();
        }
        tracing::info!(stream = %stream.id(), "Camera disabled");
    }

    fn report(&self, err: CameraError) -> CameraError {
        self.notices.emit(err.class(), err.user_message());
        err
    }
}

impl Drop for CameraAdapter {
    fn drop(&mut self) {
        self.disable();
    }
}
