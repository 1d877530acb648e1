//! Error types raised at the adapter and controller boundaries.

use crate::backend::BackendError;
use crate::notice::FailureClass;
use crate::session_state::SessionState;

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum SpeechError {
    #[error("speech input is not available on this platform")]
    Unavailable,
    #[error("speech input is already recording")]
    AlreadyActive,
    #[error("microphone access was denied")]
    PermissionDenied,
    #[error("no microphone could be opened")]
    AudioCapture,
    #[error("the speech recognition service could not be reached")]
    Network,
    #[error("speech recognition failed: {0}")]
    Engine(String),
}

impl SpeechError {
    pub fn class(&self) -> FailureClass {
        match self {
            SpeechError::Unavailable => FailureClass::CapabilityUnavailable,
            SpeechError::AlreadyActive => FailureClass::InvalidInput,
            SpeechError::PermissionDenied => FailureClass::PermissionDenied,
            SpeechError::AudioCapture => FailureClass::DeviceUnavailable,
            SpeechError::Network | SpeechError::Engine(_) => FailureClass::NetworkFailure,
        }
    }

    pub fn user_message(&self) -> &'static str {
        match self {
            SpeechError::Unavailable => {
                "Speech input is not supported here. You can still type your answer."
            }
            SpeechError::AlreadyActive => "Speech input is already recording.",
            SpeechError::PermissionDenied => {
                "Microphone access was denied. Allow microphone access to answer by voice."
            }
            SpeechError::AudioCapture => "No microphone was found. Check that one is connected.",
            SpeechError::Network => {
                "Speech recognition needs a network connection. Please type your answer instead."
            }
            SpeechError::Engine(_) => "Speech recognition stopped unexpectedly.",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum CameraError {
    #[error("camera access was denied")]
    Denied,
    #[error("no camera was found")]
    NotFound,
    #[error("the camera is in use by another application")]
    InUse,
    #[error("camera capture is not supported on this platform")]
    Unsupported,
    #[error("the camera was turned off before capture began")]
    Cancelled,
}

impl CameraError {
    pub fn class(&self) -> FailureClass {
        match self {
            CameraError::Denied => FailureClass::PermissionDenied,
            CameraError::NotFound | CameraError::InUse => FailureClass::DeviceUnavailable,
            CameraError::Unsupported => FailureClass::CapabilityUnavailable,
            CameraError::Cancelled => FailureClass::DeviceUnavailable,
        }
    }

    pub fn user_message(&self) -> &'static str {
        match self {
            CameraError::Denied => {
                "Camera access was denied. Please allow camera access in your browser settings."
            }
            CameraError::NotFound => "No camera was found. Please connect a camera and try again.",
            CameraError::InUse => {
                "The camera is already in use by another application. Close it and try again."
            }
            CameraError::Unsupported => "Camera capture is not supported in this environment.",
            CameraError::Cancelled => "The camera was turned off before it started.",
        }
    }
}

#[derive(Debug, thiserror::Error)]
pub enum SessionError {
    #[error("please provide an answer before submitting")]
    EmptyAnswer,
    #[error("another request is still in progress")]
    Busy,
    #[error("cannot {action} while the interview is {state:?}")]
    InvalidState {
        action: &'static str,
        state: SessionState,
    },
    #[error(transparent)]
    Backend(#[from] BackendError),
}

impl SessionError {
    pub fn class(&self) -> FailureClass {
        match self {
            SessionError::Backend(_) => FailureClass::NetworkFailure,
            _ => FailureClass::InvalidInput,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn each_camera_error_has_a_distinct_message() {
        let all = [
            CameraError::Denied,
            CameraError::NotFound,
            CameraError::InUse,
            CameraError::Unsupported,
            CameraError::Cancelled,
        ];
        for (i, a) in all.iter().enumerate() {
            for b in &all[i + 1..] {
                assert_ne!(a.user_message(), b.user_message());
            }
        }
    }

    #[test]
    fn speech_errors_map_onto_failure_classes() {
        assert_eq!(
            SpeechError::PermissionDenied.class(),
            FailureClass::PermissionDenied
        );
        assert_eq!(
            SpeechError::AudioCapture.class(),
            FailureClass::DeviceUnavailable
        );
        assert_eq!(
            SpeechError::Unavailable.class(),
            FailureClass::CapabilityUnavailable
        );
        assert_eq!(SpeechError::Network.class(), FailureClass::NetworkFailure);
    }
}
