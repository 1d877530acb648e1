pub mod answer;
pub mod backend;
pub mod camera;
pub mod capability;
pub mod error;
pub mod notice;
pub mod session_state;
pub mod speech_input;
pub mod speech_output;

#[cfg(test)]
mod testing;

pub use answer::AnswerBuffer;
pub use backend::{BackendClient, BackendConfig, BackendError, InterviewBackend};
pub use capability::{CapabilityProvider, CapabilityRecord, Platform, detect};
pub use error::{CameraError, SessionError, SpeechError};
pub use notice::{FailureClass, Notice, NoticeSink};
pub use session_state::{
    Controls, ControllerOptions, InterviewController, InterviewSession, InterviewSummary,
    RoundResult, ScoreGrade, SessionState, Turn,
};
