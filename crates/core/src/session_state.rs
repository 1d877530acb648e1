use crate::answer::{AnswerBuffer, lock};
use crate::backend::{
    BackendError, EndInterviewResponse, InterviewBackend, InterviewStatus, StartInterviewResponse,
    SubmitAnswerResponse, deserialize_score,
};
use crate::camera::{CameraAdapter, CameraState, DisplaySurface};
use crate::capability::{CapabilityRecord, Platform};
use crate::error::{CameraError, SessionError, SpeechError};
use crate::notice::{FailureClass, NoticeSink};
use crate::speech_input::{RecognitionConfig, RecordingState, SpeechInputAdapter};
use crate::speech_output::{NarrationConfig, SpeechOutputAdapter};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::sync::Mutex;
use std::sync::atomic::{AtomicBool, Ordering};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    NotStarted,
    Answering,
    ShowingResult,
    Ended,
}

/// One answered question. Appended only when the backend accepts a submission.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Turn {
    pub question: String,
    pub answer: String,
    #[serde(deserialize_with = "deserialize_score")]
    pub score: u8,
    pub feedback: String,
}

impl Turn {
    /// The question cut to `max_chars` characters, with an ellipsis if cut.
    pub fn question_preview(&self, max_chars: usize) -> String {
        match self.question.char_indices().nth(max_chars) {
            Some((cut, _)) => format!("{}...", &self.question[..cut]),
            None => self.question.clone(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScoreGrade {
    Excellent,
    Good,
    Fair,
    NeedsImprovement,
}

impl ScoreGrade {
    pub fn from_score(score: u8) -> Self {
        match score {
            4.. => ScoreGrade::Excellent,
            3 => ScoreGrade::Good,
            2 => ScoreGrade::Fair,
            _ => ScoreGrade::NeedsImprovement,
        }
    }

    pub fn label(self) -> &'static str {
        match self {
            ScoreGrade::Excellent => "Excellent",
            ScoreGrade::Good => "Good",
            ScoreGrade::Fair => "Fair",
            ScoreGrade::NeedsImprovement => "Needs Improvement",
        }
    }
}

/// The score and feedback shown between submitting and continuing.
#[derive(Debug, Clone, PartialEq)]
pub struct RoundResult {
    pub score: u8,
    pub feedback: String,
}

#[derive(Debug, Clone, PartialEq)]
pub struct InterviewSession {
    pub state: SessionState,
    /// 1 for the first unanswered question; 0 before the interview starts.
    pub round_number: u32,
    pub current_question: String,
    pub total_score: f64,
    pub average_score: f64,
    pub history: Vec<Turn>,
    pub last_result: Option<RoundResult>,
}

impl Default for InterviewSession {
    fn default() -> Self {
        Self {
            state: SessionState::NotStarted,
            round_number: 0,
            current_question: String::new(),
            total_score: 0.0,
            average_score: 0.0,
            history: Vec::new(),
            last_result: None,
        }
    }
}

impl InterviewSession {
    fn begin(&mut self, response: StartInterviewResponse) {
        *self = Self {
            state: SessionState::Answering,
            round_number: response.round_number,
            current_question: response.question,
            ..Self::default()
        };
    }

    fn record(&mut self, answer: String, response: SubmitAnswerResponse) -> RoundResult {
        let question = std::mem::replace(&mut self.current_question, response.next_question);
        self.history.push(Turn {
            question,
            answer,
            score: response.score,
            feedback: response.feedback.clone(),
        });
        if response.round_number as usize != self.history.len() + 1 {
            tracing::warn!(
                backend_round = response.round_number,
                answered = self.history.len(),
                "Backend round number disagrees with the local history"
            );
        }
        self.round_number = response.round_number;
        self.total_score = response.total_score;
        self.average_score = response.average_score;

        let result = RoundResult {
            score: response.score,
            feedback: response.feedback,
        };
        self.last_result = Some(result.clone());
        self.state = SessionState::ShowingResult;
        result
    }

    fn summary(&self) -> InterviewSummary {
        InterviewSummary {
            total_rounds: self.history.len() as u32,
            total_score: self.total_score,
            average_score: self.average_score,
            history: self.history.clone(),
        }
    }
}

/// Final statistics handed back when an interview ends.
#[derive(Debug, Clone, PartialEq)]
pub struct InterviewSummary {
    pub total_rounds: u32,
    pub total_score: f64,
    pub average_score: f64,
    pub history: Vec<Turn>,
}

/// Which actions are enabled right now, and which optional controls exist
/// on this host at all.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Controls {
    pub start: bool,
    pub submit: bool,
    pub end: bool,
    pub proceed: bool,
    pub edit_answer: bool,
    pub microphone: bool,
    pub camera: bool,
    pub narration: bool,
}

/// Tunables for the adapters the controller owns.
#[derive(Debug, Clone, Default)]
pub struct ControllerOptions {
    pub recognition: RecognitionConfig,
    pub narration: NarrationConfig,
}

/// Clears the loading flag however the guarded call exits.
struct LoadingGuard<'a>(&'a AtomicBool);

impl<'a> LoadingGuard<'a> {
    fn acquire(flag: &'a AtomicBool) -> Result<Self, SessionError> {
        flag.compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .map(|_| Self(flag))
            .map_err(|_| SessionError::Busy)
    }
}

impl Drop for LoadingGuard<'_> {
    fn drop(&mut self) {
        self.0.store(false, Ordering::Release);
    }
}

/// Drives the interview: owns the session state, the answer buffer and the
/// three platform adapters, and funnels every backend call through a single
/// loading flag so that requests never overlap.
pub struct InterviewController<B: InterviewBackend> {
    backend: B,
    capabilities: CapabilityRecord,
    session: Mutex<InterviewSession>,
    answer: AnswerBuffer,
    loading: AtomicBool,
    speech_input: SpeechInputAdapter,
    speech_output: SpeechOutputAdapter,
    camera: CameraAdapter,
    notices: NoticeSink,
}

impl<B: InterviewBackend> InterviewController<B> {
    pub fn new(
        backend: B,
        platform: Platform,
        options: ControllerOptions,
        notices: NoticeSink,
    ) -> Self {
        let answer = AnswerBuffer::new();
        let speech_input = SpeechInputAdapter::new(
            platform.recognition,
            options.recognition,
            answer.clone(),
            notices.clone(),
        );
        let speech_output =
            SpeechOutputAdapter::new(platform.synthesis, options.narration, notices.clone());
        let camera = CameraAdapter::new(platform.media, notices.clone());

        Self {
            backend,
            capabilities: platform.record,
            session: Mutex::new(InterviewSession::default()),
            answer,
            loading: AtomicBool::new(false),
            speech_input,
            speech_output,
            camera,
            notices,
        }
    }

    pub fn capabilities(&self) -> &CapabilityRecord {
        &self.capabilities
    }

    pub fn snapshot(&self) -> InterviewSession {
        lock(&self.session).clone()
    }

    pub fn state(&self) -> SessionState {
        lock(&self.session).state
    }

    pub fn is_loading(&self) -> bool {
        self.loading.load(Ordering::Acquire)
    }

    pub fn controls(&self) -> Controls {
        let state = self.state();
        let idle = !self.is_loading();
        let answering = state == SessionState::Answering;
        Controls {
            start: idle && state == SessionState::NotStarted,
            submit: idle && answering && !self.answer.is_blank(),
            end: idle && matches!(state, SessionState::Answering | SessionState::ShowingResult),
            proceed: state == SessionState::ShowingResult,
            edit_answer: idle && answering,
            microphone: self.capabilities.speech_input_available,
            camera: self.capabilities.camera_available,
            narration: self.capabilities.speech_output_available,
        }
    }

    // --- Answer buffer ---

    pub fn edit_answer(&self, text: impl Into<String>) {
        self.answer.set(text);
    }

    pub fn answer(&self) -> String {
        self.answer.snapshot()
    }

    // --- Interview transitions ---

    /// `NotStarted -> Answering`.
    pub async fn start(&self) -> Result<(), SessionError> {
        self.expect_state("start", SessionState::NotStarted)?;
        let _loading = LoadingGuard::acquire(&self.loading)?;

        let response = match self.backend.start_interview().await {
            Ok(response) => response,
            Err(err) => {
                return Err(self.fail(
                    "Failed to start interview. Make sure the backend server is running.",
                    err,
                ));
            }
        };

        let question = response.question.clone();
        lock(&self.session).begin(response);
        self.answer.clear();
        tracing::info!("Interview started");
        self.speech_output.announce(&question);
        Ok(())
    }

    /// `Answering -> ShowingResult`, submitting the answer buffer.
    pub async fn submit(&self) -> Result<RoundResult, SessionError> {
        self.expect_state("submit", SessionState::Answering)?;
        if self.answer.is_blank() {
            let err = SessionError::EmptyAnswer;
            self.notices
                .emit(err.class(), "Please provide an answer before submitting.");
            return Err(err);
        }
        let _loading = LoadingGuard::acquire(&self.loading)?;

        self.speech_input.stop();
        let answer = self.answer.snapshot();

        let response = match self.backend.submit_answer(&answer).await {
            Ok(response) => response,
            Err(err) => return Err(self.fail("Failed to submit answer. Please try again.", err)),
        };

        let result = lock(&self.session).record(answer, response);
        self.answer.clear();
        tracing::info!(score = result.score, "Answer scored");
        Ok(result)
    }

    /// `ShowingResult -> Answering`, revealing the question the submit delivered.
    pub fn continue_interview(&self) -> Result<(), SessionError> {
        let question = {
            let mut session = lock(&self.session);
            if session.state != SessionState::ShowingResult {
                return Err(SessionError::InvalidState {
                    action: "continue",
                    state: session.state,
                });
            }
            session.state = SessionState::Answering;
            session.last_result = None;
            session.current_question.clone()
        };
        self.speech_output.announce(&question);
        Ok(())
    }

    /// `* -> Ended -> NotStarted`.
    ///
    /// Recording, narration and the camera are released before anything
    /// else, whatever the outcome of the backend call.
    pub async fn end(&self) -> Result<InterviewSummary, SessionError> {
        self.release_media();
        let _loading = LoadingGuard::acquire(&self.loading)?;

        let previous = {
            let mut session = lock(&self.session);
            std::mem::replace(&mut session.state, SessionState::Ended)
        };

        let response = match self.backend.end_interview().await {
            Ok(response) => response,
            Err(err) => {
                lock(&self.session).state = previous;
                return Err(self.fail("Failed to end the interview.", err));
            }
        };

        let local = std::mem::take(&mut *lock(&self.session)).summary();
        self.answer.clear();
        tracing::info!(rounds = local.total_rounds, "Interview ended");
        Ok(summary_from(response, local))
    }

    /// The backend's view of the interview. Never changes local state.
    pub async fn fetch_status(&self) -> Result<InterviewStatus, SessionError> {
        self.backend.interview_status().await.map_err(|err| {
            tracing::warn!("Failed to fetch interview status: {err}");
            SessionError::from(err)
        })
    }

    // --- Speech input ---

    pub fn recording_state(&self) -> RecordingState {
        self.speech_input.state()
    }

    pub fn start_recording(&self) -> Result<(), SpeechError> {
        self.speech_input.start()
    }

    pub fn stop_recording(&self) {
        self.speech_input.stop();
    }

    pub fn toggle_recording(&self) -> Result<bool, SpeechError> {
        self.speech_input.toggle()
    }

    // --- Speech output ---

    pub fn is_narrating(&self) -> bool {
        self.speech_output.is_narrating()
    }

    /// Reads the current question aloud again.
    pub fn narrate_question(&self) {
        let question = lock(&self.session).current_question.clone();
        if !question.is_empty() {
            self.speech_output.speak(&question);
        }
    }

    pub fn stop_narration(&self) {
        self.speech_output.stop();
    }

    // --- Camera ---

    pub fn camera_state(&self) -> CameraState {
        self.camera.state()
    }

    pub fn set_display_surface(&self, surface: Arc<dyn DisplaySurface>) {
        self.camera.set_surface(surface);
    }

    /// Follows the camera checkbox. Turning the camera off also cancels a
    /// request still waiting on the platform.
    pub async fn set_camera(&self, enabled: bool) -> Result<CameraState, CameraError> {
        if enabled {
            self.camera.enable().await?;
        } else {
            self.camera.disable();
        }
        Ok(self.camera.state())
    }

    /// Releases every platform resource; used on teardown.
    pub fn shutdown(&self) {
        self.release_media();
        tracing::debug!("Interview controller shut down");
    }

    fn release_media(&self) {
        self.speech_input.stop();
        self.speech_output.stop();
        self.camera.disable();
    }

    fn expect_state(&self, action: &'static str, expected: SessionState) -> Result<(), SessionError> {
        let state = self.state();
        if state == expected {
            Ok(())
        } else {
            tracing::debug!(action, ?state, "Transition rejected");
            Err(SessionError::InvalidState { action, state })
        }
    }

    fn fail(&self, context: &str, err: BackendError) -> SessionError {
        tracing::error!("{context} {err}");
        let detail = match &err {
            BackendError::Rejected {
                message: Some(message),
                ..
            } => message.clone(),
            BackendError::Http { message, .. } => message.clone(),
            other => other.to_string(),
        };
        self.notices
            .emit(FailureClass::NetworkFailure, format!("{context} ({detail})"));
        SessionError::Backend(err)
    }
}

fn summary_from(response: EndInterviewResponse, local: InterviewSummary) -> InterviewSummary {
    match response.final_stats {
        Some(stats) => InterviewSummary {
            total_rounds: stats.total_rounds.max(0) as u32,
            total_score: stats.total_score,
            average_score: stats.average_score,
            history: if stats.history.is_empty() {
                local.history
            } else {
                stats.history
            },
        },
        None => local,
    }
}
