use crate::session_state::Turn;
use async_trait::async_trait;
#[cfg(test)]
use mockall::automock;
use reqwest::Client;
use reqwest::header::CONTENT_TYPE;
use serde::{Deserialize, Deserializer};
use serde_json::Value;

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct StartInterviewResponse {
    pub question: String,
    pub round_number: u32,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct SubmitAnswerResponse {
    #[serde(deserialize_with = "deserialize_score")]
    pub score: u8,
    pub feedback: String,
    pub next_question: String,
    pub round_number: u32,
    pub total_score: f64,
    pub average_score: f64,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct FinalStats {
    pub total_rounds: i64,
    pub total_score: f64,
    pub average_score: f64,
    #[serde(default)]
    pub history: Vec<Turn>,
}

/// The end-of-interview reply. Its status text is informational only.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct EndInterviewResponse {
    #[serde(default)]
    pub status: Option<String>,
    #[serde(default)]
    pub final_stats: Option<FinalStats>,
}

/// The backend's own view of the interview, for polling.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct InterviewStatus {
    pub current_question: Option<String>,
    pub round_number: u32,
    pub total_score: f64,
    #[serde(default)]
    pub history: Vec<Turn>,
}

#[derive(Debug, thiserror::Error)]
pub enum BackendError {
    #[error("could not reach the interview backend: {0}")]
    Transport(#[from] reqwest::Error),
    #[error("the interview backend answered HTTP {status}: {message}")]
    Http { status: u16, message: String },
    #[error("the interview backend reported status '{status}'")]
    Rejected {
        status: String,
        message: Option<String>,
    },
    #[error("unexpected response from the interview backend: {0}")]
    Decode(#[from] serde_json::Error),
}

/// Accepts any JSON number for a score and clamps it into 0..=5.
pub(crate) fn deserialize_score<'de, D>(deserializer: D) -> Result<u8, D::Error>
where
    D: Deserializer<'de>,
{
    let raw = f64::deserialize(deserializer)?;
    let clamped = raw.round().clamp(0.0, 5.0);
    if clamped != raw {
        tracing::warn!(raw, "Backend score outside 0..=5 or fractional; clamped");
    }
    Ok(clamped as u8)
}

// The interview backend generates questions, scores answers and keeps the
// running totals. The controller only ever talks to it through this trait,
// so tests substitute `MockInterviewBackend` for the HTTP client.
#[cfg_attr(test, automock)]
#[async_trait]
pub trait InterviewBackend: Send + Sync {
    async fn start_interview(&self) -> Result<StartInterviewResponse, BackendError>;

    async fn submit_answer(&self, answer: &str) -> Result<SubmitAnswerResponse, BackendError>;

    async fn end_interview(&self) -> Result<EndInterviewResponse, BackendError>;

    async fn interview_status(&self) -> Result<InterviewStatus, BackendError>;
}

#[derive(Debug, Clone)]
pub struct BackendConfig {
    /// Scheme, host and optional path prefix; `/api/...` is appended.
    pub base_url: String,
}

impl Default for BackendConfig {
    fn default() -> Self {
        Self {
            base_url: "http://127.0.0.1:5000".to_string(),
        }
    }
}

#[derive(Debug, Clone)]
struct Endpoints {
    start: String,
    submit: String,
    end: String,
    status: String,
}

impl Endpoints {
    fn new(base_url: &str) -> Self {
        let base = base_url.trim_end_matches('/');
        Self {
            start: format!("{base}/api/start-interview"),
            submit: format!("{base}/api/submit-answer"),
            end: format!("{base}/api/end-interview"),
            status: format!("{base}/api/interview-status"),
        }
    }
}

/// `InterviewBackend` over plain HTTP with JSON bodies.
///
/// No request timeout is set: a hung backend keeps the call pending.
pub struct BackendClient {
    client: Client,
    endpoints: Endpoints,
}

impl BackendClient {
    pub fn new(config: BackendConfig) -> Self {
        Self {
            client: Client::new(),
            endpoints: Endpoints::new(&config.base_url),
        }
    }

    async fn post(&self, url: &str, body: Option<Value>) -> Result<Value, BackendError> {
        tracing::debug!(url, "POST");
        let request = self.client.post(url);
        let request = match body {
            Some(body) => request.json(&body),
            None => request.header(CONTENT_TYPE, "application/json"),
        };
        Self::read_json(request.send().await?).await
    }

    async fn read_json(response: reqwest::Response) -> Result<Value, BackendError> {
        let status = response.status();
        let body = response.text().await?;
        if !status.is_success() {
            let message = serde_json::from_str::<Value>(&body)
                .ok()
                .and_then(|value| value.get("error").and_then(Value::as_str).map(str::to_string))
                .unwrap_or(body);
            return Err(BackendError::Http {
                status: status.as_u16(),
                message,
            });
        }
        Ok(serde_json::from_str(&body)?)
    }

    fn require_success(value: &Value) -> Result<(), BackendError> {
        match value.get("status").and_then(Value::as_str) {
            Some("success") => Ok(()),
            other => Err(BackendError::Rejected {
                status: other.unwrap_or("missing").to_string(),
                message: value
                    .get("error")
                    .or_else(|| value.get("message"))
                    .and_then(Value::as_str)
                    .map(str::to_string),
            }),
        }
    }
}

#[async_trait]
impl InterviewBackend for BackendClient {
    async fn start_interview(&self) -> Result<StartInterviewResponse, BackendError> {
        let value = self.post(&self.endpoints.start, None).await?;
        Self::require_success(&value)?;
        Ok(serde_json::from_value(value)?)
    }

    async fn submit_answer(&self, answer: &str) -> Result<SubmitAnswerResponse, BackendError> {
        let body = serde_json::json!({ "answer": answer });
        let value = self.post(&self.endpoints.submit, Some(body)).await?;
        Self::require_success(&value)?;
        Ok(serde_json::from_value(value)?)
    }

    async fn end_interview(&self) -> Result<EndInterviewResponse, BackendError> {
        let value = self.post(&self.endpoints.end, None).await?;
        tracing::info!(status = ?value.get("status"), "Interview ended on the backend");
        Ok(serde_json::from_value(value)?)
    }

    async fn interview_status(&self) -> Result<InterviewStatus, BackendError> {
        tracing::debug!(url = %self.endpoints.status, "GET");
        let response = self.client.get(&self.endpoints.status).send().await?;
        let value = Self::read_json(response).await?;
        Ok(serde_json::from_value(value)?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn endpoints_tolerate_a_trailing_slash() {
        let endpoints = Endpoints::new("https://interview.example.com/");
        assert_eq!(
            endpoints.start,
            "https://interview.example.com/api/start-interview"
        );
        assert_eq!(
            endpoints.status,
            "https://interview.example.com/api/interview-status"
        );
    }

    #[test]
    fn scores_are_clamped_into_range() {
        let json = |score: &str| {
            format!(
                r#"{{"score": {score}, "feedback": "", "next_question": "", "round_number": 2,
                    "total_score": 0, "average_score": 0}}"#
            )
        };
        let parse = |score: &str| {
            serde_json::from_str::<SubmitAnswerResponse>(&json(score))
                .unwrap()
                .score
        };

        assert_eq!(parse("4"), 4);
        assert_eq!(parse("3.6"), 4);
        assert_eq!(parse("9"), 5);
        assert_eq!(parse("-1"), 0);
    }

    #[test]
    fn non_success_status_is_rejected_with_its_message() {
        let value = serde_json::json!({ "status": "error", "error": "No active interview session" });
        match BackendClient::require_success(&value) {
            Err(BackendError::Rejected { status, message }) => {
                assert_eq!(status, "error");
                assert_eq!(message.as_deref(), Some("No active interview session"));
            }
            other => panic!("expected a rejection, got {other:?}"),
        }

        let missing = serde_json::json!({ "question": "Q1" });
        assert!(matches!(
            BackendClient::require_success(&missing),
            Err(BackendError::Rejected { status, .. }) if status == "missing"
        ));
    }
}
