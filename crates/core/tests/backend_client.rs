use axum::{
    Json, Router,
    http::{HeaderMap, StatusCode},
    routing::{get, post},
};
use interview_core::backend::{BackendClient, BackendConfig, BackendError, InterviewBackend};
use serde_json::{Value, json};

/// Serves `app` on an ephemeral local port and returns a client pointed at it.
async fn client_for(app: Router) -> BackendClient {
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });
    BackendClient::new(BackendConfig {
        base_url: format!("http://{addr}"),
    })
}

#[tokio::test]
async fn start_interview_reads_the_first_question() {
    let app = Router::new().route(
        "/api/start-interview",
        post(|headers: HeaderMap| async move {
            assert_eq!(headers["content-type"], "application/json");
            Json(json!({
                "status": "success",
                "question": "What is overfitting?",
                "round_number": 1
            }))
        }),
    );
    let client = client_for(app).await;

    let response = client.start_interview().await.unwrap();

    assert_eq!(response.question, "What is overfitting?");
    assert_eq!(response.round_number, 1);
}

#[tokio::test]
async fn submit_answer_posts_the_answer_body() {
    let app = Router::new().route(
        "/api/submit-answer",
        post(|Json(body): Json<Value>| async move {
            assert_eq!(body, json!({ "answer": "Memorising noise." }));
            Json(json!({
                "status": "success",
                "score": 4,
                "feedback": "Good intuition.",
                "next_question": "How do you prevent it?",
                "round_number": 2,
                "total_score": 4,
                "average_score": 4.0
            }))
        }),
    );
    let client = client_for(app).await;

    let response = client.submit_answer("Memorising noise.").await.unwrap();

    assert_eq!(response.score, 4);
    assert_eq!(response.next_question, "How do you prevent it?");
    assert_eq!(response.round_number, 2);
    assert_eq!(response.average_score, 4.0);
}

#[tokio::test]
async fn server_errors_carry_the_backend_message() {
    let app = Router::new().route(
        "/api/submit-answer",
        post(|| async {
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                Json(json!({ "error": "model quota exceeded" })),
            )
        }),
    );
    let client = client_for(app).await;

    match client.submit_answer("anything").await {
        Err(BackendError::Http { status, message }) => {
            assert_eq!(status, 500);
            assert_eq!(message, "model quota exceeded");
        }
        other => panic!("expected an HTTP error, got {other:?}"),
    }
}

#[tokio::test]
async fn non_success_status_is_a_rejection() {
    let app = Router::new().route(
        "/api/start-interview",
        post(|| async { Json(json!({ "status": "error", "message": "busy" })) }),
    );
    let client = client_for(app).await;

    match client.start_interview().await {
        Err(BackendError::Rejected { status, message }) => {
            assert_eq!(status, "error");
            assert_eq!(message.as_deref(), Some("busy"));
        }
        other => panic!("expected a rejection, got {other:?}"),
    }
}

#[tokio::test]
async fn end_interview_returns_final_stats() {
    let app = Router::new().route(
        "/api/end-interview",
        post(|| async {
            Json(json!({
                "status": "Interview completed",
                "final_stats": {
                    "total_rounds": 1,
                    "total_score": 3,
                    "average_score": 3.0,
                    "history": [{
                        "question": "Q1",
                        "answer": "A1",
                        "score": 3,
                        "feedback": "Fine."
                    }]
                }
            }))
        }),
    );
    let client = client_for(app).await;

    let response = client.end_interview().await.unwrap();

    assert_eq!(response.status.as_deref(), Some("Interview completed"));
    let stats = response.final_stats.unwrap();
    assert_eq!(stats.total_rounds, 1);
    assert_eq!(stats.history[0].answer, "A1");
}

#[tokio::test]
async fn interview_status_is_fetched_with_get() {
    let app = Router::new().route(
        "/api/interview-status",
        get(|| async {
            Json(json!({
                "current_question": "Q2",
                "round_number": 2,
                "total_score": 5,
                "history": []
            }))
        }),
    );
    let client = client_for(app).await;

    let status = client.interview_status().await.unwrap();

    assert_eq!(status.current_question.as_deref(), Some("Q2"));
    assert_eq!(status.round_number, 2);
    assert_eq!(status.total_score, 5.0);
}

#[tokio::test]
async fn unreachable_backend_is_a_transport_error() {
    let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
    let addr = listener.local_addr().unwrap();
    drop(listener);
    let client = BackendClient::new(BackendConfig {
        base_url: format!("http://{addr}"),
    });

    assert!(matches!(
        client.start_interview().await,
        Err(BackendError::Transport(_))
    ));
}
