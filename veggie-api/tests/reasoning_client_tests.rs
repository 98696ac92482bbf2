//! Reasoning-service client tests against a local mock endpoint

mod helpers;

use axum::{
    extract::State,
    http::{HeaderMap, StatusCode},
    routing::post,
    Json, Router,
};
use chrono::Utc;
use helpers::{reasoning_config, spawn_server, unreachable_base_url};
use serde_json::{json, Value};
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};
use veggie_api::estimator::{
    fallback_estimate, AssessmentRequest, OpenAiReasoningClient, ReasoningError,
    ReasoningService, RipenessEstimation, RipenessEstimator,
};
use veggie_common::events::EventBus;
use veggie_common::models::{AmbientReading, EstimateSource, ProduceCategory};

/// What the mock endpoint saw and how it answers
#[derive(Clone)]
struct MockEndpoint {
    status: StatusCode,
    content: &'static str,
    delay: Duration,
    last_request: Arc<Mutex<Option<(HeaderMap, Value)>>>,
}

impl MockEndpoint {
    fn answering(content: &'static str) -> Self {
        Self {
            status: StatusCode::OK,
            content,
            delay: Duration::ZERO,
            last_request: Arc::new(Mutex::new(None)),
        }
    }
}

async fn chat_completions(
    State(mock): State<MockEndpoint>,
    headers: HeaderMap,
    Json(body): Json<Value>,
) -> (StatusCode, Json<Value>) {
    *mock.last_request.lock().unwrap() = Some((headers, body));
    tokio::time::sleep(mock.delay).await;

    if !mock.status.is_success() {
        return (mock.status, Json(json!({"error": {"message": "mock failure"}})));
    }

    (
        StatusCode::OK,
        Json(json!({
            "id": "chatcmpl-test",
            "object": "chat.completion",
            "choices": [{
                "index": 0,
                "message": {"role": "assistant", "content": mock.content},
                "finish_reason": "stop"
            }]
        })),
    )
}

/// Start the mock and return a client pointed at it
async fn client_for(mock: MockEndpoint, timeout: Duration) -> OpenAiReasoningClient {
    let router = Router::new()
        .route("/v1/chat/completions", post(chat_completions))
        .with_state(mock);
    let base_url = format!("{}/v1", spawn_server(router).await);
    OpenAiReasoningClient::new(&reasoning_config(&base_url, timeout)).unwrap()
}

fn request() -> AssessmentRequest {
    let reading = AmbientReading::new(25.0, 60.0, Utc::now()).unwrap();
    AssessmentRequest::new("unripe_mango", &reading)
}

#[tokio::test]
async fn test_request_shape() {
    let mock = MockEndpoint::answering(r#"{"category": "fruit", "ripes_in_days": 4, "spoils_in_days": 9}"#);
    let seen = mock.last_request.clone();
    let client = client_for(mock, Duration::from_secs(5)).await;

    let content = client.assess(&request()).await.unwrap();
    assert!(content.contains("ripes_in_days"));

    let (headers, body) = seen.lock().unwrap().clone().unwrap();
    assert_eq!(headers["authorization"], "Bearer sk-test");
    assert_eq!(body["model"], "gpt-3.5-turbo");
    assert_eq!(body["max_tokens"], 150);
    assert_eq!(body["response_format"]["type"], "json_object");

    let messages = body["messages"].as_array().unwrap();
    assert_eq!(messages[0]["role"], "system");
    assert_eq!(messages[1]["role"], "user");
    let prompt = messages[1]["content"].as_str().unwrap();
    assert!(prompt.contains("unripe_mango"));
    assert!(prompt.contains("25°C"));
    assert!(prompt.contains("60%"));
}

#[tokio::test]
async fn test_valid_answer_becomes_external_estimate() {
    let mock = MockEndpoint::answering(
        r#"{"category": "fruit", "ripes_in_days": 4, "spoils_in_days": 9, "rationale": "warm"}"#,
    );
    let client = client_for(mock, Duration::from_secs(5)).await;
    let estimator = RipenessEstimator::new(Arc::new(client), Duration::from_secs(5), EventBus::new(16));

    let reading = AmbientReading::new(25.0, 60.0, Utc::now()).unwrap();
    let result = estimator.estimate("unripe_mango", &reading).await;

    assert_eq!(result.source, EstimateSource::External);
    assert_eq!(result.estimate.category, ProduceCategory::Fruit);
    assert_eq!((result.estimate.ripes_in_days, result.estimate.spoils_in_days), (4, 9));
}

#[tokio::test]
async fn test_invalid_answer_uses_fallback() {
    let mock = MockEndpoint::answering(r#"{"category": "fungus", "ripes_in_days": -2, "spoils_in_days": 1}"#);
    let client = client_for(mock, Duration::from_secs(5)).await;
    let estimator = RipenessEstimator::new(Arc::new(client), Duration::from_secs(5), EventBus::new(16));

    let reading = AmbientReading::new(25.0, 60.0, Utc::now()).unwrap();
    let result = estimator.estimate("unripe_mango", &reading).await;

    assert_eq!(result.source, EstimateSource::Fallback);
    assert_eq!(result.estimate, fallback_estimate("unripe_mango"));
}

#[tokio::test]
async fn test_error_status_is_reported() {
    let mock = MockEndpoint {
        status: StatusCode::INTERNAL_SERVER_ERROR,
        ..MockEndpoint::answering("")
    };
    let client = client_for(mock, Duration::from_secs(5)).await;

    let err = client.assess(&request()).await.unwrap_err();
    assert!(matches!(err, ReasoningError::Api(500, _)), "{err:?}");
}

#[tokio::test]
async fn test_unauthorized_is_invalid_api_key() {
    let mock = MockEndpoint {
        status: StatusCode::UNAUTHORIZED,
        ..MockEndpoint::answering("")
    };
    let client = client_for(mock, Duration::from_secs(5)).await;

    let err = client.assess(&request()).await.unwrap_err();
    assert!(matches!(err, ReasoningError::InvalidApiKey), "{err:?}");
}

#[tokio::test]
async fn test_unreachable_endpoint_is_network_error() {
    let base_url = unreachable_base_url().await;
    let client =
        OpenAiReasoningClient::new(&reasoning_config(&base_url, Duration::from_secs(2))).unwrap();

    let err = client.assess(&request()).await.unwrap_err();
    assert!(matches!(err, ReasoningError::Network(_)), "{err:?}");
}

#[tokio::test]
async fn test_slow_endpoint_times_out_to_fallback() {
    let mock = MockEndpoint {
        delay: Duration::from_secs(3),
        ..MockEndpoint::answering(r#"{"category": "fruit", "ripes_in_days": 1, "spoils_in_days": 2}"#)
    };
    let client = client_for(mock, Duration::from_secs(10)).await;
    let estimator =
        RipenessEstimator::new(Arc::new(client), Duration::from_millis(300), EventBus::new(16));

    let reading = AmbientReading::new(25.0, 60.0, Utc::now()).unwrap();
    let started = Instant::now();
    let result = estimator.estimate("ripe_strawberry", &reading).await;

    assert_eq!(result.source, EstimateSource::Fallback);
    assert_eq!(result.estimate, fallback_estimate("ripe_strawberry"));
    assert!(started.elapsed() < Duration::from_secs(2));
}
