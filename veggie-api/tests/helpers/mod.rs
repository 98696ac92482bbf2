//! Test Helper Utilities
//!
//! Shared setup for veggie-api integration tests: an in-process router
//! with scripted collaborators, and multipart request building.

#![allow(dead_code)]

use async_trait::async_trait;
use axum::{body::Body, http::Request, Router};
use std::sync::Arc;
use std::time::Duration;
use tokio::net::TcpListener;
use tokio::sync::watch;
use veggie_api::cache::AmbientCache;
use veggie_api::classifier::{ClassificationError, ProduceClassifier};
use veggie_api::estimator::{OpenAiReasoningClient, ReasoningService, RipenessEstimator};
use veggie_api::orchestrator::AnalysisOrchestrator;
use veggie_api::telemetry::TelemetryIngest;
use veggie_api::AppState;
use veggie_common::config::ReasoningConfig;
use veggie_common::events::{EventBus, SubscriberState};
use veggie_common::models::ClassificationResult;

pub const BOUNDARY: &str = "veggie-test-boundary";

/// Classifier that always answers with the same label
pub struct FixedClassifier {
    pub label: &'static str,
    pub confidence: f64,
}

#[async_trait]
impl ProduceClassifier for FixedClassifier {
    fn name(&self) -> &'static str {
        "fixed"
    }

    async fn classify(&self, image: &[u8]) -> Result<ClassificationResult, ClassificationError> {
        if image.is_empty() {
            return Err(ClassificationError::UnreadableImage("empty upload".to_string()));
        }
        Ok(ClassificationResult::new(self.label, self.confidence))
    }
}

/// Running app plus handles to drive it
pub struct TestApp {
    pub router: Router,
    pub cache: AmbientCache,
    pub ingest: TelemetryIngest,
    pub event_bus: EventBus,
    pub subscriber_state: watch::Sender<SubscriberState>,
}

/// Build the router around the given classifier and reasoning service
pub fn create_test_app(
    classifier: Arc<dyn ProduceClassifier>,
    reasoning: Arc<dyn ReasoningService>,
    max_upload_bytes: usize,
) -> TestApp {
    let event_bus = EventBus::new(100);
    let cache = AmbientCache::new();
    let ingest = TelemetryIngest::new(cache.clone(), event_bus.clone());

    let estimator = RipenessEstimator::new(reasoning, Duration::from_secs(2), event_bus.clone());
    let orchestrator = AnalysisOrchestrator::new(
        classifier,
        cache.clone(),
        Arc::new(estimator),
        Duration::from_secs(2),
        event_bus.clone(),
    );

    let (state_tx, state_rx) = watch::channel(SubscriberState::Subscribed);
    let state = AppState::new(cache.clone(), Arc::new(orchestrator), event_bus.clone(), state_rx);

    TestApp {
        router: veggie_api::build_router(state, max_upload_bytes),
        cache,
        ingest,
        event_bus,
        subscriber_state: state_tx,
    }
}

/// Reasoning config pointing at `base_url`
pub fn reasoning_config(base_url: &str, timeout: Duration) -> ReasoningConfig {
    ReasoningConfig {
        api_key: "sk-test".to_string(),
        base_url: base_url.to_string(),
        model: "gpt-3.5-turbo".to_string(),
        timeout,
        temperature: 0.7,
        max_tokens: 150,
    }
}

/// Base URL on a local port nothing listens on
pub async fn unreachable_base_url() -> String {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    drop(listener);
    format!("http://{}/v1", addr)
}

/// Real client whose endpoint refuses connections
pub async fn unreachable_reasoning() -> Arc<dyn ReasoningService> {
    let base_url = unreachable_base_url().await;
    Arc::new(
        OpenAiReasoningClient::new(&reasoning_config(&base_url, Duration::from_secs(2))).unwrap(),
    )
}

/// Serve `router` on an ephemeral port, returning its base URL
pub async fn spawn_server(router: Router) -> String {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, router).await.unwrap();
    });
    format!("http://{}", addr)
}

/// Minimal PNG header followed by `extra`
pub fn png_bytes(extra: &[u8]) -> Vec<u8> {
    let mut bytes = vec![
        0x89, b'P', b'N', b'G', 0x0D, 0x0A, 0x1A, 0x0A, 0x00, 0x00, 0x00, 0x0D, b'I', b'H', b'D',
        b'R',
    ];
    bytes.extend_from_slice(extra);
    bytes
}

/// One multipart field
pub struct Part<'a> {
    pub name: &'a str,
    pub filename: Option<&'a str>,
    pub content: &'a [u8],
}

impl<'a> Part<'a> {
    pub fn file(name: &'a str, filename: &'a str, content: &'a [u8]) -> Self {
        Self {
            name,
            filename: Some(filename),
            content,
        }
    }

    pub fn text(name: &'a str, content: &'a str) -> Self {
        Self {
            name,
            filename: None,
            content: content.as_bytes(),
        }
    }
}

/// Encode `multipart/form-data`
pub fn multipart_body(parts: &[Part<'_>]) -> Vec<u8> {
    let mut body = Vec::new();
    for part in parts {
        body.extend_from_slice(format!("--{}\r\n", BOUNDARY).as_bytes());
        match part.filename {
            Some(filename) => {
                body.extend_from_slice(
                    format!(
                        "Content-Disposition: form-data; name=\"{}\"; filename=\"{}\"\r\n\
                         Content-Type: application/octet-stream\r\n\r\n",
                        part.name, filename
                    )
                    .as_bytes(),
                );
            }
            None => {
                body.extend_from_slice(
                    format!("Content-Disposition: form-data; name=\"{}\"\r\n\r\n", part.name)
                        .as_bytes(),
                );
            }
        }
        body.extend_from_slice(part.content);
        body.extend_from_slice(b"\r\n");
    }
    body.extend_from_slice(format!("--{}--\r\n", BOUNDARY).as_bytes());
    body
}

/// `POST /analysis` carrying `parts`
pub fn analysis_request(parts: &[Part<'_>]) -> Request<Body> {
    Request::builder()
        .method("POST")
        .uri("/analysis")
        .header(
            "content-type",
            format!("multipart/form-data; boundary={}", BOUNDARY),
        )
        .body(Body::from(multipart_body(parts)))
        .unwrap()
}

/// `GET` request with empty body
pub fn get(uri: &str) -> Request<Body> {
    Request::builder().uri(uri).body(Body::empty()).unwrap()
}
