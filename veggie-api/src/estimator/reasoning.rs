//! Reasoning-service client
//!
//! Talks to an OpenAI-compatible chat-completions endpoint and asks for a
//! JSON ripeness assessment. Response validation lives in
//! [`parse_assessment`] so it can be exercised without a network.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::time::Duration;
use thiserror::Error;
use veggie_common::config::ReasoningConfig;
use veggie_common::models::{AmbientReading, ProduceCategory, RipenessEstimate};

const USER_AGENT: &str = concat!("veggie-vision/", env!("CARGO_PKG_VERSION"));

const SYSTEM_PROMPT: &str =
    "You are an expert in produce ripening analysis. Provide only JSON responses.";

/// Reasoning-service errors (all trigger the fallback policy)
#[derive(Debug, Error)]
pub enum ReasoningError {
    #[error("Network error: {0}")]
    Network(String),

    #[error("Reasoning service timed out after {0:?}")]
    Timeout(Duration),

    #[error("Invalid API key")]
    InvalidApiKey,

    #[error("API error {0}: {1}")]
    Api(u16, String),

    #[error("Invalid response: {0}")]
    InvalidResponse(String),
}

/// Inputs for one assessment
#[derive(Debug, Clone, PartialEq)]
pub struct AssessmentRequest {
    pub label: String,
    pub temperature: f64,
    pub humidity: f64,
}

impl AssessmentRequest {
    pub fn new(label: &str, reading: &AmbientReading) -> Self {
        Self {
            label: label.to_string(),
            temperature: reading.temperature,
            humidity: reading.humidity,
        }
    }

    /// User prompt sent to the model
    pub fn prompt(&self) -> String {
        format!(
            "Analyze the ripening status of {label} under the following conditions:\n\
             - Temperature: {temperature}°C\n\
             - Humidity: {humidity}%\n\
             \n\
             Return a JSON object with:\n\
             1. category: either \"fruit\" or \"vegetable\"\n\
             2. ripes_in_days: whole number of days until ripe (0 if already ripe or past ripe)\n\
             3. spoils_in_days: whole number of days until spoiled (0 if already spoiled)\n\
             4. rationale: one short sentence\n\
             \n\
             Consider optimal ripening conditions, the current environmental conditions, \
             typical ripening and spoilage times, and the impact of temperature and humidity.\n\
             Return ONLY the JSON object, no additional text.",
            label = self.label,
            temperature = self.temperature,
            humidity = self.humidity,
        )
    }
}

/// External reasoning step: returns the model's raw answer text
#[async_trait]
pub trait ReasoningService: Send + Sync {
    async fn assess(&self, request: &AssessmentRequest) -> Result<String, ReasoningError>;
}

// ============================================================================
// Response validation
// ============================================================================

/// Validate the model's answer and turn it into an estimate
///
/// Rejects anything whose `category` is not `fruit`/`vegetable` or whose
/// day counts are missing, negative, or not integers. A `rationale` field
/// is accepted and ignored. A surrounding Markdown code fence is tolerated.
pub fn parse_assessment(content: &str) -> Result<RipenessEstimate, ReasoningError> {
    let body = strip_code_fence(content);

    let value: Value = serde_json::from_str(body)
        .map_err(|e| ReasoningError::InvalidResponse(format!("not JSON: {}", e)))?;
    let Value::Object(fields) = value else {
        return Err(ReasoningError::InvalidResponse("expected a JSON object".to_string()));
    };

    let category = fields
        .get("category")
        .and_then(Value::as_str)
        .and_then(ProduceCategory::parse)
        .ok_or_else(|| {
            ReasoningError::InvalidResponse(format!(
                "category must be \"fruit\" or \"vegetable\", got {}",
                fields.get("category").map(Value::to_string).unwrap_or_else(|| "nothing".into())
            ))
        })?;

    Ok(RipenessEstimate {
        category,
        ripes_in_days: day_count(&fields, "ripes_in_days", "ripesInDays")?,
        spoils_in_days: day_count(&fields, "spoils_in_days", "spoilsInDays")?,
    })
}

fn day_count(fields: &Map<String, Value>, key: &str, alias: &str) -> Result<u32, ReasoningError> {
    let value = fields
        .get(key)
        .or_else(|| fields.get(alias))
        .ok_or_else(|| ReasoningError::InvalidResponse(format!("missing {}", key)))?;

    value
        .as_u64()
        .and_then(|n| u32::try_from(n).ok())
        .ok_or_else(|| {
            ReasoningError::InvalidResponse(format!(
                "{} must be a non-negative integer, got {}",
                key, value
            ))
        })
}

fn strip_code_fence(content: &str) -> &str {
    let trimmed = content.trim();
    let Some(inner) = trimmed.strip_prefix("```") else {
        return trimmed;
    };
    let inner = inner.strip_suffix("```").unwrap_or(inner);
    // Drop an optional language tag on the opening fence line
    match inner.split_once('\n') {
        Some((first, rest)) if !first.trim_start().starts_with('{') => rest.trim(),
        _ => inner.trim(),
    }
}

// ============================================================================
// OpenAI-compatible client
// ============================================================================

#[derive(Debug, Serialize)]
struct ChatMessage<'a> {
    role: &'a str,
    content: &'a str,
}

#[derive(Debug, Serialize)]
struct ResponseFormat {
    #[serde(rename = "type")]
    kind: &'static str,
}

#[derive(Debug, Serialize)]
struct ChatCompletionRequest<'a> {
    model: &'a str,
    messages: Vec<ChatMessage<'a>>,
    temperature: f32,
    max_tokens: u32,
    response_format: ResponseFormat,
}

#[derive(Debug, Deserialize)]
struct ChatCompletionResponse {
    choices: Vec<ChatChoice>,
}

#[derive(Debug, Deserialize)]
struct ChatChoice {
    message: ChatChoiceMessage,
}

#[derive(Debug, Deserialize)]
struct ChatChoiceMessage {
    content: Option<String>,
}

/// Chat-completions client for the reasoning service
pub struct OpenAiReasoningClient {
    http_client: reqwest::Client,
    endpoint: String,
    api_key: String,
    model: String,
    temperature: f32,
    max_tokens: u32,
}

impl OpenAiReasoningClient {
    pub fn new(config: &ReasoningConfig) -> Result<Self, ReasoningError> {
        let http_client = reqwest::Client::builder()
            .user_agent(USER_AGENT)
            .timeout(config.timeout)
            .build()
            .map_err(|e| ReasoningError::Network(e.to_string()))?;

        Ok(Self {
            http_client,
            endpoint: format!("{}/chat/completions", config.base_url.trim_end_matches('/')),
            api_key: config.api_key.clone(),
            model: config.model.clone(),
            temperature: config.temperature,
            max_tokens: config.max_tokens,
        })
    }

    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }
}

#[async_trait]
impl ReasoningService for OpenAiReasoningClient {
    async fn assess(&self, request: &AssessmentRequest) -> Result<String, ReasoningError> {
        let prompt = request.prompt();
        let body = ChatCompletionRequest {
            model: &self.model,
            messages: vec![
                ChatMessage {
                    role: "system",
                    content: SYSTEM_PROMPT,
                },
                ChatMessage {
                    role: "user",
                    content: &prompt,
                },
            ],
            temperature: self.temperature,
            max_tokens: self.max_tokens,
            response_format: ResponseFormat {
                kind: "json_object",
            },
        };

        tracing::debug!(label = %request.label, model = %self.model, "Querying reasoning service");

        let response = self
            .http_client
            .post(&self.endpoint)
            .bearer_auth(&self.api_key)
            .json(&body)
            .send()
            .await
            .map_err(|e| ReasoningError::Network(e.to_string()))?;

        let status = response.status();

        if status == reqwest::StatusCode::UNAUTHORIZED {
            return Err(ReasoningError::InvalidApiKey);
        }

        if !status.is_success() {
            let error_text = response.text().await.unwrap_or_default();
            return Err(ReasoningError::Api(status.as_u16(), error_text));
        }

        let completion: ChatCompletionResponse = response
            .json()
            .await
            .map_err(|e| ReasoningError::InvalidResponse(e.to_string()))?;

        completion
            .choices
            .into_iter()
            .next()
            .and_then(|choice| choice.message.content)
            .ok_or_else(|| ReasoningError::InvalidResponse("no message content".to_string()))
    }
}
