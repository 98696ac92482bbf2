//! Per-request analysis models

use serde::{Deserialize, Serialize};

use super::ambient::AmbientReading;
use super::produce::ProduceCategory;

/// Output of the produce classifier
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ClassificationResult {
    /// Produce and ripeness label, e.g. `ripe_banana`
    pub label: String,
    /// Confidence score (0-100)
    pub confidence: f64,
}

impl ClassificationResult {
    /// Create a result with confidence clamped to 0-100
    pub fn new(label: impl Into<String>, confidence: f64) -> Self {
        Self {
            label: label.into(),
            confidence: if confidence.is_nan() { 0.0 } else { confidence.clamp(0.0, 100.0) },
        }
    }
}

/// Ripeness outlook for one piece of produce
///
/// `spoils_in_days` is normally >= `ripes_in_days`, but estimates coming
/// from the reasoning service are passed through without enforcing that.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct RipenessEstimate {
    pub category: ProduceCategory,
    pub ripes_in_days: u32,
    pub spoils_in_days: u32,
}

/// Where a ripeness estimate came from
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EstimateSource {
    /// Reasoning service answered with a valid estimate
    External,
    /// Deterministic label-based policy
    Fallback,
}

/// Body of a successful `POST /analysis`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AnalysisResponse {
    pub prediction: String,
    pub confidence: f64,
    pub temperature: f64,
    pub humidity: f64,
    pub category: ProduceCategory,
    pub ripes_in_days: u32,
    pub spoils_in_days: u32,
}

impl AnalysisResponse {
    /// Assemble the response from the three pipeline outputs
    pub fn assemble(
        classification: ClassificationResult,
        reading: &AmbientReading,
        estimate: RipenessEstimate,
    ) -> Self {
        Self {
            prediction: classification.label,
            confidence: classification.confidence,
            temperature: reading.temperature,
            humidity: reading.humidity,
            category: estimate.category,
            ripes_in_days: estimate.ripes_in_days,
            spoils_in_days: estimate.spoils_in_days,
        }
    }
}

/// Body of `POST /analyze-ripening`: a prior prediction plus conditions
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RipeningRequest {
    pub prediction: String,
    pub temperature: f64,
    pub humidity: f64,
}

/// Body of a successful `POST /analyze-ripening`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RipeningResponse {
    pub category: ProduceCategory,
    pub ripes_in_days: u32,
    pub spoils_in_days: u32,
}

impl From<RipenessEstimate> for RipeningResponse {
    fn from(estimate: RipenessEstimate) -> Self {
        Self {
            category: estimate.category,
            ripes_in_days: estimate.ripes_in_days,
            spoils_in_days: estimate.spoils_in_days,
        }
    }
}
