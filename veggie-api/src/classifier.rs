//! Produce classification
//!
//! The analysis pipeline only depends on the [`ProduceClassifier`] trait.
//! [`DigestClassifier`] is the in-tree implementation: it validates that
//! the upload is an image and deterministically maps its SHA-256 digest to
//! one of [`KNOWN_LABELS`], so the same photo always gets the same answer.
//! A model-backed implementation plugs in behind the same trait.

use async_trait::async_trait;
use sha2::{Digest, Sha256};
use thiserror::Error;
use tracing::debug;
use veggie_common::models::{ClassificationResult, KNOWN_LABELS};

/// Lowest confidence the digest classifier reports
const MIN_CONFIDENCE: f64 = 85.0;
/// Highest confidence the digest classifier reports
const MAX_CONFIDENCE: f64 = 99.9;

/// Classification failures (fatal to the analysis request)
#[derive(Debug, Clone, PartialEq, Error)]
pub enum ClassificationError {
    /// Upload is empty, truncated, or not an image
    #[error("Unreadable image: {0}")]
    UnreadableImage(String),

    /// Inference backend cannot serve requests
    #[error("Classification model unavailable: {0}")]
    ModelUnavailable(String),
}

/// Image → produce label + confidence
#[async_trait]
pub trait ProduceClassifier: Send + Sync {
    /// Classifier name for logs and health output
    fn name(&self) -> &'static str;

    /// Classify one image
    async fn classify(&self, image: &[u8]) -> Result<ClassificationResult, ClassificationError>;
}

/// Deterministic digest-based classifier
#[derive(Debug, Clone, Default)]
pub struct DigestClassifier;

impl DigestClassifier {
    pub fn new() -> Self {
        Self
    }

    /// Pure mapping from image bytes to a result
    fn classify_bytes(image: &[u8]) -> Result<ClassificationResult, ClassificationError> {
        if image.is_empty() {
            return Err(ClassificationError::UnreadableImage("empty upload".to_string()));
        }

        let kind = infer::get(image).ok_or_else(|| {
            ClassificationError::UnreadableImage("unrecognized file format".to_string())
        })?;
        if kind.matcher_type() != infer::MatcherType::Image {
            return Err(ClassificationError::UnreadableImage(format!(
                "expected an image, got {}",
                kind.mime_type()
            )));
        }

        let digest = Sha256::digest(image);
        let label_seed = u64::from_be_bytes([
            digest[0], digest[1], digest[2], digest[3], digest[4], digest[5], digest[6], digest[7],
        ]);
        let confidence_seed = u16::from_be_bytes([digest[8], digest[9]]);

        let label = KNOWN_LABELS[(label_seed % KNOWN_LABELS.len() as u64) as usize];

        // 0.01 steps between the bounds, both inclusive
        let steps = ((MAX_CONFIDENCE - MIN_CONFIDENCE) * 100.0).round() as u16 + 1;
        let confidence = MIN_CONFIDENCE + f64::from(confidence_seed % steps) / 100.0;
        let confidence = (confidence * 100.0).round() / 100.0;

        debug!(mime = kind.mime_type(), label, confidence, "Image classified");
        Ok(ClassificationResult::new(label, confidence))
    }
}

#[async_trait]
impl ProduceClassifier for DigestClassifier {
    fn name(&self) -> &'static str {
        "digest"
    }

    async fn classify(&self, image: &[u8]) -> Result<ClassificationResult, ClassificationError> {
        // Hashing a multi-megabyte upload must not stall the runtime
        let image = image.to_vec();
        tokio::task::spawn_blocking(move || Self::classify_bytes(&image))
            .await
            .map_err(|e| {
                ClassificationError::ModelUnavailable(format!("classifier task failed: {}", e))
            })?
    }
}
