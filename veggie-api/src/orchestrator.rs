//! Analysis pipeline
//!
//! classify → read ambient cache → estimate ripeness → assemble response.
//!
//! Classification and ambient lookup are fatal to the request and stop the
//! pipeline before the reasoning service is contacted. Estimation never
//! fails (it falls back internally).

use chrono::Utc;
use std::sync::Arc;
use std::time::{Duration, Instant};
use thiserror::Error;
use tracing::{info, warn, Instrument};
use uuid::Uuid;
use veggie_common::events::{EventBus, VeggieEvent};
use veggie_common::models::{AmbientReading, AnalysisResponse, RipenessEstimate};

use crate::cache::{AmbientCache, AmbientError};
use crate::classifier::{ClassificationError, ProduceClassifier};
use crate::estimator::RipenessEstimation;

/// Request-fatal pipeline failures
#[derive(Debug, Clone, PartialEq, Error)]
pub enum AnalysisError {
    #[error("Classification failed: {0}")]
    Classification(#[from] ClassificationError),

    #[error("Classification timed out after {0:?}")]
    ClassificationTimeout(Duration),

    #[error(transparent)]
    Ambient(#[from] AmbientError),
}

/// Runs one analysis per request; shared across handlers
pub struct AnalysisOrchestrator {
    classifier: Arc<dyn ProduceClassifier>,
    cache: AmbientCache,
    estimator: Arc<dyn RipenessEstimation>,
    classifier_timeout: Duration,
    event_bus: EventBus,
}

impl AnalysisOrchestrator {
    pub fn new(
        classifier: Arc<dyn ProduceClassifier>,
        cache: AmbientCache,
        estimator: Arc<dyn RipenessEstimation>,
        classifier_timeout: Duration,
        event_bus: EventBus,
    ) -> Self {
        Self {
            classifier,
            cache,
            estimator,
            classifier_timeout,
            event_bus,
        }
    }

    pub fn classifier_name(&self) -> &'static str {
        self.classifier.name()
    }

    /// Analyze one uploaded image
    pub async fn analyze(&self, image: &[u8]) -> Result<AnalysisResponse, AnalysisError> {
        let request_id = Uuid::new_v4();
        let span = tracing::info_span!("analysis", %request_id, bytes = image.len());

        async move {
            let started = Instant::now();
            let result = self.run(image).await;
            let duration_ms = started.elapsed().as_millis() as u64;

            match &result {
                Ok(response) => info!(
                    prediction = %response.prediction,
                    confidence = response.confidence,
                    duration_ms,
                    "Analysis completed"
                ),
                Err(e) => warn!(error = %e, duration_ms, "Analysis failed"),
            }

            self.event_bus.emit_lossy(VeggieEvent::AnalysisCompleted {
                request_id,
                prediction: result.as_ref().ok().map(|r| r.prediction.clone()),
                success: result.is_ok(),
                duration_ms,
                timestamp: Utc::now(),
            });

            result
        }
        .instrument(span)
        .await
    }

    /// Estimate ripeness for an already-classified label
    ///
    /// Skips the classifier and the ambient cache: the caller supplies both
    /// the label and the conditions. Never fails.
    pub async fn estimate_ripening(&self, label: &str, reading: &AmbientReading) -> RipenessEstimate {
        let sourced = self.estimator.estimate(label, reading).await;
        info!(
            label,
            source = ?sourced.source,
            ripes_in_days = sourced.estimate.ripes_in_days,
            spoils_in_days = sourced.estimate.spoils_in_days,
            "Ripening estimated"
        );
        sourced.estimate
    }

    async fn run(&self, image: &[u8]) -> Result<AnalysisResponse, AnalysisError> {
        let classification =
            tokio::time::timeout(self.classifier_timeout, self.classifier.classify(image))
                .await
                .map_err(|_| AnalysisError::ClassificationTimeout(self.classifier_timeout))??;

        // Cache is read after classification so the freshest reading is used
        let reading = self.cache.latest_reading()?;

        let sourced = self.estimator.estimate(&classification.label, &reading).await;

        Ok(AnalysisResponse::assemble(classification, &reading, sourced.estimate))
    }
}
