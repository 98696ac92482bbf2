//! Ripeness estimation
//!
//! One bounded call to the reasoning service per request. Any failure
//! (transport error, timeout, unusable answer) is replaced by the
//! deterministic [`fallback_estimate`] for the label, so estimation never
//! fails from the caller's point of view.

pub mod fallback;
pub mod reasoning;

pub use fallback::fallback_estimate;
pub use reasoning::{
    parse_assessment, AssessmentRequest, OpenAiReasoningClient, ReasoningError, ReasoningService,
};

use async_trait::async_trait;
use chrono::Utc;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, warn};
use veggie_common::events::{EventBus, VeggieEvent};
use veggie_common::models::{AmbientReading, EstimateSource, RipenessEstimate};

/// Estimate plus where it came from
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SourcedEstimate {
    pub estimate: RipenessEstimate,
    pub source: EstimateSource,
}

/// Label + ambient reading → ripeness estimate (infallible)
#[async_trait]
pub trait RipenessEstimation: Send + Sync {
    async fn estimate(&self, label: &str, reading: &AmbientReading) -> SourcedEstimate;
}

/// Reasoning-service estimator with label-based fallback
pub struct RipenessEstimator {
    service: Arc<dyn ReasoningService>,
    timeout: Duration,
    event_bus: EventBus,
}

impl RipenessEstimator {
    pub fn new(service: Arc<dyn ReasoningService>, timeout: Duration, event_bus: EventBus) -> Self {
        Self {
            service,
            timeout,
            event_bus,
        }
    }

    /// Single attempt, bounded by `timeout`
    async fn query(
        &self,
        request: &AssessmentRequest,
    ) -> Result<RipenessEstimate, ReasoningError> {
        let content = tokio::time::timeout(self.timeout, self.service.assess(request))
            .await
            .map_err(|_| ReasoningError::Timeout(self.timeout))??;
        parse_assessment(&content)
    }
}

#[async_trait]
impl RipenessEstimation for RipenessEstimator {
    async fn estimate(&self, label: &str, reading: &AmbientReading) -> SourcedEstimate {
        let request = AssessmentRequest::new(label, reading);

        let sourced = match self.query(&request).await {
            Ok(estimate) => {
                debug!(label, ?estimate, "Reasoning service estimate accepted");
                SourcedEstimate {
                    estimate,
                    source: EstimateSource::External,
                }
            }
            Err(e) => {
                warn!(label, error = %e, "Reasoning service unusable, using fallback estimate");
                SourcedEstimate {
                    estimate: fallback_estimate(label),
                    source: EstimateSource::Fallback,
                }
            }
        };

        self.event_bus.emit_lossy(VeggieEvent::EstimateProduced {
            label: label.to_string(),
            source: sourced.source,
            timestamp: Utc::now(),
        });

        sourced
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use veggie_common::models::ProduceCategory;

    /// Scripted reasoning service
    struct Scripted {
        reply: Result<&'static str, fn() -> ReasoningError>,
        delay: Duration,
        calls: AtomicUsize,
    }

    impl Scripted {
        fn answering(reply: &'static str) -> Self {
            Self {
                reply: Ok(reply),
                delay: Duration::ZERO,
                calls: AtomicUsize::new(0),
            }
        }

        fn failing(error: fn() -> ReasoningError) -> Self {
            Self {
                reply: Err(error),
                delay: Duration::ZERO,
                calls: AtomicUsize::new(0),
            }
        }
    }

    #[async_trait]
    impl ReasoningService for Scripted {
        async fn assess(&self, _request: &AssessmentRequest) -> Result<String, ReasoningError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            tokio::time::sleep(self.delay).await;
            match &self.reply {
                Ok(content) => Ok(content.to_string()),
                Err(make) => Err(make()),
            }
        }
    }

    fn reading() -> AmbientReading {
        AmbientReading::new(25.0, 60.0, Utc::now()).unwrap()
    }

    fn estimator(service: Arc<Scripted>, bus: &EventBus) -> RipenessEstimator {
        RipenessEstimator::new(service, Duration::from_millis(200), bus.clone())
    }

    #[tokio::test]
    async fn test_valid_answer_is_used() {
        let bus = EventBus::new(16);
        let service = Arc::new(Scripted::answering(
            r#"{"category": "vegetable", "ripes_in_days": 1, "spoils_in_days": 9}"#,
        ));
        let result = estimator(service.clone(), &bus).estimate("unripe_tomato", &reading()).await;

        assert_eq!(result.source, EstimateSource::External);
        assert_eq!(result.estimate.category, ProduceCategory::Vegetable);
        assert_eq!((result.estimate.ripes_in_days, result.estimate.spoils_in_days), (1, 9));
        assert_eq!(service.calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_invalid_answer_falls_back() {
        let bus = EventBus::new(16);
        let service = Arc::new(Scripted::answering(
            r#"{"category": "berry", "ripes_in_days": 1, "spoils_in_days": 2}"#,
        ));
        let result = estimator(service, &bus).estimate("ripe_banana", &reading()).await;

        assert_eq!(result.source, EstimateSource::Fallback);
        assert_eq!(result.estimate, fallback_estimate("ripe_banana"));
    }

    #[tokio::test]
    async fn test_service_error_falls_back_without_retry() {
        let bus = EventBus::new(16);
        let service = Arc::new(Scripted::failing(|| ReasoningError::Network("refused".into())));
        let result = estimator(service.clone(), &bus).estimate("rotten_mango", &reading()).await;

        assert_eq!(result.source, EstimateSource::Fallback);
        assert_eq!(result.estimate, fallback_estimate("rotten_mango"));
        assert_eq!(service.calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_slow_service_times_out_to_fallback() {
        let bus = EventBus::new(16);
        let service = Arc::new(Scripted {
            delay: Duration::from_secs(5),
            ..Scripted::answering(r#"{"category": "fruit", "ripes_in_days": 1, "spoils_in_days": 2}"#)
        });

        let started = std::time::Instant::now();
        let result = estimator(service, &bus).estimate("unripe_avocado", &reading()).await;

        assert_eq!(result.source, EstimateSource::Fallback);
        assert!(started.elapsed() < Duration::from_secs(2));
    }

    #[tokio::test]
    async fn test_estimate_event_reports_source() {
        let bus = EventBus::new(16);
        let mut rx = bus.subscribe();
        let service = Arc::new(Scripted::failing(|| ReasoningError::InvalidApiKey));
        estimator(service, &bus).estimate("ripe_banana", &reading()).await;

        match rx.try_recv().unwrap() {
            VeggieEvent::EstimateProduced { label, source, .. } => {
                assert_eq!(label, "ripe_banana");
                assert_eq!(source, EstimateSource::Fallback);
            }
            other => panic!("unexpected event {:?}", other),
        }
    }
}
