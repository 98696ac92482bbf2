//! Background telemetry ingestion
//!
//! - `ingest`: payload decoding, normalization, cache writes
//! - `subscriber`: MQTT connection lifecycle and event loop task

pub mod ingest;
pub mod subscriber;

pub use ingest::{decode_payload, IngestOutcome, TelemetryIngest, TelemetryPayload};
pub use subscriber::{SubscriberError, TelemetrySubscriber};
