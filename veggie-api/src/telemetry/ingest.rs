//! Telemetry decoding and cache ingestion
//!
//! Each broker message is handled on its own:
//! 1. Decode as a JSON object. Anything else (not JSON, or a JSON string,
//!    number or array) becomes an opaque value: cached, never dropped.
//! 2. Normalize the object to an [`AmbientReading`]. On failure the
//!    message is dropped and the previous cache value stays.
//!
//! Nothing here returns an error to the caller; failures are logged and
//! published as events.

use chrono::{DateTime, Utc};
use serde_json::{Map, Value};
use tracing::{debug, warn};
use veggie_common::events::{EventBus, VeggieEvent};
use veggie_common::models::{AmbientReading, NormalizationError};

use crate::cache::{AmbientCache, AmbientSnapshot, OpaqueTelemetry};

/// Longest raw payload kept for an opaque value
const MAX_OPAQUE_LEN: usize = 1024;

/// Result of decoding one payload
#[derive(Debug, Clone, PartialEq)]
pub enum TelemetryPayload {
    /// Payload parsed as a JSON object
    Structured(Map<String, Value>),
    /// Payload kept as text
    Opaque(String),
}

/// Decode a raw broker payload
pub fn decode_payload(payload: &[u8]) -> TelemetryPayload {
    match serde_json::from_slice::<Value>(payload) {
        Ok(Value::Object(fields)) => TelemetryPayload::Structured(fields),
        _ => {
            let text = String::from_utf8_lossy(payload);
            let mut raw = text.trim().to_string();
            if raw.len() > MAX_OPAQUE_LEN {
                let mut cut = MAX_OPAQUE_LEN;
                while !raw.is_char_boundary(cut) {
                    cut -= 1;
                }
                raw.truncate(cut);
            }
            TelemetryPayload::Opaque(raw)
        }
    }
}

/// What ingesting one message did to the cache
#[derive(Debug, Clone, PartialEq)]
pub enum IngestOutcome {
    /// Normalized reading stored
    Stored(AmbientReading),
    /// Non-object payload stored as an opaque value
    StoredOpaque(String),
    /// Message dropped, cache unchanged
    Rejected(NormalizationError),
}

/// Sole write path from telemetry into the [`AmbientCache`]
#[derive(Clone)]
pub struct TelemetryIngest {
    cache: AmbientCache,
    event_bus: EventBus,
}

impl TelemetryIngest {
    pub fn new(cache: AmbientCache, event_bus: EventBus) -> Self {
        Self { cache, event_bus }
    }

    /// Handle one payload received at the current time
    pub fn ingest(&self, payload: &[u8]) -> IngestOutcome {
        self.ingest_at(payload, Utc::now())
    }

    /// Handle one payload with an explicit receive timestamp
    pub fn ingest_at(&self, payload: &[u8], received_at: DateTime<Utc>) -> IngestOutcome {
        match decode_payload(payload) {
            TelemetryPayload::Structured(fields) => {
                match AmbientReading::from_telemetry(&Value::Object(fields), received_at) {
                    Ok(reading) => {
                        debug!(
                            temperature = reading.temperature,
                            humidity = reading.humidity,
                            "Ambient reading updated"
                        );
                        self.cache.set(AmbientSnapshot::Reading(reading));
                        self.event_bus.emit_lossy(VeggieEvent::AmbientUpdated {
                            temperature: reading.temperature,
                            humidity: reading.humidity,
                            timestamp: received_at,
                        });
                        IngestOutcome::Stored(reading)
                    }
                    Err(e) => {
                        warn!(error = %e, "Dropping telemetry message that failed normalization");
                        self.event_bus.emit_lossy(VeggieEvent::TelemetryRejected {
                            reason: e.to_string(),
                            timestamp: received_at,
                        });
                        IngestOutcome::Rejected(e)
                    }
                }
            }
            TelemetryPayload::Opaque(raw) => {
                warn!(payload = %raw, "Telemetry payload is not a JSON object, caching as opaque value");
                self.cache.set(AmbientSnapshot::Opaque(OpaqueTelemetry {
                    raw: raw.clone(),
                    received_at,
                }));
                self.event_bus.emit_lossy(VeggieEvent::TelemetryOpaque {
                    raw: raw.clone(),
                    timestamp: received_at,
                });
                IngestOutcome::StoredOpaque(raw)
            }
        }
    }
}
