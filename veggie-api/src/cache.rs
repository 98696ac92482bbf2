//! Latest-value ambient cache
//!
//! Single slot holding the most recent telemetry snapshot. The telemetry
//! subscriber is the only writer; HTTP handlers read concurrently.
//!
//! The slot stores an `Arc`, so the lock is held only long enough to clone
//! or swap a pointer. Readers get an immutable snapshot and never observe a
//! partially replaced value.

use chrono::{DateTime, Utc};
use std::sync::{Arc, RwLock};
use thiserror::Error;
use veggie_common::models::{AmbientReading, NormalizationError};

/// Telemetry payload that never decoded as structured data
#[derive(Debug, Clone, PartialEq)]
pub struct OpaqueTelemetry {
    /// Raw payload text (lossy UTF-8)
    pub raw: String,
    pub received_at: DateTime<Utc>,
}

/// Content of the cache slot
#[derive(Debug, Clone, PartialEq)]
pub enum AmbientSnapshot {
    /// Normalized temperature/humidity reading
    Reading(AmbientReading),
    /// Passthrough value kept instead of dropping an undecodable message
    Opaque(OpaqueTelemetry),
}

impl AmbientSnapshot {
    /// Normalized reading, or the reason there isn't one
    pub fn reading(&self) -> Result<&AmbientReading, NormalizationError> {
        match self {
            AmbientSnapshot::Reading(reading) => Ok(reading),
            AmbientSnapshot::Opaque(opaque) => Err(NormalizationError::Opaque(opaque.raw.clone())),
        }
    }

    /// When the snapshot arrived
    pub fn received_at(&self) -> DateTime<Utc> {
        match self {
            AmbientSnapshot::Reading(reading) => reading.captured_at,
            AmbientSnapshot::Opaque(opaque) => opaque.received_at,
        }
    }
}

/// Why no usable ambient reading could be taken from the cache
#[derive(Debug, Clone, PartialEq, Error)]
pub enum AmbientError {
    /// Nothing has arrived since process start
    #[error("No ambient data available yet. Please wait for telemetry messages.")]
    Unavailable,

    /// Latest value cannot be interpreted as a reading
    #[error("Error processing ambient data: {0}")]
    Unreadable(#[from] NormalizationError),
}

/// Thread-safe holder of the latest ambient snapshot
///
/// Cloning shares the same slot.
#[derive(Clone, Default)]
pub struct AmbientCache {
    slot: Arc<RwLock<Option<Arc<AmbientSnapshot>>>>,
}

impl AmbientCache {
    /// Create an empty cache
    pub fn new() -> Self {
        Self::default()
    }

    /// Replace the stored snapshot (last write wins)
    pub fn set(&self, snapshot: AmbientSnapshot) {
        let snapshot = Arc::new(snapshot);
        // A poisoned lock only means a panic elsewhere mid-swap; the slot
        // itself is always a complete value.
        let mut slot = self.slot.write().unwrap_or_else(|e| e.into_inner());
        *slot = Some(snapshot);
    }

    /// Current snapshot, or `None` before the first message
    pub fn get(&self) -> Option<Arc<AmbientSnapshot>> {
        self.slot
            .read()
            .unwrap_or_else(|e| e.into_inner())
            .clone()
    }

    /// Current normalized reading
    pub fn latest_reading(&self) -> Result<AmbientReading, AmbientError> {
        let snapshot = self.get().ok_or(AmbientError::Unavailable)?;
        Ok(*snapshot.reading()?)
    }

    /// Whether anything has been cached yet
    pub fn is_populated(&self) -> bool {
        self.get().is_some()
    }
}
