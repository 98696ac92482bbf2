//! Ambient reading model and telemetry normalization
//!
//! Sensors publish readings with Spanish field names (`temperatura`,
//! `humedad`). Everything downstream of the subscriber works with the
//! canonical [`AmbientReading`] shape, so normalization happens once, before
//! a value is stored.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use thiserror::Error;

/// Source-language field name for temperature
pub const SOURCE_TEMPERATURE_FIELD: &str = "temperatura";
/// Source-language field name for humidity
pub const SOURCE_HUMIDITY_FIELD: &str = "humedad";
/// Canonical field name for temperature
pub const TEMPERATURE_FIELD: &str = "temperature";
/// Canonical field name for humidity
pub const HUMIDITY_FIELD: &str = "humidity";

/// Reasons a telemetry document cannot be turned into an [`AmbientReading`]
#[derive(Debug, Clone, PartialEq, Error)]
pub enum NormalizationError {
    /// Document is valid JSON but not an object
    #[error("expected a JSON object, got {0}")]
    NotAnObject(&'static str),

    /// Neither the source-language nor the canonical field is present
    #[error("missing field '{0}'")]
    MissingField(&'static str),

    /// Field is present but not a number or numeric string
    #[error("field '{field}' is not numeric: {value}")]
    NotNumeric { field: &'static str, value: String },

    /// Field parsed to NaN or infinity
    #[error("field '{0}' is not a finite number")]
    NotFinite(&'static str),

    /// Payload never decoded as structured data
    #[error("opaque telemetry payload cannot be normalized: {0:?}")]
    Opaque(String),
}

/// Normalized temperature/humidity pair
///
/// Immutable once constructed; both values are guaranteed finite.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AmbientReading {
    /// Temperature in degrees Celsius
    pub temperature: f64,
    /// Relative humidity percentage
    pub humidity: f64,
    /// When the reading was received from the broker
    pub captured_at: DateTime<Utc>,
}

impl AmbientReading {
    /// Create a reading from canonical values
    ///
    /// Fails if either value is NaN or infinite.
    pub fn new(
        temperature: f64,
        humidity: f64,
        captured_at: DateTime<Utc>,
    ) -> Result<Self, NormalizationError> {
        if !temperature.is_finite() {
            return Err(NormalizationError::NotFinite(TEMPERATURE_FIELD));
        }
        if !humidity.is_finite() {
            return Err(NormalizationError::NotFinite(HUMIDITY_FIELD));
        }
        Ok(Self {
            temperature,
            humidity,
            captured_at,
        })
    }

    /// Normalize a decoded telemetry document
    ///
    /// Accepts `temperatura`/`humedad` (preferred) or `temperature`/`humidity`.
    /// Values may be JSON numbers or numeric strings (`"22.5"`). Any other
    /// shape fails for this message only.
    pub fn from_telemetry(
        document: &Value,
        captured_at: DateTime<Utc>,
    ) -> Result<Self, NormalizationError> {
        let fields = match document {
            Value::Object(map) => map,
            other => return Err(NormalizationError::NotAnObject(json_kind(other))),
        };

        let temperature = numeric_field(fields, SOURCE_TEMPERATURE_FIELD, TEMPERATURE_FIELD)?;
        let humidity = numeric_field(fields, SOURCE_HUMIDITY_FIELD, HUMIDITY_FIELD)?;

        Self::new(temperature, humidity, captured_at)
    }

    /// Age of the reading relative to `now`, clamped at zero
    pub fn age_seconds(&self, now: DateTime<Utc>) -> u64 {
        now.signed_duration_since(self.captured_at)
            .num_seconds()
            .max(0) as u64
    }
}

fn numeric_field(
    fields: &Map<String, Value>,
    source: &'static str,
    canonical: &'static str,
) -> Result<f64, NormalizationError> {
    let value = fields
        .get(source)
        .or_else(|| fields.get(canonical))
        .ok_or(NormalizationError::MissingField(source))?;

    let number = match value {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => s.trim().parse::<f64>().ok(),
        _ => None,
    }
    .ok_or_else(|| NormalizationError::NotNumeric {
        field: source,
        value: value.to_string(),
    })?;

    if number.is_finite() {
        Ok(number)
    } else {
        Err(NormalizationError::NotFinite(source))
    }
}

fn json_kind(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}
