//! # Veggie Vision Common Library
//!
//! Shared code for the Veggie Vision service including:
//! - Domain models (ambient readings, classification, ripeness estimates)
//! - Telemetry normalization (source-language field names → canonical)
//! - Produce label vocabulary
//! - Configuration loading and resolution
//! - Event types (VeggieEvent enum) and EventBus

pub mod config;
pub mod error;
pub mod events;
pub mod models;

pub use error::{Error, Result};
