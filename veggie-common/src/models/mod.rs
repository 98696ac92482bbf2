//! Domain models shared across the workspace

pub mod ambient;
pub mod analysis;
pub mod produce;

pub use ambient::{AmbientReading, NormalizationError};
pub use analysis::{
    AnalysisResponse, ClassificationResult, EstimateSource, RipenessEstimate, RipeningRequest,
    RipeningResponse,
};
pub use produce::{ProduceCategory, ProduceKind, ProduceLabel, RipenessStage, KNOWN_LABELS};
