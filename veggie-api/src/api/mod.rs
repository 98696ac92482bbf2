//! HTTP API handlers for veggie-api

pub mod ambient;
pub mod analysis;
pub mod health;
pub mod ripening;
pub mod sse;

pub use ambient::ambient_routes;
pub use analysis::analysis_routes;
pub use health::health_routes;
pub use ripening::ripening_routes;
pub use sse::event_stream;
