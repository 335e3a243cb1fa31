//! Rescheduling recommendations: the response schema and the engine seam.

pub mod engine;
pub mod schema;

pub use engine::{
    EngineConfig, LlmRecommendationEngine, RecommendationEngine, RecommendationRequest,
};
pub use schema::{Recommendation, RescheduleRecommendation, response_json_schema};
