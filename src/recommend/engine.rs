//! Recommendation engine: asks the LLM for a rescheduling plan and holds it
//! to the response schema.

use std::sync::Arc;

use async_trait::async_trait;
use tracing::{debug, info, warn};

use crate::error::RecommendationError;
use crate::llm::provider::{ChatMessage, CompletionRequest, LlmProvider};

use super::schema::{RescheduleRecommendation, response_json_schema};

/// A single request to the engine.
#[derive(Debug, Clone)]
pub struct RecommendationRequest {
    pub prompt: String,
    pub response_json_schema: serde_json::Value,
}

impl RecommendationRequest {
    /// Request carrying the standard rescheduling schema.
    pub fn new(prompt: impl Into<String>) -> Self {
        Self {
            prompt: prompt.into(),
            response_json_schema: response_json_schema(),
        }
    }
}

/// External collaborator that turns a disruption prompt into a plan.
#[async_trait]
pub trait RecommendationEngine: Send + Sync {
    async fn recommend(
        &self,
        request: RecommendationRequest,
    ) -> Result<RescheduleRecommendation, RecommendationError>;
}

/// Sampling settings for the LLM-backed engine.
#[derive(Debug, Clone)]
pub struct EngineConfig {
    pub temperature: f32,
    pub max_tokens: u32,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            temperature: 0.2,
            max_tokens: 1024,
        }
    }
}

/// `RecommendationEngine` backed by an `LlmProvider`.
pub struct LlmRecommendationEngine {
    llm: Arc<dyn LlmProvider>,
    config: EngineConfig,
}

impl LlmRecommendationEngine {
    pub fn new(llm: Arc<dyn LlmProvider>, config: EngineConfig) -> Self {
        Self { llm, config }
    }
}

#[async_trait]
impl RecommendationEngine for LlmRecommendationEngine {
    async fn recommend(
        &self,
        request: RecommendationRequest,
    ) -> Result<RescheduleRecommendation, RecommendationError> {
        info!(model = %self.llm.model_name(), "Requesting rescheduling recommendation");

        let system_prompt = format!(
            "You are a production scheduling assistant for a manufacturing floor. \
             Given a disruption, propose concrete rescheduling actions.\n\n\
             Respond with a single JSON object that matches this JSON Schema:\n{schema}\n\n\
             - \"estimated_delay\" is in minutes\n\
             - \"impact\" is a short description of the effect of the action\n\n\
             ONLY output the JSON object. No other text.",
            schema = request.response_json_schema
        );

        let completion = CompletionRequest::new(vec![
            ChatMessage::system(system_prompt),
            ChatMessage::user(request.prompt),
        ])
        .with_temperature(self.config.temperature)
        .with_max_tokens(self.config.max_tokens);

        let response = self.llm.complete(completion).await?;
        debug!(
            output_tokens = response.output_tokens,
            "Recommendation response received"
        );

        let json = extract_json_object(&response.content);
        RescheduleRecommendation::from_json(&json).inspect_err(|e| {
            warn!(error = %e, "Recommendation did not match schema");
        })
    }
}

/// Pull a JSON object out of a model reply that may wrap it in prose or fences.
fn extract_json_object(text: &str) -> String {
    let trimmed = text.trim();

    if trimmed.starts_with('{') {
        return trimmed.to_string();
    }

    if let Some(start) = trimmed.find("```json") {
        let after = &trimmed[start + 7..];
        if let Some(end) = after.find("```") {
            return after[..end].trim().to_string();
        }
    }

    if let Some(start) = trimmed.find("```") {
        let after = &trimmed[start + 3..];
        if let Some(end) = after.find("```") {
            let inner = after[..end].trim();
            if inner.starts_with('{') {
                return inner.to_string();
            }
        }
    }

    if let (Some(start), Some(end)) = (trimmed.find('{'), trimmed.rfind('}')) {
        if end > start {
            return trimmed[start..=end].to_string();
        }
    }

    trimmed.to_string()
}
