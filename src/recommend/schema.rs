//! Structured response contract for rescheduling recommendations.

use serde::{Deserialize, Serialize};

use crate::error::RecommendationError;

/// One suggested action.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Recommendation {
    pub action: String,
    pub resource: String,
    pub impact: String,
}

/// Engine response for a single disruption.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RescheduleRecommendation {
    pub recommendations: Vec<Recommendation>,
    /// Expected delay in minutes. Engines sometimes omit it.
    #[serde(default)]
    pub estimated_delay: Option<f64>,
    #[serde(default)]
    pub priority_changes: Vec<String>,
}

impl RescheduleRecommendation {
    /// Parse and check an engine payload against the schema.
    pub fn from_json(raw: &str) -> Result<Self, RecommendationError> {
        let parsed: Self =
            serde_json::from_str(raw).map_err(|e| RecommendationError::SchemaViolation {
                reason: e.to_string(),
            })?;
        parsed.validate()?;
        Ok(parsed)
    }

    pub fn validate(&self) -> Result<(), RecommendationError> {
        if let Some(delay) = self.estimated_delay {
            if !delay.is_finite() || delay < 0.0 {
                return Err(RecommendationError::SchemaViolation {
                    reason: format!("estimated_delay must be a non-negative number, got {delay}"),
                });
            }
        }
        Ok(())
    }

    /// Estimated delay, or `default` when the engine left it out.
    /// An explicit zero is a real answer and is kept.
    pub fn delay_or(&self, default: f64) -> f64 {
        self.estimated_delay.unwrap_or(default)
    }
}

/// JSON Schema sent alongside every recommendation prompt.
pub fn response_json_schema() -> serde_json::Value {
    serde_json::json!({
        "type": "object",
        "properties": {
            "recommendations": {
                "type": "array",
                "items": {
                    "type": "object",
                    "properties": {
                        "action": { "type": "string" },
                        "resource": { "type": "string" },
                        "impact": { "type": "string" }
                    },
                    "required": ["action", "resource", "impact"]
                }
            },
            "estimated_delay": { "type": "number" },
            "priority_changes": {
                "type": "array",
                "items": { "type": "string" }
            }
        },
        "required": ["recommendations"]
    })
}
