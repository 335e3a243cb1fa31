//! Error types for the floor control core.

use std::time::Duration;

/// Top-level error type.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("Storage error: {0}")]
    Storage(#[from] StorageError),

    #[error("Lifecycle error: {0}")]
    Lifecycle(#[from] LifecycleError),

    #[error("Validation error: {0}")]
    Validation(#[from] ValidationError),

    #[error("LLM error: {0}")]
    Llm(#[from] LlmError),

    #[error("Recommendation error: {0}")]
    Recommendation(#[from] RecommendationError),
}

/// Configuration-related errors.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Missing required environment variable: {0}")]
    MissingEnvVar(String),

    #[error("Invalid configuration value for {key}: {message}")]
    InvalidValue { key: String, message: String },

    #[error("Failed to read seed file {path}: {reason}")]
    Seed { path: String, reason: String },
}

/// Failures reported by the entity store collaborator.
///
/// The core surfaces these to callers and never retries.
#[derive(Debug, thiserror::Error)]
pub enum StorageError {
    #[error("Store unavailable: {0}")]
    Unavailable(String),

    #[error("Query failed: {0}")]
    Query(String),

    #[error("Entity not found: {entity} with id {id}")]
    NotFound { entity: String, id: String },

    #[error("Serialization error: {0}")]
    Serialization(String),

    #[error("Migration failed: {0}")]
    Migration(String),
}

impl StorageError {
    pub fn not_found(entity: &str, id: &str) -> Self {
        Self::NotFound {
            entity: entity.to_string(),
            id: id.to_string(),
        }
    }
}

/// Rejected job status changes.
#[derive(Debug, thiserror::Error)]
pub enum LifecycleError {
    #[error("Job {id} cannot transition from {from} to {to}: {reason}")]
    InvalidTransition {
        id: String,
        from: String,
        to: String,
        reason: String,
    },
}

/// Rejected input for new records.
#[derive(Debug, thiserror::Error)]
pub enum ValidationError {
    #[error("Field {field} is invalid: {reason}")]
    InvalidField { field: String, reason: String },
}

/// LLM provider errors.
#[derive(Debug, thiserror::Error)]
pub enum LlmError {
    #[error("Provider {provider} request failed: {reason}")]
    RequestFailed { provider: String, reason: String },

    #[error("Provider {provider} rate limited, retry after {retry_after:?}")]
    RateLimited {
        provider: String,
        retry_after: Option<Duration>,
    },

    #[error("Invalid response from {provider}: {reason}")]
    InvalidResponse { provider: String, reason: String },

    #[error("Authentication failed for provider {provider}")]
    AuthFailed { provider: String },

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

/// Failures of the recommendation engine collaborator.
#[derive(Debug, thiserror::Error)]
pub enum RecommendationError {
    #[error("Recommendation transport failed: {0}")]
    Transport(#[from] LlmError),

    #[error("Recommendation does not match the response schema: {reason}")]
    SchemaViolation { reason: String },
}

/// Result type alias for the crate.
pub type Result<T> = std::result::Result<T, Error>;
