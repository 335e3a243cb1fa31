//! Bridges rig-core completion models to `LlmProvider`.

use async_trait::async_trait;
use rig::completion::message::{AssistantContent, Message as RigMessage};
use rig::completion::{CompletionError, CompletionModel};

use crate::error::LlmError;
use crate::llm::provider::{ChatMessage, CompletionRequest, CompletionResponse, LlmProvider, Role};

/// Anthropic rejects requests without `max_tokens`.
const DEFAULT_MAX_TOKENS: u64 = 1024;

pub struct RigAdapter<M> {
    model: M,
    model_name: String,
    provider: &'static str,
}

impl<M: CompletionModel> RigAdapter<M> {
    pub fn new(model: M, model_name: &str, provider: &'static str) -> Self {
        Self {
            model,
            model_name: model_name.to_string(),
            provider,
        }
    }
}

/// Messages in rig's shape: preamble, chat history, then the prompt.
struct RigParts {
    preamble: Option<String>,
    history: Vec<RigMessage>,
    prompt: RigMessage,
}

fn to_rig_parts(messages: &[ChatMessage], provider: &str) -> Result<RigParts, LlmError> {
    let system: Vec<&str> = messages
        .iter()
        .filter(|m| m.role == Role::System)
        .map(|m| m.content.as_str())
        .collect();
    let preamble = (!system.is_empty()).then(|| system.join("\n\n"));

    let mut history: Vec<RigMessage> = messages
        .iter()
        .filter(|m| m.role != Role::System)
        .map(|m| match m.role {
            Role::Assistant => RigMessage::assistant(m.content.clone()),
            _ => RigMessage::user(m.content.clone()),
        })
        .collect();

    let prompt = history.pop().ok_or_else(|| LlmError::RequestFailed {
        provider: provider.to_string(),
        reason: "request has no user or assistant message".to_string(),
    })?;

    Ok(RigParts {
        preamble,
        history,
        prompt,
    })
}

fn text_content<'a>(choice: impl IntoIterator<Item = &'a AssistantContent>) -> String {
    choice
        .into_iter()
        .filter_map(|c| match c {
            AssistantContent::Text(t) => Some(t.text.as_str()),
            _ => None,
        })
        .collect::<Vec<_>>()
        .join("")
}

fn map_error(err: CompletionError, provider: &str) -> LlmError {
    match err {
        CompletionError::JsonError(e) => LlmError::Json(e),
        CompletionError::ResponseError(reason) => LlmError::InvalidResponse {
            provider: provider.to_string(),
            reason,
        },
        CompletionError::ProviderError(body) if body.contains("authentication_error") => {
            LlmError::AuthFailed {
                provider: provider.to_string(),
            }
        }
        CompletionError::ProviderError(body) if body.contains("rate_limit_error") => {
            LlmError::RateLimited {
                provider: provider.to_string(),
                retry_after: None,
            }
        }
        other => LlmError::RequestFailed {
            provider: provider.to_string(),
            reason: other.to_string(),
        },
    }
}

#[async_trait]
impl<M> LlmProvider for RigAdapter<M>
where
    M: CompletionModel + Send + Sync + 'static,
{
    fn model_name(&self) -> &str {
        &self.model_name
    }

    async fn complete(&self, request: CompletionRequest) -> Result<CompletionResponse, LlmError> {
        let parts = to_rig_parts(&request.messages, self.provider)?;

        let mut builder = self
            .model
            .completion_request(parts.prompt)
            .messages(parts.history)
            .max_tokens(request.max_tokens.map_or(DEFAULT_MAX_TOKENS, u64::from));
        if let Some(preamble) = parts.preamble {
            builder = builder.preamble(preamble);
        }
        if let Some(temperature) = request.temperature {
            builder = builder.temperature(f64::from(temperature));
        }

        let response = builder
            .send()
            .await
            .map_err(|e| map_error(e, self.provider))?;

        let content = text_content(response.choice.iter());
        if content.is_empty() {
            return Err(LlmError::InvalidResponse {
                provider: self.provider.to_string(),
                reason: "response contained no text content".to_string(),
            });
        }

        tracing::debug!(
            model = %self.model_name,
            input_tokens = response.usage.input_tokens,
            output_tokens = response.usage.output_tokens,
            "Completion received"
        );
        Ok(CompletionResponse {
            content,
            input_tokens: response.usage.input_tokens,
            output_tokens: response.usage.output_tokens,
        })
    }
}
