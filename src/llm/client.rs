//! LLM client abstraction.

use crate::types::{MessageRole, Result};
use async_trait::async_trait;
use futures::Stream;

/// One turn of a chat exchange sent to the provider.
#[derive(Debug, Clone)]
pub struct ChatMessage {
    pub role: MessageRole,
    pub content: String,
}

impl ChatMessage {
    pub fn system(content: impl Into<String>) -> Self {
        Self {
            role: MessageRole::System,
            content: content.into(),
        }
    }

    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: MessageRole::User,
            content: content.into(),
        }
    }

    pub fn assistant(content: impl Into<String>) -> Self {
        Self {
            role: MessageRole::Assistant,
            content: content.into(),
        }
    }
}

/// Lazy, single-consumer sequence of completion tokens. Dropping the stream
/// closes the underlying HTTP response, which is how a cancelled request
/// stops the provider-side generation.
pub type TokenStream = Box<dyn Stream<Item = Result<String>> + Send + Unpin>;

/// Narrow provider contract the orchestrator and memory store consume.
///
/// All implementations must be safe to share across concurrent requests.
#[async_trait]
pub trait LlmClient: Send + Sync {
    /// Complete a chat exchange and return the full response text.
    async fn complete(&self, messages: &[ChatMessage]) -> Result<String>;

    /// Stream a completion token by token.
    async fn stream(&self, messages: &[ChatMessage]) -> Result<TokenStream>;

    /// Embed text into a fixed-length vector.
    async fn embed(&self, text: &str) -> Result<Vec<f32>>;

    /// Request a JSON object from the model.
    ///
    /// Returns `Ok(None)` when the model answered but the payload could not
    /// be parsed: recoverable absence, not an error. Transport failures
    /// still surface as `Err`.
    async fn structured_json(
        &self,
        system: &str,
        prompt: &str,
    ) -> Result<Option<serde_json::Value>>;

    /// The chat model identifier in use.
    fn model_name(&self) -> &str;
}
