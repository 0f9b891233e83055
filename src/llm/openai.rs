//! OpenAI-compatible HTTP client.
//!
//! Implements [`LlmClient`] against the `/chat/completions` and `/embeddings`
//! endpoints shared by OpenAI, OpenRouter, and Ollama's compatibility layer.

use crate::llm::client::{ChatMessage, LlmClient, TokenStream};
use crate::types::{AppError, Result};
use crate::utils::config::LlmConfig;
use async_stream::stream;
use async_trait::async_trait;
use futures::StreamExt;
use serde::Deserialize;
use serde_json::json;

/// [`LlmClient`] over any OpenAI-compatible HTTP API.
pub struct OpenAiCompatClient {
    http: reqwest::Client,
    base_url: String,
    api_key: Option<String>,
    chat_model: String,
    embedding_model: String,
}

impl OpenAiCompatClient {
    pub fn new(
        base_url: String,
        api_key: Option<String>,
        chat_model: String,
        embedding_model: String,
    ) -> Self {
        Self {
            http: reqwest::Client::new(),
            base_url: base_url.trim_end_matches('/').to_string(),
            api_key,
            chat_model,
            embedding_model,
        }
    }

    pub fn from_config(config: &LlmConfig) -> Self {
        Self::new(
            config.base_url.clone(),
            config.api_key.clone(),
            config.chat_model.clone(),
            config.embedding_model.clone(),
        )
    }

    fn post(&self, path: &str) -> reqwest::RequestBuilder {
        let mut builder = self.http.post(format!("{}{}", self.base_url, path));
        if let Some(key) = &self.api_key {
            builder = builder.bearer_auth(key);
        }
        builder
    }

    fn chat_body(&self, messages: &[ChatMessage], stream: bool) -> serde_json::Value {
        let rendered: Vec<serde_json::Value> = messages
            .iter()
            .map(|m| json!({ "role": m.role.as_str(), "content": m.content }))
            .collect();
        json!({
            "model": self.chat_model,
            "messages": rendered,
            "stream": stream,
        })
    }
}

#[async_trait]
impl LlmClient for OpenAiCompatClient {
    async fn complete(&self, messages: &[ChatMessage]) -> Result<String> {
        let response = self
            .post("/chat/completions")
            .json(&self.chat_body(messages, false))
            .send()
            .await
            .map_err(|e| AppError::Llm(format!("Chat request failed: {}", e)))?
            .error_for_status()
            .map_err(|e| AppError::Llm(format!("Chat request rejected: {}", e)))?;

        let completion: ChatCompletionResponse = response
            .json()
            .await
            .map_err(|e| AppError::Llm(format!("Malformed chat response: {}", e)))?;

        completion
            .choices
            .into_iter()
            .next()
            .and_then(|c| c.message.content)
            .ok_or_else(|| AppError::Llm("Chat response had no content".to_string()))
    }

    async fn stream(&self, messages: &[ChatMessage]) -> Result<TokenStream> {
        let response = self
            .post("/chat/completions")
            .json(&self.chat_body(messages, true))
            .send()
            .await
            .map_err(|e| AppError::Llm(format!("Chat stream failed: {}", e)))?
            .error_for_status()
            .map_err(|e| AppError::Llm(format!("Chat stream rejected: {}", e)))?;

        let mut bytes = response.bytes_stream();

        // Server-sent events arrive in arbitrary byte chunks; buffer until a
        // full line is available before parsing.
        let output = stream! {
            let mut buffer = String::new();
            while let Some(chunk) = bytes.next().await {
                let chunk = match chunk {
                    Ok(c) => c,
                    Err(e) => {
                        yield Err(AppError::Llm(format!("Stream transport error: {}", e)));
                        break;
                    }
                };
                buffer.push_str(&String::from_utf8_lossy(&chunk));

                while let Some(newline) = buffer.find('\n') {
                    let line = buffer[..newline].trim().to_string();
                    buffer.drain(..=newline);

                    let Some(payload) = sse_data(&line) else {
                        continue;
                    };
                    if payload == "[DONE]" {
                        return;
                    }
                    if let Some(token) = delta_content(payload) {
                        if !token.is_empty() {
                            yield Ok(token);
                        }
                    }
                }
            }
        };

        Ok(Box::new(Box::pin(output)))
    }

    async fn embed(&self, text: &str) -> Result<Vec<f32>> {
        let response = self
            .post("/embeddings")
            .json(&json!({
                "model": self.embedding_model,
                "input": text,
            }))
            .send()
            .await
            .map_err(|e| AppError::Llm(format!("Embedding request failed: {}", e)))?
            .error_for_status()
            .map_err(|e| AppError::Llm(format!("Embedding request rejected: {}", e)))?;

        let embeddings: EmbeddingResponse = response
            .json()
            .await
            .map_err(|e| AppError::Llm(format!("Malformed embedding response: {}", e)))?;

        embeddings
            .data
            .into_iter()
            .next()
            .map(|d| d.embedding)
            .ok_or_else(|| AppError::Llm("Embedding response was empty".to_string()))
    }

    async fn structured_json(
        &self,
        system: &str,
        prompt: &str,
    ) -> Result<Option<serde_json::Value>> {
        let messages = vec![
            ChatMessage::system(format!(
                "{}\nRespond with a single JSON object and nothing else.",
                system
            )),
            ChatMessage::user(prompt),
        ];

        let mut body = self.chat_body(&messages, false);
        body["response_format"] = json!({ "type": "json_object" });

        let response = self
            .post("/chat/completions")
            .json(&body)
            .send()
            .await
            .map_err(|e| AppError::Llm(format!("Structured request failed: {}", e)))?
            .error_for_status()
            .map_err(|e| AppError::Llm(format!("Structured request rejected: {}", e)))?;

        let completion: ChatCompletionResponse = response
            .json()
            .await
            .map_err(|e| AppError::Llm(format!("Malformed chat response: {}", e)))?;

        let Some(content) = completion
            .choices
            .into_iter()
            .next()
            .and_then(|c| c.message.content)
        else {
            return Ok(None);
        };

        Ok(serde_json::from_str(strip_code_fence(&content)).ok())
    }

    fn model_name(&self) -> &str {
        &self.chat_model
    }
}

/// Extract the payload of a `data:` SSE line, if this is one.
fn sse_data(line: &str) -> Option<&str> {
    line.strip_prefix("data:").map(str::trim)
}

/// Pull the delta content out of one streamed chunk, tolerating chunks that
/// carry no delta (role headers, finish markers).
fn delta_content(payload: &str) -> Option<String> {
    let chunk: StreamChunk = serde_json::from_str(payload).ok()?;
    chunk.choices.into_iter().next()?.delta.content
}

/// Models wrap JSON in markdown fences often enough that stripping them is
/// cheaper than a retry round-trip.
fn strip_code_fence(content: &str) -> &str {
    let trimmed = content.trim();
    let Some(inner) = trimmed.strip_prefix("```") else {
        return trimmed;
    };
    let inner = inner.strip_prefix("json").unwrap_or(inner);
    inner.strip_suffix("```").unwrap_or(inner).trim()
}

// ============= Wire Types =============

#[derive(Debug, Deserialize)]
struct ChatCompletionResponse {
    choices: Vec<Choice>,
}

#[derive(Debug, Deserialize)]
struct Choice {
    message: ChoiceMessage,
}

#[derive(Debug, Deserialize)]
struct ChoiceMessage {
    content: Option<String>,
}

#[derive(Debug, Deserialize)]
struct StreamChunk {
    #[serde(default)]
    choices: Vec<StreamChoice>,
}

#[derive(Debug, Deserialize)]
struct StreamChoice {
    delta: Delta,
}

#[derive(Debug, Deserialize, Default)]
struct Delta {
    content: Option<String>,
}

#[derive(Debug, Deserialize)]
struct EmbeddingResponse {
    data: Vec<EmbeddingData>,
}

#[derive(Debug, Deserialize)]
struct EmbeddingData {
    embedding: Vec<f32>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sse_data_extraction() {
        assert_eq!(sse_data("data: {\"x\":1}"), Some("{\"x\":1}"));
        assert_eq!(sse_data("data: [DONE]"), Some("[DONE]"));
        assert_eq!(sse_data(": keep-alive"), None);
        assert_eq!(sse_data(""), None);
    }

    #[test]
    fn test_delta_content_parsing() {
        let payload = r#"{"choices":[{"delta":{"content":"Hel"}}]}"#;
        assert_eq!(delta_content(payload), Some("Hel".to_string()));

        let role_only = r#"{"choices":[{"delta":{"role":"assistant"}}]}"#;
        assert_eq!(delta_content(role_only), None);

        assert_eq!(delta_content("not json"), None);
    }

    #[test]
    fn test_strip_code_fence() {
        assert_eq!(strip_code_fence("{\"a\":1}"), "{\"a\":1}");
        assert_eq!(strip_code_fence("```json\n{\"a\":1}\n```"), "{\"a\":1}");
        assert_eq!(strip_code_fence("```\n{\"a\":1}\n```"), "{\"a\":1}");
    }
}
