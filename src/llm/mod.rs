//! LLM provider client and abstractions.
//!
//! The rest of the application talks to one narrow contract, [`LlmClient`]:
//! full completions, token streaming, embeddings, and best-effort structured
//! JSON output. The bundled implementation speaks the OpenAI-compatible HTTP
//! API, which covers OpenAI, OpenRouter, and a local Ollama alike; agent
//! stages accept any `Arc<dyn LlmClient>`, so tests swap in deterministic
//! stubs.

pub mod client;
pub mod openai;

pub use client::{ChatMessage, LlmClient, TokenStream};
pub use openai::OpenAiCompatClient;
