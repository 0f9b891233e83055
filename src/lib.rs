//! # S.A.G.E - Search-Augmented Generative Explorer
//!
//! An iterative deep-research server: a pipeline of LLM-backed agent stages
//! (clarify → plan → search → synthesize → reflect) that answers a research
//! question, persists discovered facts as retrievable vector memory, and
//! iterates until confidence in the answer is sufficient or the iteration
//! budget is exhausted.
//!
//! ## Overview
//!
//! S.A.G.E can be used in two ways:
//!
//! 1. **As a standalone server** - Run the `sage-server` binary
//! 2. **As a library** - Import components into your own Rust project
//!
//! ## Quick Start (Library Usage)
//!
//! ```rust,ignore
//! use sage::{research::ResearchOrchestrator, ResearchEvent};
//! use futures::StreamExt;
//!
//! let mut events = orchestrator.process_research(
//!     "How do lithium-ion batteries degrade?".to_string(),
//!     conversation_id,
//!     50,   // intensity dial
//!     None, // no clarification answers yet
//! );
//!
//! while let Some(event) = events.next().await {
//!     match event {
//!         ResearchEvent::Token { text } => print!("{}", text),
//!         ResearchEvent::Done => break,
//!         _ => {}
//!     }
//! }
//! ```
//!
//! ## Modules
//!
//! - [`agents`] - Polymorphic agent stages (clarify, plan, synthesize, reflect)
//! - [`api`] - REST/SSE handlers and routes
//! - [`db`] - Relational persistence (libsql)
//! - [`llm`] - LLM provider client and abstractions
//! - [`memory`] - Chunking, embedding-indexed memory, conversation context
//! - [`research`] - The iterative research orchestrator and its event stream
//! - [`search`] - Web search gateway with caching and content fetch
//! - [`types`] - Common types and error handling
//!
//! ## Architecture
//!
//! One orchestrator run serves one request. Stages execute sequentially per
//! run so streamed events keep a natural order; the CPU-bound vector scan is
//! the one piece offloaded to the blocking pool. Multiple runs may execute
//! concurrently against the same stores.

#![warn(missing_docs)]
#![warn(rustdoc::missing_crate_level_docs)]

/// Polymorphic agent stages of the research pipeline.
pub mod agents;
/// HTTP API handlers and routes.
pub mod api;
/// Relational persistence (conversations, memory rows, search cache).
pub mod db;
/// LLM provider client and abstractions.
pub mod llm;
/// Vector-backed memory and conversation context.
pub mod memory;
/// Iterative research orchestration and event streaming.
pub mod research;
/// Web search gateway and content fetching.
pub mod search;
/// Core types (requests, domain model, errors).
pub mod types;
/// Configuration utilities.
pub mod utils;

// Re-export commonly used types
pub use db::Database;
pub use llm::{LlmClient, OpenAiCompatClient};
pub use memory::{MemoryStore, TextChunker};
pub use research::{ResearchEvent, ResearchOrchestrator, ResearchStage};
pub use search::{CachedSearchGateway, ContentFetcher, SearchGateway, WebSearchGateway};
pub use types::{AppError, Result};
pub use utils::Config;

use std::sync::Arc;

/// Application state shared across handlers
#[derive(Clone)]
pub struct AppState {
    /// Resolved configuration
    pub config: Arc<Config>,
    /// Memory store (vector index + conversation persistence)
    pub memory: Arc<MemoryStore>,
    /// The research pipeline
    pub orchestrator: Arc<ResearchOrchestrator>,
}
