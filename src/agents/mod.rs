//! Agent stages of the research pipeline.
//!
//! Each stage is one capability behind one trait: clarify, plan, synthesize,
//! reflect. The LLM-backed implementations here and the deterministic stubs
//! in the test suites are interchangeable at composition time; the
//! orchestrator only ever sees the traits.

pub mod clarifier;
pub mod planner;
pub mod reflector;
pub mod synthesizer;

use crate::llm::TokenStream;
use crate::types::{
    ClarificationResult, ConversationContext, GatheredInformation, IntensityBand, MemoryChunk,
    ReflectionResult, ResearchPlan, Result, SearchResult,
};
use async_trait::async_trait;

// Re-export commonly used types
pub use clarifier::LlmClarifier;
pub use planner::LlmPlanner;
pub use reflector::LlmReflector;
pub use synthesizer::LlmSynthesizer;

/// Produces clarifying questions for an underspecified query.
#[async_trait]
pub trait Clarifier: Send + Sync {
    async fn clarify(
        &self,
        query: &str,
        context: &ConversationContext,
        band: IntensityBand,
    ) -> Result<ClarificationResult>;
}

/// Decomposes a research goal into prioritized subtasks.
///
/// `Ok(None)` signals structured-output absence; the orchestrator supplies
/// the fallback plan.
#[async_trait]
pub trait Planner: Send + Sync {
    async fn plan(
        &self,
        goal: &str,
        context: &ConversationContext,
        band: IntensityBand,
    ) -> Result<Option<ResearchPlan>>;
}

/// Streams a cited answer from gathered sources and recalled memories.
#[async_trait]
pub trait Synthesizer: Send + Sync {
    async fn synthesize(
        &self,
        query: &str,
        sources: &[SearchResult],
        memories: &[MemoryChunk],
    ) -> Result<TokenStream>;
}

/// Scores confidence in an answer and names the gaps.
#[async_trait]
pub trait Reflector: Send + Sync {
    async fn reflect(
        &self,
        query: &str,
        answer: &str,
        info: &GatheredInformation,
    ) -> Result<ReflectionResult>;
}
