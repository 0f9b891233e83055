//! Shared test doubles: deterministic stand-ins for the LLM provider, agent
//! stages, and search gateway.

#![allow(dead_code)]

use async_trait::async_trait;
use parking_lot::Mutex;
use sage::agents::{Clarifier, Planner, Reflector, Synthesizer};
use sage::llm::{ChatMessage, LlmClient, TokenStream};
use sage::search::{ContentFetcher, SearchGateway};
use sage::types::{
    AppError, ClarificationResult, ConversationContext, GatheredInformation, IntensityBand,
    MemoryChunk, ReflectionResult, ResearchPlan, ResearchTask, Result, SearchResult,
};
use std::collections::{HashMap, VecDeque};
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

pub const TEST_DIMENSION: usize = 8;

/// Deterministic pseudo-embedding: the same text always maps to the same
/// vector, different texts almost always differ.
pub fn embedding_for(text: &str, dimension: usize) -> Vec<f32> {
    let seed: u64 = text
        .bytes()
        .fold(1469598103934665603u64, |h, b| (h ^ b as u64).wrapping_mul(1099511628211));
    (0..dimension)
        .map(|i| {
            let x = seed.wrapping_mul(i as u64 + 1) % 1000;
            x as f32 / 1000.0 + 0.001
        })
        .collect()
}

/// LLM stub: deterministic embeddings, canned completions, configurable
/// per-call embedding failures.
pub struct StubLlm {
    dimension: usize,
    embed_calls: AtomicUsize,
    fail_embed_on: Vec<usize>,
}

impl StubLlm {
    pub fn new() -> Self {
        Self {
            dimension: TEST_DIMENSION,
            embed_calls: AtomicUsize::new(0),
            fail_embed_on: Vec::new(),
        }
    }

    /// Fail the nth (zero-based) embed calls.
    pub fn failing_on(fail_embed_on: Vec<usize>) -> Self {
        Self {
            dimension: TEST_DIMENSION,
            embed_calls: AtomicUsize::new(0),
            fail_embed_on,
        }
    }
}

#[async_trait]
impl LlmClient for StubLlm {
    async fn complete(&self, _messages: &[ChatMessage]) -> Result<String> {
        Ok("stub completion".to_string())
    }

    async fn stream(&self, _messages: &[ChatMessage]) -> Result<TokenStream> {
        let tokens = vec![Ok("stub ".to_string()), Ok("stream".to_string())];
        Ok(Box::new(Box::pin(futures::stream::iter(tokens))))
    }

    async fn embed(&self, text: &str) -> Result<Vec<f32>> {
        let call = self.embed_calls.fetch_add(1, Ordering::SeqCst);
        if self.fail_embed_on.contains(&call) {
            return Err(AppError::Llm("Injected embedding failure".to_string()));
        }
        Ok(embedding_for(text, self.dimension))
    }

    async fn structured_json(
        &self,
        _system: &str,
        _prompt: &str,
    ) -> Result<Option<serde_json::Value>> {
        Ok(None)
    }

    fn model_name(&self) -> &str {
        "stub-model"
    }
}

// ============= Stage stubs =============

pub struct StubClarifier {
    pub calls: AtomicUsize,
}

impl StubClarifier {
    pub fn new() -> Self {
        Self {
            calls: AtomicUsize::new(0),
        }
    }
}

#[async_trait]
impl Clarifier for StubClarifier {
    async fn clarify(
        &self,
        query: &str,
        _context: &ConversationContext,
        _band: IntensityBand,
    ) -> Result<ClarificationResult> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        Ok(ClarificationResult {
            questions: vec![format!("Which aspect of {}?", query)],
            rationale: "stub".to_string(),
        })
    }
}

/// Planner returning a fixed number of subtasks, or absence when `count`
/// is zero.
pub struct StubPlanner {
    pub count: usize,
}

#[async_trait]
impl Planner for StubPlanner {
    async fn plan(
        &self,
        goal: &str,
        _context: &ConversationContext,
        _band: IntensityBand,
    ) -> Result<Option<ResearchPlan>> {
        if self.count == 0 {
            return Ok(None);
        }
        Ok(Some(ResearchPlan {
            main_goal: goal.to_string(),
            // Reverse priorities to exercise the sort.
            subtasks: (0..self.count)
                .map(|i| ResearchTask {
                    description: format!("subtask {}", i),
                    search_query: format!("query-{}", i),
                    priority: (self.count - i) as i32,
                })
                .collect(),
            key_concepts: vec!["stub".to_string()],
        }))
    }
}

pub struct StubSynthesizer;

#[async_trait]
impl Synthesizer for StubSynthesizer {
    async fn synthesize(
        &self,
        _query: &str,
        _sources: &[SearchResult],
        _memories: &[MemoryChunk],
    ) -> Result<TokenStream> {
        let tokens = vec![
            Ok("Grounded ".to_string()),
            Ok("answer ".to_string()),
            Ok("[1]".to_string()),
        ];
        Ok(Box::new(Box::pin(futures::stream::iter(tokens))))
    }
}

/// Reflector popping one confidence per call; repeats the last one when the
/// sequence runs dry.
pub struct SequenceReflector {
    scores: Mutex<VecDeque<f32>>,
    last: Mutex<f32>,
}

impl SequenceReflector {
    pub fn new(scores: Vec<f32>) -> Self {
        Self {
            scores: Mutex::new(scores.into()),
            last: Mutex::new(0.0),
        }
    }
}

#[async_trait]
impl Reflector for SequenceReflector {
    async fn reflect(
        &self,
        query: &str,
        _answer: &str,
        _info: &GatheredInformation,
    ) -> Result<ReflectionResult> {
        let score = {
            let mut scores = self.scores.lock();
            match scores.pop_front() {
                Some(s) => {
                    *self.last.lock() = s;
                    s
                }
                None => *self.last.lock(),
            }
        };
        let requires = score < 0.7;
        Ok(ReflectionResult {
            confidence_score: score,
            identified_gaps: if requires {
                vec!["missing depth".to_string()]
            } else {
                vec![]
            },
            suggested_additional_searches: if requires {
                vec![format!("{} follow-up", query)]
            } else {
                vec![]
            },
            requires_more_research: requires,
        })
    }
}

// ============= Gateway / fetcher stubs =============

/// Records every (query, max_results) call; fails queries containing
/// `fail_marker`.
pub struct RecordingGateway {
    pub calls: Mutex<Vec<(String, usize)>>,
    pub results_per_query: usize,
    pub fail_marker: Option<String>,
}

impl RecordingGateway {
    pub fn new(results_per_query: usize) -> Self {
        Self {
            calls: Mutex::new(Vec::new()),
            results_per_query,
            fail_marker: None,
        }
    }

    pub fn failing_on(results_per_query: usize, marker: &str) -> Self {
        Self {
            calls: Mutex::new(Vec::new()),
            results_per_query,
            fail_marker: Some(marker.to_string()),
        }
    }
}

#[async_trait]
impl SearchGateway for RecordingGateway {
    async fn search(&self, query: &str, max_results: usize) -> Result<Vec<SearchResult>> {
        self.calls.lock().push((query.to_string(), max_results));
        if let Some(marker) = &self.fail_marker {
            if query.contains(marker.as_str()) {
                return Err(AppError::Search("Injected search failure".to_string()));
            }
        }
        Ok((0..self.results_per_query)
            .map(|i| SearchResult {
                title: format!("{} result {}", query, i),
                url: format!("https://example.com/{}/{}", query, i),
                snippet: format!("Snippet {} for {}", i, query),
                content: None,
            })
            .collect())
    }
}

pub struct NullFetcher;

#[async_trait]
impl ContentFetcher for NullFetcher {
    async fn fetch_content(
        &self,
        _urls: &[String],
        _timeout_per_url: Duration,
    ) -> HashMap<String, String> {
        HashMap::new()
    }
}

// ============= Wiring helpers =============

pub async fn test_memory_store(db: Arc<sage::Database>) -> Arc<sage::MemoryStore> {
    let config = sage::utils::config::MemoryConfig {
        chunk_max_tokens: 64,
        chunk_overlap_tokens: 8,
        history_window: 10,
        memory_top_k: 5,
        retention_days: 30,
    };
    Arc::new(
        sage::MemoryStore::open(db, Arc::new(StubLlm::new()), config, TEST_DIMENSION)
            .await
            .unwrap(),
    )
}

pub struct OrchestratorParts {
    pub planner_count: usize,
    pub reflector_scores: Vec<f32>,
    pub results_per_query: usize,
    pub gateway_fail_marker: Option<String>,
    pub max_iterations: u32,
}

impl Default for OrchestratorParts {
    fn default() -> Self {
        Self {
            planner_count: 2,
            reflector_scores: vec![1.0],
            results_per_query: 2,
            gateway_fail_marker: None,
            max_iterations: 3,
        }
    }
}

pub async fn test_orchestrator(
    parts: OrchestratorParts,
) -> (Arc<sage::ResearchOrchestrator>, Arc<RecordingGateway>) {
    let db = Arc::new(sage::Database::open(":memory:").await.unwrap());
    let memory = test_memory_store(db).await;

    let gateway = Arc::new(match parts.gateway_fail_marker {
        Some(marker) => RecordingGateway::failing_on(parts.results_per_query, &marker),
        None => RecordingGateway::new(parts.results_per_query),
    });

    let search_config = sage::utils::config::SearchConfig {
        subtask_delay_ms: 0,
        fetch_top_n: 0,
        ..Default::default()
    };
    let research_config = sage::utils::config::ResearchConfig {
        confidence_threshold: 0.7,
        max_iterations: parts.max_iterations,
        ..Default::default()
    };

    let orchestrator = Arc::new(sage::ResearchOrchestrator::new(
        Arc::new(StubClarifier::new()),
        Arc::new(StubPlanner {
            count: parts.planner_count,
        }),
        Arc::new(StubSynthesizer),
        Arc::new(SequenceReflector::new(parts.reflector_scores)),
        gateway.clone(),
        Arc::new(NullFetcher),
        memory,
        search_config,
        research_config,
    ));

    (orchestrator, gateway)
}
