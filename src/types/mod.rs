#![allow(missing_docs)]

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

// ============= API Request/Response Types =============

#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct ResearchRequest {
    pub prompt: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub conversation_id: Option<String>,
    /// Intensity dial in [0, 100]; selects how many results each subtask
    /// search requests. Defaults to the middle band.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub intensity: Option<u8>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub clarification_answers: Option<Vec<String>>,
}

#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct CreateConversationRequest {
    pub title: Option<String>,
}

#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct ConversationResponse {
    pub id: String,
    pub title: Option<String>,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct HealthResponse {
    pub status: String,
    pub version: String,
}

// ============= Conversation Types =============

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct Message {
    pub id: String,
    pub role: MessageRole,
    pub content: String,
    pub timestamp: DateTime<Utc>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "lowercase")]
pub enum MessageRole {
    System,
    User,
    Assistant,
}

impl MessageRole {
    pub fn as_str(&self) -> &'static str {
        match self {
            MessageRole::System => "system",
            MessageRole::User => "user",
            MessageRole::Assistant => "assistant",
        }
    }

    pub fn parse(s: &str) -> Self {
        match s {
            "system" => MessageRole::System,
            "assistant" => MessageRole::Assistant,
            _ => MessageRole::User,
        }
    }
}

/// Read model assembled per request from the message log and a similarity
/// query over stored memories. Never mutated in place.
#[derive(Debug, Clone, Default)]
pub struct ConversationContext {
    pub conversation_id: String,
    pub recent_messages: Vec<Message>,
    pub relevant_memories: Vec<MemoryChunk>,
}

// ============= Research Types =============

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ResearchTask {
    pub description: String,
    pub search_query: String,
    /// Lower priority runs earlier.
    #[serde(default)]
    pub priority: i32,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ResearchPlan {
    pub main_goal: String,
    pub subtasks: Vec<ResearchTask>,
    #[serde(default)]
    pub key_concepts: Vec<String>,
}

impl ResearchPlan {
    /// Single-subtask plan whose query is the raw goal. Used whenever
    /// planning fails or produces nothing, so the pipeline never stalls.
    pub fn fallback(goal: &str) -> Self {
        Self {
            main_goal: goal.to_string(),
            subtasks: vec![ResearchTask {
                description: format!("Research: {}", goal),
                search_query: goal.to_string(),
                priority: 0,
            }],
            key_concepts: Vec::new(),
        }
    }

    /// Order subtasks by ascending priority before execution.
    pub fn sort_subtasks(&mut self) {
        self.subtasks.sort_by_key(|t| t.priority);
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct SearchResult {
    pub title: String,
    pub url: String,
    pub snippet: String,
    /// Filled after content fetch; absent until then.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub content: Option<String>,
}

/// Everything gathered so far in one orchestration run. Append-only across
/// iterations; never shrinks.
#[derive(Debug, Clone, Default)]
pub struct GatheredInformation {
    pub results: Vec<SearchResult>,
    pub stored_memory_ids: Vec<String>,
    pub total_sources_found: usize,
}

impl GatheredInformation {
    pub fn record_results(&mut self, results: Vec<SearchResult>) {
        self.total_sources_found += results.len();
        self.results.extend(results);
    }

    pub fn record_memory_id(&mut self, id: String) {
        self.stored_memory_ids.push(id);
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReflectionResult {
    /// Estimate in [0, 1] of answer completeness/groundedness.
    pub confidence_score: f32,
    pub identified_gaps: Vec<String>,
    pub suggested_additional_searches: Vec<String>,
    pub requires_more_research: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ClarificationResult {
    pub questions: Vec<String>,
    pub rationale: String,
}

/// Discrete bands the caller-supplied intensity dial maps onto. The result
/// count per band is configuration, not a function of the raw level.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IntensityBand {
    Low,
    Mid,
    High,
}

impl IntensityBand {
    pub fn from_level(level: u8) -> Self {
        match level {
            0..=33 => IntensityBand::Low,
            34..=66 => IntensityBand::Mid,
            _ => IntensityBand::High,
        }
    }
}

// ============= Memory Types =============

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct MemoryChunk {
    pub id: String,
    pub text: String,
    pub source: String,
    pub tags: Vec<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub conversation_id: Option<String>,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ChunkErrorKind {
    Embedding,
    Index,
    Storage,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChunkError {
    pub chunk_index: usize,
    pub chunk_id: String,
    pub message: String,
    pub kind: ChunkErrorKind,
}

/// Per-chunk outcome of one `store_memory` call. Callers branch on the
/// tri-state below instead of catching errors: partial failure is an
/// expected condition here, not an exceptional one.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct StoreMemoryResult {
    /// Id of the first successfully stored chunk, if any.
    pub primary_id: Option<String>,
    pub total_chunks: usize,
    pub successful_chunks: usize,
    pub failed_chunks: usize,
    pub errors: Vec<ChunkError>,
}

impl StoreMemoryResult {
    pub fn is_fully_successful(&self) -> bool {
        self.failed_chunks == 0
    }

    pub fn is_partial(&self) -> bool {
        self.successful_chunks > 0 && self.successful_chunks < self.total_chunks
    }

    pub fn is_failure(&self) -> bool {
        self.total_chunks > 0 && self.successful_chunks == 0
    }
}

// ============= Error Types =============

#[derive(Debug, thiserror::Error)]
pub enum AppError {
    #[error("Database error: {0}")]
    Database(String),

    #[error("LLM error: {0}")]
    Llm(String),

    #[error("Search error: {0}")]
    Search(String),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Invalid input: {0}")]
    InvalidInput(String),

    #[error("Internal error: {0}")]
    Internal(String),
}

impl From<sage_vector::Error> for AppError {
    fn from(err: sage_vector::Error) -> Self {
        match err {
            sage_vector::Error::DimensionMismatch { .. } | sage_vector::Error::InvalidVector(_) => {
                AppError::InvalidInput(err.to_string())
            }
            sage_vector::Error::Cancelled => AppError::Internal(err.to_string()),
        }
    }
}

impl axum::response::IntoResponse for AppError {
    fn into_response(self) -> axum::response::Response {
        let (status, message) = match self {
            AppError::Database(msg) => (axum::http::StatusCode::INTERNAL_SERVER_ERROR, msg),
            AppError::Llm(msg) => (axum::http::StatusCode::INTERNAL_SERVER_ERROR, msg),
            AppError::Search(msg) => (axum::http::StatusCode::BAD_GATEWAY, msg),
            AppError::NotFound(msg) => (axum::http::StatusCode::NOT_FOUND, msg),
            AppError::InvalidInput(msg) => (axum::http::StatusCode::BAD_REQUEST, msg),
            AppError::Internal(msg) => (axum::http::StatusCode::INTERNAL_SERVER_ERROR, msg),
        };

        let body = serde_json::json!({
            "error": message
        });

        (status, axum::Json(body)).into_response()
    }
}

pub type Result<T> = std::result::Result<T, AppError>;
