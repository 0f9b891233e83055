use serde::Deserialize;
use std::env;

use crate::types::IntensityBand;

#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    pub server: ServerConfig,
    pub database: DatabaseConfig,
    pub llm: LlmConfig,
    pub memory: MemoryConfig,
    pub search: SearchConfig,
    pub research: ResearchConfig,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
}

#[derive(Debug, Clone, Deserialize)]
pub struct DatabaseConfig {
    /// Path to the libsql database file. `:memory:` keeps everything
    /// in-process, which the test suites use.
    pub path: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct LlmConfig {
    /// Base URL of an OpenAI-compatible API (OpenAI, OpenRouter, Ollama...).
    pub base_url: String,
    pub api_key: Option<String>,
    pub chat_model: String,
    pub embedding_model: String,
    pub embedding_dimension: usize,
}

#[derive(Debug, Clone, Deserialize)]
pub struct MemoryConfig {
    pub chunk_max_tokens: usize,
    pub chunk_overlap_tokens: usize,
    /// Recent messages included when assembling conversation context.
    pub history_window: usize,
    /// Memories retrieved per context assembly.
    pub memory_top_k: usize,
    /// Chunks older than this are eligible for compaction.
    pub retention_days: i64,
}

impl Default for MemoryConfig {
    fn default() -> Self {
        Self {
            chunk_max_tokens: 256,
            chunk_overlap_tokens: 32,
            history_window: 10,
            memory_top_k: 5,
            retention_days: 30,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct SearchConfig {
    pub cache_ttl_secs: u64,
    pub fetch_timeout_secs: u64,
    /// How many of the gathered sources get a full-content fetch before
    /// synthesis.
    pub fetch_top_n: usize,
    /// Results requested per subtask query, by intensity band.
    pub results_low: usize,
    pub results_mid: usize,
    pub results_high: usize,
    /// Pause between subtask searches to respect external rate limits.
    pub subtask_delay_ms: u64,
}

impl SearchConfig {
    pub fn results_for_band(&self, band: IntensityBand) -> usize {
        match band {
            IntensityBand::Low => self.results_low,
            IntensityBand::Mid => self.results_mid,
            IntensityBand::High => self.results_high,
        }
    }
}

impl Default for SearchConfig {
    fn default() -> Self {
        Self {
            cache_ttl_secs: 3600,
            fetch_timeout_secs: 10,
            fetch_top_n: 3,
            results_low: 3,
            results_mid: 5,
            results_high: 8,
            subtask_delay_ms: 500,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct ResearchConfig {
    pub confidence_threshold: f32,
    /// Hard cap on search/synthesize/reflect cycles per request.
    pub max_iterations: u32,
    pub reflection: ReflectionWeights,
}

impl Default for ResearchConfig {
    fn default() -> Self {
        Self {
            confidence_threshold: 0.7,
            max_iterations: 3,
            reflection: ReflectionWeights::default(),
        }
    }
}

/// Weights for the fallback confidence heuristic. The exact formula is a
/// tunable policy, not a contract; see `agents::reflector`.
#[derive(Debug, Clone, Deserialize)]
pub struct ReflectionWeights {
    pub citation_weight: f32,
    pub source_weight: f32,
    pub expected_citations: usize,
    pub expected_sources: usize,
}

impl Default for ReflectionWeights {
    fn default() -> Self {
        Self {
            citation_weight: 0.6,
            source_weight: 0.4,
            expected_citations: 4,
            expected_sources: 5,
        }
    }
}

impl Config {
    pub fn from_env() -> Result<Self, Box<dyn std::error::Error>> {
        dotenvy::dotenv().ok();

        Ok(Config {
            server: ServerConfig {
                host: env::var("HOST").unwrap_or_else(|_| "127.0.0.1".to_string()),
                port: env::var("PORT")
                    .unwrap_or_else(|_| "3000".to_string())
                    .parse()?,
            },
            database: DatabaseConfig {
                path: env::var("DATABASE_PATH").unwrap_or_else(|_| "data/sage.db".to_string()),
            },
            llm: LlmConfig {
                base_url: env::var("LLM_BASE_URL")
                    .unwrap_or_else(|_| "http://localhost:11434/v1".to_string()),
                api_key: env::var("LLM_API_KEY").ok(),
                chat_model: env::var("LLM_CHAT_MODEL")
                    .unwrap_or_else(|_| "llama3.2".to_string()),
                embedding_model: env::var("LLM_EMBEDDING_MODEL")
                    .unwrap_or_else(|_| "nomic-embed-text".to_string()),
                embedding_dimension: env::var("LLM_EMBEDDING_DIMENSION")
                    .unwrap_or_else(|_| "768".to_string())
                    .parse()?,
            },
            memory: MemoryConfig {
                chunk_max_tokens: env::var("CHUNK_MAX_TOKENS")
                    .unwrap_or_else(|_| "256".to_string())
                    .parse()?,
                chunk_overlap_tokens: env::var("CHUNK_OVERLAP_TOKENS")
                    .unwrap_or_else(|_| "32".to_string())
                    .parse()?,
                history_window: env::var("HISTORY_WINDOW")
                    .unwrap_or_else(|_| "10".to_string())
                    .parse()?,
                memory_top_k: env::var("MEMORY_TOP_K")
                    .unwrap_or_else(|_| "5".to_string())
                    .parse()?,
                retention_days: env::var("MEMORY_RETENTION_DAYS")
                    .unwrap_or_else(|_| "30".to_string())
                    .parse()?,
            },
            search: SearchConfig {
                cache_ttl_secs: env::var("SEARCH_CACHE_TTL_SECS")
                    .unwrap_or_else(|_| "3600".to_string())
                    .parse()?,
                fetch_timeout_secs: env::var("FETCH_TIMEOUT_SECS")
                    .unwrap_or_else(|_| "10".to_string())
                    .parse()?,
                fetch_top_n: env::var("FETCH_TOP_N")
                    .unwrap_or_else(|_| "3".to_string())
                    .parse()?,
                results_low: env::var("SEARCH_RESULTS_LOW")
                    .unwrap_or_else(|_| "3".to_string())
                    .parse()?,
                results_mid: env::var("SEARCH_RESULTS_MID")
                    .unwrap_or_else(|_| "5".to_string())
                    .parse()?,
                results_high: env::var("SEARCH_RESULTS_HIGH")
                    .unwrap_or_else(|_| "8".to_string())
                    .parse()?,
                subtask_delay_ms: env::var("SUBTASK_DELAY_MS")
                    .unwrap_or_else(|_| "500".to_string())
                    .parse()?,
            },
            research: ResearchConfig {
                confidence_threshold: env::var("CONFIDENCE_THRESHOLD")
                    .unwrap_or_else(|_| "0.7".to_string())
                    .parse()?,
                max_iterations: env::var("MAX_ITERATIONS")
                    .unwrap_or_else(|_| "3".to_string())
                    .parse()?,
                reflection: ReflectionWeights {
                    citation_weight: env::var("REFLECTION_CITATION_WEIGHT")
                        .unwrap_or_else(|_| "0.6".to_string())
                        .parse()?,
                    source_weight: env::var("REFLECTION_SOURCE_WEIGHT")
                        .unwrap_or_else(|_| "0.4".to_string())
                        .parse()?,
                    expected_citations: env::var("REFLECTION_EXPECTED_CITATIONS")
                        .unwrap_or_else(|_| "4".to_string())
                        .parse()?,
                    expected_sources: env::var("REFLECTION_EXPECTED_SOURCES")
                        .unwrap_or_else(|_| "5".to_string())
                        .parse()?,
                },
            },
        })
    }
}
