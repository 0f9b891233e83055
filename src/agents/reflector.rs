use crate::agents::Reflector;
use crate::llm::LlmClient;
use crate::types::{GatheredInformation, ReflectionResult, Result};
use crate::utils::config::ReflectionWeights;
use async_trait::async_trait;
use serde::Deserialize;
use std::sync::Arc;
use tracing::warn;

/// LLM-backed [`Reflector`] with a deterministic heuristic floor.
pub struct LlmReflector {
    llm: Arc<dyn LlmClient>,
    weights: ReflectionWeights,
    confidence_threshold: f32,
}

impl LlmReflector {
    pub fn new(llm: Arc<dyn LlmClient>, weights: ReflectionWeights, confidence_threshold: f32) -> Self {
        Self {
            llm,
            weights,
            confidence_threshold,
        }
    }
}

#[derive(Deserialize)]
struct ReflectionPayload {
    confidence_score: f32,
    #[serde(default)]
    identified_gaps: Vec<String>,
    #[serde(default)]
    suggested_additional_searches: Vec<String>,
    #[serde(default)]
    requires_more_research: bool,
}

#[async_trait]
impl Reflector for LlmReflector {
    async fn reflect(
        &self,
        query: &str,
        answer: &str,
        info: &GatheredInformation,
    ) -> Result<ReflectionResult> {
        let system = r#"You are a research critic. Judge whether the answer fully and credibly
covers the question given how many sources were consulted."#;

        let prompt = format!(
            r#"Question: {}

Answer under review:
{}

Sources consulted: {}

Score your confidence that the answer is complete and grounded, in [0, 1].
List the gaps and the follow-up searches that would close them.
Respond as JSON:
{{"confidence_score": 0.0, "identified_gaps": ["..."], "suggested_additional_searches": ["..."], "requires_more_research": false}}"#,
            query, answer, info.total_sources_found
        );

        let payload = match self.llm.structured_json(system, &prompt).await {
            Ok(p) => p,
            Err(e) => {
                warn!(error = %e, "Reflection call failed; using heuristic");
                None
            }
        };

        let parsed = payload.and_then(|v| serde_json::from_value::<ReflectionPayload>(v).ok());
        let result = match parsed {
            Some(p) => normalize(ReflectionResult {
                confidence_score: p.confidence_score,
                identified_gaps: p.identified_gaps,
                suggested_additional_searches: p.suggested_additional_searches,
                requires_more_research: p.requires_more_research,
            }, query),
            None => heuristic_reflection(
                query,
                answer,
                info,
                &self.weights,
                self.confidence_threshold,
            ),
        };

        Ok(result)
    }
}

/// Clamp the score and repair the invariant: a result that asks for more
/// research must name gaps and follow-up searches.
fn normalize(mut result: ReflectionResult, query: &str) -> ReflectionResult {
    result.confidence_score = result.confidence_score.clamp(0.0, 1.0);
    if result.requires_more_research {
        if result.identified_gaps.is_empty() {
            result
                .identified_gaps
                .push("Coverage of the question is incomplete".to_string());
        }
        if result.suggested_additional_searches.is_empty() {
            result
                .suggested_additional_searches
                .push(format!("{} additional details", query));
        }
    }
    result
}

/// Deterministic confidence estimate from signal proxies: inline citation
/// density and consulted source count. The weighting is policy
/// (`ReflectionWeights`), not a fixed contract.
pub fn heuristic_reflection(
    query: &str,
    answer: &str,
    info: &GatheredInformation,
    weights: &ReflectionWeights,
    confidence_threshold: f32,
) -> ReflectionResult {
    let citations = count_citations(answer);

    let citation_score = (citations as f32 / weights.expected_citations.max(1) as f32).min(1.0);
    let source_score =
        (info.total_sources_found as f32 / weights.expected_sources.max(1) as f32).min(1.0);

    let weight_sum = (weights.citation_weight + weights.source_weight).max(f32::EPSILON);
    let confidence = ((weights.citation_weight * citation_score
        + weights.source_weight * source_score)
        / weight_sum)
        .clamp(0.0, 1.0);

    let requires_more_research = confidence < confidence_threshold;

    normalize(
        ReflectionResult {
            confidence_score: confidence,
            identified_gaps: Vec::new(),
            suggested_additional_searches: Vec::new(),
            requires_more_research,
        },
        query,
    )
}

/// Count `[n]`-style citation markers.
fn count_citations(text: &str) -> usize {
    let bytes = text.as_bytes();
    let mut count = 0;
    let mut i = 0;
    while i < bytes.len() {
        if bytes[i] == b'[' {
            let mut j = i + 1;
            while j < bytes.len() && bytes[j].is_ascii_digit() {
                j += 1;
            }
            if j > i + 1 && j < bytes.len() && bytes[j] == b']' {
                count += 1;
                i = j;
            }
        }
        i += 1;
    }
    count
}

#[cfg(test)]
mod tests {
    use super::*;

    fn info_with_sources(n: usize) -> GatheredInformation {
        GatheredInformation {
            total_sources_found: n,
            ..Default::default()
        }
    }

    #[test]
    fn test_count_citations() {
        assert_eq!(count_citations("Plain text"), 0);
        assert_eq!(count_citations("Fact [1]. Another [2][3]."), 3);
        assert_eq!(count_citations("Not a citation [abc] or [ ]"), 0);
        assert_eq!(count_citations("Trailing bracket [12"), 0);
    }

    #[test]
    fn test_heuristic_rich_answer_scores_high() {
        let weights = ReflectionWeights::default();
        let answer = "A [1] grounded [2] answer [3] with citations [4].";
        let result = heuristic_reflection("q", answer, &info_with_sources(6), &weights, 0.7);

        assert!(result.confidence_score > 0.9);
        assert!(!result.requires_more_research);
    }

    #[test]
    fn test_heuristic_thin_answer_requires_more() {
        let weights = ReflectionWeights::default();
        let result = heuristic_reflection("q", "No citations here.", &info_with_sources(0), &weights, 0.7);

        assert_eq!(result.confidence_score, 0.0);
        assert!(result.requires_more_research);
        // Invariant: asking for more research implies non-empty gaps and
        // suggestions.
        assert!(!result.identified_gaps.is_empty());
        assert!(!result.suggested_additional_searches.is_empty());
    }

    #[test]
    fn test_heuristic_confidence_stays_in_unit_range() {
        let weights = ReflectionWeights {
            citation_weight: 10.0,
            source_weight: 10.0,
            expected_citations: 1,
            expected_sources: 1,
        };
        let answer = "[1][2][3][4][5][6]";
        let result = heuristic_reflection("q", answer, &info_with_sources(100), &weights, 0.7);

        assert!(result.confidence_score <= 1.0);
        assert!(result.confidence_score >= 0.0);
    }

    #[test]
    fn test_normalize_repairs_invariant() {
        let broken = ReflectionResult {
            confidence_score: 1.7,
            identified_gaps: vec![],
            suggested_additional_searches: vec![],
            requires_more_research: true,
        };
        let fixed = normalize(broken, "topic");
        assert_eq!(fixed.confidence_score, 1.0);
        assert!(!fixed.identified_gaps.is_empty());
        assert!(!fixed.suggested_additional_searches.is_empty());
    }
}
