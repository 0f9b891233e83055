use crate::agents::Clarifier;
use crate::llm::LlmClient;
use crate::types::{ClarificationResult, ConversationContext, IntensityBand, Result};
use async_trait::async_trait;
use serde::Deserialize;
use std::sync::Arc;
use tracing::debug;

/// LLM-backed [`Clarifier`].
pub struct LlmClarifier {
    llm: Arc<dyn LlmClient>,
}

impl LlmClarifier {
    pub fn new(llm: Arc<dyn LlmClient>) -> Self {
        Self { llm }
    }

    fn question_count(band: IntensityBand) -> usize {
        match band {
            IntensityBand::Low => 2,
            IntensityBand::Mid => 3,
            IntensityBand::High => 4,
        }
    }

    /// Canned questions used when the model answered but produced nothing
    /// parseable. Keeps the non-empty invariant without blocking the run.
    fn canned(query: &str) -> ClarificationResult {
        ClarificationResult {
            questions: vec![
                format!("What specific aspect of \"{}\" matters most to you?", query),
                "Is there a time range or region the answer should focus on?".to_string(),
            ],
            rationale: "Generic clarifications; the model returned no usable output".to_string(),
        }
    }
}

#[derive(Deserialize)]
struct ClarificationPayload {
    questions: Vec<String>,
    #[serde(default)]
    rationale: String,
}

#[async_trait]
impl Clarifier for LlmClarifier {
    async fn clarify(
        &self,
        query: &str,
        context: &ConversationContext,
        band: IntensityBand,
    ) -> Result<ClarificationResult> {
        let count = Self::question_count(band);

        let history = context
            .recent_messages
            .iter()
            .map(|m| format!("{}: {}", m.role.as_str(), m.content))
            .collect::<Vec<_>>()
            .join("\n");

        let system = r#"You help scope research requests. Given a user's research question and recent conversation, identify what is ambiguous or missing before research starts."#;

        let prompt = format!(
            r#"Research question: {}

Recent conversation:
{}

Produce up to {} clarifying questions that would most improve the research.
Respond as JSON: {{"questions": ["..."], "rationale": "..."}}"#,
            query,
            if history.is_empty() { "(none)" } else { &history },
            count
        );

        let payload = self.llm.structured_json(system, &prompt).await?;

        let parsed = payload.and_then(|v| serde_json::from_value::<ClarificationPayload>(v).ok());
        match parsed {
            Some(p) if !p.questions.is_empty() => {
                debug!(questions = p.questions.len(), "Clarification produced");
                Ok(ClarificationResult {
                    questions: p.questions.into_iter().take(count).collect(),
                    rationale: p.rationale,
                })
            }
            _ => Ok(Self::canned(query)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_canned_questions_non_empty() {
        let fallback = LlmClarifier::canned("rust async runtimes");
        assert!(!fallback.questions.is_empty());
        assert!(fallback.questions[0].contains("rust async runtimes"));
    }

    #[test]
    fn test_question_count_scales_with_band() {
        assert!(
            LlmClarifier::question_count(IntensityBand::Low)
                < LlmClarifier::question_count(IntensityBand::High)
        );
    }
}
