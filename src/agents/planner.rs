use crate::agents::Planner;
use crate::llm::LlmClient;
use crate::types::{ConversationContext, IntensityBand, ResearchPlan, Result};
use async_trait::async_trait;
use std::sync::Arc;
use tracing::debug;

/// LLM-backed [`Planner`].
pub struct LlmPlanner {
    llm: Arc<dyn LlmClient>,
}

impl LlmPlanner {
    pub fn new(llm: Arc<dyn LlmClient>) -> Self {
        Self { llm }
    }

    fn subtask_count(band: IntensityBand) -> usize {
        match band {
            IntensityBand::Low => 2,
            IntensityBand::Mid => 4,
            IntensityBand::High => 6,
        }
    }
}

#[async_trait]
impl Planner for LlmPlanner {
    async fn plan(
        &self,
        goal: &str,
        context: &ConversationContext,
        band: IntensityBand,
    ) -> Result<Option<ResearchPlan>> {
        let count = Self::subtask_count(band);

        let memory_notes = context
            .relevant_memories
            .iter()
            .map(|m| format!("- {}", m.text))
            .collect::<Vec<_>>()
            .join("\n");

        let system = r#"You are a research planner. Decompose a research goal into focused, independently searchable subtasks."#;

        let prompt = format!(
            r#"Research goal: {}

Known context from earlier findings:
{}

Decompose the goal into up to {} subtasks. Each subtask needs a description,
a web search query, and a priority (lower runs earlier).
Respond as JSON:
{{"main_goal": "...", "subtasks": [{{"description": "...", "search_query": "...", "priority": 0}}], "key_concepts": ["..."]}}"#,
            goal,
            if memory_notes.is_empty() { "(none)" } else { &memory_notes },
            count
        );

        let payload = self.llm.structured_json(system, &prompt).await?;

        let plan = payload.and_then(|v| serde_json::from_value::<ResearchPlan>(v).ok());
        match plan {
            Some(mut plan) if !plan.subtasks.is_empty() => {
                plan.subtasks.truncate(count);
                debug!(subtasks = plan.subtasks.len(), "Plan produced");
                Ok(Some(plan))
            }
            // Empty or unparseable plans surface as absence; the
            // orchestrator owns the fallback.
            _ => Ok(None),
        }
    }
}
