//! The iterative research state machine.

use crate::agents::{Clarifier, Planner, Reflector, Synthesizer};
use crate::agents::reflector::heuristic_reflection;
use crate::memory::MemoryStore;
use crate::research::events::{ResearchEvent, ResearchStage};
use crate::search::{ContentFetcher, SearchGateway};
use crate::types::{
    ConversationContext, GatheredInformation, IntensityBand, MessageRole, ResearchPlan,
    ResearchTask,
};
use crate::utils::config::{ResearchConfig, SearchConfig};
use async_stream::stream;
use futures::{Stream, StreamExt};
use std::sync::Arc;
use std::time::Duration;
use tracing::{info, warn};

/// Cap on fetched page text folded into the synthesis prompt.
const FETCHED_CONTENT_MAX_CHARS: usize = 4000;

/// Sequences the agent stages for one research request and streams progress
/// and content events to the caller.
///
/// One instance serves many concurrent runs; all shared state lives behind
/// the stores and stages it holds. Stages run sequentially within a run so
/// the event stream keeps a natural ordering; dropping the stream cancels
/// whatever stage is in flight.
pub struct ResearchOrchestrator {
    clarifier: Arc<dyn Clarifier>,
    planner: Arc<dyn Planner>,
    synthesizer: Arc<dyn Synthesizer>,
    reflector: Arc<dyn Reflector>,
    gateway: Arc<dyn SearchGateway>,
    fetcher: Arc<dyn ContentFetcher>,
    memory: Arc<MemoryStore>,
    search_config: SearchConfig,
    research_config: ResearchConfig,
}

impl ResearchOrchestrator {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        clarifier: Arc<dyn Clarifier>,
        planner: Arc<dyn Planner>,
        synthesizer: Arc<dyn Synthesizer>,
        reflector: Arc<dyn Reflector>,
        gateway: Arc<dyn SearchGateway>,
        fetcher: Arc<dyn ContentFetcher>,
        memory: Arc<MemoryStore>,
        search_config: SearchConfig,
        research_config: ResearchConfig,
    ) -> Self {
        Self {
            clarifier,
            planner,
            synthesizer,
            reflector,
            gateway,
            fetcher,
            memory,
            search_config,
            research_config,
        }
    }

    /// Run the full pipeline for one request.
    ///
    /// The returned stream is lazy and single-consumer; every external call
    /// happens between its yields, so dropping it aborts the run. The stream
    /// always ends with [`ResearchEvent::Done`], error or not.
    pub fn process_research(
        self: Arc<Self>,
        prompt: String,
        conversation_id: String,
        intensity: u8,
        clarification_answers: Option<Vec<String>>,
    ) -> impl Stream<Item = ResearchEvent> + Send + 'static {
        let this = self;

        stream! {
            info!(conversation_id, intensity, "Research run started");
            let band = IntensityBand::from_level(intensity);

            // Without persistence there is nothing to research against:
            // terminal error, but the stream still closes cleanly.
            if let Err(e) = this.memory.ensure_conversation(&conversation_id).await {
                yield ResearchEvent::Error {
                    message: format!("Cannot establish conversation state: {}", e),
                };
                yield ResearchEvent::Done;
                return;
            }
            if let Err(e) = this
                .memory
                .save_message(&conversation_id, MessageRole::User, &prompt)
                .await
            {
                warn!(conversation_id, error = %e, "Failed to record user message");
            }

            // ---- Clarifying ----
            let mut goal = prompt.clone();
            match &clarification_answers {
                Some(answers) => {
                    // Stage skipped entirely: fold stored questions and the
                    // supplied answers into the goal.
                    let questions = this
                        .memory
                        .clarification_questions(&conversation_id)
                        .await
                        .unwrap_or_default();
                    goal = enhance_goal(&prompt, &questions, answers);
                }
                None => {
                    yield ResearchEvent::Progress {
                        stage: ResearchStage::Clarifying,
                        message: "Checking what needs clarification".to_string(),
                    };

                    let context = this.context_or_default(&conversation_id, &prompt).await;
                    match this.clarifier.clarify(&prompt, &context, band).await {
                        Ok(clarification) => {
                            if let Err(e) = this
                                .memory
                                .save_clarification_questions(
                                    &conversation_id,
                                    &clarification.questions,
                                )
                                .await
                            {
                                warn!(conversation_id, error = %e, "Failed to persist clarifications");
                            }
                            yield ResearchEvent::Clarification {
                                questions: clarification.questions,
                                rationale: clarification.rationale,
                            };
                        }
                        Err(e) => {
                            // Treat a failing clarifier as "no clarification
                            // needed" instead of blocking the pipeline.
                            warn!(error = %e, "Clarification failed; continuing without");
                        }
                    }
                }
            }

            // ---- Planning ----
            yield ResearchEvent::Progress {
                stage: ResearchStage::Planning,
                message: "Decomposing the research goal".to_string(),
            };

            let context = this.context_or_default(&conversation_id, &goal).await;
            let mut plan = match this.planner.plan(&goal, &context, band).await {
                Ok(Some(plan)) => plan,
                Ok(None) => {
                    warn!("Planner produced no plan; falling back to single subtask");
                    ResearchPlan::fallback(&goal)
                }
                Err(e) => {
                    warn!(error = %e, "Planning failed; falling back to single subtask");
                    ResearchPlan::fallback(&goal)
                }
            };
            plan.sort_subtasks();

            yield ResearchEvent::Plan {
                main_goal: plan.main_goal.clone(),
                subtasks: plan.subtasks.clone(),
            };

            // ---- Search / Synthesize / Reflect loop ----
            let max_results = this.search_config.results_for_band(band);
            let max_iterations = this.research_config.max_iterations.max(1);
            let threshold = this.research_config.confidence_threshold;

            let mut gathered = GatheredInformation::default();
            let mut pending: Vec<ResearchTask> = plan.subtasks;
            let mut iteration: u32 = 0;
            let mut answer = String::new();

            loop {
                iteration += 1;

                // Searching: every subtask in priority order, failures
                // isolated per subtask.
                yield ResearchEvent::Progress {
                    stage: ResearchStage::Searching,
                    message: format!("Iteration {} of {}", iteration, max_iterations),
                };

                let tasks = std::mem::take(&mut pending);
                for (task_index, task) in tasks.iter().enumerate() {
                    if task_index > 0 && this.search_config.subtask_delay_ms > 0 {
                        tokio::time::sleep(Duration::from_millis(
                            this.search_config.subtask_delay_ms,
                        ))
                        .await;
                    }

                    let results = match this.gateway.search(&task.search_query, max_results).await {
                        Ok(results) => results,
                        Err(e) => {
                            warn!(query = %task.search_query, error = %e, "Subtask search failed");
                            continue;
                        }
                    };

                    for result in &results {
                        let text = format!("{}\n{}", result.title, result.snippet);
                        match this
                            .memory
                            .store_memory(
                                &text,
                                &result.url,
                                &["search-result".to_string()],
                                Some(&conversation_id),
                            )
                            .await
                        {
                            Ok(stored) => {
                                if let Some(id) = stored.primary_id {
                                    gathered.record_memory_id(id);
                                } else if stored.is_failure() {
                                    warn!(url = %result.url, "No chunk of this source could be stored");
                                }
                            }
                            Err(e) => warn!(url = %result.url, error = %e, "Memory write failed"),
                        }

                        yield ResearchEvent::Source {
                            source: result.clone(),
                        };
                    }

                    gathered.record_results(results);
                }

                // Fill content for the top sources still missing it; absent
                // entries in the fetch map are expected.
                if this.search_config.fetch_top_n > 0 {
                    let urls: Vec<String> = gathered
                        .results
                        .iter()
                        .filter(|r| r.content.is_none())
                        .take(this.search_config.fetch_top_n)
                        .map(|r| r.url.clone())
                        .collect();

                    if !urls.is_empty() {
                        let fetched = this
                            .fetcher
                            .fetch_content(
                                &urls,
                                Duration::from_secs(this.search_config.fetch_timeout_secs),
                            )
                            .await;
                        for result in gathered.results.iter_mut() {
                            if result.content.is_none() {
                                if let Some(content) = fetched.get(&result.url) {
                                    result.content =
                                        Some(truncate_chars(content, FETCHED_CONTENT_MAX_CHARS));
                                }
                            }
                        }
                    }
                }

                // Synthesizing: stream tokens while accumulating the answer
                // for reflection.
                yield ResearchEvent::Progress {
                    stage: ResearchStage::Synthesizing,
                    message: format!("Synthesizing from {} sources", gathered.total_sources_found),
                };

                let memories = this
                    .context_or_default(&conversation_id, &goal)
                    .await
                    .relevant_memories;

                answer.clear();
                match this
                    .synthesizer
                    .synthesize(&goal, &gathered.results, &memories)
                    .await
                {
                    Ok(mut tokens) => {
                        while let Some(token) = tokens.next().await {
                            match token {
                                Ok(text) => {
                                    answer.push_str(&text);
                                    yield ResearchEvent::Token { text };
                                }
                                Err(e) => {
                                    warn!(error = %e, "Synthesis stream error");
                                    break;
                                }
                            }
                        }
                    }
                    Err(e) => {
                        // Degraded, not fatal: reflection sees the empty
                        // answer and the iteration budget still bounds us.
                        warn!(error = %e, "Synthesis failed this iteration");
                    }
                }

                // Reflecting: never propagates a failure; the heuristic is
                // the floor.
                yield ResearchEvent::Progress {
                    stage: ResearchStage::Reflecting,
                    message: "Scoring answer confidence".to_string(),
                };

                let reflection = match this.reflector.reflect(&goal, &answer, &gathered).await {
                    Ok(reflection) => reflection,
                    Err(e) => {
                        warn!(error = %e, "Reflection failed; using heuristic");
                        heuristic_reflection(
                            &goal,
                            &answer,
                            &gathered,
                            &this.research_config.reflection,
                            threshold,
                        )
                    }
                };

                yield ResearchEvent::Reflection {
                    confidence_score: reflection.confidence_score,
                    identified_gaps: reflection.identified_gaps.clone(),
                    requires_more_research: reflection.requires_more_research,
                    iteration,
                };

                if reflection.confidence_score < threshold && iteration < max_iterations {
                    pending = reflection
                        .suggested_additional_searches
                        .iter()
                        .enumerate()
                        .map(|(i, query)| ResearchTask {
                            description: query.clone(),
                            search_query: query.clone(),
                            priority: i as i32,
                        })
                        .collect();
                    if !pending.is_empty() {
                        continue;
                    }
                    warn!("Reflection requested more research but suggested no searches");
                }
                break;
            }

            if !answer.is_empty() {
                if let Err(e) = this
                    .memory
                    .save_message(&conversation_id, MessageRole::Assistant, &answer)
                    .await
                {
                    warn!(conversation_id, error = %e, "Failed to record assistant message");
                }
            }

            info!(
                conversation_id,
                iterations = iteration,
                sources = gathered.total_sources_found,
                "Research run finished"
            );
            yield ResearchEvent::Done;
        }
    }

    /// Conversation context, degrading to an empty read model when the
    /// message log is unreachable.
    async fn context_or_default(&self, conversation_id: &str, query: &str) -> ConversationContext {
        match self.memory.conversation_context(conversation_id, query).await {
            Ok(context) => context,
            Err(e) => {
                warn!(conversation_id, error = %e, "Context assembly failed; using empty context");
                ConversationContext {
                    conversation_id: conversation_id.to_string(),
                    ..Default::default()
                }
            }
        }
    }
}

/// Fold stored clarification questions and the caller's answers into an
/// enhanced research goal.
fn enhance_goal(prompt: &str, questions: &[String], answers: &[String]) -> String {
    if answers.is_empty() {
        return prompt.to_string();
    }

    let mut enhanced = format!("{}\n\nAdditional context:", prompt);
    for (i, answer) in answers.iter().enumerate() {
        match questions.get(i) {
            Some(question) => {
                enhanced.push_str(&format!("\n- {} {}", question, answer));
            }
            None => enhanced.push_str(&format!("\n- {}", answer)),
        }
    }
    enhanced
}

fn truncate_chars(text: &str, max_chars: usize) -> String {
    text.chars().take(max_chars).collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_enhance_goal_pairs_questions_with_answers() {
        let questions = vec!["Which region?".to_string(), "What time range?".to_string()];
        let answers = vec!["Europe".to_string(), "Last decade".to_string()];

        let goal = enhance_goal("solar adoption", &questions, &answers);
        assert!(goal.starts_with("solar adoption"));
        assert!(goal.contains("Which region? Europe"));
        assert!(goal.contains("What time range? Last decade"));
    }

    #[test]
    fn test_enhance_goal_with_unmatched_answers() {
        let goal = enhance_goal("topic", &[], &["extra detail".to_string()]);
        assert!(goal.contains("- extra detail"));
    }

    #[test]
    fn test_enhance_goal_no_answers_is_identity() {
        assert_eq!(enhance_goal("topic", &[], &[]), "topic");
    }

    #[test]
    fn test_truncate_chars_respects_boundaries() {
        assert_eq!(truncate_chars("héllo", 2), "hé");
        assert_eq!(truncate_chars("ok", 10), "ok");
    }
}
