//! Events streamed to the caller during a research run.

use crate::types::{ResearchTask, SearchResult};
use serde::Serialize;
use std::fmt;

/// Pipeline stages, in execution order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ResearchStage {
    Clarifying,
    Planning,
    Searching,
    Synthesizing,
    Reflecting,
}

impl fmt::Display for ResearchStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            ResearchStage::Clarifying => "clarifying",
            ResearchStage::Planning => "planning",
            ResearchStage::Searching => "searching",
            ResearchStage::Synthesizing => "synthesizing",
            ResearchStage::Reflecting => "reflecting",
        };
        write!(f, "{}", name)
    }
}

/// One event in the research stream.
///
/// The stream always terminates with [`ResearchEvent::Done`], including
/// after an [`ResearchEvent::Error`]: an error replaces content, it does not
/// leave the stream hanging.
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ResearchEvent {
    /// A stage transition, with a human-readable note.
    Progress {
        stage: ResearchStage,
        message: String,
    },
    /// Clarifying questions generated for this conversation.
    Clarification {
        questions: Vec<String>,
        rationale: String,
    },
    /// The plan about to be executed.
    Plan {
        main_goal: String,
        subtasks: Vec<ResearchTask>,
    },
    /// One discovered source, emitted as it is found.
    Source { source: SearchResult },
    /// One synthesis token.
    Token { text: String },
    /// Reflection summary for one iteration.
    Reflection {
        confidence_score: f32,
        identified_gaps: Vec<String>,
        requires_more_research: bool,
        iteration: u32,
    },
    /// Terminal failure; still followed by `Done`.
    Error { message: String },
    /// Terminal marker; always the last event.
    Done,
}

impl ResearchEvent {
    /// Stable event name used as the SSE `event:` field.
    pub fn name(&self) -> &'static str {
        match self {
            ResearchEvent::Progress { .. } => "progress",
            ResearchEvent::Clarification { .. } => "clarification",
            ResearchEvent::Plan { .. } => "plan",
            ResearchEvent::Source { .. } => "source",
            ResearchEvent::Token { .. } => "token",
            ResearchEvent::Reflection { .. } => "reflection",
            ResearchEvent::Error { .. } => "error",
            ResearchEvent::Done => "done",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_event_serialization_is_tagged() {
        let event = ResearchEvent::Progress {
            stage: ResearchStage::Searching,
            message: "iteration 1".to_string(),
        };
        let json = serde_json::to_value(&event).unwrap();
        assert_eq!(json["type"], "progress");
        assert_eq!(json["stage"], "searching");
    }

    #[test]
    fn test_done_event_name() {
        assert_eq!(ResearchEvent::Done.name(), "done");
    }
}
