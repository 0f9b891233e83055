//! Iterative research orchestration.
//!
//! This module owns the control flow of a research run: the state machine
//! that sequences the agent stages, the reflect-and-retry loop, and the
//! event stream the transport layer renders.
//!
//! # Research Workflow
//!
//! 1. **Clarify** - Surface missing context (skipped when answers are supplied)
//! 2. **Plan** - Decompose the goal into prioritized subtasks
//! 3. **Search** - Run each subtask against the search gateway, storing
//!    every source into memory as it is found
//! 4. **Synthesize** - Stream a cited answer from sources and recalled memory
//! 5. **Reflect** - Score confidence; feed identified gaps back into search
//!    until the confidence threshold is met or the iteration budget runs out
//!
//! # Usage
//!
//! ```ignore
//! use sage::research::ResearchOrchestrator;
//! use futures::StreamExt;
//!
//! let mut events = orchestrator.process_research(
//!     "What are the latest developments in quantum computing?".to_string(),
//!     conversation_id,
//!     50,
//!     None,
//! );
//!
//! while let Some(event) = events.next().await {
//!     println!("{:?}", event);
//! }
//! ```

pub mod events;
pub mod orchestrator;

pub use events::{ResearchEvent, ResearchStage};
pub use orchestrator::ResearchOrchestrator;
