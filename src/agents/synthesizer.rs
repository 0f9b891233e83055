use crate::agents::Synthesizer;
use crate::llm::{ChatMessage, LlmClient, TokenStream};
use crate::types::{MemoryChunk, Result, SearchResult};
use async_trait::async_trait;
use std::sync::Arc;

/// LLM-backed [`Synthesizer`].
pub struct LlmSynthesizer {
    llm: Arc<dyn LlmClient>,
}

impl LlmSynthesizer {
    pub fn new(llm: Arc<dyn LlmClient>) -> Self {
        Self { llm }
    }
}

/// Render sources as a numbered list. The numbering here is the contract the
/// answer's `[n]` citations refer to, so the order must match the order the
/// sources were presented to the caller.
fn numbered_sources(sources: &[SearchResult]) -> String {
    sources
        .iter()
        .enumerate()
        .map(|(i, s)| {
            let body = s.content.as_deref().unwrap_or(&s.snippet);
            format!("[{}] {} ({})\n{}", i + 1, s.title, s.url, body)
        })
        .collect::<Vec<_>>()
        .join("\n\n")
}

fn memory_notes(memories: &[MemoryChunk]) -> String {
    memories
        .iter()
        .map(|m| format!("- {} (from {})", m.text, m.source))
        .collect::<Vec<_>>()
        .join("\n")
}

#[async_trait]
impl Synthesizer for LlmSynthesizer {
    async fn synthesize(
        &self,
        query: &str,
        sources: &[SearchResult],
        memories: &[MemoryChunk],
    ) -> Result<TokenStream> {
        let sources_block = if sources.is_empty() {
            "(no sources gathered)".to_string()
        } else {
            numbered_sources(sources)
        };

        let memories_block = memory_notes(memories);

        let system = r#"You are a research writer. Synthesize the numbered sources into a clear,
well-structured answer. Cite sources inline with their number, like [1] or [2][3].
Only cite numbers that appear in the source list. Acknowledge gaps honestly."#;

        let prompt = format!(
            r#"Question: {}

Sources:
{}

Previously established findings:
{}

Write the answer now."#,
            query,
            sources_block,
            if memories_block.is_empty() { "(none)" } else { &memories_block },
        );

        let messages = vec![ChatMessage::system(system), ChatMessage::user(prompt)];
        self.llm.stream(&messages).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn source(title: &str, url: &str, content: Option<&str>) -> SearchResult {
        SearchResult {
            title: title.to_string(),
            url: url.to_string(),
            snippet: "snippet text".to_string(),
            content: content.map(str::to_string),
        }
    }

    #[test]
    fn test_numbered_sources_keep_presentation_order() {
        let sources = vec![
            source("First", "https://a.example", None),
            source("Second", "https://b.example", Some("full content")),
        ];
        let rendered = numbered_sources(&sources);

        let first = rendered.find("[1] First").unwrap();
        let second = rendered.find("[2] Second").unwrap();
        assert!(first < second);
        // Fetched content is preferred over the snippet when present.
        assert!(rendered.contains("full content"));
        assert!(rendered.contains("snippet text"));
    }
}
