//! Token-budgeted text segmentation.

use tracing::warn;

/// Characters per token. A heuristic, not a real tokenizer; consistent with
/// how the context window is budgeted elsewhere.
const CHARS_PER_TOKEN: usize = 4;

/// Fraction of the budget (from the end) searched for a natural break point
/// before falling back to a hard cut.
const BREAK_SEARCH_DIVISOR: usize = 4;

pub struct TextChunker {
    max_chars: usize,
    overlap_chars: usize,
}

impl TextChunker {
    /// Create a chunker with budgets expressed in tokens.
    ///
    /// The overlap is clamped strictly below the budget; an overlap equal to
    /// or larger than the budget could never make progress.
    pub fn new(max_tokens: usize, overlap_tokens: usize) -> Self {
        let max_tokens = max_tokens.max(1);
        let overlap_tokens = if overlap_tokens >= max_tokens {
            warn!(
                max_tokens,
                overlap_tokens, "Chunk overlap >= budget; clamping"
            );
            max_tokens - 1
        } else {
            overlap_tokens
        };

        Self {
            max_chars: max_tokens * CHARS_PER_TOKEN,
            overlap_chars: overlap_tokens * CHARS_PER_TOKEN,
        }
    }

    /// Segment `text` into chunks of at most the configured budget, with the
    /// configured overlap between consecutive chunks.
    ///
    /// Empty (or whitespace-only) input yields no chunks. When a sentence or
    /// line boundary falls in the trailing portion of the budget the chunk
    /// breaks there; otherwise it is cut at the budget.
    pub fn chunk(&self, text: &str) -> Vec<String> {
        if text.trim().is_empty() {
            return Vec::new();
        }

        let chars: Vec<char> = text.chars().collect();
        let mut chunks = Vec::new();
        let mut start = 0usize;

        while start < chars.len() {
            let hard_end = (start + self.max_chars).min(chars.len());
            let end = if hard_end == chars.len() {
                hard_end
            } else {
                self.break_point(&chars, start, hard_end).unwrap_or(hard_end)
            };

            let chunk: String = chars[start..end].iter().collect();
            let chunk = chunk.trim();
            if !chunk.is_empty() {
                chunks.push(chunk.to_string());
            }

            if end == chars.len() {
                break;
            }
            // Overlap is strictly smaller than the window, so this always
            // moves forward; the max() guards pathological boundary picks.
            start = (end.saturating_sub(self.overlap_chars)).max(start + 1);
        }

        chunks
    }

    /// Look for a sentence or line boundary inside the trailing portion of
    /// the window `[start, hard_end)`. Returns the index just past the
    /// boundary character.
    fn break_point(&self, chars: &[char], start: usize, hard_end: usize) -> Option<usize> {
        let window = hard_end - start;
        let search_from = hard_end - (self.max_chars / BREAK_SEARCH_DIVISOR).min(window);

        for i in (search_from..hard_end).rev() {
            match chars[i] {
                '\n' => return Some(i + 1),
                '.' | '!' | '?' => {
                    // Only treat it as a sentence end when followed by
                    // whitespace (avoids decimals and abbreviations mid-word).
                    if chars.get(i + 1).is_none_or(|c| c.is_whitespace()) {
                        return Some(i + 1);
                    }
                }
                _ => {}
            }
        }
        None
    }
}
