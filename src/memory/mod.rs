//! Vector-backed memory.
//!
//! Free text becomes retrievable memory here: [`TextChunker`] segments it
//! under a token budget, each chunk is embedded independently, and
//! [`MemoryStore`] keeps the chunks queryable through the in-process vector
//! index plus the relational rows it is rebuilt from. Conversation history
//! and clarification questions live behind the same store because the
//! orchestrator needs them consistent with memory writes.

pub mod chunker;
pub mod store;

pub use chunker::TextChunker;
pub use store::MemoryStore;
