//! Embedding-indexed memory store.

use crate::db::Database;
use crate::llm::LlmClient;
use crate::memory::chunker::TextChunker;
use crate::types::{
    AppError, ChunkError, ChunkErrorKind, ConversationContext, MemoryChunk, MessageRole, Result,
    StoreMemoryResult,
};
use crate::utils::config::MemoryConfig;
use chrono::Utc;
use parking_lot::RwLock;
use sage_vector::{CancelFlag, FlatIndex};
use std::sync::Arc;
use tracing::{debug, info, warn};
use uuid::Uuid;

/// Flips the scan's cancel flag when the owning future is dropped, so an
/// abandoned request stops burning a blocking worker.
struct ScanGuard(CancelFlag);

impl Drop for ScanGuard {
    fn drop(&mut self) {
        self.0.cancel();
    }
}

/// Durable, embedding-indexed memory plus conversation persistence.
///
/// The vector index lives in memory and is rebuilt from the `vectors` table
/// on open; every write goes to both. Safe to share across concurrent
/// requests.
pub struct MemoryStore {
    db: Arc<Database>,
    llm: Arc<dyn LlmClient>,
    index: RwLock<Arc<FlatIndex>>,
    chunker: TextChunker,
    config: MemoryConfig,
    dimension: usize,
}

impl MemoryStore {
    /// Open the store, rebuilding the vector index from durable rows.
    pub async fn open(
        db: Arc<Database>,
        llm: Arc<dyn LlmClient>,
        config: MemoryConfig,
        dimension: usize,
    ) -> Result<Self> {
        let rows = db.load_vectors().await?;
        let loaded = rows.len();
        let index = FlatIndex::restore(dimension, rows)?;
        info!(loaded, indexed = index.len(), "Memory index restored");

        Ok(Self {
            db,
            llm,
            index: RwLock::new(Arc::new(index)),
            chunker: TextChunker::new(config.chunk_max_tokens, config.chunk_overlap_tokens),
            config,
            dimension,
        })
    }

    /// Number of vectors currently indexed.
    pub fn indexed_vectors(&self) -> usize {
        self.index.read().len()
    }

    // ============= Memory operations =============

    /// Chunk, embed, and store `text`. Each chunk is processed
    /// independently: one chunk failing to embed or persist is recorded in
    /// the result and does not abort the others.
    pub async fn store_memory(
        &self,
        text: &str,
        source: &str,
        tags: &[String],
        conversation_id: Option<&str>,
    ) -> Result<StoreMemoryResult> {
        let chunks = self.chunker.chunk(text);
        let mut result = StoreMemoryResult {
            total_chunks: chunks.len(),
            ..Default::default()
        };

        for (chunk_index, chunk_text) in chunks.into_iter().enumerate() {
            let chunk_id = Uuid::new_v4().to_string();

            let embedding = match self.llm.embed(&chunk_text).await {
                Ok(e) => e,
                Err(e) => {
                    warn!(chunk_index, error = %e, "Chunk embedding failed");
                    result.failed_chunks += 1;
                    result.errors.push(ChunkError {
                        chunk_index,
                        chunk_id,
                        message: e.to_string(),
                        kind: ChunkErrorKind::Embedding,
                    });
                    continue;
                }
            };

            let vector_id = {
                let index = self.index.read().clone();
                match index.add(&embedding) {
                    Ok(id) => id,
                    Err(e) => {
                        warn!(chunk_index, error = %e, "Chunk indexing failed");
                        result.failed_chunks += 1;
                        result.errors.push(ChunkError {
                            chunk_index,
                            chunk_id,
                            message: e.to_string(),
                            kind: ChunkErrorKind::Index,
                        });
                        continue;
                    }
                }
            };

            let chunk = MemoryChunk {
                id: chunk_id.clone(),
                text: chunk_text,
                source: source.to_string(),
                tags: tags.to_vec(),
                conversation_id: conversation_id.map(str::to_string),
                created_at: Utc::now(),
            };

            // Persist vector row then chunk row; failures degrade to a
            // per-chunk error.
            let stored = match self.db.insert_vector(vector_id, &embedding).await {
                Ok(()) => self.db.insert_memory_chunk(&chunk, vector_id).await,
                Err(e) => Err(e),
            };

            match stored {
                Ok(()) => {
                    result.successful_chunks += 1;
                    if result.primary_id.is_none() {
                        result.primary_id = Some(chunk_id);
                    }
                }
                Err(e) => {
                    warn!(chunk_index, error = %e, "Chunk persistence failed");
                    result.failed_chunks += 1;
                    result.errors.push(ChunkError {
                        chunk_index,
                        chunk_id,
                        message: e.to_string(),
                        kind: ChunkErrorKind::Storage,
                    });
                }
            }
        }

        debug!(
            total = result.total_chunks,
            ok = result.successful_chunks,
            failed = result.failed_chunks,
            "Stored memory"
        );
        Ok(result)
    }

    /// Similarity search over stored chunks, optionally filtered to one
    /// conversation. Results keep the index's ranking.
    pub async fn search_memory(
        &self,
        query: &str,
        top_k: usize,
        conversation_id: Option<&str>,
    ) -> Result<Vec<MemoryChunk>> {
        if query.trim().is_empty() {
            return Err(AppError::InvalidInput("Empty memory query".to_string()));
        }

        let embedding = self.llm.embed(query).await?;

        // Over-fetch when filtering so the filter doesn't starve the result.
        let fetch_k = if conversation_id.is_some() {
            top_k.saturating_mul(4)
        } else {
            top_k
        };

        let index = self.index.read().clone();
        let cancel = CancelFlag::new();
        let _guard = ScanGuard(cancel.clone());

        let hits = tokio::task::spawn_blocking(move || {
            index.search_with_cancel(&embedding, fetch_k, &cancel)
        })
        .await
        .map_err(|e| AppError::Internal(format!("Vector scan panicked: {}", e)))??;

        let ids: Vec<u64> = hits.iter().map(|h| h.id).collect();
        let rows = self.db.get_chunks_by_vector_ids(&ids).await?;

        let mut by_id: std::collections::HashMap<u64, MemoryChunk> = rows.into_iter().collect();
        let mut chunks = Vec::with_capacity(top_k);
        for hit in &hits {
            let Some(chunk) = by_id.remove(&hit.id) else {
                continue;
            };
            if let Some(filter) = conversation_id {
                if chunk.conversation_id.as_deref() != Some(filter) {
                    continue;
                }
            }
            chunks.push(chunk);
            if chunks.len() == top_k {
                break;
            }
        }

        Ok(chunks)
    }

    /// Delete chunks older than `older_than` (and vectors nothing references
    /// anymore), then rebuild the in-memory index from the survivors.
    /// Maintenance operation, independent of the request path.
    pub async fn compact_memories(&self, older_than: chrono::Duration) -> Result<(u64, u64)> {
        let cutoff = Utc::now() - older_than;
        let (chunks_deleted, vectors_deleted) = self.db.delete_memories_older_than(cutoff).await?;

        let rows = self.db.load_vectors().await?;
        let rebuilt = FlatIndex::restore(self.dimension, rows)?;
        *self.index.write() = Arc::new(rebuilt);

        info!(chunks_deleted, vectors_deleted, "Compacted memories");
        Ok((chunks_deleted, vectors_deleted))
    }

    // ============= Conversation operations =============

    /// Create a conversation, returning its id.
    pub async fn create_conversation(&self, title: Option<&str>) -> Result<String> {
        let id = Uuid::new_v4().to_string();
        self.db.create_conversation(&id, title).await?;
        Ok(id)
    }

    pub async fn ensure_conversation(&self, id: &str) -> Result<()> {
        if !self.db.conversation_exists(id).await? {
            self.db.create_conversation(id, None).await?;
        }
        Ok(())
    }

    pub async fn conversation_exists(&self, id: &str) -> Result<bool> {
        self.db.conversation_exists(id).await
    }

    /// Append a message, returning its id.
    pub async fn save_message(
        &self,
        conversation_id: &str,
        role: MessageRole,
        content: &str,
    ) -> Result<String> {
        let id = Uuid::new_v4().to_string();
        self.db
            .add_message(&id, conversation_id, role, content)
            .await?;
        Ok(id)
    }

    pub async fn conversation(
        &self,
        id: &str,
    ) -> Result<Option<(String, Option<String>, chrono::DateTime<Utc>)>> {
        self.db.get_conversation(id).await
    }

    pub async fn recent_messages(
        &self,
        conversation_id: &str,
        limit: usize,
    ) -> Result<Vec<crate::types::Message>> {
        self.db.get_recent_messages(conversation_id, limit).await
    }

    pub async fn messages(&self, conversation_id: &str) -> Result<Vec<crate::types::Message>> {
        self.db.get_messages(conversation_id).await
    }

    /// Assemble the read model for one request: recent messages plus
    /// memories similar to `query`. Memory retrieval failure degrades to an
    /// empty list rather than failing context assembly.
    pub async fn conversation_context(
        &self,
        conversation_id: &str,
        query: &str,
    ) -> Result<ConversationContext> {
        let recent_messages = self
            .db
            .get_recent_messages(conversation_id, self.config.history_window)
            .await?;

        let relevant_memories = match self
            .search_memory(query, self.config.memory_top_k, Some(conversation_id))
            .await
        {
            Ok(memories) => memories,
            Err(e) => {
                warn!(conversation_id, error = %e, "Memory retrieval failed; continuing without");
                Vec::new()
            }
        };

        Ok(ConversationContext {
            conversation_id: conversation_id.to_string(),
            recent_messages,
            relevant_memories,
        })
    }

    // ============= Clarification operations =============

    pub async fn save_clarification_questions(
        &self,
        conversation_id: &str,
        questions: &[String],
    ) -> Result<()> {
        self.db
            .save_clarification_questions(conversation_id, questions)
            .await
    }

    pub async fn clarification_questions(&self, conversation_id: &str) -> Result<Vec<String>> {
        self.db.get_clarification_questions(conversation_id).await
    }
}
