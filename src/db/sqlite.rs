use crate::types::{AppError, MemoryChunk, Message, MessageRole, Result, SearchResult};
use chrono::{DateTime, Utc};
use libsql::{Builder, Connection};
use tracing::warn;

/// Local-first libsql database.
///
/// One connection is opened up front and cloned per accessor: writers on the
/// same handle are serialized, so message saves and memory writes to the
/// same conversation cannot tear each other, and a `:memory:` database stays
/// a single database instead of one per connection.
pub struct Database {
    /// Keeps the underlying database handle alive for the connection below.
    #[allow(dead_code)]
    db: libsql::Database,
    conn: Connection,
}

impl Database {
    /// Open (or create) a database at `path`. `:memory:` is supported and is
    /// what the test suites use.
    pub async fn open(path: &str) -> Result<Self> {
        let db = Builder::new_local(path)
            .build()
            .await
            .map_err(|e| AppError::Database(format!("Failed to open database: {}", e)))?;

        let conn = db
            .connect()
            .map_err(|e| AppError::Database(format!("Failed to get connection: {}", e)))?;

        let database = Self { db, conn };
        database.initialize_schema().await?;

        Ok(database)
    }

    pub fn connection(&self) -> Connection {
        self.conn.clone()
    }

    async fn initialize_schema(&self) -> Result<()> {
        let conn = self.connection();

        conn.execute(
            "CREATE TABLE IF NOT EXISTS conversations (
                id TEXT PRIMARY KEY,
                title TEXT,
                created_at INTEGER NOT NULL,
                updated_at INTEGER NOT NULL
            )",
            (),
        )
        .await
        .map_err(|e| AppError::Database(format!("Failed to create conversations table: {}", e)))?;

        conn.execute(
            "CREATE TABLE IF NOT EXISTS messages (
                id TEXT PRIMARY KEY,
                conversation_id TEXT NOT NULL,
                role TEXT NOT NULL,
                content TEXT NOT NULL,
                timestamp INTEGER NOT NULL,
                FOREIGN KEY (conversation_id) REFERENCES conversations(id)
            )",
            (),
        )
        .await
        .map_err(|e| AppError::Database(format!("Failed to create messages table: {}", e)))?;

        conn.execute(
            "CREATE TABLE IF NOT EXISTS clarification_questions (
                conversation_id TEXT NOT NULL,
                position INTEGER NOT NULL,
                question TEXT NOT NULL,
                created_at INTEGER NOT NULL,
                PRIMARY KEY (conversation_id, position)
            )",
            (),
        )
        .await
        .map_err(|e| {
            AppError::Database(format!(
                "Failed to create clarification_questions table: {}",
                e
            ))
        })?;

        conn.execute(
            "CREATE TABLE IF NOT EXISTS vectors (
                id INTEGER PRIMARY KEY,
                embedding BLOB NOT NULL,
                dimension INTEGER NOT NULL,
                created_at INTEGER NOT NULL
            )",
            (),
        )
        .await
        .map_err(|e| AppError::Database(format!("Failed to create vectors table: {}", e)))?;

        conn.execute(
            "CREATE TABLE IF NOT EXISTS memory_chunks (
                id TEXT PRIMARY KEY,
                vector_id INTEGER NOT NULL,
                text TEXT NOT NULL,
                source TEXT NOT NULL,
                tags TEXT NOT NULL,
                conversation_id TEXT,
                created_at INTEGER NOT NULL,
                FOREIGN KEY (vector_id) REFERENCES vectors(id)
            )",
            (),
        )
        .await
        .map_err(|e| AppError::Database(format!("Failed to create memory_chunks table: {}", e)))?;

        conn.execute(
            "CREATE TABLE IF NOT EXISTS search_cache (
                query_hash TEXT PRIMARY KEY,
                query TEXT NOT NULL,
                results TEXT NOT NULL,
                created_at INTEGER NOT NULL
            )",
            (),
        )
        .await
        .map_err(|e| AppError::Database(format!("Failed to create search_cache table: {}", e)))?;

        Ok(())
    }

    // ============= Conversation operations =============

    pub async fn create_conversation(&self, id: &str, title: Option<&str>) -> Result<()> {
        let conn = self.connection();
        let now = Utc::now().timestamp();

        conn.execute(
            "INSERT INTO conversations (id, title, created_at, updated_at)
             VALUES (?, ?, ?, ?)",
            (id, title, now, now),
        )
        .await
        .map_err(|e| AppError::Database(format!("Failed to create conversation: {}", e)))?;

        Ok(())
    }

    pub async fn conversation_exists(&self, id: &str) -> Result<bool> {
        let conn = self.connection();

        let mut rows = conn
            .query("SELECT 1 FROM conversations WHERE id = ?", [id])
            .await
            .map_err(|e| AppError::Database(format!("Failed to query conversation: {}", e)))?;

        Ok(rows
            .next()
            .await
            .map_err(|e| AppError::Database(e.to_string()))?
            .is_some())
    }

    pub async fn get_conversation(&self, id: &str) -> Result<Option<(String, Option<String>, DateTime<Utc>)>> {
        let conn = self.connection();

        let mut rows = conn
            .query(
                "SELECT id, title, created_at FROM conversations WHERE id = ?",
                [id],
            )
            .await
            .map_err(|e| AppError::Database(format!("Failed to query conversation: {}", e)))?;

        if let Some(row) = rows
            .next()
            .await
            .map_err(|e| AppError::Database(e.to_string()))?
        {
            let id: String = row.get(0).map_err(|e| AppError::Database(e.to_string()))?;
            let title: Option<String> = row.get(1).map_err(|e| AppError::Database(e.to_string()))?;
            let created: i64 = row.get(2).map_err(|e| AppError::Database(e.to_string()))?;
            Ok(Some((id, title, timestamp_to_datetime(created))))
        } else {
            Ok(None)
        }
    }

    pub async fn add_message(
        &self,
        id: &str,
        conversation_id: &str,
        role: MessageRole,
        content: &str,
    ) -> Result<()> {
        let conn = self.connection();
        let now = Utc::now().timestamp();

        conn.execute(
            "INSERT INTO messages (id, conversation_id, role, content, timestamp)
             VALUES (?, ?, ?, ?, ?)",
            (id, conversation_id, role.as_str(), content, now),
        )
        .await
        .map_err(|e| AppError::Database(format!("Failed to add message: {}", e)))?;

        conn.execute(
            "UPDATE conversations SET updated_at = ? WHERE id = ?",
            (now, conversation_id),
        )
        .await
        .map_err(|e| AppError::Database(format!("Failed to touch conversation: {}", e)))?;

        Ok(())
    }

    /// Most recent `limit` messages in chronological order.
    pub async fn get_recent_messages(
        &self,
        conversation_id: &str,
        limit: usize,
    ) -> Result<Vec<Message>> {
        let conn = self.connection();

        let mut rows = conn
            .query(
                "SELECT id, role, content, timestamp FROM (
                     SELECT id, role, content, timestamp FROM messages
                     WHERE conversation_id = ?
                     ORDER BY timestamp DESC, id DESC LIMIT ?
                 ) ORDER BY timestamp ASC, id ASC",
                (conversation_id, limit as i64),
            )
            .await
            .map_err(|e| AppError::Database(format!("Failed to query messages: {}", e)))?;

        let mut messages = Vec::new();
        while let Some(row) = rows
            .next()
            .await
            .map_err(|e| AppError::Database(e.to_string()))?
        {
            let role: String = row.get(1).map_err(|e| AppError::Database(e.to_string()))?;
            let timestamp: i64 = row.get(3).map_err(|e| AppError::Database(e.to_string()))?;
            messages.push(Message {
                id: row.get(0).map_err(|e| AppError::Database(e.to_string()))?,
                role: MessageRole::parse(&role),
                content: row.get(2).map_err(|e| AppError::Database(e.to_string()))?,
                timestamp: timestamp_to_datetime(timestamp),
            });
        }

        Ok(messages)
    }

    /// Every message of a conversation in chronological order.
    pub async fn get_messages(&self, conversation_id: &str) -> Result<Vec<Message>> {
        let conn = self.connection();

        let mut rows = conn
            .query(
                "SELECT id, role, content, timestamp FROM messages
                 WHERE conversation_id = ? ORDER BY timestamp ASC, id ASC",
                [conversation_id],
            )
            .await
            .map_err(|e| AppError::Database(format!("Failed to query messages: {}", e)))?;

        let mut messages = Vec::new();
        while let Some(row) = rows
            .next()
            .await
            .map_err(|e| AppError::Database(e.to_string()))?
        {
            let role: String = row.get(1).map_err(|e| AppError::Database(e.to_string()))?;
            let timestamp: i64 = row.get(3).map_err(|e| AppError::Database(e.to_string()))?;
            messages.push(Message {
                id: row.get(0).map_err(|e| AppError::Database(e.to_string()))?,
                role: MessageRole::parse(&role),
                content: row.get(2).map_err(|e| AppError::Database(e.to_string()))?,
                timestamp: timestamp_to_datetime(timestamp),
            });
        }

        Ok(messages)
    }

    // ============= Clarification operations =============

    /// Replace the stored clarification questions for a conversation.
    pub async fn save_clarification_questions(
        &self,
        conversation_id: &str,
        questions: &[String],
    ) -> Result<()> {
        let conn = self.connection();
        let now = Utc::now().timestamp();

        conn.execute(
            "DELETE FROM clarification_questions WHERE conversation_id = ?",
            [conversation_id],
        )
        .await
        .map_err(|e| AppError::Database(format!("Failed to clear clarifications: {}", e)))?;

        for (position, question) in questions.iter().enumerate() {
            conn.execute(
                "INSERT INTO clarification_questions (conversation_id, position, question, created_at)
                 VALUES (?, ?, ?, ?)",
                (conversation_id, position as i64, question.as_str(), now),
            )
            .await
            .map_err(|e| AppError::Database(format!("Failed to save clarification: {}", e)))?;
        }

        Ok(())
    }

    pub async fn get_clarification_questions(&self, conversation_id: &str) -> Result<Vec<String>> {
        let conn = self.connection();

        let mut rows = conn
            .query(
                "SELECT question FROM clarification_questions
                 WHERE conversation_id = ? ORDER BY position ASC",
                [conversation_id],
            )
            .await
            .map_err(|e| AppError::Database(format!("Failed to query clarifications: {}", e)))?;

        let mut questions = Vec::new();
        while let Some(row) = rows
            .next()
            .await
            .map_err(|e| AppError::Database(e.to_string()))?
        {
            questions.push(row.get(0).map_err(|e| AppError::Database(e.to_string()))?);
        }

        Ok(questions)
    }

    // ============= Vector operations =============

    pub async fn insert_vector(&self, id: u64, embedding: &[f32]) -> Result<()> {
        let conn = self.connection();
        let now = Utc::now().timestamp();

        conn.execute(
            "INSERT INTO vectors (id, embedding, dimension, created_at)
             VALUES (?, ?, ?, ?)",
            (
                id as i64,
                embedding_to_blob(embedding),
                embedding.len() as i64,
                now,
            ),
        )
        .await
        .map_err(|e| AppError::Database(format!("Failed to insert vector: {}", e)))?;

        Ok(())
    }

    /// All stored vector rows as `(id, embedding)`. Rows whose blob length
    /// disagrees with the stored dimension are skipped with a warning.
    pub async fn load_vectors(&self) -> Result<Vec<(u64, Vec<f32>)>> {
        let conn = self.connection();

        let mut rows = conn
            .query("SELECT id, embedding, dimension FROM vectors ORDER BY id ASC", ())
            .await
            .map_err(|e| AppError::Database(format!("Failed to load vectors: {}", e)))?;

        let mut vectors = Vec::new();
        while let Some(row) = rows
            .next()
            .await
            .map_err(|e| AppError::Database(e.to_string()))?
        {
            let id: i64 = row.get(0).map_err(|e| AppError::Database(e.to_string()))?;
            let blob: Vec<u8> = row.get(1).map_err(|e| AppError::Database(e.to_string()))?;
            let dimension: i64 = row.get(2).map_err(|e| AppError::Database(e.to_string()))?;

            let embedding = blob_to_embedding(&blob);
            if embedding.len() != dimension as usize {
                warn!(id, "Skipping vector row with corrupt blob length");
                continue;
            }
            vectors.push((id as u64, embedding));
        }

        Ok(vectors)
    }

    // ============= Memory chunk operations =============

    pub async fn insert_memory_chunk(&self, chunk: &MemoryChunk, vector_id: u64) -> Result<()> {
        let conn = self.connection();

        let tags = serde_json::to_string(&chunk.tags)
            .map_err(|e| AppError::Database(format!("Failed to encode tags: {}", e)))?;

        conn.execute(
            "INSERT INTO memory_chunks (id, vector_id, text, source, tags, conversation_id, created_at)
             VALUES (?, ?, ?, ?, ?, ?, ?)",
            (
                chunk.id.as_str(),
                vector_id as i64,
                chunk.text.as_str(),
                chunk.source.as_str(),
                tags,
                chunk.conversation_id.as_deref(),
                chunk.created_at.timestamp(),
            ),
        )
        .await
        .map_err(|e| AppError::Database(format!("Failed to insert memory chunk: {}", e)))?;

        Ok(())
    }

    /// Resolve vector ids back to their chunks. Order of the returned pairs
    /// is unspecified; callers re-rank against the id order they hold.
    pub async fn get_chunks_by_vector_ids(&self, ids: &[u64]) -> Result<Vec<(u64, MemoryChunk)>> {
        if ids.is_empty() {
            return Ok(Vec::new());
        }

        let conn = self.connection();
        let id_list = ids
            .iter()
            .map(|id| id.to_string())
            .collect::<Vec<_>>()
            .join(",");

        let mut rows = conn
            .query(
                &format!(
                    "SELECT id, vector_id, text, source, tags, conversation_id, created_at
                     FROM memory_chunks WHERE vector_id IN ({})",
                    id_list
                ),
                (),
            )
            .await
            .map_err(|e| AppError::Database(format!("Failed to query memory chunks: {}", e)))?;

        let mut chunks = Vec::new();
        while let Some(row) = rows
            .next()
            .await
            .map_err(|e| AppError::Database(e.to_string()))?
        {
            let vector_id: i64 = row.get(1).map_err(|e| AppError::Database(e.to_string()))?;
            let tags: String = row.get(4).map_err(|e| AppError::Database(e.to_string()))?;
            let created: i64 = row.get(6).map_err(|e| AppError::Database(e.to_string()))?;

            chunks.push((
                vector_id as u64,
                MemoryChunk {
                    id: row.get(0).map_err(|e| AppError::Database(e.to_string()))?,
                    text: row.get(2).map_err(|e| AppError::Database(e.to_string()))?,
                    source: row.get(3).map_err(|e| AppError::Database(e.to_string()))?,
                    tags: serde_json::from_str(&tags).unwrap_or_default(),
                    conversation_id: row.get(5).map_err(|e| AppError::Database(e.to_string()))?,
                    created_at: timestamp_to_datetime(created),
                },
            ));
        }

        Ok(chunks)
    }

    /// Delete chunks older than the cutoff, then vectors no chunk references.
    /// Returns `(chunks_deleted, vectors_deleted)`.
    pub async fn delete_memories_older_than(&self, cutoff: DateTime<Utc>) -> Result<(u64, u64)> {
        let conn = self.connection();

        let chunks = conn
            .execute(
                "DELETE FROM memory_chunks WHERE created_at < ?",
                [cutoff.timestamp()],
            )
            .await
            .map_err(|e| AppError::Database(format!("Failed to delete old chunks: {}", e)))?;

        let vectors = conn
            .execute(
                "DELETE FROM vectors WHERE id NOT IN (SELECT vector_id FROM memory_chunks)",
                (),
            )
            .await
            .map_err(|e| AppError::Database(format!("Failed to delete orphan vectors: {}", e)))?;

        Ok((chunks, vectors))
    }

    // ============= Search cache operations =============

    pub async fn put_cached_search(
        &self,
        query_hash: &str,
        query: &str,
        results: &[SearchResult],
    ) -> Result<()> {
        let conn = self.connection();
        let now = Utc::now().timestamp();

        let encoded = serde_json::to_string(results)
            .map_err(|e| AppError::Database(format!("Failed to encode search results: {}", e)))?;

        conn.execute(
            "INSERT OR REPLACE INTO search_cache (query_hash, query, results, created_at)
             VALUES (?, ?, ?, ?)",
            (query_hash, query, encoded, now),
        )
        .await
        .map_err(|e| AppError::Database(format!("Failed to cache search results: {}", e)))?;

        Ok(())
    }

    /// Cached results plus their storage time; TTL policy belongs to the
    /// gateway, not the storage layer.
    pub async fn get_cached_search(
        &self,
        query_hash: &str,
    ) -> Result<Option<(Vec<SearchResult>, DateTime<Utc>)>> {
        let conn = self.connection();

        let mut rows = conn
            .query(
                "SELECT results, created_at FROM search_cache WHERE query_hash = ?",
                [query_hash],
            )
            .await
            .map_err(|e| AppError::Database(format!("Failed to query search cache: {}", e)))?;

        if let Some(row) = rows
            .next()
            .await
            .map_err(|e| AppError::Database(e.to_string()))?
        {
            let encoded: String = row.get(0).map_err(|e| AppError::Database(e.to_string()))?;
            let created: i64 = row.get(1).map_err(|e| AppError::Database(e.to_string()))?;
            let results = serde_json::from_str(&encoded)
                .map_err(|e| AppError::Database(format!("Corrupt cached results: {}", e)))?;
            Ok(Some((results, timestamp_to_datetime(created))))
        } else {
            Ok(None)
        }
    }

    pub async fn delete_cache_entries_older_than(&self, cutoff: DateTime<Utc>) -> Result<u64> {
        let conn = self.connection();

        conn.execute(
            "DELETE FROM search_cache WHERE created_at < ?",
            [cutoff.timestamp()],
        )
        .await
        .map_err(|e| AppError::Database(format!("Failed to expire search cache: {}", e)))
    }
}

fn timestamp_to_datetime(secs: i64) -> DateTime<Utc> {
    DateTime::from_timestamp(secs, 0).unwrap_or_else(Utc::now)
}

/// Little-endian f32 packing for the embedding BLOB column.
pub(crate) fn embedding_to_blob(embedding: &[f32]) -> Vec<u8> {
    let mut blob = Vec::with_capacity(embedding.len() * 4);
    for value in embedding {
        blob.extend_from_slice(&value.to_le_bytes());
    }
    blob
}

pub(crate) fn blob_to_embedding(blob: &[u8]) -> Vec<f32> {
    blob.chunks_exact(4)
        .map(|bytes| f32::from_le_bytes([bytes[0], bytes[1], bytes[2], bytes[3]]))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_embedding_blob_round_trip() {
        let embedding = vec![0.25f32, -1.5, 3.75, 0.0];
        let blob = embedding_to_blob(&embedding);
        assert_eq!(blob.len(), 16);
        assert_eq!(blob_to_embedding(&blob), embedding);
    }

    #[test]
    fn test_blob_truncated_tail_dropped() {
        let mut blob = embedding_to_blob(&[1.0f32, 2.0]);
        blob.pop();
        // The incomplete trailing f32 is dropped, not zero-padded.
        assert_eq!(blob_to_embedding(&blob), vec![1.0f32]);
    }
}
