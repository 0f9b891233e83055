//! Integration tests for the memory store: chunked ingestion with
//! per-chunk failure accounting, hybrid search, durability, compaction.

mod common;

use common::{StubLlm, TEST_DIMENSION, test_memory_store};
use sage::types::{ChunkErrorKind, MessageRole};
use sage::utils::config::MemoryConfig;
use sage::{Database, MemoryStore};
use std::sync::Arc;

fn small_chunk_config() -> MemoryConfig {
    MemoryConfig {
        chunk_max_tokens: 8,
        chunk_overlap_tokens: 0,
        history_window: 10,
        memory_top_k: 5,
        retention_days: 30,
    }
}

#[tokio::test]
async fn test_store_and_search_round_trip() {
    let db = Arc::new(Database::open(":memory:").await.unwrap());
    let store = test_memory_store(db).await;

    let result = store
        .store_memory(
            "The capital of France is Paris.",
            "geography-notes",
            &["geo".to_string()],
            Some("conv-1"),
        )
        .await
        .unwrap();

    assert!(result.is_fully_successful());
    assert_eq!(result.total_chunks, 1);
    assert!(result.primary_id.is_some());

    let hits = store
        .search_memory("The capital of France is Paris.", 3, None)
        .await
        .unwrap();
    assert!(!hits.is_empty());
    assert!(hits[0].text.contains("Paris"));
    assert_eq!(hits[0].source, "geography-notes");
    assert_eq!(hits[0].tags, vec!["geo".to_string()]);
}

#[tokio::test]
async fn test_empty_text_stores_nothing() {
    let db = Arc::new(Database::open(":memory:").await.unwrap());
    let store = test_memory_store(db).await;

    let result = store.store_memory("", "empty", &[], None).await.unwrap();
    assert_eq!(result.total_chunks, 0);
    assert!(result.primary_id.is_none());
    assert!(result.is_fully_successful());
    assert!(!result.is_failure());
}

#[tokio::test]
async fn test_one_chunk_failure_does_not_abort_the_rest() {
    let db = Arc::new(Database::open(":memory:").await.unwrap());
    // Second embed call fails; chunks are small so one sentence ≈ one chunk.
    let llm = Arc::new(StubLlm::failing_on(vec![1]));
    let store = MemoryStore::open(db, llm, small_chunk_config(), TEST_DIMENSION)
        .await
        .unwrap();

    let text = "First sentence about storage. Second sentence about indexing. Third sentence about retrieval.";
    let result = store.store_memory(text, "doc", &[], None).await.unwrap();

    assert!(result.total_chunks >= 3);
    assert_eq!(result.failed_chunks, 1);
    assert_eq!(result.successful_chunks, result.total_chunks - 1);
    assert!(result.is_partial());
    assert_eq!(result.errors.len(), 1);
    assert_eq!(result.errors[0].chunk_index, 1);
    assert_eq!(result.errors[0].kind, ChunkErrorKind::Embedding);
    // The surviving chunks are searchable.
    assert_eq!(store.indexed_vectors(), result.successful_chunks);
}

#[tokio::test]
async fn test_reload_preserves_ranking() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("sage.db");
    let path = path.to_str().unwrap();

    let texts = [
        "Rust borrow checker rules",
        "Tokio task scheduling",
        "Postgres query planning",
    ];

    {
        let db = Arc::new(Database::open(path).await.unwrap());
        let store = test_memory_store(db).await;
        for text in &texts {
            let stored = store.store_memory(text, "notes", &[], None).await.unwrap();
            assert!(stored.is_fully_successful());
        }
    }

    // Fresh store over the same file: the index is rebuilt from rows.
    let db = Arc::new(Database::open(path).await.unwrap());
    let store = test_memory_store(db).await;
    assert_eq!(store.indexed_vectors(), texts.len());

    let hits = store
        .search_memory("Tokio task scheduling", 3, None)
        .await
        .unwrap();
    assert_eq!(hits[0].text, "Tokio task scheduling");
}

#[tokio::test]
async fn test_search_filters_by_conversation() {
    let db = Arc::new(Database::open(":memory:").await.unwrap());
    let store = test_memory_store(db).await;

    store
        .store_memory("shared topic fact alpha", "a", &[], Some("conv-a"))
        .await
        .unwrap();
    store
        .store_memory("shared topic fact beta", "b", &[], Some("conv-b"))
        .await
        .unwrap();

    let hits = store
        .search_memory("shared topic", 10, Some("conv-a"))
        .await
        .unwrap();
    assert_eq!(hits.len(), 1);
    assert_eq!(hits[0].conversation_id.as_deref(), Some("conv-a"));
}

#[tokio::test]
async fn test_empty_query_is_rejected() {
    let db = Arc::new(Database::open(":memory:").await.unwrap());
    let store = test_memory_store(db).await;

    let result = store.search_memory("  ", 5, None).await;
    assert!(result.is_err());
}

#[tokio::test]
async fn test_compaction_drops_old_chunks_and_vectors() {
    let db = Arc::new(Database::open(":memory:").await.unwrap());
    let store = test_memory_store(db.clone()).await;

    store
        .store_memory("ephemeral finding", "web", &[], None)
        .await
        .unwrap();
    assert_eq!(store.indexed_vectors(), 1);

    // A negative horizon puts the cutoff in the future, so everything just
    // stored is "older than" it.
    let (chunks, vectors) = store
        .compact_memories(chrono::Duration::seconds(-5))
        .await
        .unwrap();
    assert_eq!(chunks, 1);
    assert_eq!(vectors, 1);
    assert_eq!(store.indexed_vectors(), 0);

    let hits = store.search_memory("ephemeral finding", 5, None).await.unwrap();
    assert!(hits.is_empty());
}

#[tokio::test]
async fn test_conversation_and_clarification_persistence() {
    let db = Arc::new(Database::open(":memory:").await.unwrap());
    let store = test_memory_store(db).await;

    let conv = store.create_conversation(Some("Battery research")).await.unwrap();
    store
        .save_message(&conv, MessageRole::User, "How do batteries degrade?")
        .await
        .unwrap();
    store
        .save_message(&conv, MessageRole::Assistant, "Several mechanisms [1].")
        .await
        .unwrap();

    let messages = store.messages(&conv).await.unwrap();
    assert_eq!(messages.len(), 2);
    assert_eq!(messages[0].role, MessageRole::User);
    assert_eq!(messages[1].role, MessageRole::Assistant);

    let questions = vec!["Which chemistry?".to_string(), "Cycle count?".to_string()];
    store
        .save_clarification_questions(&conv, &questions)
        .await
        .unwrap();
    assert_eq!(store.clarification_questions(&conv).await.unwrap(), questions);

    // Saving again replaces, not appends.
    let replacement = vec!["Operating temperature?".to_string()];
    store
        .save_clarification_questions(&conv, &replacement)
        .await
        .unwrap();
    assert_eq!(
        store.clarification_questions(&conv).await.unwrap(),
        replacement
    );
}

#[tokio::test]
async fn test_conversation_context_is_assembled_fresh() {
    let db = Arc::new(Database::open(":memory:").await.unwrap());
    let store = test_memory_store(db).await;

    let conv = store.create_conversation(None).await.unwrap();
    store
        .save_message(&conv, MessageRole::User, "Tell me about solid state batteries")
        .await
        .unwrap();
    store
        .store_memory(
            "Solid state batteries use a solid electrolyte.",
            "web",
            &[],
            Some(&conv),
        )
        .await
        .unwrap();

    let context = store
        .conversation_context(&conv, "solid state batteries")
        .await
        .unwrap();
    assert_eq!(context.conversation_id, conv);
    assert_eq!(context.recent_messages.len(), 1);
    assert!(!context.relevant_memories.is_empty());
}
