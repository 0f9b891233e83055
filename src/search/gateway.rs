//! Web search gateway with caching.

use crate::db::Database;
use crate::types::{AppError, Result, SearchResult};
use async_trait::async_trait;
use chrono::{Duration, Utc};
use sha2::{Digest, Sha256};
use std::collections::HashSet;
use std::sync::Arc;
use tracing::{debug, warn};

/// External search contract consumed by the research pipeline.
#[async_trait]
pub trait SearchGateway: Send + Sync {
    async fn search(&self, query: &str, max_results: usize) -> Result<Vec<SearchResult>>;
}

/// Web search powered by daedra (DuckDuckGo backend).
pub struct WebSearchGateway;

impl WebSearchGateway {
    pub fn new() -> Self {
        Self
    }
}

impl Default for WebSearchGateway {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl SearchGateway for WebSearchGateway {
    async fn search(&self, query: &str, max_results: usize) -> Result<Vec<SearchResult>> {
        if query.trim().is_empty() {
            return Err(AppError::InvalidInput("Empty search query".to_string()));
        }

        let args = daedra::SearchArgs {
            query: query.to_string(),
            options: Some(daedra::SearchOptions {
                num_results: max_results,
                ..Default::default()
            }),
        };

        match daedra::tools::search::perform_search(&args).await {
            Ok(response) => Ok(response
                .data
                .iter()
                .map(|r| SearchResult {
                    title: r.title.clone(),
                    url: r.url.clone(),
                    snippet: r.description.clone(),
                    content: None,
                })
                .collect()),
            Err(e) => Err(AppError::Search(format!("Search failed: {}", e))),
        }
    }
}

/// TTL cache over any [`SearchGateway`].
///
/// Entries are keyed by a SHA-256 hash of the normalized query and stored in
/// the relational database, so the cache survives restarts. Results are
/// deduplicated by URL before caching; a hit is truncated to the requested
/// count.
pub struct CachedSearchGateway<G> {
    inner: G,
    db: Arc<Database>,
    ttl: Duration,
}

impl<G: SearchGateway> CachedSearchGateway<G> {
    pub fn new(inner: G, db: Arc<Database>, ttl_secs: u64) -> Self {
        Self {
            inner,
            db,
            ttl: Duration::seconds(ttl_secs as i64),
        }
    }

    /// Drop every cache row older than the TTL. Maintenance call, not part
    /// of the request path.
    pub async fn clear_expired_cache(&self) -> Result<u64> {
        self.db
            .delete_cache_entries_older_than(Utc::now() - self.ttl)
            .await
    }
}

#[async_trait]
impl<G: SearchGateway> SearchGateway for CachedSearchGateway<G> {
    async fn search(&self, query: &str, max_results: usize) -> Result<Vec<SearchResult>> {
        if query.trim().is_empty() {
            return Err(AppError::InvalidInput("Empty search query".to_string()));
        }

        let key = query_key(query);

        match self.db.get_cached_search(&key).await {
            // Strict comparison: a zero TTL disables serving from cache.
            Ok(Some((mut results, created_at))) if Utc::now() - created_at < self.ttl => {
                debug!(query, "Search cache hit");
                results.truncate(max_results);
                return Ok(results);
            }
            Ok(_) => {}
            Err(e) => warn!(query, error = %e, "Search cache read failed"),
        }

        let results = dedup_by_url(self.inner.search(query, max_results).await?);

        if let Err(e) = self.db.put_cached_search(&key, query, &results).await {
            warn!(query, error = %e, "Search cache write failed");
        }

        Ok(results)
    }
}

/// Collapse whitespace and case so trivially-different phrasings share a
/// cache entry.
fn normalize_query(query: &str) -> String {
    query
        .trim()
        .to_lowercase()
        .split_whitespace()
        .collect::<Vec<_>>()
        .join(" ")
}

fn query_key(query: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(normalize_query(query).as_bytes());
    format!("{:x}", hasher.finalize())
}

fn dedup_by_url(results: Vec<SearchResult>) -> Vec<SearchResult> {
    let mut seen = HashSet::new();
    results
        .into_iter()
        .filter(|r| seen.insert(r.url.clone()))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    struct CountingGateway {
        calls: AtomicUsize,
    }

    impl CountingGateway {
        fn new() -> Self {
            Self {
                calls: AtomicUsize::new(0),
            }
        }
    }

    #[async_trait]
    impl SearchGateway for &CountingGateway {
        async fn search(&self, query: &str, max_results: usize) -> Result<Vec<SearchResult>> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            Ok((0..max_results)
                .map(|i| SearchResult {
                    title: format!("{} #{}", query, i),
                    url: format!("https://example.com/{}/{}", query, i),
                    snippet: "snippet".to_string(),
                    content: None,
                })
                .collect())
        }
    }

    #[test]
    fn test_normalize_query() {
        assert_eq!(normalize_query("  Rust   ASYNC  "), "rust async");
        assert_eq!(normalize_query("rust async"), "rust async");
    }

    #[test]
    fn test_query_key_is_case_and_space_insensitive() {
        assert_eq!(query_key("Rust  Async"), query_key("rust async"));
        assert_ne!(query_key("rust async"), query_key("rust await"));
    }

    #[test]
    fn test_dedup_by_url_keeps_first() {
        let results = vec![
            SearchResult {
                title: "a".to_string(),
                url: "https://example.com/a".to_string(),
                snippet: String::new(),
                content: None,
            },
            SearchResult {
                title: "duplicate".to_string(),
                url: "https://example.com/a".to_string(),
                snippet: String::new(),
                content: None,
            },
            SearchResult {
                title: "b".to_string(),
                url: "https://example.com/b".to_string(),
                snippet: String::new(),
                content: None,
            },
        ];
        let deduped = dedup_by_url(results);
        assert_eq!(deduped.len(), 2);
        assert_eq!(deduped[0].title, "a");
    }

    #[tokio::test]
    async fn test_cache_hit_skips_inner_gateway() {
        let db = Arc::new(Database::open(":memory:").await.unwrap());
        let counting = CountingGateway::new();
        let gateway = CachedSearchGateway::new(&counting, db, 3600);

        let first = gateway.search("rust async", 3).await.unwrap();
        assert_eq!(first.len(), 3);
        assert_eq!(counting.calls.load(Ordering::SeqCst), 1);

        // Differently-cased rendering of the same query hits the cache.
        let second = gateway.search("Rust  Async", 3).await.unwrap();
        assert_eq!(second.len(), 3);
        assert_eq!(counting.calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_expired_entries_refetch() {
        let db = Arc::new(Database::open(":memory:").await.unwrap());
        let counting = CountingGateway::new();
        let gateway = CachedSearchGateway::new(&counting, db, 0);

        gateway.search("rust async", 2).await.unwrap();
        gateway.search("rust async", 2).await.unwrap();
        assert_eq!(counting.calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn test_empty_query_rejected() {
        let db = Arc::new(Database::open(":memory:").await.unwrap());
        let counting = CountingGateway::new();
        let gateway = CachedSearchGateway::new(&counting, db, 3600);

        let result = gateway.search("   ", 3).await;
        assert!(matches!(result, Err(AppError::InvalidInput(_))));
        assert_eq!(counting.calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_clear_expired_cache() {
        let db = Arc::new(Database::open(":memory:").await.unwrap());
        let counting = CountingGateway::new();

        {
            let gateway = CachedSearchGateway::new(&counting, db.clone(), 3600);
            gateway.search("rust async", 2).await.unwrap();
        }

        // Timestamps have second granularity; step past the stored second so
        // the zero-TTL cutoff is strictly newer than the row.
        tokio::time::sleep(std::time::Duration::from_millis(1100)).await;
        let gateway = CachedSearchGateway::new(&counting, db, 0);
        let removed = gateway.clear_expired_cache().await.unwrap();
        assert_eq!(removed, 1);
    }
}
