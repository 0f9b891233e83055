//! Page content fetching.

use crate::types::{AppError, Result};
use async_trait::async_trait;
use std::collections::HashMap;
use std::time::Duration;
use tracing::warn;

/// Fetches page text for a set of URLs. Partial results are the norm: URLs
/// that error or exceed the per-URL timeout are simply absent from the map.
#[async_trait]
pub trait ContentFetcher: Send + Sync {
    async fn fetch_content(
        &self,
        urls: &[String],
        timeout_per_url: Duration,
    ) -> HashMap<String, String>;
}

/// Content fetch via daedra's page reader (HTML → markdown-ish text).
pub struct WebContentFetcher;

impl WebContentFetcher {
    pub fn new() -> Self {
        Self
    }

    async fn fetch_one(url: &str) -> Result<String> {
        let args = daedra::VisitPageArgs {
            url: url.to_string(),
            include_images: false,
            selector: None,
        };

        match daedra::tools::fetch::fetch_page(&args).await {
            Ok(page) => Ok(page.content),
            Err(e) => Err(AppError::Search(format!("Failed to fetch page: {}", e))),
        }
    }
}

impl Default for WebContentFetcher {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl ContentFetcher for WebContentFetcher {
    async fn fetch_content(
        &self,
        urls: &[String],
        timeout_per_url: Duration,
    ) -> HashMap<String, String> {
        let mut contents = HashMap::new();

        for url in urls {
            match tokio::time::timeout(timeout_per_url, Self::fetch_one(url)).await {
                Ok(Ok(text)) => {
                    contents.insert(url.clone(), text);
                }
                Ok(Err(e)) => warn!(url, error = %e, "Content fetch failed"),
                Err(_) => warn!(url, "Content fetch timed out"),
            }
        }

        contents
    }
}
