//! Search providers and article text extraction.
//!
//! This crate provides:
//! - [`SearchProvider`] — the narrow interface the Searcher agent consumes
//! - [`GoogleSearchProvider`] / [`BingSearchProvider`] — HTTP implementations
//! - [`content`] — page fetching, SSRF guard, and plain-text extraction

pub mod bing;
pub mod content;
pub mod google;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use blogsmith_shared::{BlogsmithError, Result, RetryPolicy, SearchConfig};

pub use bing::BingSearchProvider;
pub use content::fetch_article_text;
pub use google::GoogleSearchProvider;

/// Longest query string we will send to a provider.
const MAX_QUERY_LEN: usize = 500;

/// One result row from a search provider.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SearchHit {
    pub title: String,
    pub url: String,
    pub snippet: String,
    /// 1-based position in the provider's result order.
    pub position: usize,
    /// Provider name: "google" or "bing".
    pub source: String,
}

/// Narrow interface over an external web-search API.
#[async_trait]
pub trait SearchProvider: Send + Sync {
    /// Execute one query, returning at most `num_results` hits.
    async fn search(&self, query: &str, num_results: usize) -> Result<Vec<SearchHit>>;

    /// Provider name for logs and [`SearchHit::source`].
    fn name(&self) -> &'static str;
}

/// Reject queries a provider would choke on before spending a request.
pub fn validate_query(query: &str) -> Result<()> {
    if query.trim().is_empty() {
        return Err(BlogsmithError::validation("search query cannot be empty"));
    }
    if query.len() > MAX_QUERY_LEN {
        return Err(BlogsmithError::validation(format!(
            "search query is too long (max {MAX_QUERY_LEN} characters)"
        )));
    }
    Ok(())
}

/// Build the configured provider, resolving its API key from the env.
pub fn provider_from_config(
    config: &SearchConfig,
    retry: RetryPolicy,
) -> Result<Box<dyn SearchProvider>> {
    let api_key = blogsmith_shared::resolve_api_key(&config.api_key_env)?;

    match config.provider.as_str() {
        "google" => {
            let engine_id = config.search_engine_id.clone().ok_or_else(|| {
                BlogsmithError::config("google search requires search_engine_id")
            })?;
            Ok(Box::new(GoogleSearchProvider::new(
                api_key,
                engine_id,
                config.max_results,
                retry,
            )?))
        }
        "bing" => Ok(Box::new(BingSearchProvider::new(
            api_key,
            config.max_results,
            retry,
        )?)),
        other => Err(BlogsmithError::config(format!(
            "unknown search provider '{other}': expected 'google' or 'bing'"
        ))),
    }
}

/// Map raw `(title, url, snippet)` rows into positioned [`SearchHit`]s,
/// dropping rows without a URL.
pub(crate) fn format_hits(
    raw: Vec<(String, String, String)>,
    source: &'static str,
) -> Vec<SearchHit> {
    raw.into_iter()
        .filter(|(_, url, _)| !url.is_empty())
        .enumerate()
        .map(|(idx, (title, url, snippet))| SearchHit {
            title,
            url,
            snippet,
            position: idx + 1,
            source: source.to_string(),
        })
        .collect()
}
