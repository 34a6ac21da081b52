//! Google Custom Search API provider.

use std::time::Duration;

use async_trait::async_trait;
use serde::Deserialize;
use tracing::debug;

use blogsmith_shared::{BlogsmithError, Result, RetryPolicy, retry_with_backoff};

use crate::{SearchHit, SearchProvider, format_hits, validate_query};

/// Production endpoint for the Custom Search JSON API.
pub const DEFAULT_BASE_URL: &str = "https://www.googleapis.com";

const USER_AGENT: &str = concat!("blogsmith/", env!("CARGO_PKG_VERSION"));

#[derive(Debug, Deserialize)]
struct CustomSearchResponse {
    #[serde(default)]
    items: Vec<CustomSearchItem>,
}

#[derive(Debug, Deserialize)]
struct CustomSearchItem {
    #[serde(default)]
    title: String,
    #[serde(default)]
    link: String,
    #[serde(default)]
    snippet: String,
}

/// Google Custom Search provider.
pub struct GoogleSearchProvider {
    http: reqwest::Client,
    base_url: String,
    api_key: String,
    search_engine_id: String,
    max_results: usize,
    retry: RetryPolicy,
}

impl GoogleSearchProvider {
    pub fn new(
        api_key: impl Into<String>,
        search_engine_id: impl Into<String>,
        max_results: usize,
        retry: RetryPolicy,
    ) -> Result<Self> {
        let http = reqwest::Client::builder()
            .user_agent(USER_AGENT)
            .timeout(Duration::from_secs(30))
            .build()
            .map_err(|e| {
                BlogsmithError::Provider(format!("failed to build HTTP client: {e}"))
            })?;

        Ok(Self {
            http,
            base_url: DEFAULT_BASE_URL.to_string(),
            api_key: api_key.into(),
            search_engine_id: search_engine_id.into(),
            max_results,
            retry,
        })
    }

    /// Point the provider at a different endpoint (mock servers in tests).
    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into();
        self
    }

    async fn search_once(&self, query: &str, num_results: usize) -> Result<Vec<SearchHit>> {
        let url = format!("{}/customsearch/v1", self.base_url);
        let num = num_results.min(self.max_results);

        let response = self
            .http
            .get(&url)
            .query(&[
                ("key", self.api_key.as_str()),
                ("cx", self.search_engine_id.as_str()),
                ("q", query),
                ("num", &num.to_string()),
            ])
            .send()
            .await
            .map_err(|e| BlogsmithError::Transient(format!("google search: {e}")))?;

        let status = response.status();
        if !status.is_success() {
            let detail = response.text().await.unwrap_or_default();
            let message = format!("google API error {status}: {detail}");
            return if status.as_u16() == 429 || status.is_server_error() {
                Err(BlogsmithError::Transient(message))
            } else {
                Err(BlogsmithError::Provider(message))
            };
        }

        let parsed: CustomSearchResponse = response.json().await.map_err(|e| {
            BlogsmithError::Provider(format!("invalid google response: {e}"))
        })?;

        debug!(query, results = parsed.items.len(), "google search complete");

        let raw = parsed
            .items
            .into_iter()
            .map(|item| (item.title, item.link, item.snippet))
            .collect();

        Ok(format_hits(raw, "google"))
    }
}

#[async_trait]
impl SearchProvider for GoogleSearchProvider {
    async fn search(&self, query: &str, num_results: usize) -> Result<Vec<SearchHit>> {
        validate_query(query)?;
        retry_with_backoff(&self.retry, "google-search", || {
            self.search_once(query, num_results)
        })
        .await
    }

    fn name(&self) -> &'static str {
        "google"
    }
}
