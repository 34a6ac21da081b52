//! Bing Web Search API provider.

use std::time::Duration;

use async_trait::async_trait;
use serde::Deserialize;
use tracing::debug;

use blogsmith_shared::{BlogsmithError, Result, RetryPolicy, retry_with_backoff};

use crate::{SearchHit, SearchProvider, format_hits, validate_query};

/// Production endpoint for the Bing Web Search API.
pub const DEFAULT_BASE_URL: &str = "https://api.bing.microsoft.com";

const USER_AGENT: &str = concat!("blogsmith/", env!("CARGO_PKG_VERSION"));

#[derive(Debug, Deserialize)]
struct WebSearchResponse {
    #[serde(rename = "webPages", default)]
    web_pages: Option<WebPages>,
}

#[derive(Debug, Deserialize)]
struct WebPages {
    #[serde(default)]
    value: Vec<WebPage>,
}

#[derive(Debug, Deserialize)]
struct WebPage {
    #[serde(default)]
    name: String,
    #[serde(default)]
    url: String,
    #[serde(default)]
    snippet: String,
}

/// Bing Web Search provider.
pub struct BingSearchProvider {
    http: reqwest::Client,
    base_url: String,
    api_key: String,
    max_results: usize,
    market: String,
    retry: RetryPolicy,
}

impl BingSearchProvider {
    pub fn new(
        api_key: impl Into<String>,
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
            max_results,
            market: "en-US".to_string(),
            retry,
        })
    }

    /// Point the provider at a different endpoint (mock servers in tests).
    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into();
        self
    }

    /// Override the market/locale sent with each query.
    pub fn with_market(mut self, market: impl Into<String>) -> Self {
        self.market = market.into();
        self
    }

    async fn search_once(&self, query: &str, num_results: usize) -> Result<Vec<SearchHit>> {
        let url = format!("{}/v7.0/search", self.base_url);
        let count = num_results.min(self.max_results);

        let response = self
            .http
            .get(&url)
            .header("Ocp-Apim-Subscription-Key", &self.api_key)
            .query(&[
                ("q", query),
                ("count", &count.to_string()),
                ("mkt", self.market.as_str()),
            ])
            .send()
            .await
            .map_err(|e| BlogsmithError::Transient(format!("bing search: {e}")))?;

        let status = response.status();
        if !status.is_success() {
            let detail = response.text().await.unwrap_or_default();
            let message = format!("bing API error {status}: {detail}");
            return if status.as_u16() == 429 || status.is_server_error() {
                Err(BlogsmithError::Transient(message))
            } else {
                Err(BlogsmithError::Provider(message))
            };
        }

        let parsed: WebSearchResponse = response.json().await.map_err(|e| {
            BlogsmithError::Provider(format!("invalid bing response: {e}"))
        })?;

        let pages = parsed.web_pages.map(|w| w.value).unwrap_or_default();
        debug!(query, results = pages.len(), "bing search complete");

        let raw = pages
            .into_iter()
            .map(|page| (page.name, page.url, page.snippet))
            .collect();

        Ok(format_hits(raw, "bing"))
    }
}

#[async_trait]
impl SearchProvider for BingSearchProvider {
    async fn search(&self, query: &str, num_results: usize) -> Result<Vec<SearchHit>> {
        validate_query(query)?;
        retry_with_backoff(&self.retry, "bing-search", || {
            self.search_once(query, num_results)
        })
        .await
    }

    fn name(&self) -> &'static str {
        "bing"
    }
}
