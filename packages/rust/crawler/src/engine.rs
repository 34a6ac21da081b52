//! Concurrent pattern-based crawler.
//!
//! Expands a source's URL patterns into concrete pages, fetches them with
//! bounded concurrency and per-request delay, and extracts title/body text
//! through ordered CSS-selector fallbacks.

use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use scraper::{Html, Selector};
use serde::Deserialize;
use tokio::sync::Semaphore;
use tracing::{debug, info, instrument, warn};

use blogsmith_shared::{BlogsmithError, CrawlConfig, Result};

use crate::filters::ContentFilter;
use crate::patterns::{self, UrlPattern};

/// User-Agent string for crawl requests.
const USER_AGENT: &str = concat!("blogsmith/", env!("CARGO_PKG_VERSION"));

/// Title selectors, in priority order.
const TITLE_SELECTORS: &[&str] = &[
    "h1",
    "h2.title",
    ".post-title",
    ".entry-title",
    ".article-title",
    "title",
];

/// Content selectors, in priority order.
const CONTENT_SELECTORS: &[&str] = &[
    ".post-content",
    ".entry-content",
    "article",
    ".post-body",
    ".article-content",
    "main",
    ".content",
];

/// Tag/category selectors.
const TAG_SELECTORS: &[&str] = &[".tags a", ".categories a", ".post-tags a", ".tag"];

/// Shortest title/body worth keeping during extraction.
const MIN_TITLE_CHARS: usize = 5;
const MIN_BODY_CHARS: usize = 100;

// ---------------------------------------------------------------------------
// Source definition
// ---------------------------------------------------------------------------

/// A crawl source definition, loaded from a TOML file.
#[derive(Debug, Clone, Deserialize)]
pub struct CrawlSource {
    /// Base URL substituted into pattern templates.
    pub base_url: String,
    /// URL patterns to expand.
    pub patterns: Vec<UrlPattern>,
    /// Post-extraction content filter.
    #[serde(default)]
    pub filter: ContentFilter,
}

impl CrawlSource {
    /// Load a source definition from a TOML file.
    pub fn load(path: &Path) -> Result<Self> {
        let content =
            std::fs::read_to_string(path).map_err(|e| BlogsmithError::io(path, e))?;
        toml::from_str(&content).map_err(|e| {
            BlogsmithError::config(format!("invalid crawl source {}: {e}", path.display()))
        })
    }
}

// ---------------------------------------------------------------------------
// CrawledPage
// ---------------------------------------------------------------------------

/// One successfully fetched and extracted page.
#[derive(Debug, Clone, serde::Serialize, Deserialize)]
pub struct CrawledPage {
    pub url: String,
    pub title: String,
    /// Extracted body text, newline-joined.
    pub text: String,
    #[serde(default)]
    pub tags: Vec<String>,
    pub fetched_at: DateTime<Utc>,
}

// ---------------------------------------------------------------------------
// PatternCrawler
// ---------------------------------------------------------------------------

/// Concurrent crawler over pattern-expanded URLs.
pub struct PatternCrawler {
    config: CrawlConfig,
    client: reqwest::Client,
}

impl PatternCrawler {
    /// Create a new crawler with the given configuration.
    pub fn new(config: CrawlConfig) -> Result<Self> {
        let client = reqwest::Client::builder()
            .user_agent(USER_AGENT)
            .redirect(reqwest::redirect::Policy::limited(5))
            .timeout(Duration::from_secs(30))
            .build()
            .map_err(|e| {
                BlogsmithError::Transient(format!("failed to build HTTP client: {e}"))
            })?;

        Ok(Self { config, client })
    }

    /// Expand the source's patterns and fetch every page, returning those
    /// that extracted cleanly and pass the source's filter. Per-page
    /// failures are logged and skipped.
    #[instrument(skip_all, fields(base_url = %source.base_url))]
    pub async fn crawl(&self, source: &CrawlSource) -> Result<Vec<CrawledPage>> {
        let mut urls = patterns::expand_all(&source.patterns, &source.base_url);
        if urls.is_empty() {
            return Err(BlogsmithError::validation(
                "crawl source expanded to zero URLs",
            ));
        }
        urls.truncate(self.config.max_pages);

        info!(
            urls = urls.len(),
            concurrency = self.config.concurrency,
            delay_ms = self.config.request_delay_ms,
            "starting pattern crawl"
        );

        let semaphore = Arc::new(Semaphore::new(self.config.concurrency.max(1)));
        let mut handles = Vec::with_capacity(urls.len());

        for url in urls {
            let client = self.client.clone();
            let sem = semaphore.clone();
            let delay = self.config.request_delay_ms;

            handles.push(tokio::spawn(async move {
                let _permit = sem.acquire().await.expect("semaphore closed");
                if delay > 0 {
                    tokio::time::sleep(Duration::from_millis(delay)).await;
                }
                let result = fetch_page(&client, &url).await;
                (url, result)
            }));
        }

        let mut pages = Vec::new();
        let mut skipped = 0usize;
        for handle in handles {
            match handle.await {
                Ok((_, Ok(Some(page)))) => {
                    if source.filter.should_include(&page) {
                        pages.push(page);
                    } else {
                        skipped += 1;
                    }
                }
                Ok((url, Ok(None))) => {
                    debug!(%url, "no extractable content");
                    skipped += 1;
                }
                Ok((url, Err(e))) => {
                    warn!(%url, error = %e, "fetch failed, skipping");
                    skipped += 1;
                }
                Err(e) => {
                    warn!(error = %e, "crawl task panicked");
                    skipped += 1;
                }
            }
        }

        // Deterministic output order regardless of completion order
        pages.sort_by(|a, b| a.url.cmp(&b.url));

        info!(fetched = pages.len(), skipped, "pattern crawl complete");
        Ok(pages)
    }
}

/// Fetch one URL and extract its title/body/tags. `None` when the page has
/// no usable content.
async fn fetch_page(client: &reqwest::Client, url: &str) -> Result<Option<CrawledPage>> {
    debug!(%url, "fetching page");

    let response = client
        .get(url)
        .send()
        .await
        .map_err(|e| BlogsmithError::Transient(format!("{url}: {e}")))?;

    let status = response.status();
    if !status.is_success() {
        return Err(BlogsmithError::Provider(format!("{url}: HTTP {status}")));
    }

    let html = response
        .text()
        .await
        .map_err(|e| BlogsmithError::Transient(format!("{url}: body read failed: {e}")))?;

    let doc = Html::parse_document(&html);

    let title = extract_first_text(&doc, TITLE_SELECTORS, MIN_TITLE_CHARS);
    let text = extract_content(&doc);

    let (Some(title), Some(text)) = (title, text) else {
        return Ok(None);
    };

    Ok(Some(CrawledPage {
        url: url.to_string(),
        title,
        text,
        tags: extract_tags(&doc),
        fetched_at: Utc::now(),
    }))
}

/// First selector whose match has at least `min_len` characters of text.
fn extract_first_text(doc: &Html, selectors: &[&str], min_len: usize) -> Option<String> {
    for sel_str in selectors {
        let Ok(selector) = Selector::parse(sel_str) else {
            continue;
        };
        if let Some(el) = doc.select(&selector).next() {
            let text = el.text().collect::<String>().trim().to_string();
            if text.len() >= min_len {
                return Some(text);
            }
        }
    }
    None
}

/// Main content through the selector fallback list, else all paragraphs.
fn extract_content(doc: &Html) -> Option<String> {
    for sel_str in CONTENT_SELECTORS {
        let Ok(selector) = Selector::parse(sel_str) else {
            continue;
        };
        if let Some(el) = doc.select(&selector).next() {
            let text = joined_text(el.text());
            if text.len() >= MIN_BODY_CHARS {
                return Some(text);
            }
        }
    }

    // Fallback: every <p> in the document
    let p_sel = Selector::parse("p").expect("static selector");
    let text = doc
        .select(&p_sel)
        .map(|p| p.text().collect::<String>().trim().to_string())
        .filter(|t| !t.is_empty())
        .collect::<Vec<_>>()
        .join("\n");

    (text.len() >= MIN_BODY_CHARS).then_some(text)
}

fn joined_text<'a>(parts: impl Iterator<Item = &'a str>) -> String {
    parts
        .map(str::trim)
        .filter(|t| !t.is_empty())
        .collect::<Vec<_>>()
        .join("\n")
}

/// Collect unique tag/category labels.
fn extract_tags(doc: &Html) -> Vec<String> {
    let mut tags = Vec::new();
    for sel_str in TAG_SELECTORS {
        let Ok(selector) = Selector::parse(sel_str) else {
            continue;
        };
        for el in doc.select(&selector) {
            let tag = el.text().collect::<String>().trim().to_string();
            if !tag.is_empty() && !tags.contains(&tag) {
                tags.push(tag);
            }
        }
    }
    tags
}
