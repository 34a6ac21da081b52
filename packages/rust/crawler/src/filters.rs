//! Content filtering for crawled pages.

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::engine::CrawledPage;

/// Keyword and length filters applied after extraction.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ContentFilter {
    /// Page must contain at least one of these (title or body).
    #[serde(default)]
    pub required_keywords: Vec<String>,

    /// Page must contain none of these (title or body).
    #[serde(default)]
    pub excluded_keywords: Vec<String>,

    /// Minimum body length in characters.
    #[serde(default)]
    pub min_content_length: usize,

    /// Minimum title length in characters.
    #[serde(default)]
    pub min_title_length: usize,
}

impl ContentFilter {
    /// Whether a crawled page passes every configured filter.
    pub fn should_include(&self, page: &CrawledPage) -> bool {
        let haystack = format!("{} {}", page.title, page.text).to_lowercase();

        if !self.required_keywords.is_empty()
            && !self
                .required_keywords
                .iter()
                .any(|kw| haystack.contains(&kw.to_lowercase()))
        {
            debug!(url = %page.url, "filtered: no required keyword");
            return false;
        }

        if self
            .excluded_keywords
            .iter()
            .any(|kw| haystack.contains(&kw.to_lowercase()))
        {
            debug!(url = %page.url, "filtered: excluded keyword");
            return false;
        }

        if page.text.len() < self.min_content_length {
            debug!(url = %page.url, "filtered: content too short");
            return false;
        }

        if page.title.len() < self.min_title_length {
            debug!(url = %page.url, "filtered: title too short");
            return false;
        }

        true
    }
}
