//! Notes-service upload client (Notion-style API).

use std::time::Duration;

use serde::Deserialize;
use serde_json::json;
use tracing::{debug, info};

use blogsmith_shared::{BlogsmithError, Result, RetryPolicy, retry_with_backoff};

/// Production notes-service endpoint.
pub const DEFAULT_BASE_URL: &str = "https://api.notion.com";

/// API version header value the service requires.
const API_VERSION: &str = "2022-06-28";

const USER_AGENT: &str = concat!("blogsmith/", env!("CARGO_PKG_VERSION"));

/// Paragraph blocks are capped by the API; longer bodies are chunked.
const MAX_PARAGRAPH_CHARS: usize = 2000;

/// Structured content for one uploaded page.
#[derive(Debug, Clone)]
pub struct NotePage {
    pub title: String,
    pub body: String,
    pub source_url: Option<String>,
    pub tags: Vec<String>,
}

#[derive(Debug, Deserialize)]
struct CreatePageResponse {
    id: String,
}

/// HTTP client for the notes service.
pub struct NotesClient {
    http: reqwest::Client,
    base_url: String,
    api_key: String,
    retry: RetryPolicy,
}

impl NotesClient {
    pub fn new(api_key: impl Into<String>, retry: RetryPolicy) -> Result<Self> {
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
            retry,
        })
    }

    /// Point the client at a different endpoint (mock servers in tests).
    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into();
        self
    }

    /// Create a page in the given database. Returns the created page id.
    pub async fn create_page(&self, page: &NotePage, database_id: &str) -> Result<String> {
        retry_with_backoff(&self.retry, "notes-create-page", || {
            self.create_page_once(page, database_id)
        })
        .await
    }

    async fn create_page_once(&self, page: &NotePage, database_id: &str) -> Result<String> {
        let payload = json!({
            "parent": {"database_id": database_id},
            "properties": build_properties(page),
            "children": build_children(&page.body),
        });

        let url = format!("{}/v1/pages", self.base_url);
        let response = self
            .http
            .post(&url)
            .bearer_auth(&self.api_key)
            .header("Notion-Version", API_VERSION)
            .json(&payload)
            .send()
            .await
            .map_err(|e| BlogsmithError::Transient(format!("notes upload: {e}")))?;

        let status = response.status();
        if !status.is_success() {
            let detail = response.text().await.unwrap_or_default();
            let message = format!("notes API error {status}: {detail}");
            return if status.as_u16() == 429 || status.is_server_error() {
                Err(BlogsmithError::Transient(message))
            } else {
                Err(BlogsmithError::Provider(message))
            };
        }

        let parsed: CreatePageResponse = response.json().await.map_err(|e| {
            BlogsmithError::Provider(format!("invalid notes response: {e}"))
        })?;

        info!(page_id = %parsed.id, title = %page.title, "notes page created");
        Ok(parsed.id)
    }
}

/// Title/URL/tags properties for the database row.
fn build_properties(page: &NotePage) -> serde_json::Value {
    let mut properties = json!({
        "Title": {
            "title": [{"text": {"content": page.title}}]
        }
    });

    if let Some(url) = &page.source_url {
        properties["URL"] = json!({"url": url});
    }

    if !page.tags.is_empty() {
        let tags: Vec<_> = page.tags.iter().map(|t| json!({"name": t})).collect();
        properties["Tags"] = json!({"multi_select": tags});
    }

    properties
}

/// Paragraph blocks for the page body, chunked to the API limit.
fn build_children(body: &str) -> Vec<serde_json::Value> {
    let mut blocks = Vec::new();
    for paragraph in body.split("\n\n").filter(|p| !p.trim().is_empty()) {
        for chunk in chunk_text(paragraph.trim(), MAX_PARAGRAPH_CHARS) {
            blocks.push(json!({
                "object": "block",
                "type": "paragraph",
                "paragraph": {
                    "rich_text": [{"type": "text", "text": {"content": chunk}}]
                }
            }));
        }
    }
    debug!(blocks = blocks.len(), "built content blocks");
    blocks
}

/// Split text into chunks of at most `max_chars`, on UTF-8 boundaries.
fn chunk_text(text: &str, max_chars: usize) -> Vec<String> {
    if text.len() <= max_chars {
        return vec![text.to_string()];
    }

    let mut chunks = Vec::new();
    let mut rest = text;
    while !rest.is_empty() {
        if rest.len() <= max_chars {
            chunks.push(rest.to_string());
            break;
        }
        let mut end = max_chars;
        while !rest.is_char_boundary(end) {
            end -= 1;
        }
        chunks.push(rest[..end].to_string());
        rest = &rest[end..];
    }
    chunks
}

#[cfg(test)]
mod tests {
    use super::*;
    use wiremock::matchers::{header, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn fast_retry() -> RetryPolicy {
        RetryPolicy {
            max_attempts: 3,
            base_delay: Duration::from_millis(1),
            max_delay: Duration::from_millis(4),
        }
    }

    fn sample_page() -> NotePage {
        NotePage {
            title: "Weekly digest".into(),
            body: "First paragraph.\n\nSecond paragraph.".into(),
            source_url: Some("https://blog.example.com/post".into()),
            tags: vec!["rust".into()],
        }
    }

    #[test]
    fn chunking_respects_limit_and_boundaries() {
        let text = "é".repeat(1500); // 3000 bytes
        let chunks = chunk_text(&text, 2000);
        assert_eq!(chunks.len(), 2);
        assert!(chunks.iter().all(|c| c.len() <= 2000));
        assert_eq!(chunks.concat(), text);
    }

    #[test]
    fn properties_include_url_and_tags() {
        let props = build_properties(&sample_page());
        assert_eq!(
            props["Title"]["title"][0]["text"]["content"],
            "Weekly digest"
        );
        assert_eq!(props["URL"]["url"], "https://blog.example.com/post");
        assert_eq!(props["Tags"]["multi_select"][0]["name"], "rust");
    }

    #[test]
    fn children_split_on_blank_lines() {
        let blocks = build_children("One.\n\nTwo.\n\n\n");
        assert_eq!(blocks.len(), 2);
        assert_eq!(
            blocks[0]["paragraph"]["rich_text"][0]["text"]["content"],
            "One."
        );
    }

    #[tokio::test]
    async fn create_page_returns_id() {
        let server = MockServer::start().await;

        Mock::given(method("POST"))
            .and(path("/v1/pages"))
            .and(header("Notion-Version", API_VERSION))
            .and(header("authorization", "Bearer notes-key"))
            .respond_with(
                ResponseTemplate::new(200)
                    .set_body_json(serde_json::json!({"id": "page-123"})),
            )
            .mount(&server)
            .await;

        let client = NotesClient::new("notes-key", fast_retry())
            .unwrap()
            .with_base_url(server.uri());

        let id = client.create_page(&sample_page(), "db-1").await.unwrap();
        assert_eq!(id, "page-123");
    }

    #[tokio::test]
    async fn rate_limited_upload_is_retried() {
        let server = MockServer::start().await;

        Mock::given(method("POST"))
            .and(path("/v1/pages"))
            .respond_with(ResponseTemplate::new(429))
            .up_to_n_times(1)
            .mount(&server)
            .await;

        Mock::given(method("POST"))
            .and(path("/v1/pages"))
            .respond_with(
                ResponseTemplate::new(200)
                    .set_body_json(serde_json::json!({"id": "page-456"})),
            )
            .mount(&server)
            .await;

        let client = NotesClient::new("notes-key", fast_retry())
            .unwrap()
            .with_base_url(server.uri());

        let id = client.create_page(&sample_page(), "db-1").await.unwrap();
        assert_eq!(id, "page-456");
        assert_eq!(server.received_requests().await.unwrap().len(), 2);
    }

    #[tokio::test]
    async fn bad_request_is_terminal() {
        let server = MockServer::start().await;

        Mock::given(method("POST"))
            .and(path("/v1/pages"))
            .respond_with(ResponseTemplate::new(400).set_body_string("bad database id"))
            .mount(&server)
            .await;

        let client = NotesClient::new("notes-key", fast_retry())
            .unwrap()
            .with_base_url(server.uri());

        let err = client
            .create_page(&sample_page(), "nope")
            .await
            .unwrap_err();
        assert!(matches!(err, BlogsmithError::Provider(_)));
        assert_eq!(server.received_requests().await.unwrap().len(), 1);
    }
}
