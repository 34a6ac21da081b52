//! Generative-text provider client.
//!
//! Wraps the hosted messages API behind [`GenerationClient::generate`]:
//! one system prompt + one user message in, the first text block out.
//! Transient HTTP failures are retried internally with bounded backoff.

pub mod extract;

use std::time::Duration;

use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use blogsmith_shared::{AiConfig, BlogsmithError, Result, RetryPolicy, retry_with_backoff};

pub use extract::{extract_json, extract_json_as};

/// Production API endpoint.
pub const DEFAULT_BASE_URL: &str = "https://api.anthropic.com";

/// API version header value the provider requires.
const API_VERSION: &str = "2023-06-01";

/// User-Agent string for generation requests.
const USER_AGENT: &str = concat!("blogsmith/", env!("CARGO_PKG_VERSION"));

// ---------------------------------------------------------------------------
// Wire types
// ---------------------------------------------------------------------------

#[derive(Debug, Serialize)]
struct MessagesRequest<'a> {
    model: &'a str,
    max_tokens: u32,
    temperature: f32,
    system: &'a str,
    messages: [MessageBody<'a>; 1],
}

#[derive(Debug, Serialize)]
struct MessageBody<'a> {
    role: &'static str,
    content: &'a str,
}

#[derive(Debug, Deserialize)]
struct MessagesResponse {
    #[serde(default)]
    content: Vec<ContentBlock>,
    #[serde(default)]
    usage: Option<Usage>,
}

#[derive(Debug, Deserialize)]
struct ContentBlock {
    #[serde(default)]
    text: String,
}

#[derive(Debug, Deserialize)]
struct Usage {
    #[serde(default)]
    input_tokens: u64,
    #[serde(default)]
    output_tokens: u64,
}

// ---------------------------------------------------------------------------
// GenerationClient
// ---------------------------------------------------------------------------

/// One prompt call to the generative provider.
#[derive(Debug, Clone, Copy)]
pub struct GenerationRequest<'a> {
    /// System prompt establishing the role.
    pub system: &'a str,
    /// The user message body.
    pub user: &'a str,
    /// Temperature override for this call.
    pub temperature: Option<f32>,
    /// Output token cap override for this call.
    pub max_tokens: Option<u32>,
}

impl<'a> GenerationRequest<'a> {
    /// A request with the client's default temperature and token cap.
    pub fn new(system: &'a str, user: &'a str) -> Self {
        Self {
            system,
            user,
            temperature: None,
            max_tokens: None,
        }
    }

    /// Set the sampling temperature for this call.
    pub fn temperature(mut self, t: f32) -> Self {
        self.temperature = Some(t);
        self
    }
}

/// HTTP client for the generative-text provider.
#[derive(Debug, Clone)]
pub struct GenerationClient {
    http: reqwest::Client,
    base_url: String,
    api_key: String,
    model: String,
    max_tokens: u32,
    temperature: f32,
    retry: RetryPolicy,
}

impl GenerationClient {
    /// Build a client from config, resolving the API key from the
    /// configured environment variable.
    pub fn new(config: &AiConfig, retry: RetryPolicy) -> Result<Self> {
        let api_key = blogsmith_shared::resolve_api_key(&config.api_key_env)?;
        Self::with_api_key(config, retry, api_key)
    }

    /// Build a client with an explicit API key.
    pub fn with_api_key(
        config: &AiConfig,
        retry: RetryPolicy,
        api_key: impl Into<String>,
    ) -> Result<Self> {
        let http = reqwest::Client::builder()
            .user_agent(USER_AGENT)
            .timeout(Duration::from_secs(120))
            .build()
            .map_err(|e| {
                BlogsmithError::Provider(format!("failed to build HTTP client: {e}"))
            })?;

        Ok(Self {
            http,
            base_url: DEFAULT_BASE_URL.to_string(),
            api_key: api_key.into(),
            model: config.model.clone(),
            max_tokens: config.max_tokens,
            temperature: config.temperature,
            retry,
        })
    }

    /// Point the client at a different endpoint (mock servers in tests).
    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into();
        self
    }

    /// The model identifier this client sends.
    pub fn model(&self) -> &str {
        &self.model
    }

    /// Run one generation call, retrying transient failures.
    pub async fn generate(&self, request: GenerationRequest<'_>) -> Result<String> {
        retry_with_backoff(&self.retry, "generate", || self.generate_once(&request)).await
    }

    /// A single attempt against the messages endpoint.
    async fn generate_once(&self, request: &GenerationRequest<'_>) -> Result<String> {
        let body = MessagesRequest {
            model: &self.model,
            max_tokens: request.max_tokens.unwrap_or(self.max_tokens),
            temperature: request.temperature.unwrap_or(self.temperature),
            system: request.system,
            messages: [MessageBody {
                role: "user",
                content: request.user,
            }],
        };

        let url = format!("{}/v1/messages", self.base_url);
        let response = self
            .http
            .post(&url)
            .header("x-api-key", &self.api_key)
            .header("anthropic-version", API_VERSION)
            .json(&body)
            .send()
            .await
            .map_err(classify_transport_error)?;

        let status = response.status();
        if !status.is_success() {
            let detail = response.text().await.unwrap_or_default();
            return Err(classify_status(status, &detail));
        }

        let parsed: MessagesResponse = response.json().await.map_err(|e| {
            BlogsmithError::Provider(format!("invalid messages response: {e}"))
        })?;

        if let Some(usage) = &parsed.usage {
            debug!(
                tokens_in = usage.input_tokens,
                tokens_out = usage.output_tokens,
                model = %self.model,
                "generation call complete"
            );
        }

        let text = parsed
            .content
            .first()
            .map(|block| block.text.trim().to_string())
            .unwrap_or_default();

        if text.is_empty() {
            warn!(model = %self.model, "empty response from generation API");
            return Err(BlogsmithError::Transient(
                "empty response from generation API".into(),
            ));
        }

        Ok(text)
    }
}

/// Truncate content to approximately `max_chars` characters for inclusion
/// in a prompt, respecting UTF-8 boundaries.
pub fn truncate_content(content: &str, max_chars: usize) -> String {
    if content.len() <= max_chars {
        return content.to_string();
    }
    let mut end = max_chars;
    while !content.is_char_boundary(end) {
        end -= 1;
    }
    format!(
        "{}\n\n[... content truncated for context window ...]",
        &content[..end]
    )
}

/// Map an HTTP status to the error taxonomy: rate limits, timeouts, and
/// server-side failures are transient; everything else is terminal.
fn classify_status(status: reqwest::StatusCode, detail: &str) -> BlogsmithError {
    let brief: String = detail.chars().take(200).collect();
    let message = format!("HTTP {status}: {brief}");
    if status.as_u16() == 429 || status.as_u16() == 408 || status.is_server_error() {
        BlogsmithError::Transient(message)
    } else {
        BlogsmithError::Provider(message)
    }
}

/// Transport-level failures (connect, timeout) are transient.
fn classify_transport_error(err: reqwest::Error) -> BlogsmithError {
    if err.is_timeout() || err.is_connect() || err.is_request() {
        BlogsmithError::Transient(err.to_string())
    } else {
        BlogsmithError::Provider(err.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use wiremock::matchers::{header, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn test_client(base_url: &str) -> GenerationClient {
        let config = AiConfig::default();
        let retry = RetryPolicy {
            max_attempts: 3,
            base_delay: Duration::from_millis(1),
            max_delay: Duration::from_millis(4),
        };
        GenerationClient::with_api_key(&config, retry, "test-key")
            .unwrap()
            .with_base_url(base_url)
    }

    fn ok_body(text: &str) -> serde_json::Value {
        serde_json::json!({
            "content": [{"type": "text", "text": text}],
            "usage": {"input_tokens": 120, "output_tokens": 45}
        })
    }

    #[tokio::test]
    async fn generate_returns_first_text_block() {
        let server = MockServer::start().await;

        Mock::given(method("POST"))
            .and(path("/v1/messages"))
            .and(header("x-api-key", "test-key"))
            .and(header("anthropic-version", API_VERSION))
            .respond_with(ResponseTemplate::new(200).set_body_json(ok_body("  hello  ")))
            .mount(&server)
            .await;

        let client = test_client(&server.uri());
        let text = client
            .generate(GenerationRequest::new("system", "user"))
            .await
            .unwrap();

        assert_eq!(text, "hello");
    }

    #[tokio::test]
    async fn rate_limit_is_retried_until_success() {
        let server = MockServer::start().await;

        Mock::given(method("POST"))
            .and(path("/v1/messages"))
            .respond_with(ResponseTemplate::new(429).set_body_string("rate limited"))
            .up_to_n_times(2)
            .mount(&server)
            .await;

        Mock::given(method("POST"))
            .and(path("/v1/messages"))
            .respond_with(ResponseTemplate::new(200).set_body_json(ok_body("recovered")))
            .mount(&server)
            .await;

        let client = test_client(&server.uri());
        let text = client
            .generate(GenerationRequest::new("system", "user"))
            .await
            .unwrap();

        assert_eq!(text, "recovered");
        assert_eq!(server.received_requests().await.unwrap().len(), 3);
    }

    #[tokio::test]
    async fn client_error_is_terminal() {
        let server = MockServer::start().await;

        Mock::given(method("POST"))
            .and(path("/v1/messages"))
            .respond_with(ResponseTemplate::new(401).set_body_string("bad key"))
            .mount(&server)
            .await;

        let client = test_client(&server.uri());
        let err = client
            .generate(GenerationRequest::new("system", "user"))
            .await
            .unwrap_err();

        assert!(matches!(err, BlogsmithError::Provider(_)));
        // No retries on terminal errors
        assert_eq!(server.received_requests().await.unwrap().len(), 1);
    }

    #[test]
    fn truncate_short_content_is_untouched() {
        assert_eq!(truncate_content("short", 100), "short");
    }

    #[test]
    fn truncate_long_content_marks_the_cut() {
        let content = "a".repeat(200);
        let result = truncate_content(&content, 100);
        assert!(result.starts_with(&"a".repeat(100)));
        assert!(result.contains("truncated"));
    }

    #[test]
    fn truncate_respects_utf8_boundaries() {
        let content = "é".repeat(100); // 2 bytes per char
        let result = truncate_content(&content, 101);
        assert!(result.contains("truncated"));
        assert_eq!(result.chars().filter(|&c| c == 'é').count(), 50);
    }

    #[tokio::test]
    async fn empty_content_is_transient() {
        let server = MockServer::start().await;

        Mock::given(method("POST"))
            .and(path("/v1/messages"))
            .respond_with(
                ResponseTemplate::new(200)
                    .set_body_json(serde_json::json!({"content": []})),
            )
            .mount(&server)
            .await;

        let client = test_client(&server.uri());
        let err = client
            .generate(GenerationRequest::new("system", "user"))
            .await
            .unwrap_err();

        assert!(err.is_transient());
        // Retried up to the attempt cap
        assert_eq!(server.received_requests().await.unwrap().len(), 3);
    }
}
