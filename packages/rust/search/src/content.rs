//! Article fetching and plain-text extraction.
//!
//! Search results point at arbitrary URLs, so every fetch goes through an
//! SSRF guard before the request is made.

use std::net::IpAddr;
use std::time::Duration;

use scraper::{ElementRef, Html, Selector};
use url::Url;

use blogsmith_shared::{BlogsmithError, Result};

/// Timeout for a single article fetch.
const FETCH_TIMEOUT: Duration = Duration::from_secs(10);

const USER_AGENT: &str = concat!("blogsmith/", env!("CARGO_PKG_VERSION"));

/// Elements whose text never belongs in an article body.
const CHROME_TAGS: &[&str] = &[
    "script", "style", "nav", "footer", "header", "aside", "noscript", "iframe", "svg",
];

/// Known content containers, in priority order.
const CONTENT_SELECTORS: &[&str] = &[
    "article",
    "main",
    "[role=\"main\"]",
    ".post-content",
    ".entry-content",
    ".content",
];

/// Build the HTTP client used for article fetches.
pub fn build_fetch_client() -> Result<reqwest::Client> {
    reqwest::Client::builder()
        .user_agent(USER_AGENT)
        .redirect(reqwest::redirect::Policy::limited(5))
        .timeout(FETCH_TIMEOUT)
        .build()
        .map_err(|e| BlogsmithError::Transient(format!("failed to build HTTP client: {e}")))
}

/// Fetch a page and return its visible text, newline-joined.
///
/// `allow_localhost` disables the SSRF guard for integration tests
/// against mock servers.
pub async fn fetch_article_text(
    client: &reqwest::Client,
    url: &str,
    allow_localhost: bool,
) -> Result<String> {
    let parsed = Url::parse(url)
        .map_err(|e| BlogsmithError::validation(format!("invalid URL '{url}': {e}")))?;

    if !allow_localhost && is_ssrf_target(&parsed) {
        return Err(BlogsmithError::validation(format!(
            "refusing to fetch private/internal URL: {url}"
        )));
    }

    let response = client
        .get(parsed.as_str())
        .send()
        .await
        .map_err(|e| BlogsmithError::Transient(format!("{url}: {e}")))?;

    let status = response.status();
    if !status.is_success() {
        let message = format!("{url}: HTTP {status}");
        return if status.as_u16() == 429 || status.is_server_error() {
            Err(BlogsmithError::Transient(message))
        } else {
            Err(BlogsmithError::Provider(message))
        };
    }

    let html = response
        .text()
        .await
        .map_err(|e| BlogsmithError::Transient(format!("{url}: body read failed: {e}")))?;

    Ok(extract_text(&html))
}

/// Extract the visible article text, one line per text node.
///
/// Prefers a known content container; otherwise walks `<body>` while
/// skipping chrome elements.
pub fn extract_text(html: &str) -> String {
    let doc = Html::parse_document(html);

    for sel_str in CONTENT_SELECTORS {
        if let Ok(selector) = Selector::parse(sel_str) {
            if let Some(el) = doc.select(&selector).next() {
                return collect_text(el);
            }
        }
    }

    let body_sel = Selector::parse("body").expect("static selector");
    match doc.select(&body_sel).next() {
        Some(body) => collect_text(body),
        None => collect_text(doc.root_element()),
    }
}

/// Walk an element's subtree, collecting trimmed text and skipping chrome.
fn collect_text(el: ElementRef<'_>) -> String {
    let mut lines = Vec::new();
    walk(el, &mut lines);
    lines.join("\n")
}

fn walk(el: ElementRef<'_>, lines: &mut Vec<String>) {
    for child in el.children() {
        if let Some(text) = child.value().as_text() {
            let trimmed = text.trim();
            if !trimmed.is_empty() {
                lines.push(trimmed.to_string());
            }
        } else if let Some(child_el) = ElementRef::wrap(child) {
            if CHROME_TAGS.contains(&child_el.value().name()) {
                continue;
            }
            walk(child_el, lines);
        }
    }
}

// ---------------------------------------------------------------------------
// SSRF protection
// ---------------------------------------------------------------------------

/// Check if a URL targets a potentially dangerous resource.
pub fn is_ssrf_target(url: &Url) -> bool {
    // Block non-HTTP schemes
    match url.scheme() {
        "http" | "https" => {}
        _ => return true,
    }

    // Block private/loopback IPs
    if let Some(host) = url.host_str() {
        if let Ok(ip) = host.parse::<IpAddr>() {
            return is_private_ip(&ip);
        }
        // Block known local hostnames
        if host == "localhost"
            || host == "127.0.0.1"
            || host == "[::1]"
            || host.ends_with(".local")
            || host.ends_with(".internal")
        {
            return true;
        }
    }

    false
}

/// Check if an IP is in a private/reserved range.
fn is_private_ip(ip: &IpAddr) -> bool {
    match ip {
        IpAddr::V4(v4) => {
            v4.is_loopback()
                || v4.is_private()
                || v4.is_link_local()
                || v4.is_broadcast()
                || v4.is_unspecified()
                // 100.64.0.0/10 (Carrier-grade NAT)
                || (v4.octets()[0] == 100 && (v4.octets()[1] & 0xC0) == 64)
        }
        IpAddr::V6(v6) => v6.is_loopback() || v6.is_unspecified(),
    }
}
