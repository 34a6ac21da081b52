//! Crawl-digest pipeline: crawl → filter → summarize → upload.
//!
//! The crawler half of the workspace. Pages from a pattern source are
//! summarized with one generative call each, written as digest artifacts,
//! and optionally uploaded to the notes service. Per-page failures are
//! logged and skipped; the run itself only fails if nothing was crawled.

use std::path::PathBuf;

use serde::{Deserialize, Serialize};
use tracing::{info, instrument, warn};

use blogsmith_ai::{GenerationClient, GenerationRequest, extract_json_as, truncate_content};
use blogsmith_artifacts::{ArtifactStore, slug};
use blogsmith_crawler::{CrawlSource, CrawledPage, NotePage, NotesClient, PatternCrawler};
use blogsmith_shared::Result;

use crate::pipeline::ProgressReporter;

const SUMMARY_SYSTEM_PROMPT: &str = "\
You are a technical editor producing a reading digest. Summarize the
provided article for a technical audience.

IMPORTANT: Respond with ONLY valid JSON, no additional text.

Format:
{
  \"summary\": \"3-5 sentence summary\",
  \"key_points\": [\"point 1\", \"point 2\", \"point 3\"]
}";

/// Longest article prefix included in the summary prompt.
const SUMMARY_INPUT_CHARS: usize = 12_000;

/// One summarized page, written as a digest artifact.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PageDigest {
    pub url: String,
    pub title: String,
    pub summary: String,
    #[serde(default)]
    pub key_points: Vec<String>,
    #[serde(default)]
    pub tags: Vec<String>,
    pub fetched_at: chrono::DateTime<chrono::Utc>,
}

#[derive(Debug, Deserialize)]
struct SummaryWire {
    #[serde(default)]
    summary: String,
    #[serde(default)]
    key_points: Vec<String>,
}

/// Result of a digest run.
#[derive(Debug)]
pub struct DigestResult {
    /// Pages fetched and kept by the filter.
    pub pages_crawled: usize,
    /// Digest artifacts written.
    pub digests_written: usize,
    /// Pages uploaded to the notes service.
    pub pages_uploaded: usize,
    /// Directory the digest artifacts were written into.
    pub artifact_dir: PathBuf,
}

/// Run the digest pipeline over one crawl source.
///
/// `notes` is the optional upload target: `Some((client, database_id))`
/// uploads every digest, `None` stops after the artifacts.
#[instrument(skip_all, fields(base_url = %source.base_url))]
pub async fn run_digest(
    source: &CrawlSource,
    crawler: &PatternCrawler,
    ai: &GenerationClient,
    notes: Option<(&NotesClient, &str)>,
    output_root: &std::path::Path,
    progress: &dyn ProgressReporter,
) -> Result<DigestResult> {
    progress.phase("Crawling pages");
    let pages = crawler.crawl(source).await?;
    info!(pages = pages.len(), "crawl complete");

    let artifacts = ArtifactStore::at(output_root.join("digests"))?;

    let mut digests_written = 0usize;
    let mut pages_uploaded = 0usize;

    for (idx, page) in pages.iter().enumerate() {
        progress.phase(&format!(
            "Summarizing [{}/{}] {}",
            idx + 1,
            pages.len(),
            page.title
        ));

        let digest = match summarize_page(ai, page).await {
            Ok(digest) => digest,
            Err(e) => {
                warn!(url = %page.url, error = %e, "summarization failed, skipping");
                continue;
            }
        };

        let name = format!("digest-{}.json", slug(&digest.title));
        if let Err(e) = artifacts.write_json(&name, &digest) {
            warn!(url = %digest.url, error = %e, "digest write failed, skipping");
            continue;
        }
        digests_written += 1;

        if let Some((client, database_id)) = notes {
            progress.phase(&format!("Uploading: {}", digest.title));
            let note = NotePage {
                title: digest.title.clone(),
                body: digest_body(&digest),
                source_url: Some(digest.url.clone()),
                tags: digest.tags.clone(),
            };
            match client.create_page(&note, database_id).await {
                Ok(page_id) => {
                    info!(page_id = %page_id, title = %digest.title, "uploaded");
                    pages_uploaded += 1;
                }
                Err(e) => {
                    warn!(title = %digest.title, error = %e, "upload failed, skipping");
                }
            }
        }
    }

    let result = DigestResult {
        pages_crawled: pages.len(),
        digests_written,
        pages_uploaded,
        artifact_dir: artifacts.base_dir().to_path_buf(),
    };

    info!(
        crawled = result.pages_crawled,
        written = result.digests_written,
        uploaded = result.pages_uploaded,
        "digest run complete"
    );
    Ok(result)
}

/// One generative call per page: summary plus key points.
async fn summarize_page(ai: &GenerationClient, page: &CrawledPage) -> Result<PageDigest> {
    let user = format!(
        "Title: {}\nURL: {}\n\nArticle:\n{}\n\nSummarize. Respond with ONLY valid JSON.",
        page.title,
        page.url,
        truncate_content(&page.text, SUMMARY_INPUT_CHARS)
    );

    let response = ai
        .generate(GenerationRequest::new(SUMMARY_SYSTEM_PROMPT, &user).temperature(0.3))
        .await?;
    let wire: SummaryWire = extract_json_as(&response)?;

    Ok(PageDigest {
        url: page.url.clone(),
        title: page.title.clone(),
        summary: wire.summary,
        key_points: wire.key_points,
        tags: page.tags.clone(),
        fetched_at: page.fetched_at,
    })
}

/// Plain-text body for the uploaded note.
fn digest_body(digest: &PageDigest) -> String {
    let mut body = digest.summary.trim().to_string();
    if !digest.key_points.is_empty() {
        body.push_str("\n\nKey points:\n");
        for point in &digest.key_points {
            body.push_str(&format!("- {point}\n"));
        }
    }
    body
}
