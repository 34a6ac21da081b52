//! Searcher agent: query fan-out, article extraction, and ranking.

use std::collections::HashSet;
use std::sync::Arc;

use async_trait::async_trait;
use tokio::sync::Semaphore;
use tracing::{debug, info, instrument, warn};

use blogsmith_ai::{GenerationClient, GenerationRequest, extract_json_as, truncate_content};
use blogsmith_search::{SearchHit, SearchProvider, content};
use blogsmith_shared::{
    AgentsConfig, Article, BlogsmithError, Result, StepUpdate, WorkflowState, WorkflowStep,
};

use crate::StepAgent;

const RANKING_SYSTEM_PROMPT: &str = "\
You are a content curator. Rank the provided articles by their relevance \
to the given keywords.

Consider:
1. Topical relevance to keywords
2. Content quality and depth
3. Recency and credibility

Respond with ONLY a JSON array of indices in order of relevance \
(most relevant first). Example: [2, 0, 4, 1, 3]";

/// Longest content prefix included per article in the ranking prompt.
const RANKING_PREVIEW_CHARS: usize = 1000;

/// Agent for searching and ranking relevant articles.
pub struct Searcher {
    provider: Arc<dyn SearchProvider>,
    ai: GenerationClient,
    http: reqwest::Client,
    max_articles: usize,
    min_content_length: usize,
    fetch_concurrency: usize,
    allow_localhost: bool,
}

impl Searcher {
    pub fn new(
        provider: Arc<dyn SearchProvider>,
        ai: GenerationClient,
        config: &AgentsConfig,
    ) -> Result<Self> {
        Ok(Self {
            provider,
            ai,
            http: content::build_fetch_client()?,
            max_articles: config.max_articles,
            min_content_length: config.min_content_length,
            fetch_concurrency: config.fetch_concurrency.max(1),
            allow_localhost: false,
        })
    }

    /// Allow fetching localhost URLs (integration tests with mock servers).
    pub fn allow_localhost(mut self) -> Self {
        self.allow_localhost = true;
        self
    }

    /// Fan the keyword phrases out as concurrent queries and merge the hits,
    /// deduplicating by URL while keeping provider order per query.
    async fn run_queries(&self, keywords: &str) -> Result<Vec<SearchHit>> {
        let queries: Vec<String> = keywords
            .split(',')
            .map(str::trim)
            .filter(|q| !q.is_empty())
            .map(String::from)
            .collect();

        if queries.is_empty() {
            return Err(BlogsmithError::validation("keywords are required"));
        }

        let mut handles = Vec::with_capacity(queries.len());
        for query in queries {
            let provider = self.provider.clone();
            let limit = self.max_articles * 3;
            handles.push(tokio::spawn(async move {
                let hits = provider.search(&query, limit).await;
                (query, hits)
            }));
        }

        let mut merged: Vec<SearchHit> = Vec::new();
        let mut seen: HashSet<String> = HashSet::new();
        let mut first_error: Option<BlogsmithError> = None;

        for handle in handles {
            let (query, hits) = handle.await.map_err(|e| {
                BlogsmithError::Provider(format!("search task panicked: {e}"))
            })?;
            match hits {
                Ok(hits) => {
                    debug!(query, hits = hits.len(), "query complete");
                    for hit in hits {
                        if seen.insert(hit.url.clone()) {
                            merged.push(hit);
                        }
                    }
                }
                Err(e) => {
                    warn!(query, error = %e, "query failed");
                    first_error.get_or_insert(e);
                }
            }
        }

        // All queries failing is a step failure; partial results are fine.
        if merged.is_empty() {
            if let Some(err) = first_error {
                return Err(err);
            }
        }

        Ok(merged)
    }

    /// Fetch every hit concurrently and keep those with enough text.
    async fn extract_articles(&self, hits: &[SearchHit]) -> Vec<(SearchHit, String)> {
        let semaphore = Arc::new(Semaphore::new(self.fetch_concurrency));
        let mut handles = Vec::with_capacity(hits.len());

        for hit in hits.iter().cloned() {
            let client = self.http.clone();
            let sem = semaphore.clone();
            let allow_localhost = self.allow_localhost;
            let min_len = self.min_content_length;

            handles.push(tokio::spawn(async move {
                let _permit = sem.acquire().await.expect("semaphore closed");
                match content::fetch_article_text(&client, &hit.url, allow_localhost).await {
                    Ok(text) if text.len() >= min_len => Some((hit, text)),
                    Ok(_) => {
                        debug!(url = %hit.url, "content too short, skipping");
                        None
                    }
                    Err(e) => {
                        warn!(url = %hit.url, error = %e, "extraction failed, skipping");
                        None
                    }
                }
            }));
        }

        let mut articles = Vec::new();
        for handle in handles {
            if let Ok(Some(article)) = handle.await {
                articles.push(article);
            }
        }
        articles
    }

    /// Ask the model for a relevance order; fall back to provider order.
    async fn rank(&self, keywords: &str, articles: &[(SearchHit, String)]) -> Vec<usize> {
        let summaries: Vec<serde_json::Value> = articles
            .iter()
            .enumerate()
            .map(|(idx, (hit, text))| {
                serde_json::json!({
                    "index": idx,
                    "title": hit.title,
                    "url": hit.url,
                    "snippet": hit.snippet,
                    "content_preview": truncate_content(text, RANKING_PREVIEW_CHARS),
                })
            })
            .collect();

        let user = format!(
            "Keywords: {keywords}\n\nArticles:\n{}\n\nRank these articles by relevance. \
             Respond with only the JSON array of indices.",
            serde_json::to_string_pretty(&summaries).unwrap_or_default()
        );

        let response = self
            .ai
            .generate(GenerationRequest::new(RANKING_SYSTEM_PROMPT, &user).temperature(0.3))
            .await;

        match response.and_then(|text| extract_json_as::<Vec<usize>>(&text)) {
            Ok(order) => {
                // Keep valid, unique indices; append anything the model dropped.
                let mut seen = HashSet::new();
                let mut ranked: Vec<usize> = order
                    .into_iter()
                    .filter(|&idx| idx < articles.len() && seen.insert(idx))
                    .collect();
                for idx in 0..articles.len() {
                    if seen.insert(idx) {
                        ranked.push(idx);
                    }
                }
                ranked
            }
            Err(e) => {
                warn!(error = %e, "ranking failed, keeping provider order");
                (0..articles.len()).collect()
            }
        }
    }
}

#[async_trait]
impl StepAgent for Searcher {
    fn step(&self) -> WorkflowStep {
        WorkflowStep::Search
    }

    #[instrument(skip_all, fields(keywords = %state.keywords))]
    async fn execute(&self, state: &WorkflowState) -> Result<StepUpdate> {
        let hits = self.run_queries(&state.keywords).await?;
        info!(hits = hits.len(), "search queries complete");

        if hits.is_empty() {
            return Err(BlogsmithError::validation("no search results found"));
        }

        let extracted = self.extract_articles(&hits).await;
        info!(articles = extracted.len(), "content extraction complete");

        if extracted.is_empty() {
            return Err(BlogsmithError::validation(
                "no articles with extractable content",
            ));
        }

        let order = self.rank(&state.keywords, &extracted).await;

        // Rank position becomes a descending score so the sort-and-truncate
        // below is deterministic.
        let total = order.len() as f32;
        let mut articles: Vec<Article> = order
            .iter()
            .enumerate()
            .map(|(rank, &idx)| {
                let (hit, text) = &extracted[idx];
                Article {
                    url: hit.url.clone(),
                    title: hit.title.clone(),
                    extracted_text: text.clone(),
                    relevance_score: (total - rank as f32) / total,
                }
            })
            .collect();

        articles.sort_by(|a, b| {
            b.relevance_score
                .total_cmp(&a.relevance_score)
                .then_with(|| a.url.cmp(&b.url))
        });
        articles.truncate(self.max_articles);

        info!(selected = articles.len(), "articles ranked and selected");
        Ok(StepUpdate::Search(articles))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use blogsmith_shared::RetryPolicy;
    use wiremock::matchers::{method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    /// Provider returning canned hits, counting invocations.
    struct FixedProvider {
        hits: Vec<SearchHit>,
        calls: std::sync::atomic::AtomicUsize,
    }

    #[async_trait]
    impl SearchProvider for FixedProvider {
        async fn search(&self, _query: &str, _n: usize) -> Result<Vec<SearchHit>> {
            self.calls
                .fetch_add(1, std::sync::atomic::Ordering::SeqCst);
            Ok(self.hits.clone())
        }

        fn name(&self) -> &'static str {
            "fixed"
        }
    }

    fn hit(url: &str, title: &str) -> SearchHit {
        SearchHit {
            title: title.into(),
            url: url.into(),
            snippet: format!("{title} snippet"),
            position: 1,
            source: "fixed".into(),
        }
    }

    fn ai_client(base_url: &str) -> GenerationClient {
        let retry = RetryPolicy {
            max_attempts: 1,
            base_delay: std::time::Duration::from_millis(1),
            max_delay: std::time::Duration::from_millis(1),
        };
        GenerationClient::with_api_key(&Default::default(), retry, "k")
            .unwrap()
            .with_base_url(base_url)
    }

    fn test_config() -> AgentsConfig {
        AgentsConfig {
            max_articles: 2,
            min_content_length: 10,
            fetch_concurrency: 4,
            ..Default::default()
        }
    }

    async fn mount_article(server: &MockServer, route: &str, heading: &str) {
        let body = format!(
            "<html><body><article><h1>{heading}</h1>\
             <p>Long enough body text for extraction to keep.</p></article></body></html>"
        );
        Mock::given(method("GET"))
            .and(path(route))
            .respond_with(ResponseTemplate::new(200).set_body_string(body))
            .mount(server)
            .await;
    }

    fn ai_response(text: &str) -> serde_json::Value {
        serde_json::json!({"content": [{"type": "text", "text": text}]})
    }

    #[tokio::test]
    async fn ranks_sorts_and_truncates() {
        let server = MockServer::start().await;
        mount_article(&server, "/a", "Alpha").await;
        mount_article(&server, "/b", "Beta").await;
        mount_article(&server, "/c", "Gamma").await;

        // Model ranks the third article first
        Mock::given(method("POST"))
            .and(path("/v1/messages"))
            .respond_with(ResponseTemplate::new(200).set_body_json(ai_response("[2, 0, 1]")))
            .mount(&server)
            .await;

        let provider = Arc::new(FixedProvider {
            hits: vec![
                hit(&format!("{}/a", server.uri()), "Alpha"),
                hit(&format!("{}/b", server.uri()), "Beta"),
                hit(&format!("{}/c", server.uri()), "Gamma"),
            ],
            calls: Default::default(),
        });

        let searcher = Searcher::new(provider, ai_client(&server.uri()), &test_config())
            .unwrap()
            .allow_localhost();

        let state = WorkflowState::new("rust testing");
        let update = searcher.execute(&state).await.unwrap();

        let StepUpdate::Search(articles) = update else {
            panic!("expected search update");
        };
        assert_eq!(articles.len(), 2);
        assert_eq!(articles[0].title, "Gamma");
        assert_eq!(articles[1].title, "Alpha");
        assert!(articles[0].relevance_score > articles[1].relevance_score);
    }

    #[tokio::test]
    async fn one_query_per_comma_separated_phrase() {
        let server = MockServer::start().await;
        mount_article(&server, "/a", "Alpha").await;

        Mock::given(method("POST"))
            .and(path("/v1/messages"))
            .respond_with(ResponseTemplate::new(200).set_body_json(ai_response("[0]")))
            .mount(&server)
            .await;

        let provider = Arc::new(FixedProvider {
            hits: vec![hit(&format!("{}/a", server.uri()), "Alpha")],
            calls: Default::default(),
        });

        let searcher = Searcher::new(
            provider.clone(),
            ai_client(&server.uri()),
            &test_config(),
        )
        .unwrap()
        .allow_localhost();

        let state = WorkflowState::new("rust testing, property testing, fuzzing");
        let update = searcher.execute(&state).await.unwrap();

        assert_eq!(
            provider.calls.load(std::sync::atomic::Ordering::SeqCst),
            3
        );
        // Duplicate URLs across queries collapse to one article
        let StepUpdate::Search(articles) = update else {
            panic!("expected search update");
        };
        assert_eq!(articles.len(), 1);
    }

    #[tokio::test]
    async fn unparseable_ranking_keeps_provider_order() {
        let server = MockServer::start().await;
        mount_article(&server, "/a", "Alpha").await;
        mount_article(&server, "/b", "Beta").await;

        Mock::given(method("POST"))
            .and(path("/v1/messages"))
            .respond_with(
                ResponseTemplate::new(200).set_body_json(ai_response("no json here")),
            )
            .mount(&server)
            .await;

        let provider = Arc::new(FixedProvider {
            hits: vec![
                hit(&format!("{}/a", server.uri()), "Alpha"),
                hit(&format!("{}/b", server.uri()), "Beta"),
            ],
            calls: Default::default(),
        });

        let searcher = Searcher::new(provider, ai_client(&server.uri()), &test_config())
            .unwrap()
            .allow_localhost();

        let state = WorkflowState::new("rust testing");
        let StepUpdate::Search(articles) = searcher.execute(&state).await.unwrap() else {
            panic!("expected search update");
        };
        assert_eq!(articles[0].title, "Alpha");
        assert_eq!(articles[1].title, "Beta");
    }

    #[tokio::test]
    async fn empty_keywords_is_validation_error() {
        let server = MockServer::start().await;
        let provider = Arc::new(FixedProvider {
            hits: vec![],
            calls: Default::default(),
        });
        let searcher =
            Searcher::new(provider, ai_client(&server.uri()), &test_config()).unwrap();

        let state = WorkflowState::new("   ");
        let err = searcher.execute(&state).await.unwrap_err();
        assert!(matches!(err, BlogsmithError::Validation { .. }));
    }

    #[tokio::test]
    async fn no_hits_is_validation_error() {
        let server = MockServer::start().await;
        let provider = Arc::new(FixedProvider {
            hits: vec![],
            calls: Default::default(),
        });
        let searcher =
            Searcher::new(provider, ai_client(&server.uri()), &test_config()).unwrap();

        let state = WorkflowState::new("rust testing");
        let err = searcher.execute(&state).await.unwrap_err();
        assert!(matches!(err, BlogsmithError::Validation { .. }));
    }
}
