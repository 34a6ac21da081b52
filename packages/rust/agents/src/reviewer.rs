//! Reviewer agent: surface corrections and a reliability check against
//! the source articles.

use async_trait::async_trait;
use serde::Deserialize;
use tracing::{info, instrument, warn};

use blogsmith_ai::{GenerationClient, GenerationRequest, extract_json_as, truncate_content};
use blogsmith_shared::{
    Article, BlogsmithError, Result, ReviewReport, StepUpdate, WorkflowState, WorkflowStep,
};

use crate::StepAgent;

const PROOFREAD_SYSTEM_PROMPT: &str = "\
You are a professional proofreader and editor.

Review the provided blog content and:
1. Fix typos and spelling errors
2. Remove duplicated words or phrases
3. Correct grammar issues
4. Ensure proper punctuation
5. Maintain the original meaning and structure

IMPORTANT: Respond with ONLY valid JSON, no additional text.

Format:
{
  \"corrected_content\": \"the corrected full content here\",
  \"corrections\": [\"correction 1\", \"correction 2\"]
}";

const RELIABILITY_SYSTEM_PROMPT: &str = "\
You are a fact-checking editor. Compare the blog content against the source
articles and flag claims the sources do not support.

IMPORTANT: Respond with ONLY valid JSON, no additional text.

Format:
{
  \"reliability_score\": 0.0,
  \"unsupported_claims\": [\"claim 1\"]
}";

/// Longest source excerpt included per article in the reliability prompt.
const SOURCE_EXCERPT_CHARS: usize = 1500;

#[derive(Debug, Deserialize)]
struct ProofreadWire {
    #[serde(default)]
    corrected_content: String,
    #[serde(default)]
    corrections: Vec<String>,
}

#[derive(Debug, Deserialize)]
struct ReliabilityWire {
    #[serde(default)]
    reliability_score: f32,
    #[serde(default)]
    unsupported_claims: Vec<String>,
}

/// Agent for reviewing the draft for quality and accuracy.
pub struct Reviewer {
    ai: GenerationClient,
}

impl Reviewer {
    pub fn new(ai: GenerationClient) -> Self {
        Self { ai }
    }

    /// Grammar/typo pass. A parse failure keeps the draft unchanged.
    async fn proofread(&self, content: &str) -> (String, Vec<String>) {
        let user = format!(
            "Review this blog content for typos, duplications, and grammar issues:\n\n\
             {content}\n\n\
             Provide the corrected content and list of corrections made."
        );

        let response = self
            .ai
            .generate(GenerationRequest::new(PROOFREAD_SYSTEM_PROMPT, &user).temperature(0.3))
            .await;

        match response.and_then(|text| extract_json_as::<ProofreadWire>(&text)) {
            Ok(wire) if !wire.corrected_content.trim().is_empty() => {
                (wire.corrected_content, wire.corrections)
            }
            Ok(_) => {
                warn!("proofread returned empty content, keeping draft");
                (content.to_string(), Vec::new())
            }
            Err(e) => {
                warn!(error = %e, "proofread pass failed, keeping draft");
                (content.to_string(), Vec::new())
            }
        }
    }

    /// Reliability pass against the source articles. Failure degrades to a
    /// neutral score rather than failing the step.
    async fn check_reliability(
        &self,
        content: &str,
        sources: &[Article],
    ) -> (f32, Vec<String>) {
        let excerpts: Vec<serde_json::Value> = sources
            .iter()
            .map(|article| {
                serde_json::json!({
                    "title": article.title,
                    "url": article.url,
                    "excerpt": truncate_content(&article.extracted_text, SOURCE_EXCERPT_CHARS),
                })
            })
            .collect();

        let user = format!(
            "Sources:\n{}\n\nBlog content:\n{content}\n\n\
             Score how well the sources support the content (0.0-1.0) and list \
             unsupported claims.",
            serde_json::to_string_pretty(&excerpts).unwrap_or_default()
        );

        let response = self
            .ai
            .generate(
                GenerationRequest::new(RELIABILITY_SYSTEM_PROMPT, &user).temperature(0.3),
            )
            .await;

        match response.and_then(|text| extract_json_as::<ReliabilityWire>(&text)) {
            Ok(wire) => (
                wire.reliability_score.clamp(0.0, 1.0),
                wire.unsupported_claims,
            ),
            Err(e) => {
                warn!(error = %e, "reliability check failed, scoring neutral");
                (0.5, Vec::new())
            }
        }
    }
}

#[async_trait]
impl StepAgent for Reviewer {
    fn step(&self) -> WorkflowStep {
        WorkflowStep::Review
    }

    #[instrument(skip_all, fields(keywords = %state.keywords))]
    async fn execute(&self, state: &WorkflowState) -> Result<StepUpdate> {
        let draft = state
            .draft
            .as_deref()
            .filter(|d| !d.trim().is_empty())
            .ok_or_else(|| BlogsmithError::validation("no draft available for review"))?;

        let (corrected, corrections) = self.proofread(draft).await;
        info!(corrections = corrections.len(), "proofread pass complete");

        let sources = state.search_results.as_deref().unwrap_or_default();
        let (reliability_score, reliability_notes) =
            self.check_reliability(&corrected, sources).await;
        info!(
            score = reliability_score,
            flagged = reliability_notes.len(),
            "reliability check complete"
        );

        Ok(StepUpdate::Review {
            text: corrected,
            report: ReviewReport {
                corrections,
                reliability_score,
                reliability_notes,
            },
        })
    }
}
