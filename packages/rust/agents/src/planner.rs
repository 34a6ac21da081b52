//! Planner agent: derives a section outline from the selected articles.

use async_trait::async_trait;
use serde::Deserialize;
use tracing::{info, instrument, warn};

use blogsmith_ai::{GenerationClient, GenerationRequest, extract_json, extract_json_as, truncate_content};
use blogsmith_shared::{
    AgentsConfig, Article, BlogsmithError, Outline, OutlineSection, Result, StepUpdate,
    WorkflowState, WorkflowStep,
};

use crate::StepAgent;

const ANALYSIS_SYSTEM_PROMPT: &str = "\
You are a content analyst. Analyze the provided articles and identify:

1. Common themes across articles
2. Unique perspectives or approaches
3. Gaps or missing information
4. Key concepts and terminology

IMPORTANT: Respond with ONLY valid JSON, no additional text.

Format:
{
  \"common_themes\": [\"theme1\"],
  \"unique_perspectives\": [\"perspective1\"],
  \"gaps\": [\"gap1\"],
  \"key_concepts\": [\"concept1\"]
}";

/// Longest content prefix included per article in the analysis prompt.
const ANALYSIS_SAMPLE_CHARS: usize = 2000;

#[derive(Debug, Deserialize)]
struct OutlineWire {
    #[serde(default)]
    sections: Vec<SectionWire>,
}

#[derive(Debug, Deserialize)]
struct SectionWire {
    #[serde(default)]
    section_title: String,
    #[serde(default)]
    key_points: Vec<String>,
}

/// Agent for planning blog post structure and content.
pub struct Planner {
    ai: GenerationClient,
    min_sections: usize,
    max_sections: usize,
}

impl Planner {
    pub fn new(ai: GenerationClient, config: &AgentsConfig) -> Self {
        Self {
            ai,
            min_sections: config.min_sections,
            max_sections: config.max_sections,
        }
    }

    /// Identify themes and gaps across the articles. Analysis is advisory:
    /// failure degrades to an empty analysis rather than failing the step.
    async fn analyze_articles(&self, query: &str, articles: &[Article]) -> serde_json::Value {
        let samples: Vec<serde_json::Value> = articles
            .iter()
            .map(|article| {
                serde_json::json!({
                    "title": article.title,
                    "url": article.url,
                    "content_sample": truncate_content(&article.extracted_text, ANALYSIS_SAMPLE_CHARS),
                })
            })
            .collect();

        let user = format!(
            "Topic: {query}\n\nArticles:\n{}\n\nAnalyze these articles. \
             Respond with ONLY valid JSON.",
            serde_json::to_string_pretty(&samples).unwrap_or_default()
        );

        let response = self
            .ai
            .generate(GenerationRequest::new(ANALYSIS_SYSTEM_PROMPT, &user).temperature(0.5))
            .await;

        match response.and_then(|text| extract_json(&text)) {
            Ok(analysis) => analysis,
            Err(e) => {
                warn!(error = %e, "article analysis failed, planning without it");
                serde_json::json!({
                    "common_themes": [format!("General discussion of {query}")],
                    "key_concepts": [query],
                })
            }
        }
    }

    /// Generate the outline itself. Malformed output falls back to a fixed
    /// structure so the plan step still yields a valid 3–7 section outline.
    async fn generate_outline(
        &self,
        query: &str,
        analysis: &serde_json::Value,
    ) -> Outline {
        let system = format!(
            "You are a blog content strategist. Create a blog post outline.\n\n\
             Requirements:\n\
             - {} to {} main sections\n\
             - Each section lists 2-4 key points it must cover\n\
             - Logical flow from introduction to conclusion\n\n\
             IMPORTANT: Respond with ONLY valid JSON, no additional text.\n\n\
             Format:\n\
             {{\n  \"sections\": [\n    {{\n      \"section_title\": \"Section title\",\n      \
             \"key_points\": [\"point 1\", \"point 2\"]\n    }}\n  ]\n}}",
            self.min_sections, self.max_sections
        );

        let user = format!(
            "Topic: {query}\n\nAnalysis:\n{}\n\nCreate the outline. \
             Respond with ONLY valid JSON, no markdown code blocks.",
            serde_json::to_string_pretty(analysis).unwrap_or_default()
        );

        let response = self
            .ai
            .generate(GenerationRequest::new(&system, &user).temperature(0.7))
            .await;

        let wire = match response.and_then(|text| extract_json_as::<OutlineWire>(&text)) {
            Ok(wire) => wire,
            Err(e) => {
                warn!(error = %e, "outline generation failed, using fallback");
                return self.fallback_outline(query);
            }
        };

        let mut sections: Vec<OutlineSection> = wire
            .sections
            .into_iter()
            .filter(|s| !s.section_title.trim().is_empty())
            .map(|s| OutlineSection {
                section_title: s.section_title.trim().to_string(),
                key_points: s.key_points,
            })
            .collect();

        if sections.len() > self.max_sections {
            warn!(
                got = sections.len(),
                max = self.max_sections,
                "trimming oversized outline"
            );
            sections.truncate(self.max_sections);
        }

        if sections.len() < self.min_sections {
            warn!(
                got = sections.len(),
                min = self.min_sections,
                "outline too small, using fallback"
            );
            return self.fallback_outline(query);
        }

        Outline { sections }
    }

    /// Fixed outline used when generation fails. Four sections, inside the
    /// 3–7 policy bounds.
    fn fallback_outline(&self, query: &str) -> Outline {
        Outline {
            sections: vec![
                OutlineSection {
                    section_title: "Introduction".into(),
                    key_points: vec![
                        format!("What {query} is"),
                        "Why it matters".into(),
                    ],
                },
                OutlineSection {
                    section_title: "Key Concepts".into(),
                    key_points: vec![
                        "Basic principles".into(),
                        "Core components".into(),
                    ],
                },
                OutlineSection {
                    section_title: "Best Practices".into(),
                    key_points: vec![
                        "Common approaches".into(),
                        "Expert tips".into(),
                    ],
                },
                OutlineSection {
                    section_title: "Conclusion".into(),
                    key_points: vec!["Summary".into(), "Next steps".into()],
                },
            ],
        }
    }
}

#[async_trait]
impl StepAgent for Planner {
    fn step(&self) -> WorkflowStep {
        WorkflowStep::Plan
    }

    #[instrument(skip_all, fields(keywords = %state.keywords))]
    async fn execute(&self, state: &WorkflowState) -> Result<StepUpdate> {
        let articles = state
            .search_results
            .as_deref()
            .filter(|a| !a.is_empty())
            .ok_or_else(|| {
                BlogsmithError::validation("no articles available for planning")
            })?;

        let analysis = self.analyze_articles(&state.keywords, articles).await;
        let outline = self.generate_outline(&state.keywords, &analysis).await;

        info!(sections = outline.sections.len(), "outline generated");
        Ok(StepUpdate::Plan(outline))
    }
}
