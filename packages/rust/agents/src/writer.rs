//! Writer agent: drafts the post from the outline, section by section.

use async_trait::async_trait;
use tracing::{info, instrument};

use blogsmith_ai::{GenerationClient, GenerationRequest};
use blogsmith_shared::{
    AgentsConfig, Article, BlogsmithError, Outline, OutlineSection, Result, StepUpdate,
    WorkflowState, WorkflowStep,
};

use crate::{StepAgent, ToneProfile};

/// Agent for writing the draft with optional tone application.
pub struct Writer {
    ai: GenerationClient,
    section_word_target: usize,
    tone: Option<ToneProfile>,
}

impl Writer {
    pub fn new(
        ai: GenerationClient,
        config: &AgentsConfig,
        tone: Option<ToneProfile>,
    ) -> Self {
        Self {
            ai,
            section_word_target: config.section_word_target,
            tone,
        }
    }

    /// Append the tone profile to a system prompt when one is loaded.
    fn with_tone(&self, base: &str) -> String {
        match &self.tone {
            Some(tone) => format!(
                "{base}\n\nApply this tone profile:\n\
                 - Characteristics: {}\n\
                 - Vocabulary: {}\n\
                 - Style: {}",
                tone.characteristics, tone.vocabulary, tone.style
            ),
            None => base.to_string(),
        }
    }

    async fn write_introduction(&self, topic: &str, outline: &Outline) -> Result<String> {
        let system = self.with_tone(
            "You are a skilled blog writer. Write an engaging introduction for a blog post.\n\n\
             The introduction should:\n\
             1. Hook the reader with a compelling opening\n\
             2. Introduce the topic and its relevance\n\
             3. Preview what the post will cover\n\
             4. Be approximately 150-200 words\n\n\
             Respond with the introduction text only, no heading.",
        );

        let headings: Vec<String> = outline
            .sections
            .iter()
            .map(|s| format!("- {}", s.section_title))
            .collect();

        let user = format!(
            "Blog Topic: {topic}\n\nSections to Preview:\n{}\n\nWrite an engaging introduction.",
            headings.join("\n")
        );

        self.ai
            .generate(GenerationRequest::new(&system, &user).temperature(0.7))
            .await
    }

    async fn write_section(&self, topic: &str, section: &OutlineSection) -> Result<String> {
        let system = self.with_tone(&format!(
            "You are a skilled blog writer. Write one section of a blog post.\n\n\
             The section should:\n\
             1. Cover every listed key point\n\
             2. Be approximately {} words\n\
             3. Use concrete examples where they help\n\n\
             Respond with the section body only, no heading.",
            self.section_word_target
        ));

        let points: Vec<String> = section
            .key_points
            .iter()
            .map(|p| format!("- {p}"))
            .collect();

        let user = format!(
            "Blog Topic: {topic}\nSection: {}\n\nKey points to cover:\n{}\n\nWrite the section.",
            section.section_title,
            points.join("\n")
        );

        self.ai
            .generate(GenerationRequest::new(&system, &user).temperature(0.7))
            .await
    }

    async fn write_conclusion(&self, topic: &str, outline: &Outline) -> Result<String> {
        let system = self.with_tone(
            "You are a skilled blog writer. Write a conclusion for a blog post.\n\n\
             The conclusion should:\n\
             1. Summarize the key takeaways\n\
             2. End with a clear next step for the reader\n\
             3. Be approximately 100-150 words\n\n\
             Respond with the conclusion text only, no heading.",
        );

        let headings: Vec<String> = outline
            .sections
            .iter()
            .map(|s| format!("- {}", s.section_title))
            .collect();

        let user = format!(
            "Blog Topic: {topic}\n\nSections covered:\n{}\n\nWrite the conclusion.",
            headings.join("\n")
        );

        self.ai
            .generate(GenerationRequest::new(&system, &user).temperature(0.7))
            .await
    }

    /// Stitch the generated parts into one Markdown document.
    fn assemble(
        topic: &str,
        introduction: &str,
        outline: &Outline,
        section_bodies: &[String],
        conclusion: &str,
        sources: &[Article],
    ) -> String {
        let mut doc = String::new();
        doc.push_str(&format!("# {topic}\n\n"));
        doc.push_str(introduction.trim());
        doc.push_str("\n\n");

        for (section, body) in outline.sections.iter().zip(section_bodies) {
            doc.push_str(&format!("## {}\n\n", section.section_title));
            doc.push_str(body.trim());
            doc.push_str("\n\n");
        }

        doc.push_str("## Conclusion\n\n");
        doc.push_str(conclusion.trim());
        doc.push_str("\n");

        if !sources.is_empty() {
            doc.push_str("\n## Sources\n\n");
            for article in sources {
                doc.push_str(&format!("- [{}]({})\n", article.title, article.url));
            }
        }

        doc
    }
}

#[async_trait]
impl StepAgent for Writer {
    fn step(&self) -> WorkflowStep {
        WorkflowStep::Write
    }

    #[instrument(skip_all, fields(keywords = %state.keywords))]
    async fn execute(&self, state: &WorkflowState) -> Result<StepUpdate> {
        let outline = state
            .plan
            .as_ref()
            .filter(|o| !o.sections.is_empty())
            .ok_or_else(|| BlogsmithError::validation("no plan available for writing"))?;

        let topic = &state.keywords;
        let introduction = self.write_introduction(topic, outline).await?;

        let mut section_bodies = Vec::with_capacity(outline.sections.len());
        for (idx, section) in outline.sections.iter().enumerate() {
            info!(
                section = %section.section_title,
                n = idx + 1,
                total = outline.sections.len(),
                "writing section"
            );
            section_bodies.push(self.write_section(topic, section).await?);
        }

        let conclusion = self.write_conclusion(topic, outline).await?;

        let sources = state.search_results.as_deref().unwrap_or_default();
        let draft = Self::assemble(
            topic,
            &introduction,
            outline,
            &section_bodies,
            &conclusion,
            sources,
        );

        if draft.trim().is_empty() {
            return Err(BlogsmithError::validation("writer produced an empty draft"));
        }

        info!(
            words = draft.split_whitespace().count(),
            sections = outline.sections.len(),
            tone_applied = self.tone.is_some(),
            "draft complete"
        );
        Ok(StepUpdate::Draft(draft))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use blogsmith_shared::RetryPolicy;
    use wiremock::matchers::{body_string_contains, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

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

    fn ai_response(text: &str) -> serde_json::Value {
        serde_json::json!({"content": [{"type": "text", "text": text}]})
    }

    fn planned_state() -> WorkflowState {
        let mut state = WorkflowState::new("Rust error handling");
        state.search_results = Some(vec![Article {
            url: "https://example.com/errors".into(),
            title: "Errors in Rust".into(),
            extracted_text: "text".into(),
            relevance_score: 1.0,
        }]);
        state.plan = Some(Outline {
            sections: vec![
                OutlineSection {
                    section_title: "Result and Option".into(),
                    key_points: vec!["? operator".into()],
                },
                OutlineSection {
                    section_title: "Custom Errors".into(),
                    key_points: vec!["thiserror".into()],
                },
            ],
        });
        state.current_step = WorkflowStep::Write;
        state
    }

    #[tokio::test]
    async fn draft_contains_every_section_and_sources() {
        let server = MockServer::start().await;

        Mock::given(method("POST"))
            .and(path("/v1/messages"))
            .and(body_string_contains("introduction"))
            .respond_with(
                ResponseTemplate::new(200).set_body_json(ai_response("Intro paragraph.")),
            )
            .mount(&server)
            .await;

        Mock::given(method("POST"))
            .and(path("/v1/messages"))
            .and(body_string_contains("one section"))
            .respond_with(
                ResponseTemplate::new(200).set_body_json(ai_response("Section body.")),
            )
            .mount(&server)
            .await;

        Mock::given(method("POST"))
            .and(path("/v1/messages"))
            .and(body_string_contains("conclusion"))
            .respond_with(
                ResponseTemplate::new(200).set_body_json(ai_response("Wrap up.")),
            )
            .mount(&server)
            .await;

        let writer = Writer::new(ai_client(&server.uri()), &AgentsConfig::default(), None);
        let StepUpdate::Draft(draft) = writer.execute(&planned_state()).await.unwrap()
        else {
            panic!("expected draft update");
        };

        assert!(draft.starts_with("# Rust error handling"));
        assert!(draft.contains("## Result and Option"));
        assert!(draft.contains("## Custom Errors"));
        assert!(draft.contains("## Conclusion"));
        assert!(draft.contains("(https://example.com/errors)"));
        assert!(!draft.trim().is_empty());
    }

    #[tokio::test]
    async fn tone_profile_reaches_the_prompt() {
        let server = MockServer::start().await;

        // Every call must carry the tone characteristics
        Mock::given(method("POST"))
            .and(path("/v1/messages"))
            .and(body_string_contains("direct and wry"))
            .respond_with(ResponseTemplate::new(200).set_body_json(ai_response("Text.")))
            .mount(&server)
            .await;

        let tone = ToneProfile {
            characteristics: "direct and wry".into(),
            vocabulary: "plain".into(),
            patterns: "short sentences".into(),
            style: "conversational".into(),
        };

        let writer = Writer::new(
            ai_client(&server.uri()),
            &AgentsConfig::default(),
            Some(tone),
        );
        let update = writer.execute(&planned_state()).await.unwrap();
        assert!(matches!(update, StepUpdate::Draft(_)));

        // intro + 2 sections + conclusion
        assert_eq!(server.received_requests().await.unwrap().len(), 4);
    }

    #[tokio::test]
    async fn missing_plan_is_validation_error() {
        let server = MockServer::start().await;
        let writer = Writer::new(ai_client(&server.uri()), &AgentsConfig::default(), None);

        let state = WorkflowState::new("Rust error handling");
        let err = writer.execute(&state).await.unwrap_err();
        assert!(matches!(err, BlogsmithError::Validation { .. }));
    }
}
