//! Core domain types for blogsmith workflows.

use serde::{Deserialize, Serialize};
use uuid::Uuid;

// ---------------------------------------------------------------------------
// WorkflowId
// ---------------------------------------------------------------------------

/// A UUID v7 wrapper for workflow identifiers (time-sortable).
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct WorkflowId(pub Uuid);

impl WorkflowId {
    /// Generate a new time-sortable workflow identifier.
    pub fn new() -> Self {
        Self(Uuid::now_v7())
    }
}

impl Default for WorkflowId {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Display for WorkflowId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl std::str::FromStr for WorkflowId {
    type Err = uuid::Error;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        Ok(Self(Uuid::parse_str(s)?))
    }
}

// ---------------------------------------------------------------------------
// WorkflowStep
// ---------------------------------------------------------------------------

/// One stage of the generation pipeline. Strictly forward, no branching.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
#[serde(rename_all = "snake_case")]
pub enum WorkflowStep {
    Search,
    Plan,
    Write,
    Review,
    Done,
}

impl WorkflowStep {
    /// The step that follows this one. `Done` is terminal.
    pub fn next(self) -> Self {
        match self {
            Self::Search => Self::Plan,
            Self::Plan => Self::Write,
            Self::Write => Self::Review,
            Self::Review | Self::Done => Self::Done,
        }
    }

    /// Stable name used in logs, checkpoints, and error messages.
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Search => "search",
            Self::Plan => "plan",
            Self::Write => "write",
            Self::Review => "review",
            Self::Done => "done",
        }
    }
}

impl std::fmt::Display for WorkflowStep {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

// ---------------------------------------------------------------------------
// Article
// ---------------------------------------------------------------------------

/// A source article found and extracted by the Searcher.
/// Never mutated after creation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Article {
    /// Original page URL.
    pub url: String,
    /// Page title as reported by the search provider.
    pub title: String,
    /// Plain text extracted from the page body.
    pub extracted_text: String,
    /// Relevance to the keyword set, higher is better.
    pub relevance_score: f32,
}

// ---------------------------------------------------------------------------
// Outline
// ---------------------------------------------------------------------------

/// A single planned section of the blog post.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OutlineSection {
    /// Section heading.
    pub section_title: String,
    /// Points this section must cover, in order.
    #[serde(default)]
    pub key_points: Vec<String>,
}

/// The blog plan produced by the Planner: 3–7 sections by policy.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Outline {
    pub sections: Vec<OutlineSection>,
}

// ---------------------------------------------------------------------------
// ReviewReport
// ---------------------------------------------------------------------------

/// Findings from the Reviewer, written alongside the final post.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReviewReport {
    /// Surface corrections applied (typos, grammar, duplication).
    #[serde(default)]
    pub corrections: Vec<String>,
    /// 0.0–1.0 confidence that claims are supported by the sources.
    pub reliability_score: f32,
    /// Claims flagged as unsupported by the source articles.
    #[serde(default)]
    pub reliability_notes: Vec<String>,
}

// ---------------------------------------------------------------------------
// WorkflowState
// ---------------------------------------------------------------------------

/// The live state of one workflow run.
///
/// Invariant: fields for steps not yet reached are `None`; fields for
/// completed steps are `Some` and immutable once written.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WorkflowState {
    pub workflow_id: WorkflowId,
    pub current_step: WorkflowStep,
    pub keywords: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub search_results: Option<Vec<Article>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub plan: Option<Outline>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub draft: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none", rename = "final")]
    pub final_text: Option<String>,
}

impl WorkflowState {
    /// Start a fresh workflow at the SEARCH step.
    pub fn new(keywords: impl Into<String>) -> Self {
        Self {
            workflow_id: WorkflowId::new(),
            current_step: WorkflowStep::Search,
            keywords: keywords.into(),
            search_results: None,
            plan: None,
            draft: None,
            final_text: None,
        }
    }

    /// Apply a completed step's output. All-or-nothing: the update either
    /// lands in full or the state is untouched.
    pub fn apply(&mut self, update: StepUpdate) {
        match update {
            StepUpdate::Search(articles) => self.search_results = Some(articles),
            StepUpdate::Plan(outline) => self.plan = Some(outline),
            StepUpdate::Draft(text) => self.draft = Some(text),
            StepUpdate::Review { text, .. } => self.final_text = Some(text),
        }
    }

    /// Advance to the next step after a successful apply.
    pub fn advance(&mut self) {
        self.current_step = self.current_step.next();
    }
}

// ---------------------------------------------------------------------------
// StepUpdate
// ---------------------------------------------------------------------------

/// Output of one step agent, carried back to the orchestrator.
#[derive(Debug, Clone, PartialEq)]
pub enum StepUpdate {
    Search(Vec<Article>),
    Plan(Outline),
    Draft(String),
    Review { text: String, report: ReviewReport },
}
