//! Step agents for the blog generation pipeline.
//!
//! Each agent wraps one external-API call pattern and maps its result into
//! a typed [`StepUpdate`]: given the fields already in the workflow state,
//! produce the next field. Agents are stateless between calls.

pub mod planner;
pub mod reviewer;
pub mod searcher;
pub mod tone;
pub mod writer;

use std::sync::Arc;

use async_trait::async_trait;

use blogsmith_ai::GenerationClient;
use blogsmith_search::provider_from_config;
use blogsmith_shared::{AppConfig, Result, RetryPolicy, StepUpdate, WorkflowState, WorkflowStep};

pub use planner::Planner;
pub use reviewer::Reviewer;
pub use searcher::Searcher;
pub use tone::{ToneLearner, ToneProfile};
pub use writer::Writer;

/// One pipeline stage: reads already-populated state fields, produces the
/// next one. Implementations never mutate state directly; the orchestrator
/// applies the returned update atomically.
#[async_trait]
pub trait StepAgent: Send + Sync {
    /// The step this agent serves.
    fn step(&self) -> WorkflowStep;

    /// Produce this step's output from the fields prior steps populated.
    async fn execute(&self, state: &WorkflowState) -> Result<StepUpdate>;
}

/// The four agents the orchestrator drives, boxed so tests can substitute
/// mocks for any of them.
pub struct AgentSet {
    pub searcher: Box<dyn StepAgent>,
    pub planner: Box<dyn StepAgent>,
    pub writer: Box<dyn StepAgent>,
    pub reviewer: Box<dyn StepAgent>,
}

impl AgentSet {
    /// Wire up the production agents from config. `tone_profile` is the
    /// optional pre-analyzed profile the writer applies.
    pub fn from_config(
        config: &AppConfig,
        tone_profile: Option<ToneProfile>,
    ) -> Result<Self> {
        let retry = RetryPolicy::from(&config.retry);
        let ai = GenerationClient::new(&config.ai, retry)?;
        let provider = provider_from_config(&config.search, retry)?;

        Ok(Self {
            searcher: Box::new(Searcher::new(
                Arc::from(provider),
                ai.clone(),
                &config.agents,
            )?),
            planner: Box::new(Planner::new(ai.clone(), &config.agents)),
            writer: Box::new(Writer::new(ai.clone(), &config.agents, tone_profile)),
            reviewer: Box::new(Reviewer::new(ai)),
        })
    }

    /// The agent responsible for `step`, if any.
    pub fn agent_for(&self, step: WorkflowStep) -> Option<&dyn StepAgent> {
        match step {
            WorkflowStep::Search => Some(self.searcher.as_ref()),
            WorkflowStep::Plan => Some(self.planner.as_ref()),
            WorkflowStep::Write => Some(self.writer.as_ref()),
            WorkflowStep::Review => Some(self.reviewer.as_ref()),
            WorkflowStep::Done => None,
        }
    }
}
