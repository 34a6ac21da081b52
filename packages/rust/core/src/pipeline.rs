//! The blog generation pipeline: SEARCH → PLAN → WRITE → REVIEW → DONE.
//!
//! The orchestrator owns the live [`WorkflowState`] for the duration of a
//! run. Each step's output is applied atomically, written to the artifact
//! store for inspection, and checkpointed before the next step begins.

use std::path::{Path, PathBuf};

use tracing::{info, instrument, warn};

use blogsmith_agents::AgentSet;
use blogsmith_artifacts::{
    ArtifactStore, BLOG_PLAN_FILE, DRAFT_FILE, REVIEW_REPORT_FILE, SEARCH_RESULTS_FILE,
    final_post_filename,
};
use blogsmith_shared::{
    Article, BlogsmithError, Result, StepUpdate, WorkflowId, WorkflowState, WorkflowStep,
};
use blogsmith_storage::Storage;

use crate::checkpoint::{CheckpointManager, checkpoint_dir};

// ---------------------------------------------------------------------------
// Progress reporting
// ---------------------------------------------------------------------------

/// Progress callback for reporting pipeline status.
pub trait ProgressReporter: Send + Sync {
    /// Called when entering a new phase.
    fn phase(&self, name: &str);
    /// Called when a pipeline step starts.
    fn step_started(&self, step: WorkflowStep);
    /// Called when a pipeline step completes.
    fn step_completed(&self, step: WorkflowStep);
    /// Called when the run completes.
    fn done(&self, state: &WorkflowState);
}

/// No-op progress reporter for headless/test usage.
pub struct SilentProgress;

impl ProgressReporter for SilentProgress {
    fn phase(&self, _name: &str) {}
    fn step_started(&self, _step: WorkflowStep) {}
    fn step_completed(&self, _step: WorkflowStep) {}
    fn done(&self, _state: &WorkflowState) {}
}

// ---------------------------------------------------------------------------
// Orchestrator
// ---------------------------------------------------------------------------

/// Runs the fixed step sequence, checkpointing after every completed step.
pub struct Orchestrator {
    agents: AgentSet,
    checkpoints: CheckpointManager,
    storage: Storage,
    output_root: PathBuf,
}

impl Orchestrator {
    /// Open the orchestrator over an output root directory. Creates the
    /// checkpoint directory and the run index on first use.
    pub async fn new(output_root: impl Into<PathBuf>, agents: AgentSet) -> Result<Self> {
        let output_root = output_root.into();
        let checkpoints = CheckpointManager::open(checkpoint_dir(&output_root))?;
        let storage =
            Storage::open(&output_root.join("index").join("blogsmith.db")).await?;

        Ok(Self {
            agents,
            checkpoints,
            storage,
            output_root,
        })
    }

    /// The run index, for `list-workflows`.
    pub fn storage(&self) -> &Storage {
        &self.storage
    }

    /// The checkpoint manager, for inspection tooling.
    pub fn checkpoints(&self) -> &CheckpointManager {
        &self.checkpoints
    }

    /// Run the pipeline to completion.
    ///
    /// A fresh run starts at SEARCH under a new workflow id. With
    /// `resume_from`, the latest checkpoint for that workflow is loaded and
    /// execution continues from its recorded step; completed steps are
    /// never re-run. On step failure the run halts without advancing,
    /// leaving the last checkpoint as the valid resume point.
    #[instrument(skip_all, fields(keywords = %keywords))]
    pub async fn run(
        &self,
        keywords: &str,
        resume_from: Option<&WorkflowId>,
        progress: &dyn ProgressReporter,
    ) -> Result<WorkflowState> {
        let mut state = match resume_from {
            Some(workflow_id) => {
                progress.phase("Loading checkpoint");
                let latest = self.checkpoints.latest(workflow_id)?;
                let state = self.checkpoints.load(&latest)?;
                info!(
                    workflow_id = %state.workflow_id,
                    step = %state.current_step,
                    "resuming workflow"
                );
                if !keywords.is_empty() && keywords != state.keywords {
                    warn!(
                        checkpoint_keywords = %state.keywords,
                        "ignoring new keywords on resume"
                    );
                }
                state
            }
            None => {
                let state = WorkflowState::new(keywords);
                info!(workflow_id = %state.workflow_id, "starting new workflow");
                state
            }
        };

        if state.keywords.trim().is_empty() {
            return Err(BlogsmithError::validation("keywords are required"));
        }

        self.storage
            .insert_workflow(
                &state.workflow_id.to_string(),
                &state.keywords,
                state.current_step.as_str(),
            )
            .await?;

        let artifacts = ArtifactStore::for_workflow(&self.output_root, &state.workflow_id)?;

        while state.current_step != WorkflowStep::Done {
            let step = state.current_step;
            let agent = self
                .agents
                .agent_for(step)
                .ok_or_else(|| BlogsmithError::step_failed(step.as_str(), "no agent"))?;
            if agent.step() != step {
                return Err(BlogsmithError::step_failed(
                    step.as_str(),
                    format!("agent serves step '{}'", agent.step()),
                ));
            }

            progress.step_started(step);

            let update = match agent.execute(&state).await {
                Ok(update) => update,
                Err(e) => {
                    let _ = self
                        .storage
                        .update_workflow_status(&state.workflow_id.to_string(), "failed")
                        .await;
                    warn!(step = %step, error = %e, "step failed, halting");
                    return Err(BlogsmithError::step_failed(step.as_str(), e.to_string()));
                }
            };

            if !update_matches(step, &update) {
                return Err(BlogsmithError::step_failed(
                    step.as_str(),
                    "agent returned output for a different step",
                ));
            }

            // Artifact first: a failed write halts the step before any
            // state mutation, keeping updates all-or-nothing.
            self.write_step_artifacts(&artifacts, &state, &update)?;

            state.apply(update);
            state.advance();
            self.checkpoints.save(&state)?;
            self.storage
                .update_workflow_status(
                    &state.workflow_id.to_string(),
                    state.current_step.as_str(),
                )
                .await?;

            progress.step_completed(step);
            info!(step = %step, next = %state.current_step, "step complete");
        }

        self.storage
            .update_workflow_status(&state.workflow_id.to_string(), "completed")
            .await?;

        progress.done(&state);
        info!(workflow_id = %state.workflow_id, "workflow complete");
        Ok(state)
    }

    /// Execute only the search step, writing its artifact under a fresh
    /// workflow directory. Returns the selected articles.
    #[instrument(skip_all, fields(keywords = %keywords))]
    pub async fn search_only(
        &self,
        keywords: &str,
        progress: &dyn ProgressReporter,
    ) -> Result<Vec<Article>> {
        let state = WorkflowState::new(keywords);
        progress.step_started(WorkflowStep::Search);

        let update = self
            .agents
            .searcher
            .execute(&state)
            .await
            .map_err(|e| BlogsmithError::step_failed("search", e.to_string()))?;

        let StepUpdate::Search(articles) = update else {
            return Err(BlogsmithError::step_failed(
                "search",
                "agent returned output for a different step",
            ));
        };

        let artifacts = ArtifactStore::for_workflow(&self.output_root, &state.workflow_id)?;
        artifacts.write_json(SEARCH_RESULTS_FILE, &articles)?;

        progress.step_completed(WorkflowStep::Search);
        Ok(articles)
    }

    /// Write the inspection artifact(s) for one step's output.
    fn write_step_artifacts(
        &self,
        artifacts: &ArtifactStore,
        state: &WorkflowState,
        update: &StepUpdate,
    ) -> Result<()> {
        match update {
            StepUpdate::Search(articles) => {
                artifacts.write_json(SEARCH_RESULTS_FILE, articles)?;
            }
            StepUpdate::Plan(outline) => {
                artifacts.write_json(BLOG_PLAN_FILE, outline)?;
            }
            StepUpdate::Draft(text) => {
                artifacts.write_text(DRAFT_FILE, text)?;
            }
            StepUpdate::Review { text, report } => {
                artifacts.write_json(REVIEW_REPORT_FILE, report)?;
                artifacts.write_text(&final_post_filename(&state.keywords), text)?;
            }
        }
        Ok(())
    }

    /// The artifact directory for a workflow, for reporting.
    pub fn artifact_dir(&self, workflow_id: &WorkflowId) -> PathBuf {
        self.output_root.join(workflow_id.to_string())
    }

    /// The output root this orchestrator writes under.
    pub fn output_root(&self) -> &Path {
        &self.output_root
    }
}

/// Whether an agent's output belongs to the step that produced it.
fn update_matches(step: WorkflowStep, update: &StepUpdate) -> bool {
    matches!(
        (step, update),
        (WorkflowStep::Search, StepUpdate::Search(_))
            | (WorkflowStep::Plan, StepUpdate::Plan(_))
            | (WorkflowStep::Write, StepUpdate::Draft(_))
            | (WorkflowStep::Review, StepUpdate::Review { .. })
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use std::sync::Arc;
    use std::sync::atomic::{AtomicUsize, Ordering};

    use blogsmith_agents::StepAgent;
    use blogsmith_shared::{Outline, OutlineSection, ReviewReport};

    /// Scripted agent: counts invocations, returns a canned update or error.
    struct MockAgent {
        step: WorkflowStep,
        calls: Arc<AtomicUsize>,
        fail: bool,
    }

    impl MockAgent {
        fn new(step: WorkflowStep, calls: Arc<AtomicUsize>) -> Self {
            Self {
                step,
                calls,
                fail: false,
            }
        }

        fn failing(step: WorkflowStep, calls: Arc<AtomicUsize>) -> Self {
            Self {
                step,
                calls,
                fail: true,
            }
        }
    }

    #[async_trait]
    impl StepAgent for MockAgent {
        fn step(&self) -> WorkflowStep {
            self.step
        }

        async fn execute(&self, state: &WorkflowState) -> Result<StepUpdate> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            if self.fail {
                return Err(BlogsmithError::Transient("provider down".into()));
            }
            Ok(match self.step {
                WorkflowStep::Search => StepUpdate::Search(
                    (0..5)
                        .map(|i| Article {
                            url: format!("https://example.com/{i}"),
                            title: format!("Article {i}"),
                            extracted_text: "body".into(),
                            relevance_score: 1.0 - i as f32 * 0.1,
                        })
                        .collect(),
                ),
                WorkflowStep::Plan => StepUpdate::Plan(Outline {
                    sections: (0..3)
                        .map(|i| OutlineSection {
                            section_title: format!("Section {i}"),
                            key_points: vec!["point".into()],
                        })
                        .collect(),
                }),
                WorkflowStep::Write => {
                    StepUpdate::Draft(format!("# {}\n\nDraft body.\n", state.keywords))
                }
                WorkflowStep::Review => StepUpdate::Review {
                    text: format!("# {}\n\nFinal body.\n", state.keywords),
                    report: ReviewReport {
                        corrections: vec![],
                        reliability_score: 0.9,
                        reliability_notes: vec![],
                    },
                },
                WorkflowStep::Done => unreachable!(),
            })
        }
    }

    struct Counters {
        search: Arc<AtomicUsize>,
        plan: Arc<AtomicUsize>,
        write: Arc<AtomicUsize>,
        review: Arc<AtomicUsize>,
    }

    fn mock_agents(fail_at: Option<WorkflowStep>) -> (AgentSet, Counters) {
        let counters = Counters {
            search: Arc::new(AtomicUsize::new(0)),
            plan: Arc::new(AtomicUsize::new(0)),
            write: Arc::new(AtomicUsize::new(0)),
            review: Arc::new(AtomicUsize::new(0)),
        };

        let make = |step: WorkflowStep, calls: &Arc<AtomicUsize>| -> Box<dyn StepAgent> {
            if fail_at == Some(step) {
                Box::new(MockAgent::failing(step, calls.clone()))
            } else {
                Box::new(MockAgent::new(step, calls.clone()))
            }
        };

        let agents = AgentSet {
            searcher: make(WorkflowStep::Search, &counters.search),
            planner: make(WorkflowStep::Plan, &counters.plan),
            writer: make(WorkflowStep::Write, &counters.write),
            reviewer: make(WorkflowStep::Review, &counters.review),
        };
        (agents, counters)
    }

    fn temp_root() -> PathBuf {
        std::env::temp_dir().join(format!("bs-pipeline-test-{}", uuid::Uuid::now_v7()))
    }

    #[tokio::test]
    async fn fresh_run_completes_and_writes_artifacts() {
        let root = temp_root();
        let (agents, counters) = mock_agents(None);
        let orchestrator = Orchestrator::new(&root, agents).await.unwrap();

        let state = orchestrator
            .run("Python testing", None, &SilentProgress)
            .await
            .unwrap();

        assert_eq!(state.current_step, WorkflowStep::Done);
        assert_eq!(state.search_results.as_ref().unwrap().len(), 5);
        assert!(state.plan.as_ref().unwrap().sections.len() >= 3);
        assert!(!state.draft.as_ref().unwrap().is_empty());
        let final_text = state.final_text.as_ref().unwrap();
        assert!(!final_text.contains("TODO"));
        assert!(!final_text.contains("placeholder"));

        // Each agent ran exactly once
        assert_eq!(counters.search.load(Ordering::SeqCst), 1);
        assert_eq!(counters.plan.load(Ordering::SeqCst), 1);
        assert_eq!(counters.write.load(Ordering::SeqCst), 1);
        assert_eq!(counters.review.load(Ordering::SeqCst), 1);

        // Artifacts exist on disk and match state
        let artifacts =
            ArtifactStore::for_workflow(&root, &state.workflow_id).unwrap();
        let on_disk: Vec<Article> =
            artifacts.read_json(SEARCH_RESULTS_FILE).unwrap().unwrap();
        assert_eq!(&on_disk, state.search_results.as_ref().unwrap());
        assert!(artifacts.exists(BLOG_PLAN_FILE));
        assert!(artifacts.exists(DRAFT_FILE));
        assert!(artifacts.exists(REVIEW_REPORT_FILE));
        assert!(
            artifacts
                .list()
                .unwrap()
                .iter()
                .any(|name| name.starts_with("python-testing-") && name.ends_with(".md"))
        );

        // Four checkpoints: one per completed step
        assert_eq!(orchestrator.checkpoints().list().unwrap().len(), 4);

        // Run index reflects completion
        let rows = orchestrator.storage().list_workflows().await.unwrap();
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].status, "completed");

        let _ = std::fs::remove_dir_all(&root);
    }

    #[tokio::test]
    async fn failed_step_halts_without_advancing() {
        let root = temp_root();
        let (agents, counters) = mock_agents(Some(WorkflowStep::Write));
        let orchestrator = Orchestrator::new(&root, agents).await.unwrap();

        let err = orchestrator
            .run("Python testing", None, &SilentProgress)
            .await
            .unwrap_err();

        match err {
            BlogsmithError::StepFailed { step, .. } => assert_eq!(step, "write"),
            other => panic!("expected StepFailed, got {other}"),
        }
        assert_eq!(counters.review.load(Ordering::SeqCst), 0);

        // Last checkpoint still points at WRITE, the valid resume point
        let ids = orchestrator.checkpoints().list().unwrap();
        assert_eq!(ids.len(), 2);
        let last = orchestrator
            .checkpoints()
            .load(ids.last().unwrap())
            .unwrap();
        assert_eq!(last.current_step, WorkflowStep::Write);

        let rows = orchestrator.storage().list_workflows().await.unwrap();
        assert_eq!(rows[0].status, "failed");

        let _ = std::fs::remove_dir_all(&root);
    }

    #[tokio::test]
    async fn resume_runs_only_remaining_steps() {
        let root = temp_root();

        // First run dies at WRITE, leaving the PLAN checkpoint behind
        let workflow_id = {
            let (agents, _) = mock_agents(Some(WorkflowStep::Write));
            let orchestrator = Orchestrator::new(&root, agents).await.unwrap();
            orchestrator
                .run("Python testing", None, &SilentProgress)
                .await
                .unwrap_err();
            orchestrator.checkpoints().list().unwrap()[0]
                .workflow_id
                .clone()
        };

        // Resume with healthy agents: search and plan never re-run
        let (agents, counters) = mock_agents(None);
        let orchestrator = Orchestrator::new(&root, agents).await.unwrap();
        let state = orchestrator
            .run("", Some(&workflow_id), &SilentProgress)
            .await
            .unwrap();

        assert_eq!(state.current_step, WorkflowStep::Done);
        assert_eq!(state.workflow_id, workflow_id);
        assert_eq!(counters.search.load(Ordering::SeqCst), 0);
        assert_eq!(counters.plan.load(Ordering::SeqCst), 0);
        assert_eq!(counters.write.load(Ordering::SeqCst), 1);
        assert_eq!(counters.review.load(Ordering::SeqCst), 1);

        // State carried over from the checkpoint
        assert_eq!(state.keywords, "Python testing");
        assert!(state.search_results.is_some());

        let _ = std::fs::remove_dir_all(&root);
    }

    #[tokio::test]
    async fn step_never_regresses_across_checkpoints() {
        let root = temp_root();
        let (agents, _) = mock_agents(None);
        let orchestrator = Orchestrator::new(&root, agents).await.unwrap();

        orchestrator
            .run("Python testing", None, &SilentProgress)
            .await
            .unwrap();

        let ids = orchestrator.checkpoints().list().unwrap();
        let mut previous = None;
        for id in &ids {
            let state = orchestrator.checkpoints().load(id).unwrap();
            if let Some(prev) = previous {
                assert!(state.current_step >= prev, "step regressed");
            }
            previous = Some(state.current_step);
        }

        let _ = std::fs::remove_dir_all(&root);
    }

    #[tokio::test]
    async fn resume_of_unknown_workflow_fails_fast() {
        let root = temp_root();
        let (agents, _) = mock_agents(None);
        let orchestrator = Orchestrator::new(&root, agents).await.unwrap();

        let err = orchestrator
            .run("anything", Some(&WorkflowId::new()), &SilentProgress)
            .await
            .unwrap_err();
        assert!(matches!(err, BlogsmithError::CheckpointNotFound(_)));

        let _ = std::fs::remove_dir_all(&root);
    }

    #[tokio::test]
    async fn empty_keywords_rejected_before_any_step() {
        let root = temp_root();
        let (agents, counters) = mock_agents(None);
        let orchestrator = Orchestrator::new(&root, agents).await.unwrap();

        let err = orchestrator
            .run("  ", None, &SilentProgress)
            .await
            .unwrap_err();
        assert!(matches!(err, BlogsmithError::Validation { .. }));
        assert_eq!(counters.search.load(Ordering::SeqCst), 0);

        let _ = std::fs::remove_dir_all(&root);
    }

    #[tokio::test]
    async fn search_only_writes_the_artifact() {
        let root = temp_root();
        let (agents, counters) = mock_agents(None);
        let orchestrator = Orchestrator::new(&root, agents).await.unwrap();

        let articles = orchestrator
            .search_only("Python testing", &SilentProgress)
            .await
            .unwrap();

        assert_eq!(articles.len(), 5);
        assert_eq!(counters.search.load(Ordering::SeqCst), 1);
        assert_eq!(counters.plan.load(Ordering::SeqCst), 0);

        let _ = std::fs::remove_dir_all(&root);
    }
}
