//! Checkpoint persistence for workflow resume.
//!
//! One JSON file per checkpoint, named `<workflow_id>.<sequence>.json`.
//! Checkpoints are append-only: each completed step writes the next
//! sequence number, superseding (never deleting) the previous file.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use blogsmith_shared::{BlogsmithError, Result, WorkflowId, WorkflowState};

/// A persisted snapshot of [`WorkflowState`] plus its sequence number.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Checkpoint {
    /// Monotonic per-workflow sequence, starting at 1.
    pub sequence: u64,
    #[serde(flatten)]
    pub state: WorkflowState,
}

/// Identifies one checkpoint file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CheckpointId {
    pub workflow_id: WorkflowId,
    pub sequence: u64,
}

impl std::fmt::Display for CheckpointId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}.{:04}", self.workflow_id, self.sequence)
    }
}

/// Serializes workflow state to checkpoint files and reloads it for
/// resume. Single-writer per workflow id by design; no locking.
#[derive(Debug, Clone)]
pub struct CheckpointManager {
    dir: PathBuf,
}

impl CheckpointManager {
    /// Open (and create) the checkpoint directory.
    pub fn open(dir: impl Into<PathBuf>) -> Result<Self> {
        let dir = dir.into();
        std::fs::create_dir_all(&dir).map_err(|e| BlogsmithError::io(&dir, e))?;
        Ok(Self { dir })
    }

    /// Persist a snapshot of `state`, returning the new checkpoint's id.
    /// The sequence is one past the highest existing for this workflow.
    pub fn save(&self, state: &WorkflowState) -> Result<CheckpointId> {
        let sequence = self
            .max_sequence(&state.workflow_id)?
            .map_or(1, |s| s + 1);

        let id = CheckpointId {
            workflow_id: state.workflow_id.clone(),
            sequence,
        };

        let checkpoint = Checkpoint {
            sequence,
            state: state.clone(),
        };
        let json = serde_json::to_string_pretty(&checkpoint).map_err(|e| {
            BlogsmithError::validation(format!("checkpoint serialization failed: {e}"))
        })?;

        let target = self.path_for(&id);
        let temp = self.dir.join(format!(".{id}.tmp"));
        std::fs::write(&temp, &json).map_err(|e| BlogsmithError::io(&temp, e))?;
        std::fs::rename(&temp, &target).map_err(|e| BlogsmithError::io(&target, e))?;

        info!(
            checkpoint = %id,
            step = %state.current_step,
            "checkpoint saved"
        );
        Ok(id)
    }

    /// Load a checkpoint's state. Unknown ids fail with
    /// [`BlogsmithError::CheckpointNotFound`]; unreadable or unparseable
    /// files fail with [`BlogsmithError::CheckpointCorrupt`], never a
    /// silent reset.
    pub fn load(&self, id: &CheckpointId) -> Result<WorkflowState> {
        let path = self.path_for(id);
        if !path.exists() {
            return Err(BlogsmithError::CheckpointNotFound(id.to_string()));
        }

        let content = std::fs::read_to_string(&path).map_err(|e| {
            BlogsmithError::CheckpointCorrupt {
                path: path.clone(),
                message: e.to_string(),
            }
        })?;

        let checkpoint: Checkpoint = serde_json::from_str(&content).map_err(|e| {
            BlogsmithError::CheckpointCorrupt {
                path: path.clone(),
                message: e.to_string(),
            }
        })?;

        if checkpoint.state.workflow_id != id.workflow_id {
            return Err(BlogsmithError::CheckpointCorrupt {
                path,
                message: format!(
                    "checkpoint names workflow {}, expected {}",
                    checkpoint.state.workflow_id, id.workflow_id
                ),
            });
        }

        debug!(checkpoint = %id, step = %checkpoint.state.current_step, "checkpoint loaded");
        Ok(checkpoint.state)
    }

    /// The latest checkpoint id for a workflow.
    pub fn latest(&self, workflow_id: &WorkflowId) -> Result<CheckpointId> {
        match self.max_sequence(workflow_id)? {
            Some(sequence) => Ok(CheckpointId {
                workflow_id: workflow_id.clone(),
                sequence,
            }),
            None => Err(BlogsmithError::CheckpointNotFound(workflow_id.to_string())),
        }
    }

    /// All checkpoint ids on disk, sorted by workflow then sequence.
    pub fn list(&self) -> Result<Vec<CheckpointId>> {
        let mut ids = Vec::new();
        let entries =
            std::fs::read_dir(&self.dir).map_err(|e| BlogsmithError::io(&self.dir, e))?;
        for entry in entries {
            let entry = entry.map_err(|e| BlogsmithError::io(&self.dir, e))?;
            if let Some(id) = parse_file_name(&entry.file_name().to_string_lossy()) {
                ids.push(id);
            }
        }
        ids.sort_by(|a, b| {
            a.workflow_id
                .to_string()
                .cmp(&b.workflow_id.to_string())
                .then(a.sequence.cmp(&b.sequence))
        });
        Ok(ids)
    }

    fn path_for(&self, id: &CheckpointId) -> PathBuf {
        self.dir.join(format!("{id}.json"))
    }

    /// Highest sequence number on disk for a workflow, if any.
    fn max_sequence(&self, workflow_id: &WorkflowId) -> Result<Option<u64>> {
        let mut max = None;
        for id in self.list()? {
            if id.workflow_id == *workflow_id {
                max = Some(max.map_or(id.sequence, |m: u64| m.max(id.sequence)));
            }
        }
        Ok(max)
    }
}

/// Parse `<workflow_id>.<sequence>.json` back into a [`CheckpointId`].
fn parse_file_name(name: &str) -> Option<CheckpointId> {
    let stem = name.strip_suffix(".json")?;
    let (workflow_part, sequence_part) = stem.rsplit_once('.')?;
    Some(CheckpointId {
        workflow_id: workflow_part.parse().ok()?,
        sequence: sequence_part.parse().ok()?,
    })
}

/// Convenience: checkpoint directory under an output root.
pub fn checkpoint_dir(output_root: &Path) -> PathBuf {
    output_root.join("checkpoints")
}

#[cfg(test)]
mod tests {
    use super::*;
    use blogsmith_shared::{Article, WorkflowStep};

    fn temp_manager() -> (PathBuf, CheckpointManager) {
        let dir = std::env::temp_dir().join(format!(
            "bs-checkpoint-test-{}",
            uuid::Uuid::now_v7()
        ));
        let manager = CheckpointManager::open(&dir).unwrap();
        (dir, manager)
    }

    fn populated_state() -> WorkflowState {
        let mut state = WorkflowState::new("Python testing");
        state.current_step = WorkflowStep::Plan;
        state.search_results = Some(vec![Article {
            url: "https://example.com/a".into(),
            title: "A".into(),
            extracted_text: "body".into(),
            relevance_score: 1.0,
        }]);
        state
    }

    #[test]
    fn save_load_roundtrip_is_exact() {
        let (dir, manager) = temp_manager();

        let state = populated_state();
        let id = manager.save(&state).unwrap();
        let loaded = manager.load(&id).unwrap();

        assert_eq!(loaded, state);

        let _ = std::fs::remove_dir_all(&dir);
    }

    #[test]
    fn sequences_are_monotonic_and_append_only() {
        let (dir, manager) = temp_manager();

        let mut state = WorkflowState::new("topic");
        let id1 = manager.save(&state).unwrap();
        state.advance();
        let id2 = manager.save(&state).unwrap();
        state.advance();
        let id3 = manager.save(&state).unwrap();

        assert_eq!(id1.sequence, 1);
        assert_eq!(id2.sequence, 2);
        assert_eq!(id3.sequence, 3);

        // Earlier checkpoints are superseded, not deleted
        assert_eq!(manager.load(&id1).unwrap().current_step, WorkflowStep::Search);
        assert_eq!(manager.load(&id3).unwrap().current_step, WorkflowStep::Write);

        let _ = std::fs::remove_dir_all(&dir);
    }

    #[test]
    fn latest_finds_highest_sequence_per_workflow() {
        let (dir, manager) = temp_manager();

        let state_a = WorkflowState::new("topic a");
        let mut state_b = WorkflowState::new("topic b");

        manager.save(&state_a).unwrap();
        manager.save(&state_b).unwrap();
        state_b.advance();
        manager.save(&state_b).unwrap();

        let latest_a = manager.latest(&state_a.workflow_id).unwrap();
        let latest_b = manager.latest(&state_b.workflow_id).unwrap();
        assert_eq!(latest_a.sequence, 1);
        assert_eq!(latest_b.sequence, 2);

        let _ = std::fs::remove_dir_all(&dir);
    }

    #[test]
    fn unknown_checkpoint_is_not_found() {
        let (dir, manager) = temp_manager();

        let missing = CheckpointId {
            workflow_id: WorkflowId::new(),
            sequence: 1,
        };
        assert!(matches!(
            manager.load(&missing).unwrap_err(),
            BlogsmithError::CheckpointNotFound(_)
        ));
        assert!(matches!(
            manager.latest(&WorkflowId::new()).unwrap_err(),
            BlogsmithError::CheckpointNotFound(_)
        ));

        let _ = std::fs::remove_dir_all(&dir);
    }

    #[test]
    fn corrupt_checkpoint_fails_fast() {
        let (dir, manager) = temp_manager();

        let state = WorkflowState::new("topic");
        let id = manager.save(&state).unwrap();

        // Truncate the file mid-JSON
        let path = dir.join(format!("{id}.json"));
        std::fs::write(&path, "{\"sequence\": 1, \"workflow").unwrap();

        assert!(matches!(
            manager.load(&id).unwrap_err(),
            BlogsmithError::CheckpointCorrupt { .. }
        ));

        let _ = std::fs::remove_dir_all(&dir);
    }

    #[test]
    fn checkpoint_json_flattens_state_fields() {
        let (dir, manager) = temp_manager();

        let state = populated_state();
        let id = manager.save(&state).unwrap();

        let content = std::fs::read_to_string(dir.join(format!("{id}.json"))).unwrap();
        let value: serde_json::Value = serde_json::from_str(&content).unwrap();

        // sequence + workflow_id live at the top level next to state fields
        assert_eq!(value["sequence"], 1);
        assert_eq!(value["workflow_id"], state.workflow_id.to_string());
        assert_eq!(value["current_step"], "plan");
        assert!(value["search_results"].is_array());

        let _ = std::fs::remove_dir_all(&dir);
    }

    #[test]
    fn list_ignores_foreign_files() {
        let (dir, manager) = temp_manager();

        manager.save(&WorkflowState::new("topic")).unwrap();
        std::fs::write(dir.join("notes.txt"), "not a checkpoint").unwrap();
        std::fs::write(dir.join("bad.json"), "{}").unwrap();

        assert_eq!(manager.list().unwrap().len(), 1);

        let _ = std::fs::remove_dir_all(&dir);
    }
}
