//! Per-workflow artifact storage.
//!
//! Every pipeline step writes a human-inspectable file into
//! `<output_root>/<workflow_id>/`: `search_results.json`, `blog_plan.json`,
//! `draft.md`, `review_report.json`, and the final dated Markdown post.

use std::path::{Path, PathBuf};

use chrono::Utc;
use tracing::{debug, info};

use blogsmith_shared::{BlogsmithError, Result, WorkflowId};

/// Article list produced by the search step.
pub const SEARCH_RESULTS_FILE: &str = "search_results.json";
/// Outline produced by the plan step.
pub const BLOG_PLAN_FILE: &str = "blog_plan.json";
/// Unreviewed Markdown from the write step.
pub const DRAFT_FILE: &str = "draft.md";
/// Reviewer findings written alongside the final post.
pub const REVIEW_REPORT_FILE: &str = "review_report.json";

/// Reads and writes named artifacts for one workflow directory.
#[derive(Debug, Clone)]
pub struct ArtifactStore {
    base_dir: PathBuf,
}

impl ArtifactStore {
    /// Open (and create) the artifact directory for one workflow.
    pub fn for_workflow(output_root: &Path, workflow_id: &WorkflowId) -> Result<Self> {
        let base_dir = output_root.join(workflow_id.to_string());
        std::fs::create_dir_all(&base_dir).map_err(|e| BlogsmithError::io(&base_dir, e))?;
        Ok(Self { base_dir })
    }

    /// Open an arbitrary directory as an artifact store (digest pipeline).
    pub fn at(base_dir: impl Into<PathBuf>) -> Result<Self> {
        let base_dir = base_dir.into();
        std::fs::create_dir_all(&base_dir).map_err(|e| BlogsmithError::io(&base_dir, e))?;
        Ok(Self { base_dir })
    }

    /// The directory this store writes into.
    pub fn base_dir(&self) -> &Path {
        &self.base_dir
    }

    /// Write a pretty-printed JSON artifact atomically.
    pub fn write_json<T: serde::Serialize>(&self, name: &str, data: &T) -> Result<PathBuf> {
        let json = serde_json::to_string_pretty(data).map_err(|e| {
            BlogsmithError::validation(format!("JSON serialization failed: {e}"))
        })?;
        self.write_raw(name, &json)
    }

    /// Read a JSON artifact. `None` if the file does not exist.
    pub fn read_json<T: serde::de::DeserializeOwned>(&self, name: &str) -> Result<Option<T>> {
        let path = self.base_dir.join(name);
        if !path.exists() {
            debug!(path = %path.display(), "artifact not found");
            return Ok(None);
        }

        let content =
            std::fs::read_to_string(&path).map_err(|e| BlogsmithError::io(&path, e))?;
        let value = serde_json::from_str(&content).map_err(|e| {
            BlogsmithError::validation(format!("invalid artifact {name}: {e}"))
        })?;
        Ok(Some(value))
    }

    /// Write a text artifact (Markdown and friends) atomically.
    pub fn write_text(&self, name: &str, content: &str) -> Result<PathBuf> {
        self.write_raw(name, content)
    }

    /// Read a text artifact. `None` if the file does not exist.
    pub fn read_text(&self, name: &str) -> Result<Option<String>> {
        let path = self.base_dir.join(name);
        if !path.exists() {
            return Ok(None);
        }
        std::fs::read_to_string(&path)
            .map(Some)
            .map_err(|e| BlogsmithError::io(&path, e))
    }

    /// Whether a named artifact exists.
    pub fn exists(&self, name: &str) -> bool {
        self.base_dir.join(name).exists()
    }

    /// List artifact file names in this store.
    pub fn list(&self) -> Result<Vec<String>> {
        let mut names = Vec::new();
        let entries = std::fs::read_dir(&self.base_dir)
            .map_err(|e| BlogsmithError::io(&self.base_dir, e))?;
        for entry in entries {
            let entry = entry.map_err(|e| BlogsmithError::io(&self.base_dir, e))?;
            if entry.path().is_file() {
                names.push(entry.file_name().to_string_lossy().to_string());
            }
        }
        names.sort();
        Ok(names)
    }

    /// Write to a temp file in the same directory, then rename into place.
    fn write_raw(&self, name: &str, content: &str) -> Result<PathBuf> {
        let target = self.base_dir.join(name);
        let temp = self.base_dir.join(format!(".{name}.tmp"));

        std::fs::write(&temp, content).map_err(|e| BlogsmithError::io(&temp, e))?;
        std::fs::rename(&temp, &target).map_err(|e| BlogsmithError::io(&target, e))?;

        info!(path = %target.display(), bytes = content.len(), "wrote artifact");
        Ok(target)
    }
}

// ---------------------------------------------------------------------------
// Final post naming
// ---------------------------------------------------------------------------

/// Lowercase, alphanumeric-and-dash slug of a topic string.
pub fn slug(topic: &str) -> String {
    let mut out = String::with_capacity(topic.len());
    let mut last_dash = true;
    for ch in topic.chars() {
        if ch.is_alphanumeric() {
            out.extend(ch.to_lowercase());
            last_dash = false;
        } else if !last_dash {
            out.push('-');
            last_dash = true;
        }
    }
    let trimmed = out.trim_end_matches('-');
    if trimmed.is_empty() {
        "post".to_string()
    } else {
        trimmed.to_string()
    }
}

/// File name for the final post: `<topic-slug>-<YYYY-MM-DD>.md`.
pub fn final_post_filename(topic: &str) -> String {
    format!("{}-{}.md", slug(topic), Utc::now().format("%Y-%m-%d"))
}
