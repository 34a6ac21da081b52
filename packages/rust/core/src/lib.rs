//! Workflow orchestration for blogsmith.
//!
//! This crate provides:
//! - [`checkpoint`] — checkpoint save/load for resumable workflows
//! - [`pipeline`] — the SEARCH → PLAN → WRITE → REVIEW orchestrator
//! - [`digest`] — the crawl-summarize-upload pipeline

pub mod checkpoint;
pub mod digest;
pub mod pipeline;

pub use checkpoint::{Checkpoint, CheckpointId, CheckpointManager};
pub use digest::{DigestResult, PageDigest, run_digest};
pub use pipeline::{Orchestrator, ProgressReporter, SilentProgress};
