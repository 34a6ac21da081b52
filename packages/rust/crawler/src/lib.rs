//! Pattern-based crawler and notes-service upload.
//!
//! This crate provides:
//! - [`patterns`] — URL pattern expansion (numeric ranges, value lists)
//! - [`engine`] — concurrent pattern crawler with per-page extraction
//! - [`filters`] — keyword/length content filters
//! - [`notes`] — Notion-style notes-service client

pub mod engine;
pub mod filters;
pub mod notes;
pub mod patterns;

pub use engine::{CrawledPage, CrawlSource, PatternCrawler};
pub use filters::ContentFilter;
pub use notes::{NotePage, NotesClient};
pub use patterns::UrlPattern;
