//! Application configuration for blogsmith.
//!
//! User config lives at `~/.blogsmith/blogsmith.toml`.
//! CLI flags override config file values, which override defaults.

use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::{BlogsmithError, Result};

/// Default configuration file name.
const CONFIG_FILE_NAME: &str = "blogsmith.toml";

/// Default config directory name under the user's home.
const CONFIG_DIR_NAME: &str = ".blogsmith";

// ---------------------------------------------------------------------------
// Config structs (matching blogsmith.toml schema)
// ---------------------------------------------------------------------------

/// Top-level application config, deserialized from TOML.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AppConfig {
    /// Global defaults.
    #[serde(default)]
    pub defaults: DefaultsConfig,

    /// Generative AI provider settings.
    #[serde(default)]
    pub ai: AiConfig,

    /// Search provider settings.
    #[serde(default)]
    pub search: SearchConfig,

    /// Per-agent policy knobs.
    #[serde(default)]
    pub agents: AgentsConfig,

    /// Retry/backoff policy for external calls.
    #[serde(default)]
    pub retry: RetryConfig,

    /// Pattern-crawler settings.
    #[serde(default)]
    pub crawl: CrawlConfig,

    /// Notes-service upload settings.
    #[serde(default)]
    pub notes: NotesConfig,
}

/// `[defaults]` section.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DefaultsConfig {
    /// Root directory for artifacts, checkpoints, and the run index.
    #[serde(default = "default_output_dir")]
    pub output_dir: String,

    /// Optional reference document for tone analysis.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reference_file: Option<String>,
}

impl Default for DefaultsConfig {
    fn default() -> Self {
        Self {
            output_dir: default_output_dir(),
            reference_file: None,
        }
    }
}

fn default_output_dir() -> String {
    "outputs".into()
}

/// `[ai]` section.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AiConfig {
    /// Name of the env var holding the API key (never store the key itself).
    #[serde(default = "default_ai_key_env")]
    pub api_key_env: String,

    /// Model identifier sent to the provider.
    #[serde(default = "default_model")]
    pub model: String,

    /// Per-call output token cap.
    #[serde(default = "default_max_tokens")]
    pub max_tokens: u32,

    /// Default sampling temperature.
    #[serde(default = "default_temperature")]
    pub temperature: f32,
}

impl Default for AiConfig {
    fn default() -> Self {
        Self {
            api_key_env: default_ai_key_env(),
            model: default_model(),
            max_tokens: default_max_tokens(),
            temperature: default_temperature(),
        }
    }
}

fn default_ai_key_env() -> String {
    "ANTHROPIC_API_KEY".into()
}
fn default_model() -> String {
    "claude-3-5-sonnet-20241022".into()
}
fn default_max_tokens() -> u32 {
    4000
}
fn default_temperature() -> f32 {
    0.7
}

/// `[search]` section.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SearchConfig {
    /// Search backend: "google" or "bing".
    #[serde(default = "default_search_provider")]
    pub provider: String,

    /// Name of the env var holding the search API key.
    #[serde(default = "default_search_key_env")]
    pub api_key_env: String,

    /// Google Custom Search engine id (unused for Bing).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub search_engine_id: Option<String>,

    /// Maximum results per query.
    #[serde(default = "default_max_results")]
    pub max_results: usize,
}

impl Default for SearchConfig {
    fn default() -> Self {
        Self {
            provider: default_search_provider(),
            api_key_env: default_search_key_env(),
            search_engine_id: None,
            max_results: default_max_results(),
        }
    }
}

fn default_search_provider() -> String {
    "google".into()
}
fn default_search_key_env() -> String {
    "SEARCH_API_KEY".into()
}
fn default_max_results() -> usize {
    10
}

/// `[agents]` section.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AgentsConfig {
    /// Articles kept after ranking and truncation.
    #[serde(default = "default_max_articles")]
    pub max_articles: usize,

    /// Extracted pages shorter than this are discarded.
    #[serde(default = "default_min_content_length")]
    pub min_content_length: usize,

    /// Concurrent article fetches during the search step.
    #[serde(default = "default_fetch_concurrency")]
    pub fetch_concurrency: usize,

    /// Outline floor. The planner never emits fewer sections.
    #[serde(default = "default_min_sections")]
    pub min_sections: usize,

    /// Outline ceiling. Longer model outlines are trimmed.
    #[serde(default = "default_max_sections")]
    pub max_sections: usize,

    /// Word target handed to the writer per section.
    #[serde(default = "default_section_word_target")]
    pub section_word_target: usize,

    /// Whether the writer applies a learned tone profile.
    #[serde(default = "default_true")]
    pub apply_tone: bool,
}

impl Default for AgentsConfig {
    fn default() -> Self {
        Self {
            max_articles: default_max_articles(),
            min_content_length: default_min_content_length(),
            fetch_concurrency: default_fetch_concurrency(),
            min_sections: default_min_sections(),
            max_sections: default_max_sections(),
            section_word_target: default_section_word_target(),
            apply_tone: default_true(),
        }
    }
}

fn default_max_articles() -> usize {
    3
}
fn default_min_content_length() -> usize {
    500
}
fn default_fetch_concurrency() -> usize {
    5
}
fn default_min_sections() -> usize {
    3
}
fn default_max_sections() -> usize {
    7
}
fn default_section_word_target() -> usize {
    300
}
fn default_true() -> bool {
    true
}

/// `[retry]` section.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RetryConfig {
    /// Total attempts, including the first.
    #[serde(default = "default_max_attempts")]
    pub max_attempts: u32,

    /// First backoff delay in milliseconds.
    #[serde(default = "default_base_delay_ms")]
    pub base_delay_ms: u64,

    /// Backoff ceiling in milliseconds.
    #[serde(default = "default_max_delay_ms")]
    pub max_delay_ms: u64,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_attempts: default_max_attempts(),
            base_delay_ms: default_base_delay_ms(),
            max_delay_ms: default_max_delay_ms(),
        }
    }
}

fn default_max_attempts() -> u32 {
    3
}
fn default_base_delay_ms() -> u64 {
    1000
}
fn default_max_delay_ms() -> u64 {
    10_000
}

/// `[crawl]` section.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CrawlConfig {
    /// Hard cap on pages fetched per crawl.
    #[serde(default = "default_max_pages")]
    pub max_pages: usize,

    /// Concurrent page fetches.
    #[serde(default = "default_crawl_concurrency")]
    pub concurrency: usize,

    /// Minimum ms between requests from one worker.
    #[serde(default = "default_request_delay_ms")]
    pub request_delay_ms: u64,
}

impl Default for CrawlConfig {
    fn default() -> Self {
        Self {
            max_pages: default_max_pages(),
            concurrency: default_crawl_concurrency(),
            request_delay_ms: default_request_delay_ms(),
        }
    }
}

fn default_max_pages() -> usize {
    10
}
fn default_crawl_concurrency() -> usize {
    4
}
fn default_request_delay_ms() -> u64 {
    1000
}

/// `[notes]` section.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NotesConfig {
    /// Name of the env var holding the notes-service API key.
    #[serde(default = "default_notes_key_env")]
    pub api_key_env: String,

    /// Default target database for uploads.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub database_id: Option<String>,
}

impl Default for NotesConfig {
    fn default() -> Self {
        Self {
            api_key_env: default_notes_key_env(),
            database_id: None,
        }
    }
}

fn default_notes_key_env() -> String {
    "NOTION_API_KEY".into()
}

impl RetryConfig {
    /// First backoff delay as a [`Duration`].
    pub fn base_delay(&self) -> Duration {
        Duration::from_millis(self.base_delay_ms)
    }

    /// Backoff ceiling as a [`Duration`].
    pub fn max_delay(&self) -> Duration {
        Duration::from_millis(self.max_delay_ms)
    }
}

// ---------------------------------------------------------------------------
// Config loading
// ---------------------------------------------------------------------------

/// Get the path to the config directory (`~/.blogsmith/`).
pub fn config_dir() -> Result<PathBuf> {
    let home = dirs::home_dir()
        .ok_or_else(|| BlogsmithError::config("could not determine home directory"))?;
    Ok(home.join(CONFIG_DIR_NAME))
}

/// Get the path to the config file (`~/.blogsmith/blogsmith.toml`).
pub fn config_file_path() -> Result<PathBuf> {
    Ok(config_dir()?.join(CONFIG_FILE_NAME))
}

/// Load the application config from disk. Returns defaults if the file does not exist.
pub fn load_config() -> Result<AppConfig> {
    let path = config_file_path()?;

    if !path.exists() {
        tracing::debug!(?path, "config file not found, using defaults");
        return Ok(AppConfig::default());
    }

    load_config_from(&path)
}

/// Load the application config from a specific file path.
pub fn load_config_from(path: &Path) -> Result<AppConfig> {
    let content = std::fs::read_to_string(path).map_err(|e| BlogsmithError::io(path, e))?;

    toml::from_str(&content).map_err(|e| {
        BlogsmithError::config(format!("failed to parse {}: {e}", path.display()))
    })
}

/// Create the config directory and write a default config file.
/// Returns the path to the created file.
pub fn init_config() -> Result<PathBuf> {
    let dir = config_dir()?;
    std::fs::create_dir_all(&dir).map_err(|e| BlogsmithError::io(&dir, e))?;

    let path = dir.join(CONFIG_FILE_NAME);
    let config = AppConfig::default();
    let content =
        toml::to_string_pretty(&config).map_err(|e| BlogsmithError::config(e.to_string()))?;

    std::fs::write(&path, content).map_err(|e| BlogsmithError::io(&path, e))?;
    tracing::info!(?path, "created default config file");

    Ok(path)
}

/// Resolve an API key through the env var named in config.
pub fn resolve_api_key(var_name: &str) -> Result<String> {
    match std::env::var(var_name) {
        Ok(val) if !val.is_empty() => Ok(val),
        _ => Err(BlogsmithError::config(format!(
            "API key not found. Set the {var_name} environment variable."
        ))),
    }
}

/// Check that the generative-provider API key env var is set and non-empty.
pub fn validate_api_key(config: &AppConfig) -> Result<()> {
    resolve_api_key(&config.ai.api_key_env).map(|_| ())
}
