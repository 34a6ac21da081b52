//! CLI command definitions, routing, and tracing setup.

use std::path::PathBuf;

use clap::{Parser, Subcommand};
use color_eyre::eyre::{Result, eyre};
use indicatif::{ProgressBar, ProgressStyle};
use tracing::info;

use blogsmith_agents::{AgentSet, ToneLearner, ToneProfile};
use blogsmith_ai::GenerationClient;
use blogsmith_core::pipeline::{Orchestrator, ProgressReporter};
use blogsmith_core::{CheckpointManager, checkpoint, run_digest};
use blogsmith_crawler::{CrawlSource, NotesClient, PatternCrawler};
use blogsmith_shared::{
    AppConfig, RetryPolicy, WorkflowId, WorkflowState, WorkflowStep, init_config, load_config,
    resolve_api_key, validate_api_key,
};
use blogsmith_storage::Storage;

// ---------------------------------------------------------------------------
// CLI structure
// ---------------------------------------------------------------------------

/// blogsmith — multi-agent blog generation from a keyword set.
#[derive(Parser)]
#[command(
    name = "blogsmith",
    version,
    about = "Generate reviewed blog posts from keywords, or crawl and digest sources into your notes.",
    long_about = None,
)]
pub(crate) struct Cli {
    /// Log format: text (default) or json.
    #[arg(long, default_value = "text", global = true)]
    pub log_format: LogFormat,

    /// Verbosity level (-v, -vv, -vvv).
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    #[command(subcommand)]
    pub command: Command,
}

/// Log output format.
#[derive(Clone, Debug, clap::ValueEnum)]
pub(crate) enum LogFormat {
    Text,
    Json,
}

/// Top-level CLI subcommands.
#[derive(Subcommand)]
pub(crate) enum Command {
    /// Generate a complete blog post from keywords.
    Generate {
        /// Search keywords or topic (comma-separated phrases fan out).
        #[arg(short, long)]
        keywords: Option<String>,

        /// Workflow id to resume from its latest checkpoint.
        #[arg(short, long)]
        resume: Option<String>,

        /// Output directory (defaults to config).
        #[arg(short, long)]
        out: Option<String>,
    },

    /// Execute only the search step.
    SearchOnly {
        /// Search keywords.
        #[arg(short, long)]
        keywords: String,

        /// Output directory (defaults to config).
        #[arg(short, long)]
        out: Option<String>,
    },

    /// Analyze tone from a reference file.
    AnalyzeTone {
        /// Reference file to analyze.
        #[arg(short, long)]
        file: String,
    },

    /// List workflow runs and their checkpoints.
    ListWorkflows {
        /// Output directory (defaults to config).
        #[arg(short, long)]
        out: Option<String>,
    },

    /// Crawl a pattern source, summarize pages, and upload digests.
    Crawl {
        /// Crawl source definition (TOML).
        #[arg(short, long)]
        source: PathBuf,

        /// Notes database to upload into (defaults to config; omit both to
        /// skip uploading).
        #[arg(short, long)]
        database: Option<String>,

        /// Output directory (defaults to config).
        #[arg(short, long)]
        out: Option<String>,
    },

    /// Configuration management.
    Config {
        /// Config subcommand.
        #[command(subcommand)]
        action: ConfigAction,
    },
}

/// Config subcommands.
#[derive(Subcommand)]
pub(crate) enum ConfigAction {
    /// Initialize config file with defaults.
    Init,
    /// Show resolved configuration.
    Show,
}

// ---------------------------------------------------------------------------
// Tracing setup
// ---------------------------------------------------------------------------

/// Initialize tracing based on CLI flags.
pub(crate) fn init_tracing(cli: &Cli) {
    use tracing_subscriber::{EnvFilter, fmt};

    let filter = match cli.verbose {
        0 => "blogsmith=info",
        1 => "blogsmith=debug",
        _ => "blogsmith=trace",
    };

    let env_filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(filter));

    match cli.log_format {
        LogFormat::Text => {
            fmt()
                .with_env_filter(env_filter)
                .with_target(false)
                .init();
        }
        LogFormat::Json => {
            fmt()
                .json()
                .with_env_filter(env_filter)
                .init();
        }
    }
}

// ---------------------------------------------------------------------------
// Command dispatch
// ---------------------------------------------------------------------------

/// Run the CLI command.
pub(crate) async fn run(cli: Cli) -> Result<()> {
    match cli.command {
        Command::Generate {
            keywords,
            resume,
            out,
        } => cmd_generate(keywords.as_deref(), resume.as_deref(), out.as_deref()).await,
        Command::SearchOnly { keywords, out } => {
            cmd_search_only(&keywords, out.as_deref()).await
        }
        Command::AnalyzeTone { file } => cmd_analyze_tone(&file).await,
        Command::ListWorkflows { out } => cmd_list_workflows(out.as_deref()).await,
        Command::Crawl {
            source,
            database,
            out,
        } => cmd_crawl(&source, database.as_deref(), out.as_deref()).await,
        Command::Config { action } => match action {
            ConfigAction::Init => cmd_config_init().await,
            ConfigAction::Show => cmd_config_show().await,
        },
    }
}

/// Resolve the output root from flag or config.
fn output_root(config: &AppConfig, out: Option<&str>) -> PathBuf {
    match out {
        Some(path) => PathBuf::from(path),
        None => PathBuf::from(&config.defaults.output_dir),
    }
}

/// Load the tone profile when configured; tone failures never block a run.
async fn load_tone_profile(
    config: &AppConfig,
    storage: Option<&Storage>,
) -> Option<ToneProfile> {
    if !config.agents.apply_tone {
        return None;
    }
    let reference = config.defaults.reference_file.as_ref()?;
    let reference = PathBuf::from(reference);
    if !reference.exists() {
        info!(path = %reference.display(), "reference file not found, writing without tone");
        return None;
    }

    let retry = RetryPolicy::from(&config.retry);
    let ai = match GenerationClient::new(&config.ai, retry) {
        Ok(ai) => ai,
        Err(_) => return None,
    };

    match ToneLearner::new(ai).analyze(&reference, storage).await {
        Ok(profile) => Some(profile),
        Err(e) => {
            tracing::warn!(error = %e, "tone analysis failed, writing without tone");
            None
        }
    }
}

async fn cmd_generate(
    keywords: Option<&str>,
    resume: Option<&str>,
    out: Option<&str>,
) -> Result<()> {
    let config = load_config()?;
    validate_api_key(&config)?;

    let resume_id: Option<WorkflowId> = match resume {
        Some(raw) => Some(
            raw.parse()
                .map_err(|e| eyre!("invalid workflow id '{raw}': {e}"))?,
        ),
        None => None,
    };

    let keywords = match (keywords, &resume_id) {
        (Some(k), _) => k.to_string(),
        (None, Some(_)) => String::new(), // taken from the checkpoint
        (None, None) => return Err(eyre!("--keywords is required for a new workflow")),
    };

    let root = output_root(&config, out);
    let tone = {
        let storage = Storage::open(&root.join("index").join("blogsmith.db")).await?;
        load_tone_profile(&config, Some(&storage)).await
    };
    let agents = AgentSet::from_config(&config, tone)?;
    let orchestrator = Orchestrator::new(&root, agents).await?;

    info!(keywords, resuming = resume_id.is_some(), "generating blog post");

    let reporter = CliProgress::new();
    let state = orchestrator
        .run(&keywords, resume_id.as_ref(), &reporter)
        .await?;
    reporter.finish();

    let final_text = state.final_text.as_deref().unwrap_or_default();
    println!();
    println!("  Blog post generated!");
    println!("  Workflow: {}", state.workflow_id);
    println!("  Topic:    {}", state.keywords);
    println!("  Words:    {}", final_text.split_whitespace().count());
    println!(
        "  Sections: {}",
        state.plan.as_ref().map_or(0, |p| p.sections.len())
    );
    println!(
        "  Sources:  {}",
        state.search_results.as_ref().map_or(0, Vec::len)
    );
    println!(
        "  Path:     {}",
        orchestrator.artifact_dir(&state.workflow_id).display()
    );
    println!();

    Ok(())
}

async fn cmd_search_only(keywords: &str, out: Option<&str>) -> Result<()> {
    let config = load_config()?;
    validate_api_key(&config)?;

    let root = output_root(&config, out);
    let agents = AgentSet::from_config(&config, None)?;
    let orchestrator = Orchestrator::new(&root, agents).await?;

    let reporter = CliProgress::new();
    let articles = orchestrator.search_only(keywords, &reporter).await?;
    reporter.finish();

    println!();
    println!("  Selected {} article(s):", articles.len());
    for (idx, article) in articles.iter().enumerate() {
        println!("  {}. {} ({:.2})", idx + 1, article.title, article.relevance_score);
        println!("     {}", article.url);
    }
    println!();

    Ok(())
}

async fn cmd_analyze_tone(file: &str) -> Result<()> {
    let config = load_config()?;
    validate_api_key(&config)?;

    let retry = RetryPolicy::from(&config.retry);
    let ai = GenerationClient::new(&config.ai, retry)?;

    info!(file, "analyzing tone");
    let profile = ToneLearner::new(ai)
        .analyze(&PathBuf::from(file), None)
        .await?;

    println!();
    println!("  Tone analysis complete!");
    println!("  Characteristics: {}", profile.characteristics);
    println!("  Vocabulary:      {}", profile.vocabulary);
    println!("  Patterns:        {}", profile.patterns);
    println!("  Style:           {}", profile.style);
    println!();

    Ok(())
}

async fn cmd_list_workflows(out: Option<&str>) -> Result<()> {
    let config = load_config()?;
    let root = output_root(&config, out);

    let storage = Storage::open(&root.join("index").join("blogsmith.db")).await?;
    let rows = storage.list_workflows().await?;

    if rows.is_empty() {
        println!("No workflows found under {}", root.display());
        return Ok(());
    }

    let checkpoints = CheckpointManager::open(checkpoint::checkpoint_dir(&root))?;

    println!();
    println!("  {} workflow(s):", rows.len());
    for row in rows {
        let resumable = row
            .id
            .parse::<WorkflowId>()
            .ok()
            .and_then(|id| checkpoints.latest(&id).ok());
        let marker = match resumable {
            Some(id) => format!("checkpoint {id}"),
            None => "no checkpoint".to_string(),
        };
        println!(
            "  {}  [{}]  {}  ({marker})",
            row.id, row.status, row.keywords
        );
    }
    println!();

    Ok(())
}

async fn cmd_crawl(source: &PathBuf, database: Option<&str>, out: Option<&str>) -> Result<()> {
    let config = load_config()?;
    validate_api_key(&config)?;

    let source = CrawlSource::load(source)?;
    let root = output_root(&config, out);
    let retry = RetryPolicy::from(&config.retry);

    let crawler = PatternCrawler::new(config.crawl.clone())?;
    let ai = GenerationClient::new(&config.ai, retry)?;

    // Upload only when a database id is available from flag or config
    let database_id = database
        .map(String::from)
        .or_else(|| config.notes.database_id.clone());
    let notes = match &database_id {
        Some(_) => {
            let key = resolve_api_key(&config.notes.api_key_env)?;
            Some(NotesClient::new(key, retry)?)
        }
        None => None,
    };

    info!(
        base_url = %source.base_url,
        upload = database_id.is_some(),
        "starting crawl digest"
    );

    let reporter = CliProgress::new();
    let result = run_digest(
        &source,
        &crawler,
        &ai,
        notes.as_ref().zip(database_id.as_deref()),
        &root,
        &reporter,
    )
    .await?;
    reporter.finish();

    println!();
    println!("  Crawl digest complete!");
    println!("  Crawled:  {}", result.pages_crawled);
    println!("  Digests:  {}", result.digests_written);
    println!("  Uploaded: {}", result.pages_uploaded);
    println!("  Path:     {}", result.artifact_dir.display());
    println!();

    Ok(())
}

async fn cmd_config_init() -> Result<()> {
    let path = init_config()?;
    println!("Config initialized at: {}", path.display());
    Ok(())
}

async fn cmd_config_show() -> Result<()> {
    let config: AppConfig = load_config()?;
    let toml_str = toml::to_string_pretty(&config)?;
    println!("{toml_str}");
    Ok(())
}

// ---------------------------------------------------------------------------
// CLI progress reporter
// ---------------------------------------------------------------------------

/// CLI progress reporter using an indicatif spinner.
struct CliProgress {
    spinner: ProgressBar,
}

impl CliProgress {
    fn new() -> Self {
        let spinner = ProgressBar::new_spinner();
        spinner.set_style(
            ProgressStyle::with_template("{spinner:.cyan} {msg}")
                .unwrap()
                .tick_strings(&["⠋", "⠙", "⠹", "⠸", "⠼", "⠴", "⠦", "⠧", "⠇", "⠏"]),
        );
        spinner.enable_steady_tick(std::time::Duration::from_millis(80));
        Self { spinner }
    }

    fn finish(&self) {
        self.spinner.finish_and_clear();
    }
}

impl ProgressReporter for CliProgress {
    fn phase(&self, name: &str) {
        self.spinner.set_message(name.to_string());
    }

    fn step_started(&self, step: WorkflowStep) {
        let label = match step {
            WorkflowStep::Search => "Searching for articles...",
            WorkflowStep::Plan => "Planning the post...",
            WorkflowStep::Write => "Writing the draft...",
            WorkflowStep::Review => "Reviewing and refining...",
            WorkflowStep::Done => "Done",
        };
        self.spinner.set_message(label.to_string());
    }

    fn step_completed(&self, step: WorkflowStep) {
        self.spinner.println(format!("  ✓ {step}"));
    }

    fn done(&self, _state: &WorkflowState) {
        self.spinner.finish_and_clear();
    }
}
