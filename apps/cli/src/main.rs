//! blogsmith CLI — multi-agent blog generation and crawl digests.
//!
//! Sequences search, planning, writing, and review agents over hosted
//! AI/search APIs, with checkpoint/resume between steps.

mod commands;

use clap::Parser;
use color_eyre::eyre::Result;

use commands::Cli;

#[tokio::main]
async fn main() -> Result<()> {
    color_eyre::install()?;
    let cli = Cli::parse();
    commands::init_tracing(&cli);
    commands::run(cli).await
}
