//! keyplan CLI: keyword strategies and articles for a blog concept.
//!
//! Proposes keyword groups with Gemini, attaches search volume and
//! competition from the metrics provider, and drafts articles per group.

mod commands;
mod files;

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
