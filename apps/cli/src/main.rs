//! Stargazer CLI — starred-repository documentation pipeline.
//!
//! Watches a GitHub account's starred repositories and turns each new star
//! into a refined Markdown document.

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
