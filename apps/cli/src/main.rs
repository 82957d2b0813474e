//! SchemaScribe CLI: catalog builder for upstream schema services.
//!
//! Mirrors an upstream schema graph into a local searchable catalog and
//! fills it with model-written descriptions.

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
