//! PitchPerfect Control - CLI for practice sessions, progress and scores

use anyhow::Result;
use clap::Parser;
use pitchctl::cli::Cli;
use pitchctl::{commands, logging, PitchConfig};
use tracing::debug;

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let mut config = PitchConfig::load()?;
    if let Some(dir) = cli.data_dir {
        config.store.data_dir = dir;
    }

    logging::init(&config.logging.level);
    debug!("pitchctl v{} using {}", env!("CARGO_PKG_VERSION"), config.store.data_dir.display());

    commands::run(cli.command, config).await
}
