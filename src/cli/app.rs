use anyhow::Result;
use clap::Parser;
use tracing::{debug, error, info};

use super::dispatch::dispatch;
use super::env::CliArgs;
use super::runtime::{init_logging, load_options};

pub async fn run() -> Result<()> {
    let cli = CliArgs::parse();

    init_logging(&cli.log_level, cli.debug)?;

    info!("Starting reqgate v{}", env!("CARGO_PKG_VERSION"));

    let loaded = load_options(cli.config.as_ref())?;
    if let Some(path) = &loaded.path {
        debug!(path = %path.display(), "using gate options file");
    }

    match dispatch(&cli, loaded).await {
        Ok(()) => {
            info!("Command completed successfully");
            Ok(())
        }
        Err(err) => {
            error!("Command failed: {}", err);
            Err(err)
        }
    }
}
