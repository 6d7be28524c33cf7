use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use request_interceptor::config::load_options_from_path;
use request_interceptor::InstallOptions;
use tracing::{info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

pub fn init_logging(level: &str, debug: bool) -> Result<()> {
    let level = if debug {
        tracing::Level::DEBUG
    } else {
        level.parse().context("Invalid log level")?
    };

    // stdout carries command output; diagnostics go to stderr.
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(level.to_string())),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    Ok(())
}

pub struct LoadedOptions {
    pub options: InstallOptions,
    pub path: Option<PathBuf>,
}

pub fn load_options(config_path: Option<&PathBuf>) -> Result<LoadedOptions> {
    let config_path = match config_path {
        Some(path) => path.clone(),
        None => match default_config_path() {
            Some(path) => path,
            None => {
                info!("No gate configuration found, using defaults");
                return Ok(LoadedOptions {
                    options: InstallOptions::default(),
                    path: None,
                });
            }
        },
    };

    if !config_path.exists() {
        warn!(
            "Config file not found, using defaults: {}",
            config_path.display()
        );
        return Ok(LoadedOptions {
            options: InstallOptions::default(),
            path: None,
        });
    }

    let options = load_options_from_path(&config_path)
        .with_context(|| format!("Failed to load gate options from {}", config_path.display()))?;
    info!("Loaded gate options from: {}", config_path.display());
    Ok(LoadedOptions {
        options,
        path: Some(config_path),
    })
}

// Priority: ./config/reqgate.yaml > ~/.config/reqgate/config.yaml
fn default_config_path() -> Option<PathBuf> {
    let local = Path::new("config/reqgate.yaml");
    if local.exists() {
        return Some(local.to_path_buf());
    }
    let mut path = dirs::config_dir()?;
    path.push("reqgate");
    path.push("config.yaml");
    path.exists().then_some(path)
}
