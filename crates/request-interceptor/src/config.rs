//! Installation options and their on-disk representation.

use std::fs::File;
use std::io::Read;
use std::path::Path;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::permission::GatePolicy;

pub const DEFAULT_READY_EVENT: &str = "DOMContentLoaded";

/// Options accepted by [`crate::install`].
///
/// Option files may use either snake_case keys or the camelCase names page scripts
/// traditionally pass (`readyEvent`, `whiteList`, `allowCurrentHost`).
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct InstallOptions {
    #[serde(alias = "readyEvent")]
    pub ready_event: String,
    #[serde(alias = "whiteList")]
    pub whitelist: Vec<String>,
    #[serde(alias = "allowCurrentHost")]
    pub allow_current_host: bool,
    /// Host name of the page the gate is installed into. Empty when the page has no
    /// network origin, in which case the current-host exemption never applies.
    #[serde(alias = "currentHost")]
    pub current_host: String,
}

impl Default for InstallOptions {
    fn default() -> Self {
        Self {
            ready_event: DEFAULT_READY_EVENT.to_string(),
            whitelist: Vec::new(),
            allow_current_host: false,
            current_host: String::new(),
        }
    }
}

impl InstallOptions {
    pub fn with_ready_event(mut self, event: impl Into<String>) -> Self {
        self.ready_event = event.into();
        self
    }

    pub fn with_whitelist<I, S>(mut self, entries: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.whitelist = entries.into_iter().map(Into::into).collect();
        self
    }

    pub fn with_current_host(mut self, host: impl Into<String>) -> Self {
        self.current_host = host.into();
        self
    }

    pub fn allow_current_host(mut self, allow: bool) -> Self {
        self.allow_current_host = allow;
        self
    }

    pub fn policy(&self) -> GatePolicy {
        GatePolicy {
            whitelist: self.whitelist.clone(),
            allow_current_host: self.allow_current_host,
            current_host: self.current_host.clone(),
        }
    }
}

/// Errors surfaced while loading an options file.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
    #[error("failed to deserialize install options: {0}")]
    Deserialize(String),
}

pub fn load_options_from_reader<R: Read>(mut reader: R) -> Result<InstallOptions, ConfigError> {
    let mut buf = String::new();
    reader.read_to_string(&mut buf)?;
    parse_options_str(&buf)
}

pub fn load_options_from_path(path: impl AsRef<Path>) -> Result<InstallOptions, ConfigError> {
    let file = File::open(path.as_ref())?;
    load_options_from_reader(file)
}

pub fn parse_options_str(raw: &str) -> Result<InstallOptions, ConfigError> {
    match serde_json::from_str(raw) {
        Ok(options) => Ok(options),
        Err(json_err) => serde_yaml::from_str(raw).map_err(|yaml_err| {
            ConfigError::Deserialize(format!(
                "json error: {}; yaml error: {}",
                json_err, yaml_err
            ))
        }),
    }
}
