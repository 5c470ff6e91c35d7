use crate::core::error::{Error, Result};
use crate::core::policy::Platform;
use crate::utils::get_config_dir;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use tracing::debug;

/// Settings shared by every render, loaded from `config.json`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct AppConfig {
    /// Terms expiring within this many weeks are reported at info level
    #[serde(default = "default_exp_info_weeks")]
    pub exp_info_weeks: u32,
    /// Directory holding `.net` / `.svc` definition files
    #[serde(default = "default_definitions_dir")]
    pub definitions_dir: PathBuf,
    /// Directory rendered artifacts are written to
    #[serde(default = "default_output_dir")]
    pub output_dir: PathBuf,
    /// Backends rendered when `--backend` is not given
    #[serde(default = "default_backends")]
    pub backends: Vec<Platform>,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            exp_info_weeks: default_exp_info_weeks(),
            definitions_dir: default_definitions_dir(),
            output_dir: default_output_dir(),
            backends: default_backends(),
        }
    }
}

fn default_exp_info_weeks() -> u32 {
    2
}

fn default_definitions_dir() -> PathBuf {
    PathBuf::from("def")
}

fn default_output_dir() -> PathBuf {
    PathBuf::from("filters")
}

fn default_backends() -> Vec<Platform> {
    vec![Platform::Arista, Platform::OpenConfig]
}

/// Path of the per-user config file, if the platform has a config dir.
pub fn default_config_path() -> Option<PathBuf> {
    get_config_dir().map(|dir| dir.join("config.json"))
}

/// Parses a config document; absent fields take their defaults.
///
/// # Errors
///
/// [`Error::Config`] for malformed JSON or unknown fields.
pub fn parse_config(json: &str) -> Result<AppConfig> {
    serde_json::from_str(json).map_err(|e| Error::Config(e.to_string()))
}

/// Loads the config from `path`, or from the per-user config file when
/// `path` is `None`.
///
/// A missing per-user file yields the defaults. An explicitly given path
/// must exist.
///
/// # Errors
///
/// [`Error::Config`] for a malformed file, [`Error::Io`] when an explicit
/// path cannot be read.
pub fn load_config(path: Option<&Path>) -> Result<AppConfig> {
    if let Some(path) = path {
        let json = std::fs::read_to_string(path)?;
        return parse_config(&json);
    }

    if let Some(path) = default_config_path()
        && path.exists()
    {
        debug!("Loading config from {}", path.display());
        let json = std::fs::read_to_string(&path)?;
        return parse_config(&json);
    }

    Ok(AppConfig::default())
}
