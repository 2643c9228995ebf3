//! Reading the controller config from disk.

use std::path::{Path, PathBuf};

use eyre::WrapErr as _;
use tokio::fs;

use crate::config::{ControllerConfig, resolve_config_relative_paths};

/// Reads and parses the controller config from a TOML file.
///
/// # Errors
///
/// Returns an error if the config file cannot be read or parsed.
pub async fn load<P: AsRef<Path>>(path: P) -> eyre::Result<ControllerConfig> {
    let path_ref = path.as_ref();
    let content = fs::read_to_string(&path).await.wrap_err(format!(
        "Failed to read config file at: {}",
        path_ref.display()
    ))?;
    let config: ControllerConfig = toml::from_str(&content).wrap_err(format!(
        "Failed to parse config as TOML at: {}",
        path_ref.display()
    ))?;
    Ok(config)
}

/// Storage locations with relative entries resolved against the config file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolvedPaths {
    pub settings_path: PathBuf,
    pub data_dir: PathBuf,
}

impl ResolvedPaths {
    #[must_use]
    pub fn new(config_path: &Path, config: &ControllerConfig) -> Self {
        Self {
            settings_path: resolve_config_relative_paths(
                config_path,
                &config.storage.settings_path,
            ),
            data_dir: resolve_config_relative_paths(config_path, &config.storage.data_dir),
        }
    }

    /// Where the supervisor writes the configuration of each START.
    #[must_use]
    pub fn broker_config_path(&self) -> PathBuf {
        self.data_dir.join("broker.json")
    }
}
