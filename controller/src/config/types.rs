//! Configuration data types for the controller.
//!
//! Every section and field has a default, so an empty file is a valid configuration.

use std::path::{Component, Path, PathBuf};

use serde::Deserialize;

use crate::broker_config::PasswordPolicy;

/// Root of `brokerctl.toml`.
#[derive(Debug, Deserialize, Default, Clone, PartialEq, Eq)]
pub struct ControllerConfig {
    #[serde(default)]
    pub server: ServerConfig,
    #[serde(default)]
    pub storage: StorageConfig,
    #[serde(default)]
    pub broker: BrokerSection,
}

/// Local control API listener.
#[derive(Debug, Deserialize, Clone, PartialEq, Eq)]
pub struct ServerConfig {
    #[serde(default = "default_port")]
    pub port: u16,
    #[serde(default = "default_bind")]
    pub bind: String,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            port: default_port(),
            bind: default_bind(),
        }
    }
}

/// Where settings and generated files live.
///
/// Paths in the config are interpreted relative to the config file when not absolute.
#[derive(Debug, Deserialize, Clone, PartialEq, Eq)]
pub struct StorageConfig {
    /// The user-editable settings store.
    #[serde(default = "default_settings_path")]
    pub settings_path: String,
    /// Private directory for the credential file and the serialized broker configuration.
    #[serde(default = "default_data_dir")]
    pub data_dir: String,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            settings_path: default_settings_path(),
            data_dir: default_data_dir(),
        }
    }
}

#[derive(Debug, Deserialize, Clone, PartialEq, Eq)]
pub struct BrokerSection {
    /// Shell command running the broker in the foreground.
    #[serde(default = "default_broker_command")]
    pub command: String,
    /// Start with the default password instead of refusing when none is set.
    #[serde(default)]
    pub allow_default_password: bool,
    /// Start the broker right after the `create` checkpoint.
    #[serde(default)]
    pub autostart: bool,
}

impl Default for BrokerSection {
    fn default() -> Self {
        Self {
            command: default_broker_command(),
            allow_default_password: false,
            autostart: false,
        }
    }
}

impl BrokerSection {
    #[must_use]
    pub const fn password_policy(&self) -> PasswordPolicy {
        PasswordPolicy::from_allow_default(self.allow_default_password)
    }
}

const fn default_port() -> u16 {
    7878
}

fn default_bind() -> String {
    "127.0.0.1".to_string()
}

fn default_settings_path() -> String {
    "./settings.toml".to_string()
}

fn default_data_dir() -> String {
    "./data".to_string()
}

fn default_broker_command() -> String {
    "moquette".to_string()
}

/// Resolves a path to an absolute one.
///
/// If the path is absolute, returns it as-is. If relative, joins it with the
/// config file's parent directory and normalizes the result to remove redundant
/// components like `./`.
#[must_use]
pub fn resolve_config_relative_paths(config_path: &Path, relative_path: &str) -> PathBuf {
    let path = Path::new(relative_path);
    let resolved = if path.is_absolute() {
        path.to_path_buf()
    } else {
        config_path
            .parent()
            .map_or_else(|| path.to_path_buf(), |d| d.join(path))
    };

    // The target may not exist yet, so no canonicalize().
    normalize_path(&resolved)
}

fn normalize_path(path: &Path) -> PathBuf {
    let mut result = PathBuf::new();
    for component in path.components() {
        use Component as C;
        match component {
            C::Normal(c) => {
                result.push(c);
            }
            C::ParentDir => {
                result.pop();
            }
            C::CurDir => {}
            C::RootDir | C::Prefix(_) => {
                result.push(component);
            }
        }
    }
    result
}
