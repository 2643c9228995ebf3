//! Settings accessor: a flat, persistent string-to-string store with documented defaults.
//!
//! The store is shared between the checkpoint synchronizer, the configuration builder and the
//! `settings` CLI (the settings-entry flow). Every key is optional; [`defaults`] documents what an
//! absent key means.

mod file_store;
mod memory;

use std::{collections::BTreeMap, io, path::PathBuf};

use brokerctl_common::UnwrapToStringExt as _;
use thiserror::Error as ThisError;

pub use file_store::FileSettings;
pub use memory::MemorySettings;

/// Full view of the store at one point in time.
pub type SettingsSnapshot = BTreeMap<String, String>;

/// Keys understood by the controller.
pub mod keys {
    pub const HOST: &str = "host";
    pub const PORT: &str = "port";
    pub const USERNAME: &str = "username";
    pub const PASSWORD: &str = "password";
    pub const MESSAGE_SIZE: &str = "netty.mqtt.message_size";
    pub const WAKE_LOCK_DURATION: &str = "wakelockduration";
    /// Written once the settings-entry flow saved something; decides first-run detection.
    pub const CONFIGURED: &str = "configured";
}

/// Values used when a key is absent.
pub mod defaults {
    pub const HOST: &str = "192.168.5.10";
    pub const PORT: &str = "61613";
    pub const USERNAME: &str = "admin";
    /// Only applied when the password policy allows it.
    pub const PASSWORD: &str = "password";
    pub const MESSAGE_SIZE: &str = "999999999";
    pub const WAKE_LOCK_DURATION: &str = "2";
}

/// Errors raised by settings stores.
#[derive(Debug, ThisError)]
pub enum SettingsError {
    #[error("Failed to read settings file at {}", path.display())]
    Read {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
    #[error("Failed to parse settings file at {} as TOML", path.display())]
    Parse {
        path: PathBuf,
        #[source]
        source: toml::de::Error,
    },
    #[error("Setting '{key}' in {} is not a scalar value", path.display())]
    NotScalar { path: PathBuf, key: String },
    #[error("Failed to serialize settings")]
    Serialize(#[from] toml::ser::Error),
    #[error("Failed to write settings file at {}", path.display())]
    Write {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
}

/// Key-value get/set by string key, surviving restarts.
pub trait SettingsStore: Send + Sync {
    /// Reads every key at once.
    ///
    /// # Errors
    ///
    /// Returns an error if the backing storage cannot be read.
    fn snapshot(&self) -> Result<SettingsSnapshot, SettingsError>;

    /// Writes all `entries` in one go. Keys not mentioned are left alone.
    ///
    /// # Errors
    ///
    /// Returns an error if the backing storage cannot be read or written.
    fn set_many(&self, entries: &[(&str, &str)]) -> Result<(), SettingsError>;

    /// Removes `key`, returning whether it was present.
    ///
    /// # Errors
    ///
    /// Returns an error if the backing storage cannot be read or written.
    fn remove(&self, key: &str) -> Result<bool, SettingsError>;

    /// # Errors
    ///
    /// Returns an error if the backing storage cannot be read.
    fn get(&self, key: &str) -> Result<Option<String>, SettingsError> {
        Ok(self.snapshot()?.remove(key))
    }

    /// # Errors
    ///
    /// Returns an error if the backing storage cannot be read or written.
    fn set(&self, key: &str, value: &str) -> Result<(), SettingsError> {
        self.set_many(&[(key, value)])
    }
}

/// Reads `key` from a snapshot, falling back to `default`.
#[must_use]
pub fn value_or(snapshot: &SettingsSnapshot, key: &str, default: &str) -> String {
    snapshot.get(key).unwrap_or_to_string(default)
}

/// Whether the controller has never been configured.
///
/// An explicit [`keys::CONFIGURED`] flag decides when present. Stores written before the flag
/// existed fall back to "empty means first run".
#[must_use]
pub fn is_first_run(snapshot: &SettingsSnapshot) -> bool {
    match snapshot.get(keys::CONFIGURED) {
        Some(flag) => flag != "true",
        None => snapshot.is_empty(),
    }
}

/// Applies `entries` to `map`, returning whether anything changed.
fn merge_into(map: &mut SettingsSnapshot, entries: &[(&str, &str)]) -> bool {
    let mut changed = false;
    for &(key, value) in entries {
        if map.get(key).map(String::as_str) != Some(value) {
            map.insert(key.to_owned(), value.to_owned());
            changed = true;
        }
    }
    changed
}
