//! TOML file backed settings store.

use std::{
    fs, io,
    path::PathBuf,
    sync::{Mutex, PoisonError},
};

#[cfg(unix)]
use nix::fcntl::{Flock, FlockArg};
use toml::Value;
use tracing::debug;

use super::{SettingsError, SettingsSnapshot, SettingsStore, merge_into};
use crate::persist::write_atomically;

/// Settings persisted as a flat TOML table of strings.
///
/// A missing file reads as an empty store. Hand-edited scalar values (`port = 1883`) are accepted
/// and read back as strings. Writes replace the file atomically and hold an advisory lock on a
/// `.lock` sibling, which also serializes them against other processes such as the CLI.
#[derive(Debug)]
pub struct FileSettings {
    path: PathBuf,
    write_lock: Mutex<()>,
}

impl FileSettings {
    #[must_use]
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            write_lock: Mutex::new(()),
        }
    }

    /// The settings file itself is replaced on every write, so the lock lives next to it.
    #[cfg(unix)]
    fn lock_path(&self) -> PathBuf {
        let mut name = self.path.as_os_str().to_owned();
        name.push(".lock");
        PathBuf::from(name)
    }

    /// Blocks until no other process is writing the settings file.
    #[cfg(unix)]
    fn lock_exclusive(&self) -> Result<Flock<fs::File>, SettingsError> {
        let lock_path = self.lock_path();
        let file = fs::OpenOptions::new()
            .create(true)
            .truncate(false)
            .write(true)
            .open(&lock_path)
            .map_err(|source| SettingsError::Write {
                path: lock_path.clone(),
                source,
            })?;
        Flock::lock(file, FlockArg::LockExclusive).map_err(|(_, errno)| SettingsError::Write {
            path: lock_path,
            source: io::Error::from(errno),
        })
    }

    /// Runs `update` on the current contents while holding both the process and the file lock.
    fn locked_update<T>(
        &self,
        update: impl FnOnce(&mut SettingsSnapshot) -> (bool, T),
    ) -> Result<T, SettingsError> {
        let _guard = self.write_lock.lock().unwrap_or_else(PoisonError::into_inner);
        self.ensure_parent()?;
        #[cfg(unix)]
        let _file_lock = self.lock_exclusive()?;
        let mut map = self.read()?;
        let (changed, result) = update(&mut map);
        if changed {
            self.write(&map)?;
        } else {
            // Skipping the write keeps file watchers from seeing a change that isn't one.
            debug!(path = %self.path.display(), "Settings unchanged, not writing");
        }
        Ok(result)
    }

    fn ensure_parent(&self) -> Result<(), SettingsError> {
        if let Some(parent) = self.path.parent()
            && !parent.as_os_str().is_empty()
        {
            fs::create_dir_all(parent).map_err(|source| SettingsError::Write {
                path: self.path.clone(),
                source,
            })?;
        }
        Ok(())
    }

    fn read(&self) -> Result<SettingsSnapshot, SettingsError> {
        let content = match fs::read_to_string(&self.path) {
            Ok(content) => content,
            Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(SettingsSnapshot::new()),
            Err(source) => {
                return Err(SettingsError::Read {
                    path: self.path.clone(),
                    source,
                });
            }
        };
        let table: toml::Table = toml::from_str(&content).map_err(|source| SettingsError::Parse {
            path: self.path.clone(),
            source,
        })?;
        table
            .into_iter()
            .map(|(key, value)| {
                let value = match value {
                    Value::String(s) => s,
                    Value::Integer(i) => i.to_string(),
                    Value::Float(f) => f.to_string(),
                    Value::Boolean(b) => b.to_string(),
                    Value::Datetime(d) => d.to_string(),
                    Value::Array(_) | Value::Table(_) => {
                        return Err(SettingsError::NotScalar {
                            path: self.path.clone(),
                            key,
                        });
                    }
                };
                Ok((key, value))
            })
            .collect()
    }

    fn write(&self, map: &SettingsSnapshot) -> Result<(), SettingsError> {
        let content = toml::to_string(map)?;
        write_atomically(&self.path, content.as_bytes(), true).map_err(|source| {
            SettingsError::Write {
                path: self.path.clone(),
                source,
            }
        })
    }
}

impl SettingsStore for FileSettings {
    fn snapshot(&self) -> Result<SettingsSnapshot, SettingsError> {
        self.read()
    }

    fn set_many(&self, entries: &[(&str, &str)]) -> Result<(), SettingsError> {
        self.locked_update(|map| (merge_into(map, entries), ()))
    }

    fn remove(&self, key: &str) -> Result<bool, SettingsError> {
        self.locked_update(|map| {
            let removed = map.remove(key).is_some();
            (removed, removed)
        })
    }
}
