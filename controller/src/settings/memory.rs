use std::sync::{Mutex, PoisonError};

use super::{SettingsError, SettingsSnapshot, SettingsStore, merge_into};

/// Volatile store, for embedding and tests.
#[derive(Debug, Default)]
pub struct MemorySettings {
    inner: Mutex<SettingsSnapshot>,
}

impl MemorySettings {
    #[must_use]
    pub fn new(initial: SettingsSnapshot) -> Self {
        Self {
            inner: Mutex::new(initial),
        }
    }

    /// Convenience constructor from literal pairs.
    #[must_use]
    pub fn from_pairs(pairs: &[(&str, &str)]) -> Self {
        Self::new(
            pairs
                .iter()
                .map(|&(k, v)| (k.to_owned(), v.to_owned()))
                .collect(),
        )
    }
}

impl SettingsStore for MemorySettings {
    fn snapshot(&self) -> Result<SettingsSnapshot, SettingsError> {
        Ok(self
            .inner
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone())
    }

    fn set_many(&self, entries: &[(&str, &str)]) -> Result<(), SettingsError> {
        let mut guard = self.inner.lock().unwrap_or_else(PoisonError::into_inner);
        merge_into(&mut guard, entries);
        Ok(())
    }

    fn remove(&self, key: &str) -> Result<bool, SettingsError> {
        Ok(self
            .inner
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .remove(key)
            .is_some())
    }
}
