//! Lifecycle synchronizer: refreshes the display and writes resolved values back at each checkpoint.

use alloc::sync::Arc;
use core::fmt;

use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use crate::{
    display::{ConnectionIndicator, DisplayState, PLACEHOLDER_NOT_REACHABLE},
    network::{AddressResolver, ResolveError},
    settings::{SettingsError, SettingsStore, defaults, is_first_run, keys, value_or},
};

/// Points in the service lifecycle at which settings and display are re-synchronized.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Checkpoint {
    /// Service initialized.
    Create,
    /// Service about to accept requests.
    Start,
    /// Explicit reload, e.g. `SIGHUP`.
    Restart,
    /// The settings file changed underneath the service.
    Resume,
}

impl fmt::Display for Checkpoint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match *self {
            Self::Create => "create",
            Self::Start => "start",
            Self::Restart => "restart",
            Self::Resume => "resume",
        })
    }
}

/// Result of one synchronization pass.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SyncOutcome {
    /// Nothing has been configured yet. Placeholders are shown and nothing was written.
    FirstRun(DisplayState),
    /// Settings were read and the resolved values written back.
    Synced {
        display: DisplayState,
        /// Why the live address could not be used, if it could not.
        address_fault: Option<ResolveError>,
    },
}

impl SyncOutcome {
    #[must_use]
    pub const fn display(&self) -> &DisplayState {
        match *self {
            Self::FirstRun(ref display) | Self::Synced { ref display, .. } => display,
        }
    }
}

pub struct LifecycleSynchronizer {
    settings: Arc<dyn SettingsStore>,
    resolver: Arc<dyn AddressResolver>,
}

impl LifecycleSynchronizer {
    #[must_use]
    pub fn new(settings: Arc<dyn SettingsStore>, resolver: Arc<dyn AddressResolver>) -> Self {
        Self { settings, resolver }
    }

    /// Runs one pass for `checkpoint`.
    ///
    /// Blocking: reads and writes the settings store and enumerates interfaces. The new display
    /// carries `connection` over unchanged, since a checkpoint says nothing about the broker.
    ///
    /// # Errors
    ///
    /// Returns an error if the settings store cannot be read or written. An unresolvable address is
    /// not an error; it is reported in [`SyncOutcome::Synced::address_fault`].
    #[tracing::instrument(skip(self, connection))]
    pub fn synchronize(
        &self,
        checkpoint: Checkpoint,
        connection: ConnectionIndicator,
    ) -> Result<SyncOutcome, SettingsError> {
        let snapshot = self.settings.snapshot()?;

        if is_first_run(&snapshot) {
            info!(
                "No settings saved yet; configure the broker with `brokerctl settings set <key> <value>`"
            );
            return Ok(SyncOutcome::FirstRun(DisplayState::first_run(connection)));
        }

        let port = value_or(&snapshot, keys::PORT, defaults::PORT);
        let message_size = value_or(&snapshot, keys::MESSAGE_SIZE, defaults::MESSAGE_SIZE);

        let (address, address_fault) = match self.resolver.resolve() {
            Ok(ip) => (ip.to_string(), None),
            Err(e) => {
                let fallback = snapshot
                    .get(keys::HOST)
                    .cloned()
                    .unwrap_or_else(|| PLACEHOLDER_NOT_REACHABLE.to_owned());
                warn!(error = %e, %fallback, "Could not resolve device address");
                (fallback, Some(e))
            }
        };
        let reachable = address_fault.is_none();

        let mut write_back = vec![(keys::MESSAGE_SIZE, message_size.as_str())];
        if reachable {
            write_back.push((keys::HOST, address.as_str()));
        }
        self.settings.set_many(&write_back)?;

        let display = DisplayState {
            address,
            port,
            message_size,
            reachable,
            configured: true,
            connection,
        };
        let connection_string = display.connection_string();
        info!(%connection_string, "Display synchronized");
        Ok(SyncOutcome::Synced {
            display,
            address_fault,
        })
    }
}
