//! Derived values shown to the user: address, port, message size and connection indicator.
//!
//! A [`DisplayState`] is never mutated in place. Each checkpoint or lifecycle command produces a new
//! value which the caller stores (the service publishes it through a `watch` channel).

use core::fmt;

use serde::Serialize;

/// Address shown before the settings have ever been saved.
pub const PLACEHOLDER_NOT_CONFIGURED: &str = "Not configured yet";
/// Address shown when no usable network address could be resolved and none was known.
pub const PLACEHOLDER_NOT_REACHABLE: &str = "Not reachable yet";
const FIRST_RUN_PORT: &str = "8080";
const FIRST_RUN_MESSAGE_SIZE: &str = "9999999";

/// What the user is told about the broker connection.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ConnectionIndicator {
    #[default]
    Unknown,
    Connected,
    Disconnected,
}

impl fmt::Display for ConnectionIndicator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match *self {
            Self::Unknown => "Unknown",
            Self::Connected => "Connected",
            Self::Disconnected => "Disconnected",
        })
    }
}

/// Snapshot of everything the presentation layer renders.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DisplayState {
    /// Resolved device address, the last known host, or a placeholder.
    pub address: String,
    pub port: String,
    pub message_size: String,
    /// `false` when the address could not be resolved on the last pass.
    pub reachable: bool,
    /// `false` until the settings have been saved at least once.
    pub configured: bool,
    pub connection: ConnectionIndicator,
}

impl DisplayState {
    /// Placeholder display used on first run, before any settings exist.
    #[must_use]
    pub fn first_run(connection: ConnectionIndicator) -> Self {
        Self {
            address: PLACEHOLDER_NOT_CONFIGURED.to_owned(),
            port: FIRST_RUN_PORT.to_owned(),
            message_size: FIRST_RUN_MESSAGE_SIZE.to_owned(),
            reachable: false,
            configured: false,
            connection,
        }
    }

    /// `tcp://<address>:<port>`
    #[must_use]
    pub fn connection_string(&self) -> String {
        format!("tcp://{}:{}", self.address, self.port)
    }

    /// Returns a copy carrying a new connection indicator.
    #[must_use]
    pub fn with_connection(&self, connection: ConnectionIndicator) -> Self {
        Self {
            connection,
            ..self.clone()
        }
    }
}

impl Default for DisplayState {
    fn default() -> Self {
        Self::first_run(ConnectionIndicator::Unknown)
    }
}
