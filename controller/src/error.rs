//! Faults that abort a broker start sequence.

use std::{io, path::PathBuf};

use brokerctl_common::BrokerCommandKind;
use thiserror::Error as ThisError;

use crate::settings::SettingsError;

/// Errors returned by the configuration and lifecycle operations.
///
/// Every variant is terminal for the start attempt it occurred in. Nothing here is retried automatically.
#[derive(Debug, ThisError)]
pub enum Fault {
    #[error("No password is configured; refusing to start the broker without credentials")]
    CredentialUnavailable,
    #[error("Username {0:?} cannot be written to the credential file; it must not contain ':' or line breaks")]
    InvalidUsername(String),
    #[error("Failed to write credential file at {}", path.display())]
    CredentialWriteFailed {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
    #[error("Failed to access broker settings")]
    Settings(#[from] SettingsError),
    #[error("Failed to serialize broker configuration")]
    Serialize(#[from] serde_json::Error),
    #[error("Broker supervisor is not running; {0} command was not dispatched")]
    DispatchFailed(BrokerCommandKind),
    #[error("Broker supervisor did not answer the liveness probe")]
    ProbeFailed,
    #[error("Offloaded task did not complete")]
    TaskAborted(#[from] tokio::task::JoinError),
}

impl Fault {
    /// Whether the fault stems from missing, malformed or unwritable credentials.
    #[must_use]
    pub const fn is_credential_fault(&self) -> bool {
        matches!(
            *self,
            Self::CredentialUnavailable
                | Self::InvalidUsername(_)
                | Self::CredentialWriteFailed { .. }
        )
    }
}
