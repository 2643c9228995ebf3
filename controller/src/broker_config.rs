//! Configuration builder: maps the flat settings store onto a [`BrokerConfiguration`].

use brokerctl_common::{BROKER_WEBSOCKET_PORT, BrokerConfiguration};
use secrecy::SecretString;
use serde::Deserialize;
use tracing::info;

use crate::{
    credentials::CredentialProvisioner,
    error::Fault,
    settings::{SettingsStore, defaults, keys, value_or},
};

/// What to do when the settings carry no password.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum PasswordPolicy {
    /// Abort the start sequence with [`Fault::CredentialUnavailable`].
    #[default]
    Require,
    /// Fall back to [`defaults::PASSWORD`].
    AllowDefault,
}

impl PasswordPolicy {
    #[must_use]
    pub const fn from_allow_default(allow: bool) -> Self {
        if allow { Self::AllowDefault } else { Self::Require }
    }
}

/// Builds a fresh configuration from the current settings, provisioning the credential file on the way.
///
/// Reads a single snapshot so every field comes from the same point in time.
///
/// # Errors
///
/// Returns the provisioner's fault unchanged when credentials cannot be produced, or
/// [`Fault::Settings`] when the store is unreadable. A caller receiving an error must not start the broker.
#[tracing::instrument(skip_all)]
pub fn build(
    settings: &dyn SettingsStore,
    provisioner: &CredentialProvisioner,
    policy: PasswordPolicy,
) -> Result<BrokerConfiguration, Fault> {
    let snapshot = settings.snapshot()?;

    let password = match (snapshot.get(keys::PASSWORD), policy) {
        (Some(pw), _) => Some(SecretString::from(pw.as_str())),
        (None, PasswordPolicy::AllowDefault) => Some(SecretString::from(defaults::PASSWORD)),
        (None, PasswordPolicy::Require) => None,
    };
    let username = value_or(&snapshot, keys::USERNAME, defaults::USERNAME);

    let password_file = provisioner.provision(&username, password.as_ref())?;

    let config = BrokerConfiguration {
        host: value_or(&snapshot, keys::HOST, defaults::HOST),
        port: value_or(&snapshot, keys::PORT, defaults::PORT),
        websocket_port: BROKER_WEBSOCKET_PORT,
        max_message_bytes: value_or(&snapshot, keys::MESSAGE_SIZE, defaults::MESSAGE_SIZE),
        auth_required: true,
        password_file_path: password_file.to_string_lossy().into_owned(),
        wake_lock_duration: value_or(
            &snapshot,
            keys::WAKE_LOCK_DURATION,
            defaults::WAKE_LOCK_DURATION,
        ),
    };
    info!(host = %config.host, port = %config.port, "Built broker configuration");
    Ok(config)
}
