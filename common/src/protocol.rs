//! Protocol types for the controller-to-broker boundary.
//!
//! - The controller builds a [`BrokerConfiguration`] and ships it, serialized, inside a [`BrokerCommand::Start`].
//! - [`ServiceAction`] is what the controller *believes* the broker is doing, not what it confirmed.

use core::{fmt, str::FromStr};

use serde::{Deserialize, Serialize};

/// Websocket port of the broker collaborator. Not user-configurable.
pub const BROKER_WEBSOCKET_PORT: u16 = 8080;

// Macro to define the enum from variant => string mappings
macro_rules! define_enum_with_str {
    (
        $(#[$meta:meta])*
        $vis:vis enum $name:ident {
            $(
                $(#[$variant_meta:meta])*
                $variant:ident => $str:literal
            ),* $(,)?
        }
    ) => {
        $(#[$meta])*
        $vis enum $name {
            $(
                $(#[$variant_meta])*
                $variant,
            )*
        }

        impl $name {
            /// Every variant, in declaration order.
            pub const ALL: &'static [$name] = &[$($name::$variant,)*];

            /// The wire name of this variant.
            #[must_use]
            pub const fn as_str(&self) -> &'static str {
                match *self {
                    $($name::$variant => $str,)*
                }
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str(self.as_str())
            }
        }

        impl FromStr for $name {
            type Err = ();

            fn from_str(value: &str) -> Result<Self, Self::Err> {
                match value {
                    $($str => Ok($name::$variant),)*
                    _ => Err(()),
                }
            }
        }
    };
}

define_enum_with_str! {
    #[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
    #[serde(rename_all = "lowercase")]
    /// The controller's believed broker state.
    ///
    /// This tracks intent: `Started` means a START was dispatched, not that the broker bound its port.
    /// Callers needing confirmed liveness must probe the broker collaborator.
    pub enum ServiceAction {
        /// Nothing dispatched yet.
        #[default]
        Undefined => "undefined",
        /// A STOP was dispatched.
        Stopped => "stopped",
        /// A START was dispatched.
        Started => "started",
        /// A liveness probe is in flight.
        Probing => "probing",
        /// A start sequence is in progress.
        Starting => "starting",
        /// A stop sequence is in progress.
        Stopping => "stopping",
    }
}

define_enum_with_str! {
    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    /// Discriminant of [`BrokerCommand`], used for logging and wire names.
    pub enum BrokerCommandKind {
        Start => "START",
        Stop => "STOP",
    }
}

/// One-way command dispatched across the broker process boundary.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BrokerCommand {
    /// Start the broker with the given serialized [`BrokerConfiguration`].
    Start { payload: String },
    /// Stop the broker. Carries no payload.
    Stop,
}

impl BrokerCommand {
    /// Serializes `config` and wraps it in a START command.
    ///
    /// # Errors
    ///
    /// Returns an error if the configuration cannot be serialized to JSON.
    pub fn start(config: &BrokerConfiguration) -> Result<Self, serde_json::Error> {
        Ok(Self::Start {
            payload: serde_json::to_string(config)?,
        })
    }

    #[must_use]
    pub const fn kind(&self) -> BrokerCommandKind {
        match *self {
            Self::Start { .. } => BrokerCommandKind::Start,
            Self::Stop => BrokerCommandKind::Stop,
        }
    }

    /// Deserializes the configuration carried by a START command.
    ///
    /// Returns `None` for STOP.
    ///
    /// # Errors
    ///
    /// Returns an error if the payload is not a valid configuration.
    pub fn configuration(&self) -> Option<Result<BrokerConfiguration, serde_json::Error>> {
        match *self {
            Self::Start { ref payload } => Some(serde_json::from_str(payload)),
            Self::Stop => None,
        }
    }
}

/// Immutable snapshot of everything the broker collaborator needs to start.
///
/// Values are kept as the strings read from the settings store; parsing them is the broker's concern.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BrokerConfiguration {
    /// Address the broker binds to.
    pub host: String,
    /// MQTT listener port.
    pub port: String,
    /// Websocket listener port, always [`BROKER_WEBSOCKET_PORT`].
    pub websocket_port: u16,
    /// Maximum message size in bytes.
    pub max_message_bytes: String,
    /// Whether clients must authenticate. Always `true`.
    pub auth_required: bool,
    /// Absolute path of the `username:sha256hex` credential file.
    pub password_file_path: String,
    /// Wake-lock duration handed through to the broker's host.
    pub wake_lock_duration: String,
}
