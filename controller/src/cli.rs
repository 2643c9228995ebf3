//! Command-line interface definitions for the controller.

use std::env;

use clap::{Parser, Subcommand, ValueEnum};

/// Top-level command-line interface definition.
#[derive(Debug, Parser)]
#[command(name = "brokerctl")]
#[command(version = env!("CARGO_PKG_VERSION"))]
#[command(about = env!("CARGO_PKG_DESCRIPTION"))]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,
}

/// Available subcommands.
#[derive(Debug, Subcommand)]
pub enum Command {
    /// Run the controller: synchronize settings, supervise the broker and serve the control API.
    ControlService(ServiceArgs),

    /// Read or edit the broker settings store.
    Settings {
        #[command(flatten)]
        config: ConfigArg,
        #[command(subcommand)]
        action: SettingsAction,
    },

    /// Build the broker configuration from the current settings and print it as JSON.
    ///
    /// Writes the credential file as a side effect.
    PrintConfig {
        #[command(flatten)]
        config: ConfigArg,
    },

    /// Print the address the controller would advertise for the broker.
    ResolveAddress,
}

/// Path to the controller config file.
#[derive(Debug, Parser)]
pub struct ConfigArg {
    /// Path to the configuration file
    #[arg(short, long, default_value = "brokerctl.toml", env = "BROKERCTL_CONFIG")]
    pub config: String,
}

#[derive(Debug, Subcommand)]
pub enum SettingsAction {
    /// Print every stored setting as `key = value`.
    List,
    /// Print a single setting.
    Get { key: String },
    /// Store a setting and mark the controller as configured.
    Set { key: String, value: String },
    /// Remove a setting.
    Unset { key: String },
}

/// Arguments for the control service command.
#[derive(Debug, Parser)]
pub struct ServiceArgs {
    #[command(flatten)]
    pub config: ConfigArg,

    /// Optional override for the listen port (overrides port in config)
    #[arg(long)]
    pub port: Option<u16>,

    /// Optional override for the bind address (overrides bind in config)
    #[arg(long)]
    pub bind: Option<String>,

    /// Log output format
    #[arg(long, value_enum, default_value_t = LogFormat::Compact)]
    pub log_format: LogFormat,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum LogFormat {
    Compact,
    Json,
    Pretty,
}
