//! Library entry for the `brokerctl` controller.
//!
//! Exposes `inner_main` so the workspace-level binary and the integration tests can drive the
//! controller in-process.
//!
//! The controller turns a flat settings store into a broker configuration, provisions the broker's
//! credential file, supervises the broker process and keeps a derived display state in sync at
//! lifecycle checkpoints.
#![cfg_attr(
    test,
    expect(
        clippy::unwrap_used,
        clippy::indexing_slicing,
        reason = "This is not problematic in tests"
    )
)]

extern crate alloc;
extern crate core;

mod app;
pub mod broker_config;
pub mod cli;
pub mod config;
pub mod credentials;
pub mod display;
pub mod error;
mod http;
pub mod lifecycle;
pub mod network;
mod persist;
pub mod settings;
pub mod sync;

use std::{env, fs, path::PathBuf, sync::Once};

#[cfg(unix)]
use nix::sys::stat;
use tracing::{Instrument as _, info};
use tracing_subscriber::{EnvFilter, fmt::time::ChronoLocal};

use eyre::{Result, WrapErr as _};

use cli::{Cli, Command, LogFormat, SettingsAction};
use config::{ControllerConfig, ResolvedPaths};
use credentials::CredentialProvisioner;
use settings::{FileSettings, SettingsStore as _, keys};

static INIT_TRACING: Once = Once::new();

fn init_tracing(format: LogFormat, default_level: &'static str) {
    INIT_TRACING.call_once(move || {
        let default_level = if env::var("BROKERCTL_INTEGRATION_TEST").is_ok() {
            "error"
        } else {
            default_level
        };

        let builder = tracing_subscriber::fmt()
            .with_env_filter(
                EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level)),
            )
            .with_timer(ChronoLocal::rfc_3339())
            .with_writer(std::io::stderr);

        match format {
            LogFormat::Compact => builder.compact().init(),
            LogFormat::Json => builder.json().init(),
            LogFormat::Pretty => builder.pretty().init(),
        }
    });
}

async fn load_config(config: &str) -> Result<(PathBuf, ControllerConfig)> {
    let config_path =
        fs::canonicalize(config).wrap_err(format!("Config file not found at: {config}"))?;
    let loaded = config::load(&config_path).await?;
    Ok((config_path, loaded))
}

/// The controller's main function; can be called from a shim binary.
///
/// # Errors
///
/// Returns an error if the configuration cannot be loaded, the service fails to start, or the
/// requested one-shot command fails.
pub async fn inner_main(invocation: Cli) -> Result<()> {
    match invocation.command {
        Command::ControlService(args) => {
            // Generated files (credentials, broker config, settings) are owner-only
            #[cfg(unix)]
            stat::umask(stat::Mode::S_IRWXG | stat::Mode::S_IRWXO);

            let config = &args.config.config;
            let config_path =
                fs::canonicalize(config).wrap_err(format!("Config file not found at: {config}"))?;

            init_tracing(args.log_format, "info");

            let startup_span = tracing::info_span!("brokerctl.startup", ?config_path, pid = ?std::process::id(), version = env!("CARGO_PKG_VERSION"));

            info!(parent: &startup_span, "Starting broker controller");

            app::start(&config_path, args.port, args.bind.as_deref())
                .instrument(startup_span)
                .await
        }
        Command::Settings { config, action } => {
            init_tracing(LogFormat::Compact, "warn");
            let (config_path, loaded) = load_config(&config.config).await?;
            let paths = ResolvedPaths::new(&config_path, &loaded);
            run_settings_action(&FileSettings::new(paths.settings_path), action)
        }
        Command::PrintConfig { config } => {
            init_tracing(LogFormat::Compact, "warn");
            let (config_path, loaded) = load_config(&config.config).await?;
            let paths = ResolvedPaths::new(&config_path, &loaded);
            let built = broker_config::build(
                &FileSettings::new(paths.settings_path),
                &CredentialProvisioner::new(paths.data_dir),
                loaded.broker.password_policy(),
            )?;
            println!("{}", serde_json::to_string_pretty(&built)?);
            Ok(())
        }
        Command::ResolveAddress => {
            init_tracing(LogFormat::Compact, "warn");
            let addr = network::resolve()?;
            println!("{addr}");
            Ok(())
        }
    }
}

fn run_settings_action(store: &FileSettings, action: SettingsAction) -> Result<()> {
    match action {
        SettingsAction::List => {
            for (key, value) in store.snapshot()? {
                let shown = if key == keys::PASSWORD { "********" } else { value.as_str() };
                println!("{key} = {shown}");
            }
        }
        SettingsAction::Get { key } => match store.get(&key)? {
            Some(value) => println!("{value}"),
            None => eyre::bail!("Setting '{key}' is not set"),
        },
        SettingsAction::Set { key, value } => {
            store.set_many(&[(&key, &value), (keys::CONFIGURED, "true")])?;
            info!(%key, "Setting stored");
        }
        SettingsAction::Unset { key } => {
            if !store.remove(&key)? {
                info!(%key, "Setting was not set");
            }
        }
    }
    Ok(())
}
