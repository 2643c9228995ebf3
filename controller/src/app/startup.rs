use alloc::{string, sync::Arc};
use core::net::{IpAddr, SocketAddr};
use std::path::Path;

use eyre::WrapErr as _;
use tokio::{fs, net, signal};
use tracing::{info, warn};

use super::{
    runtime::start_background_tasks,
    state::{AppState, Parts},
};
use crate::{
    config::{ResolvedPaths, load},
    credentials::CredentialProvisioner,
    http::router,
    lifecycle::{ProcessSupervisor, SupervisorSettings},
    network::InterfaceResolver,
    settings::FileSettings,
    sync::Checkpoint,
};

/// Creates a future that resolves when a shutdown signal is received.
async fn shutdown_signal() {
    #[cfg(unix)]
    {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut sigterm) => {
                tokio::select! {
                    _ = sigterm.recv() => {}
                    res = signal::ctrl_c() => drop(res),
                }
            }
            Err(e) => {
                warn!(?e, "Failed to install SIGTERM handler, only Ctrl-C will shut down");
                drop(signal::ctrl_c().await);
            }
        }
    }
    #[cfg(not(unix))]
    {
        drop(signal::ctrl_c().await);
    }
}

/// Initializes the service, runs the `create` and `start` checkpoints and serves the control API
/// until a shutdown signal arrives. The broker is stopped on the way out.
///
/// # Errors
///
/// Returns an error if the configuration cannot be loaded, the data directory cannot be created,
/// or the server cannot bind.
pub(crate) async fn start(
    config_path: &Path,
    port_override: Option<u16>,
    bind_override: Option<&str>,
) -> eyre::Result<()> {
    let config = load(config_path).await?;
    let paths = ResolvedPaths::new(config_path, &config);

    fs::create_dir_all(&paths.data_dir).await.wrap_err(format!(
        "Failed to create data directory at: {}",
        paths.data_dir.display()
    ))?;
    info!(
        settings = %paths.settings_path.display(),
        data = %paths.data_dir.display(),
        "Using storage locations"
    );

    let (supervisor, _supervisor_task) = ProcessSupervisor::spawn(SupervisorSettings {
        command: config.broker.command.clone(),
        config_path: paths.broker_config_path(),
    });

    // Apply optional overrides from CLI/tests
    let listen_port = port_override.unwrap_or(config.server.port);
    let bind_str = bind_override.map_or_else(
        || config.server.bind.clone(),
        string::ToString::to_string,
    );
    let listen_ip: IpAddr = bind_str
        .parse()
        .wrap_err(format!("Invalid bind address: {bind_str}"))?;

    let (app_state, checkpoints) = AppState::new(Parts {
        config,
        settings: Arc::new(FileSettings::new(&paths.settings_path)),
        provisioner: CredentialProvisioner::new(&paths.data_dir),
        resolver: Arc::new(InterfaceResolver),
        dispatcher: Arc::new(supervisor),
    });

    app_state.enqueue(Checkpoint::Create);
    start_background_tasks(&app_state, checkpoints, paths.settings_path);
    app_state.enqueue(Checkpoint::Start);

    serve(app_state.clone(), SocketAddr::from((listen_ip, listen_port))).await?;

    if let Err(e) = app_state.stop_broker().await {
        warn!(error = %e, "Failed to stop broker on shutdown");
    }
    // The probe queues behind the STOP, so its answer means the STOP was handled.
    if let Ok(true) = app_state.probe_broker().await {
        warn!("Broker still running after shutdown");
    }
    Ok(())
}

async fn serve(app_state: AppState, addr: SocketAddr) -> eyre::Result<()> {
    let app = router::create_app(app_state);

    let listener = net::TcpListener::bind(addr)
        .await
        .wrap_err(format!("Failed to bind control API to {addr}"))?;
    info!("Listening on http://{}", addr);

    axum::serve(listener, app)
        .with_graceful_shutdown(async {
            shutdown_signal().await;
            info!("Received shutdown, shutting down");
        })
        .await
        .wrap_err("Control API server failed")
}
