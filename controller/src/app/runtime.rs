//! Background tasks of the control service.

use std::path::PathBuf;

use tracing::{Instrument as _, debug, error, info, warn};

use super::{
    settings_watcher::watch_settings_file,
    state::{AppState, CheckpointRx},
};
use crate::sync::{Checkpoint, SyncOutcome};

/// Start all background tasks.
pub(super) fn start_background_tasks(
    state: &AppState,
    checkpoints: CheckpointRx,
    settings_path: PathBuf,
) {
    // Checkpoint handlers run to completion one after the other
    {
        let state = state.clone();
        tokio::spawn(
            async move {
                run_checkpoints(state, checkpoints).await;
            }
            .in_current_span(),
        );
    }

    // Edits to the settings file resume the service
    {
        let state = state.clone();
        tokio::spawn(
            async move {
                if let Err(e) = watch_settings_file(settings_path, &state).await {
                    error!(?e, "Settings file watcher stopped");
                }
            }
            .in_current_span(),
        );
    }

    // SIGHUP restarts the service
    #[cfg(unix)]
    {
        let state = state.clone();
        tokio::spawn(
            async move {
                forward_hangups(&state).await;
            }
            .in_current_span(),
        );
    }
}

pub(super) async fn run_checkpoints(state: AppState, mut checkpoints: CheckpointRx) {
    while let Some(checkpoint) = checkpoints.recv().await {
        handle_checkpoint(&state, checkpoint)
            .instrument(tracing::info_span!("checkpoint", %checkpoint))
            .await;
    }
    debug!("Checkpoint queue closed");
}

async fn handle_checkpoint(state: &AppState, checkpoint: Checkpoint) {
    let outcome = match state.synchronize(checkpoint).await {
        Ok(outcome) => outcome,
        Err(e) => {
            error!(error = %e, "Synchronization failed");
            return;
        }
    };

    match outcome {
        SyncOutcome::FirstRun(_) => {
            info!("Broker not configured yet, leaving it stopped");
        }
        SyncOutcome::Synced {
            address_fault: Some(ref fault),
            ..
        } => {
            warn!(%fault, "Showing fallback address");
        }
        SyncOutcome::Synced { .. } => {}
    }

    if checkpoint == Checkpoint::Create
        && state.config.broker.autostart
        && !matches!(outcome, SyncOutcome::FirstRun(_))
    {
        match state.start_broker().await {
            Ok(_) => info!("Broker started automatically"),
            Err(e) => error!(error = %e, "Automatic broker start failed"),
        }
    }
}

#[cfg(unix)]
async fn forward_hangups(state: &AppState) {
    use tokio::signal::unix::{SignalKind, signal};

    let mut hangups = match signal(SignalKind::hangup()) {
        Ok(hangups) => hangups,
        Err(e) => {
            warn!(?e, "Failed to install SIGHUP handler, restart checkpoint unavailable");
            return;
        }
    };
    while hangups.recv().await.is_some() {
        info!("Received SIGHUP");
        if !state.enqueue(Checkpoint::Restart) {
            break;
        }
    }
}
