use alloc::sync::Arc;

use brokerctl_common::ServiceAction;
use tokio::{
    sync::{Mutex, mpsc, watch},
    task,
};
use tracing::{debug, info};

use crate::{
    broker_config::{self, PasswordPolicy},
    config::ControllerConfig,
    credentials::CredentialProvisioner,
    display::{ConnectionIndicator, DisplayState},
    error::Fault,
    lifecycle::{BrokerDispatcher, LifecycleController},
    network::AddressResolver,
    settings::SettingsStore,
    sync::{Checkpoint, LifecycleSynchronizer, SyncOutcome},
};

pub(crate) type DisplayRx = watch::Receiver<Arc<DisplayState>>;
pub(crate) type DisplayTx = watch::Sender<Arc<DisplayState>>;
pub(crate) type CheckpointTx = mpsc::UnboundedSender<Checkpoint>;
pub(crate) type CheckpointRx = mpsc::UnboundedReceiver<Checkpoint>;

/// Application state shared across request handlers and background tasks.
#[derive(Clone)]
pub(crate) struct AppState {
    pub config: Arc<ControllerConfig>,

    pub settings: Arc<dyn SettingsStore>,
    pub provisioner: Arc<CredentialProvisioner>,
    pub synchronizer: Arc<LifecycleSynchronizer>,

    /// Serializes start/stop/probe so credential writes and configuration builds never interleave.
    pub controller: Arc<Mutex<LifecycleController>>,

    /// Latest display state.
    pub display_rx: DisplayRx,
    display_tx: DisplayTx,

    /// Queue consumed by the checkpoint loop, one checkpoint at a time.
    pub checkpoint_tx: CheckpointTx,
}

/// Collaborators the state is assembled from.
pub(crate) struct Parts {
    pub config: ControllerConfig,
    pub settings: Arc<dyn SettingsStore>,
    pub provisioner: CredentialProvisioner,
    pub resolver: Arc<dyn AddressResolver>,
    pub dispatcher: Arc<dyn BrokerDispatcher>,
}

impl AppState {
    /// Wires the collaborators together. The returned receiver feeds the checkpoint loop.
    pub(crate) fn new(parts: Parts) -> (Self, CheckpointRx) {
        let Parts {
            config,
            settings,
            provisioner,
            resolver,
            dispatcher,
        } = parts;

        let (display_tx, display_rx) = watch::channel(Arc::new(DisplayState::default()));
        let (checkpoint_tx, checkpoint_rx) = mpsc::unbounded_channel();
        let synchronizer = LifecycleSynchronizer::new(settings.clone(), resolver);

        let state = Self {
            config: Arc::new(config),
            settings,
            provisioner: Arc::new(provisioner),
            synchronizer: Arc::new(synchronizer),
            controller: Arc::new(Mutex::new(LifecycleController::new(dispatcher))),
            display_rx,
            display_tx,
            checkpoint_tx,
        };
        (state, checkpoint_rx)
    }

    pub(crate) fn password_policy(&self) -> PasswordPolicy {
        self.config.broker.password_policy()
    }

    pub(crate) fn display(&self) -> Arc<DisplayState> {
        self.display_rx.borrow().clone()
    }

    /// Queues `checkpoint` for the checkpoint loop.
    pub(crate) fn enqueue(&self, checkpoint: Checkpoint) -> bool {
        let queued = self.checkpoint_tx.send(checkpoint).is_ok();
        if !queued {
            debug!(%checkpoint, "Checkpoint loop is gone, dropping checkpoint");
        }
        queued
    }

    /// Runs one synchronization pass and publishes the new display.
    ///
    /// The connection indicator is read again when publishing, so a start or stop that completed
    /// during the pass is not overwritten.
    pub(crate) async fn synchronize(&self, checkpoint: Checkpoint) -> Result<SyncOutcome, Fault> {
        let connection = self.display_rx.borrow().connection;
        let synchronizer = self.synchronizer.clone();
        let outcome = task::spawn_blocking(move || synchronizer.synchronize(checkpoint, connection))
            .await?
            .map_err(Fault::from)?;

        let display = outcome.display().clone();
        self.display_tx.send_modify(|current| {
            *current = Arc::new(display.with_connection(current.connection));
        });
        Ok(outcome)
    }

    /// Builds a fresh configuration and dispatches START.
    pub(crate) async fn start_broker(&self) -> Result<ConnectionIndicator, Fault> {
        let mut controller = self.controller.lock().await;

        let settings = self.settings.clone();
        let provisioner = self.provisioner.clone();
        let policy = self.password_policy();
        let config =
            task::spawn_blocking(move || broker_config::build(&*settings, &provisioner, policy))
                .await??;

        let indicator = controller.start(&config)?;
        self.publish_connection(indicator);
        Ok(indicator)
    }

    pub(crate) async fn stop_broker(&self) -> Result<ConnectionIndicator, Fault> {
        let mut controller = self.controller.lock().await;
        let indicator = controller.stop()?;
        self.publish_connection(indicator);
        Ok(indicator)
    }

    /// Asks the supervisor whether the broker is alive and aligns the believed state.
    pub(crate) async fn probe_broker(&self) -> Result<bool, Fault> {
        let mut controller = self.controller.lock().await;
        let alive = controller.probe().await?;
        self.publish_connection(controller.connection());
        Ok(alive)
    }

    pub(crate) async fn action(&self) -> ServiceAction {
        self.controller.lock().await.action()
    }

    fn publish_connection(&self, connection: ConnectionIndicator) {
        self.display_tx.send_if_modified(|current| {
            if current.connection == connection {
                return false;
            }
            info!(%connection, "Connection indicator changed");
            *current = Arc::new(current.with_connection(connection));
            true
        });
    }
}

#[cfg(test)]
pub(crate) mod testing {
    use alloc::sync::Arc;
    use core::net::Ipv4Addr;
    use std::{env, fs, path::PathBuf};

    use super::{AppState, CheckpointRx, Parts};
    use crate::{
        config::ControllerConfig, credentials::CredentialProvisioner,
        lifecycle::testing::RecordingDispatcher, network::testing::FixedResolver,
        settings::MemorySettings,
    };

    pub(crate) struct Harness {
        pub state: AppState,
        pub checkpoints: CheckpointRx,
        pub settings: Arc<MemorySettings>,
        pub dispatcher: Arc<RecordingDispatcher>,
        pub data_dir: PathBuf,
    }

    /// State over in-memory settings, a recording dispatcher and a fixed address.
    pub(crate) fn harness(name: &str, entries: &[(&str, &str)]) -> Harness {
        harness_with_config(name, entries, ControllerConfig::default())
    }

    pub(crate) fn harness_with_config(
        name: &str,
        entries: &[(&str, &str)],
        config: ControllerConfig,
    ) -> Harness {
        let data_dir = env::temp_dir().join("brokerctl_app").join(name);
        drop(fs::remove_dir_all(&data_dir));
        let settings = Arc::new(MemorySettings::from_pairs(entries));
        let dispatcher = Arc::new(RecordingDispatcher::default());
        let (state, checkpoints) = AppState::new(Parts {
            config,
            settings: settings.clone(),
            provisioner: CredentialProvisioner::new(&data_dir),
            resolver: Arc::new(FixedResolver(Ok(Ipv4Addr::new(10, 0, 0, 5)))),
            dispatcher: dispatcher.clone(),
        });
        Harness {
            state,
            checkpoints,
            settings,
            dispatcher,
            data_dir,
        }
    }
}
