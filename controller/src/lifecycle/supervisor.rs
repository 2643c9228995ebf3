//! Runs the broker as a child process and feeds it the commands the controller dispatches.
//!
//! The supervisor is a single task owning the child. Commands reach it over an unbounded channel,
//! so dispatching never blocks and the order of START/STOP is preserved.

use core::time::Duration;
use std::{io, path::PathBuf};

use brokerctl_common::{BrokerCommand, BrokerCommandKind};
use futures::future::BoxFuture;
use tokio::{
    fs,
    process::{Child, Command},
    sync::{mpsc, oneshot},
    task::JoinHandle,
    time::timeout,
};
use tracing::{Instrument as _, debug, error, info, warn};

use super::BrokerDispatcher;
use crate::error::Fault;

/// Environment variable through which the broker learns where its configuration was written.
pub const CONFIG_PATH_ENV: &str = "BROKERCTL_BROKER_CONFIG";

/// How long a stopping broker gets between SIGTERM and SIGKILL.
const STOP_GRACE_PERIOD: Duration = Duration::from_secs(5);

#[derive(Debug, Clone)]
pub struct SupervisorSettings {
    /// Shell command that runs the broker in the foreground.
    pub command: String,
    /// Where the configuration of each START is written before the broker is spawned.
    pub config_path: PathBuf,
}

enum Request {
    Command(BrokerCommand),
    Probe(oneshot::Sender<bool>),
}

/// Handle to the supervisor task. Cloning shares the same broker process.
#[derive(Debug, Clone)]
pub struct ProcessSupervisor {
    tx: mpsc::UnboundedSender<Request>,
}

impl ProcessSupervisor {
    /// Spawns the supervisor task. It runs until every handle is dropped, then stops the broker.
    #[must_use]
    pub fn spawn(settings: SupervisorSettings) -> (Self, JoinHandle<()>) {
        let (tx, rx) = mpsc::unbounded_channel();
        let handle = tokio::spawn(supervise(settings, rx).in_current_span());
        (Self { tx }, handle)
    }
}

impl BrokerDispatcher for ProcessSupervisor {
    fn dispatch(&self, command: BrokerCommand) -> Result<(), Fault> {
        let kind = command.kind();
        self.tx
            .send(Request::Command(command))
            .map_err(|_| Fault::DispatchFailed(kind))
    }

    fn probe(&self) -> BoxFuture<'_, Result<bool, Fault>> {
        Box::pin(async move {
            let (reply_tx, reply_rx) = oneshot::channel();
            self.tx
                .send(Request::Probe(reply_tx))
                .map_err(|_| Fault::ProbeFailed)?;
            reply_rx.await.map_err(|_| Fault::ProbeFailed)
        })
    }
}

async fn supervise(settings: SupervisorSettings, mut rx: mpsc::UnboundedReceiver<Request>) {
    let mut child: Option<Child> = None;
    while let Some(request) = rx.recv().await {
        match request {
            Request::Command(BrokerCommand::Start { payload }) => {
                start_broker(&settings, &mut child, &payload).await;
            }
            Request::Command(BrokerCommand::Stop) => stop_broker(&mut child).await,
            Request::Probe(reply) => {
                if reply.send(is_alive(&mut child)).is_err() {
                    debug!("Probe requester went away");
                }
            }
        }
    }
    debug!("All supervisor handles dropped");
    stop_broker(&mut child).await;
}

fn is_alive(child: &mut Option<Child>) -> bool {
    match child.as_mut().map(Child::try_wait) {
        Some(Ok(None)) => true,
        Some(Ok(Some(status))) => {
            info!(%status, "Broker process has exited");
            *child = None;
            false
        }
        Some(Err(e)) => {
            warn!(?e, "Failed to query broker process");
            false
        }
        None => false,
    }
}

async fn start_broker(settings: &SupervisorSettings, child: &mut Option<Child>, payload: &str) {
    if is_alive(child) {
        warn!(
            command = %BrokerCommandKind::Start,
            "Broker is already running, ignoring"
        );
        return;
    }

    if let Err(e) = fs::write(&settings.config_path, payload).await {
        error!(
            ?e,
            path = %settings.config_path.display(),
            "Failed to write broker configuration, broker not started"
        );
        return;
    }

    match spawn_broker(settings) {
        Ok(spawned) => {
            info!(pid = ?spawned.id(), command = %settings.command, "Broker process spawned");
            *child = Some(spawned);
        }
        Err(e) => error!(?e, command = %settings.command, "Failed to spawn broker process"),
    }
}

fn spawn_broker(settings: &SupervisorSettings) -> io::Result<Child> {
    const IS_WINDOWS: bool = cfg!(target_os = "windows");

    let mut command = Command::new(if IS_WINDOWS { "pwsh" } else { "sh" });
    command
        .arg(if IS_WINDOWS { "-Command" } else { "-c" })
        .arg(&settings.command)
        .env(CONFIG_PATH_ENV, &settings.config_path)
        .kill_on_drop(true);
    // Own process group, so that stopping reaches whatever the shell started.
    #[cfg(unix)]
    command.process_group(0);
    command.spawn()
}

async fn stop_broker(child: &mut Option<Child>) {
    let Some(mut running) = child.take() else {
        debug!("No broker process to stop");
        return;
    };

    #[cfg(unix)]
    signal_group(&running, nix::sys::signal::Signal::SIGTERM);

    match timeout(STOP_GRACE_PERIOD, running.wait()).await {
        Ok(Ok(status)) => info!(%status, "Broker process stopped"),
        Ok(Err(e)) => warn!(?e, "Failed to wait for broker process"),
        Err(_) => {
            warn!("Broker did not exit within the grace period, killing it");
            #[cfg(unix)]
            signal_group(&running, nix::sys::signal::Signal::SIGKILL);
            if let Err(e) = running.kill().await {
                warn!(?e, "Failed to kill broker process");
            }
        }
    }
}

#[cfg(unix)]
fn signal_group(child: &Child, signal: nix::sys::signal::Signal) {
    let Some(pid) = child.id().and_then(|id| i32::try_from(id).ok()) else {
        return;
    };
    if let Err(e) = nix::sys::signal::killpg(nix::unistd::Pid::from_raw(pid), signal) {
        debug!(?e, ?signal, "Failed to signal broker process group");
    }
}
