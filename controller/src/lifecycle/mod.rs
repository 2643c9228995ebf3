//! Lifecycle controller: turns start/stop requests into broker commands and tracks the believed state.
//!
//! The controller never waits for the broker to confirm anything. After a successful dispatch the
//! state reflects intent; [`LifecycleController::probe`] asks the dispatcher for actual liveness.

pub mod supervisor;

use alloc::sync::Arc;

use brokerctl_common::{BrokerCommand, BrokerConfiguration, ServiceAction};
use futures::future::BoxFuture;
use tracing::{info, warn};

use crate::{
    broker_config::{self, PasswordPolicy},
    credentials::CredentialProvisioner,
    display::ConnectionIndicator,
    error::Fault,
    settings::SettingsStore,
};

pub use supervisor::{ProcessSupervisor, SupervisorSettings};

/// The boundary to whatever runs the broker.
pub trait BrokerDispatcher: Send + Sync {
    /// Hands `command` over without waiting for it to take effect.
    ///
    /// # Errors
    ///
    /// Returns [`Fault::DispatchFailed`] if the command could not be handed over at all.
    fn dispatch(&self, command: BrokerCommand) -> Result<(), Fault>;

    /// Reports whether the broker is actually running right now.
    fn probe(&self) -> BoxFuture<'_, Result<bool, Fault>>;
}

/// Owns the [`ServiceAction`] state machine.
///
/// All transitions go through `&mut self`; the service wraps the controller in a mutex so that
/// concurrent start requests are serialized.
pub struct LifecycleController {
    dispatcher: Arc<dyn BrokerDispatcher>,
    action: ServiceAction,
}

impl LifecycleController {
    #[must_use]
    pub fn new(dispatcher: Arc<dyn BrokerDispatcher>) -> Self {
        Self {
            dispatcher,
            action: ServiceAction::Undefined,
        }
    }

    #[must_use]
    pub const fn action(&self) -> ServiceAction {
        self.action
    }

    /// Indicator matching the current action.
    #[must_use]
    pub const fn connection(&self) -> ConnectionIndicator {
        match self.action {
            ServiceAction::Started => ConnectionIndicator::Connected,
            ServiceAction::Stopped => ConnectionIndicator::Disconnected,
            ServiceAction::Undefined
            | ServiceAction::Probing
            | ServiceAction::Starting
            | ServiceAction::Stopping => ConnectionIndicator::Unknown,
        }
    }

    /// Dispatches START carrying `config`.
    ///
    /// Every call dispatches, even when the broker is believed to be running already. Whether a
    /// second START is harmless is the dispatcher's business.
    ///
    /// # Errors
    ///
    /// Fails if the configuration cannot be serialized or the dispatch fails. The previous action is
    /// restored in both cases.
    #[tracing::instrument(skip_all)]
    pub fn start(&mut self, config: &BrokerConfiguration) -> Result<ConnectionIndicator, Fault> {
        let previous = self.transition_from(ServiceAction::Starting);
        let result = BrokerCommand::start(config)
            .map_err(Fault::from)
            .and_then(|command| self.dispatcher.dispatch(command));
        self.settle(result, previous, ServiceAction::Started)?;
        info!(host = %config.host, port = %config.port, "START dispatched");
        Ok(ConnectionIndicator::Connected)
    }

    /// Dispatches STOP.
    ///
    /// # Errors
    ///
    /// Fails if the dispatch fails; the previous action is restored.
    #[tracing::instrument(skip_all)]
    pub fn stop(&mut self) -> Result<ConnectionIndicator, Fault> {
        let previous = self.transition_from(ServiceAction::Stopping);
        let result = self.dispatcher.dispatch(BrokerCommand::Stop);
        self.settle(result, previous, ServiceAction::Stopped)?;
        info!("STOP dispatched");
        Ok(ConnectionIndicator::Disconnected)
    }

    /// Builds a fresh configuration from `settings` and starts the broker with it.
    ///
    /// Nothing is dispatched when the build fails, so a credential fault leaves the action untouched.
    ///
    /// # Errors
    ///
    /// Propagates the build fault or the dispatch fault.
    pub fn start_from_settings(
        &mut self,
        settings: &dyn SettingsStore,
        provisioner: &CredentialProvisioner,
        policy: PasswordPolicy,
    ) -> Result<ConnectionIndicator, Fault> {
        let config = broker_config::build(settings, provisioner, policy)?;
        self.start(&config)
    }

    /// Asks the dispatcher whether the broker is alive and aligns the action with the answer.
    ///
    /// # Errors
    ///
    /// Returns [`Fault::ProbeFailed`] if the dispatcher could not answer; the previous action is restored.
    #[tracing::instrument(skip_all)]
    pub async fn probe(&mut self) -> Result<bool, Fault> {
        let previous = self.transition_from(ServiceAction::Probing);
        let dispatcher = Arc::clone(&self.dispatcher);
        let alive = dispatcher.probe().await;
        let target = match alive {
            Ok(true) => ServiceAction::Started,
            Ok(false) | Err(_) => ServiceAction::Stopped,
        };
        self.settle(alive, previous, target)
    }

    fn transition_from(&mut self, through: ServiceAction) -> ServiceAction {
        core::mem::replace(&mut self.action, through)
    }

    fn settle<T>(
        &mut self,
        result: Result<T, Fault>,
        previous: ServiceAction,
        target: ServiceAction,
    ) -> Result<T, Fault> {
        match result {
            Ok(value) => {
                self.action = target;
                Ok(value)
            }
            Err(e) => {
                warn!(error = %e, action = %previous, "Lifecycle transition failed, restoring");
                self.action = previous;
                Err(e)
            }
        }
    }
}


#[cfg(test)]
mod tests {
    use std::{env, fs};

    use brokerctl_common::{BROKER_WEBSOCKET_PORT, BrokerCommandKind};

    use super::{testing::RecordingDispatcher, *};
    use crate::settings::{MemorySettings, keys};

    fn config() -> BrokerConfiguration {
        BrokerConfiguration {
            host: "10.0.0.5".to_owned(),
            port: "1883".to_owned(),
            websocket_port: BROKER_WEBSOCKET_PORT,
            max_message_bytes: "1024".to_owned(),
            auth_required: true,
            password_file_path: "/data/password.conf".to_owned(),
            wake_lock_duration: "2".to_owned(),
        }
    }

    fn controller() -> (Arc<RecordingDispatcher>, LifecycleController) {
        let dispatcher = Arc::new(RecordingDispatcher::default());
        let controller = LifecycleController::new(dispatcher.clone());
        (dispatcher, controller)
    }

    #[test]
    fn starts_undefined() {
        let (_, controller) = controller();
        assert_eq!(controller.action(), ServiceAction::Undefined);
        assert_eq!(controller.connection(), ConnectionIndicator::Unknown);
    }

    #[test]
    fn start_dispatches_exactly_one_start_with_config() {
        let (dispatcher, mut controller) = controller();

        let indicator = controller.start(&config()).unwrap();

        assert_eq!(indicator, ConnectionIndicator::Connected);
        assert_eq!(controller.action(), ServiceAction::Started);
        let sent = dispatcher.sent();
        assert_eq!(sent.len(), 1);
        assert_eq!(sent[0].kind(), BrokerCommandKind::Start);
        assert_eq!(sent[0].configuration().unwrap().unwrap(), config());
    }

    #[test]
    fn stop_after_start_dispatches_exactly_one_stop() {
        let (dispatcher, mut controller) = controller();
        controller.start(&config()).unwrap();

        let indicator = controller.stop().unwrap();

        assert_eq!(indicator, ConnectionIndicator::Disconnected);
        assert_eq!(controller.action(), ServiceAction::Stopped);
        let stops = dispatcher
            .sent()
            .iter()
            .filter(|cmd| cmd.kind() == BrokerCommandKind::Stop)
            .count();
        assert_eq!(stops, 1);
    }

    #[test]
    fn repeated_start_dispatches_again() {
        let (dispatcher, mut controller) = controller();
        controller.start(&config()).unwrap();
        controller.start(&config()).unwrap();

        assert_eq!(dispatcher.sent().len(), 2);
        assert_eq!(controller.action(), ServiceAction::Started);
    }

    #[test]
    fn stop_without_start_still_dispatches() {
        let (dispatcher, mut controller) = controller();
        controller.stop().unwrap();
        assert_eq!(dispatcher.sent(), vec![BrokerCommand::Stop]);
    }

    #[test]
    fn failed_dispatch_restores_previous_action() {
        let mut controller = LifecycleController::new(Arc::new(RecordingDispatcher::failing()));

        let res = controller.start(&config());

        assert!(matches!(
            res,
            Err(Fault::DispatchFailed(BrokerCommandKind::Start))
        ));
        assert_eq!(controller.action(), ServiceAction::Undefined);
    }

    #[test]
    fn credential_fault_dispatches_nothing() {
        let (dispatcher, mut controller) = controller();
        let dir = env::temp_dir().join("brokerctl_lifecycle").join("no_password");
        drop(fs::remove_dir_all(&dir));
        let settings = MemorySettings::from_pairs(&[(keys::HOST, "10.0.0.5")]);

        let res = controller.start_from_settings(
            &settings,
            &CredentialProvisioner::new(dir),
            PasswordPolicy::Require,
        );

        assert!(matches!(res, Err(Fault::CredentialUnavailable)));
        assert!(dispatcher.sent().is_empty());
        assert_eq!(controller.action(), ServiceAction::Undefined);
    }

    #[test]
    fn start_from_settings_carries_fresh_values() {
        let (dispatcher, mut controller) = controller();
        let dir = env::temp_dir().join("brokerctl_lifecycle").join("fresh");
        drop(fs::remove_dir_all(&dir));
        let provisioner = CredentialProvisioner::new(dir);
        let settings = MemorySettings::from_pairs(&[(keys::PASSWORD, "pw"), (keys::PORT, "1883")]);

        controller
            .start_from_settings(&settings, &provisioner, PasswordPolicy::Require)
            .unwrap();
        settings.set(keys::PORT, "1884").unwrap();
        controller
            .start_from_settings(&settings, &provisioner, PasswordPolicy::Require)
            .unwrap();

        let ports = dispatcher
            .sent()
            .iter()
            .map(|cmd| cmd.configuration().unwrap().unwrap().port)
            .collect::<Vec<_>>();
        assert_eq!(ports, ["1883", "1884"]);
    }

    #[tokio::test]
    async fn probe_aligns_action_with_liveness() {
        let dispatcher = Arc::new(RecordingDispatcher::alive());
        let mut controller = LifecycleController::new(dispatcher);
        controller.stop().unwrap();

        assert!(controller.probe().await.unwrap());
        assert_eq!(controller.action(), ServiceAction::Started);
    }

    #[tokio::test]
    async fn failed_probe_restores_previous_action() {
        let mut controller = LifecycleController::new(Arc::new(RecordingDispatcher::failing()));

        assert!(matches!(controller.probe().await, Err(Fault::ProbeFailed)));
        assert_eq!(controller.action(), ServiceAction::Undefined);
    }
}
