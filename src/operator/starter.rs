//! Operator Starter
//!
//! Builds clients and informers, registers the CSI driver controllers and
//! runs them until the process is asked to stop.

use super::{
    CONTROLLER_ASSET, CONTROLLER_SERVICE_CONTROLLER, NODE_ASSET, NODE_SERVICE_CONTROLLER,
    STATIC_ASSETS, STATIC_RESOURCES_CONTROLLER,
};
use crate::assets;
use crate::client::{KubeApplier, KubeOperatorClient, OperatorClient, ResourceApplier};
use crate::config::OperatorConfig;
use crate::controllers::ControllerSet;
use crate::error::{Error, Result};
use crate::events::EventPublisher;
use crate::informers::{Informers, Trigger};
use crate::logging::LogLevelSetter;
use crate::metrics::ControllerMetrics;
use kube::Client;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tracing::info;

/// Everything the operator needs from the process that hosts it
pub struct ControllerContext {
    /// Cluster connection settings
    pub kube_config: kube::Config,
    /// Operator settings
    pub config: OperatorConfig,
    /// Cancelled when the process should stop
    pub shutdown: CancellationToken,
    /// Process log level control
    pub log_level: Arc<dyn LogLevelSetter>,
    /// Sync counters
    pub metrics: ControllerMetrics,
    /// Flipped once the controllers are running
    pub ready: Arc<AtomicBool>,
}

/// Assemble the CSI driver controllers on top of the given clients
pub fn build_controller_set(
    config: &OperatorConfig,
    operator_client: Arc<dyn OperatorClient>,
    applier: Arc<dyn ResourceApplier>,
    log_level: Arc<dyn LogLevelSetter>,
    metrics: ControllerMetrics,
    trigger: Trigger,
) -> ControllerSet {
    ControllerSet::new(operator_client, metrics, trigger)
        .with_resync_interval(config.resync_interval)
        .with_log_level_controller(log_level)
        .with_management_state_controller(&config.operand_name, false)
        .with_static_resources_controller(
            STATIC_RESOURCES_CONTROLLER,
            applier.clone(),
            assets::asset,
            STATIC_ASSETS,
            &config.namespace,
        )
        .with_csi_driver_controller_service(
            CONTROLLER_SERVICE_CONTROLLER,
            assets::asset,
            CONTROLLER_ASSET,
            applier.clone(),
            config,
        )
        .with_csi_driver_node_service(
            NODE_SERVICE_CONTROLLER,
            assets::asset,
            NODE_ASSET,
            applier,
            config,
        )
}

/// Run the operator until `ctx.shutdown` is cancelled
///
/// Never returns `Ok`: cancellation yields [`Error::Stopped`] so the process
/// exits non-zero and gets restarted.
pub async fn run_operator(ctx: ControllerContext) -> Result<()> {
    let client = Client::try_from(ctx.kube_config)?;
    let config = ctx.config;

    let operator_client: Arc<dyn OperatorClient> =
        Arc::new(KubeOperatorClient::new(client.clone(), &config.instance_name));
    let applier: Arc<dyn ResourceApplier> =
        Arc::new(KubeApplier::new(client.clone(), &config.field_manager));
    let trigger = Trigger::new();
    let informers = Informers::new(
        client.clone(),
        &config.namespace,
        &config.instance_name,
        trigger.clone(),
    );

    let controller_set = build_controller_set(
        &config,
        operator_client,
        applier,
        ctx.log_level,
        ctx.metrics,
        trigger,
    )
    .with_event_publisher(EventPublisher::new(client, &config.instance_name));

    info!("Starting the informers");
    let _informers = informers.start(ctx.shutdown.clone());

    info!("Starting controllerset");
    tokio::spawn(controller_set.run(ctx.shutdown.clone(), config.workers));
    ctx.ready.store(true, Ordering::SeqCst);

    ctx.shutdown.cancelled().await;

    Err(Error::Stopped)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::client::fake::{FakeApplier, FakeOperatorClient};
    use crate::controllers::{LOG_LEVEL_CONTROLLER, MANAGEMENT_STATE_CONTROLLER};
    use crate::crd::{ConditionStatus, ManagementState};
    use assert_matches::assert_matches;
    use prometheus::Registry;
    use std::time::Duration;
    use tracing::Level;

    struct NoopSetter;

    impl LogLevelSetter for NoopSetter {
        fn set_level(&self, _level: Level) -> Result<()> {
            Ok(())
        }
    }

    fn controller_set(
        client: Arc<FakeOperatorClient>,
        applier: Arc<FakeApplier>,
    ) -> ControllerSet {
        build_controller_set(
            &OperatorConfig::default(),
            client,
            applier,
            Arc::new(NoopSetter),
            ControllerMetrics::new(&Registry::new()).unwrap(),
            Trigger::new(),
        )
    }

    #[test]
    fn test_registers_all_controllers() {
        let set = controller_set(
            Arc::new(FakeOperatorClient::with_state(ManagementState::Managed)),
            Arc::new(FakeApplier::new()),
        );
        assert_eq!(
            set.controller_names(),
            vec![
                LOG_LEVEL_CONTROLLER,
                MANAGEMENT_STATE_CONTROLLER,
                STATIC_RESOURCES_CONTROLLER,
                CONTROLLER_SERVICE_CONTROLLER,
                NODE_SERVICE_CONTROLLER,
            ]
        );
    }

    #[tokio::test]
    async fn test_full_sync_against_fakes() {
        let client = Arc::new(FakeOperatorClient::with_state(ManagementState::Managed));
        let applier = Arc::new(FakeApplier::new());
        let set = controller_set(client.clone(), applier.clone());

        let shutdown = CancellationToken::new();
        let handle = tokio::spawn(set.run(shutdown.clone(), 1));

        // Every static manifest plus the two workloads
        let expected = STATIC_ASSETS.len() + 2;
        tokio::time::timeout(Duration::from_secs(5), async {
            while applier.applied().len() < expected
                || client
                    .condition(&format!("{}Available", NODE_SERVICE_CONTROLLER))
                    .is_none()
            {
                tokio::time::sleep(Duration::from_millis(10)).await;
            }
        })
        .await
        .expect("controllers did not converge");

        shutdown.cancel();
        handle.await.unwrap();

        let names = applier.applied_names();
        assert!(names.contains(&"openstack-cinder-csi-driver-controller".to_string()));
        assert!(names.contains(&"openstack-cinder-csi-driver-node".to_string()));
        assert_eq!(
            client
                .condition(&format!("{}Degraded", STATIC_RESOURCES_CONTROLLER))
                .unwrap()
                .status,
            ConditionStatus::False
        );
    }

    #[tokio::test]
    async fn test_run_operator_stops_on_cancellation() {
        // Nothing listens on the discard port; watches and syncs just fail
        let kube_config = kube::Config::new("http://127.0.0.1:9".parse().unwrap());
        let ready = Arc::new(AtomicBool::new(false));
        let shutdown = CancellationToken::new();
        let ctx = ControllerContext {
            kube_config,
            config: OperatorConfig::default(),
            shutdown: shutdown.clone(),
            log_level: Arc::new(NoopSetter),
            metrics: ControllerMetrics::new(&Registry::new()).unwrap(),
            ready: ready.clone(),
        };

        let handle = tokio::spawn(run_operator(ctx));
        tokio::time::timeout(Duration::from_secs(5), async {
            while !ready.load(Ordering::SeqCst) {
                tokio::time::sleep(Duration::from_millis(10)).await;
            }
        })
        .await
        .expect("operator did not start");

        shutdown.cancel();
        let result = tokio::time::timeout(Duration::from_secs(5), handle)
            .await
            .expect("operator did not stop")
            .unwrap();
        assert_matches!(result, Err(Error::Stopped));
    }
}
