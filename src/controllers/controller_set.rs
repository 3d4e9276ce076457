//! Controller Set
//!
//! Builder for the CSI driver controllers and the loop that runs them. Every
//! controller gets its own task; a sync is triggered by informer events or
//! by the periodic resync, and failed syncs are retried with backoff.

use super::{
    Controller, LogLevelController, ManagementStateController, StaticResourcesController,
    WorkloadController,
};
use crate::assets::AssetFn;
use crate::client::{OperatorClient, ResourceApplier};
use crate::config::OperatorConfig;
use crate::error::{Error, ErrorAction};
use crate::events::EventPublisher;
use crate::informers::Trigger;
use crate::logging::LogLevelSetter;
use crate::metrics::ControllerMetrics;
use backoff::{ExponentialBackoff, ExponentialBackoffBuilder};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{watch, Semaphore};
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

/// Why a controller woke up
enum Wake {
    Shutdown,
    Trigger,
    TriggerClosed,
    Resync,
}

/// Result of one sync round, including its retries
enum SyncOutcome {
    Synced,
    Failed { retry_in: Duration },
}

/// The set of controllers managing one CSI driver
pub struct ControllerSet {
    operator_client: Arc<dyn OperatorClient>,
    controllers: Vec<Arc<dyn Controller>>,
    metrics: ControllerMetrics,
    events: EventPublisher,
    trigger: Trigger,
    resync_interval: Duration,
}

impl ControllerSet {
    pub fn new(
        operator_client: Arc<dyn OperatorClient>,
        metrics: ControllerMetrics,
        trigger: Trigger,
    ) -> Self {
        Self {
            operator_client,
            controllers: Vec::new(),
            metrics,
            events: EventPublisher::disabled(),
            trigger,
            resync_interval: Duration::from_secs(60),
        }
    }

    pub fn with_resync_interval(mut self, interval: Duration) -> Self {
        self.resync_interval = interval;
        self
    }

    pub fn with_event_publisher(mut self, events: EventPublisher) -> Self {
        self.events = events;
        self
    }

    /// Add any controller
    pub fn with_controller(mut self, controller: Arc<dyn Controller>) -> Self {
        self.controllers.push(controller);
        self
    }

    pub fn with_log_level_controller(self, setter: Arc<dyn LogLevelSetter>) -> Self {
        let controller = LogLevelController::new(self.operator_client.clone(), setter);
        self.with_controller(Arc::new(controller))
    }

    pub fn with_management_state_controller(
        self,
        operand_name: &str,
        supports_removal: bool,
    ) -> Self {
        let controller = ManagementStateController::new(
            operand_name,
            supports_removal,
            self.operator_client.clone(),
        );
        self.with_controller(Arc::new(controller))
    }

    pub fn with_static_resources_controller(
        self,
        name: &str,
        applier: Arc<dyn ResourceApplier>,
        asset_fn: AssetFn,
        files: &[&str],
        namespace: &str,
    ) -> Self {
        let controller = StaticResourcesController::new(
            name,
            self.operator_client.clone(),
            applier,
            asset_fn,
            files,
            namespace,
        );
        self.with_controller(Arc::new(controller))
    }

    pub fn with_csi_driver_controller_service(
        self,
        name: &str,
        asset_fn: AssetFn,
        file: &str,
        applier: Arc<dyn ResourceApplier>,
        config: &OperatorConfig,
    ) -> Self {
        let controller = WorkloadController::controller_service(
            name,
            asset_fn,
            file,
            self.operator_client.clone(),
            applier,
            config.clone(),
        );
        self.with_controller(Arc::new(controller))
    }

    pub fn with_csi_driver_node_service(
        self,
        name: &str,
        asset_fn: AssetFn,
        file: &str,
        applier: Arc<dyn ResourceApplier>,
        config: &OperatorConfig,
    ) -> Self {
        let controller = WorkloadController::node_service(
            name,
            asset_fn,
            file,
            self.operator_client.clone(),
            applier,
            config.clone(),
        );
        self.with_controller(Arc::new(controller))
    }

    /// Names of the registered controllers, in registration order
    pub fn controller_names(&self) -> Vec<String> {
        self.controllers.iter().map(|c| c.name().to_string()).collect()
    }

    /// Run every controller until `shutdown` is cancelled
    ///
    /// At most `workers` syncs run at the same time.
    pub async fn run(self, shutdown: CancellationToken, workers: usize) {
        let permits = Arc::new(Semaphore::new(workers.max(1)));
        let mut handles = Vec::with_capacity(self.controllers.len());

        for controller in &self.controllers {
            let worker = Worker {
                controller: controller.clone(),
                metrics: self.metrics.clone(),
                events: self.events.clone(),
                permits: permits.clone(),
                resync_interval: self.resync_interval,
            };
            let trigger = self.trigger.subscribe();
            let shutdown = shutdown.clone();
            handles.push(tokio::spawn(worker.run(trigger, shutdown)));
        }

        info!("Started {} controllers", handles.len());
        for handle in handles {
            if let Err(e) = handle.await {
                error!("Controller task failed: {}", e);
            }
        }
        info!("All controllers stopped");
    }
}

// =============================================================================
// Worker
// =============================================================================

struct Worker {
    controller: Arc<dyn Controller>,
    metrics: ControllerMetrics,
    events: EventPublisher,
    permits: Arc<Semaphore>,
    resync_interval: Duration,
}

impl Worker {
    async fn run(self, trigger: watch::Receiver<u64>, shutdown: CancellationToken) {
        let name = self.controller.name().to_string();
        let mut trigger = Some(trigger);
        let mut failing = false;
        debug!("{}: starting", name);

        loop {
            let outcome = tokio::select! {
                _ = shutdown.cancelled() => break,
                outcome = self.sync_with_backoff() => outcome,
            };

            let next_sync = match outcome {
                SyncOutcome::Synced => {
                    if failing {
                        self.events
                            .normal("SyncRecovered", "Sync", format!("{} recovered", name))
                            .await;
                    }
                    failing = false;
                    self.resync_interval
                }
                SyncOutcome::Failed { retry_in } => {
                    failing = true;
                    retry_in
                }
            };

            let wake = tokio::select! {
                _ = shutdown.cancelled() => Wake::Shutdown,
                changed = wait_for_trigger(&mut trigger) => {
                    if changed { Wake::Trigger } else { Wake::TriggerClosed }
                }
                _ = tokio::time::sleep(next_sync) => Wake::Resync,
            };

            match wake {
                Wake::Shutdown => break,
                Wake::Trigger => debug!("{}: triggered", name),
                Wake::TriggerClosed => {
                    warn!("{}: trigger closed, falling back to periodic resync", name);
                    trigger = None;
                }
                Wake::Resync => debug!("{}: resync", name),
            }
        }

        debug!("{}: stopped", name);
    }

    /// Sync, retrying transient errors until the resync interval elapses
    ///
    /// Errors that ask for a delayed requeue are not retried here; the
    /// caller waits for the delay or the next trigger, whichever is first.
    async fn sync_with_backoff(&self) -> SyncOutcome {
        let name = self.controller.name();
        let operation = move || async move {
            let _permit = self
                .permits
                .acquire()
                .await
                .map_err(|e| backoff::Error::permanent(Error::Internal(e.to_string())))?;

            self.metrics.record_sync(name);
            self.controller.sync().await.map_err(|e| {
                self.metrics.record_error(name);
                warn!("{}: sync failed: {}", name, e);
                match e.action() {
                    ErrorAction::RequeueWithBackoff => backoff::Error::transient(e),
                    ErrorAction::RequeueAfter(_) | ErrorAction::NoRequeue => {
                        backoff::Error::permanent(e)
                    }
                }
            })
        };

        match backoff::future::retry(self.backoff_policy(), operation).await {
            Ok(()) => SyncOutcome::Synced,
            Err(e) => {
                let retry_in = match e.action() {
                    ErrorAction::RequeueAfter(after) => after.min(self.resync_interval),
                    _ => self.resync_interval,
                };
                error!("{}: giving up for {:?} or until next trigger: {}", name, retry_in, e);
                self.events
                    .warning("SyncFailed", "Sync", format!("{}: {}", name, e))
                    .await;
                SyncOutcome::Failed { retry_in }
            }
        }
    }

    fn backoff_policy(&self) -> ExponentialBackoff {
        ExponentialBackoffBuilder::new()
            .with_initial_interval(Duration::from_millis(500))
            .with_max_interval(Duration::from_secs(30))
            .with_max_elapsed_time(Some(self.resync_interval))
            .build()
    }
}

/// Wait for the next trigger; returns false once the sender is gone
async fn wait_for_trigger(trigger: &mut Option<watch::Receiver<u64>>) -> bool {
    match trigger {
        Some(rx) => rx.changed().await.is_ok(),
        None => std::future::pending().await,
    }
}
