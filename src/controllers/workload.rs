//! CSI Driver Workload Controllers
//!
//! Roll out the driver's controller Deployment and node DaemonSet from their
//! templates and report availability from the applied object's status.

use super::{Controller, REASON_AS_EXPECTED, REASON_SYNC_ERROR};
use crate::assets::{self, AssetFn};
use crate::client::{OperatorClient, ResourceApplier};
use crate::config::OperatorConfig;
use crate::crd::{ConditionStatus, GenerationStatus, OperatorCondition};
use crate::error::{Error, Result};
use async_trait::async_trait;
use k8s_openapi::api::apps::v1::{DaemonSet, Deployment};
use kube::api::DynamicObject;
use std::sync::Arc;
use tracing::{debug, info};

// =============================================================================
// Workload Kind
// =============================================================================

/// Kind of workload a controller rolls out
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WorkloadKind {
    /// Driver controller service
    Deployment,
    /// Driver node service
    DaemonSet,
}

impl WorkloadKind {
    pub fn kind(&self) -> &'static str {
        match self {
            WorkloadKind::Deployment => "Deployment",
            WorkloadKind::DaemonSet => "DaemonSet",
        }
    }

    pub fn resource(&self) -> &'static str {
        match self {
            WorkloadKind::Deployment => "deployments",
            WorkloadKind::DaemonSet => "daemonsets",
        }
    }
}

impl std::fmt::Display for WorkloadKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.kind())
    }
}

// =============================================================================
// Rollout Status
// =============================================================================

/// Rollout state derived from a workload's status
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RolloutStatus {
    pub namespace: String,
    pub name: String,
    pub generation: i64,
    pub available: bool,
    pub progressing: bool,
}

impl RolloutStatus {
    /// Rollout state of a Deployment
    pub fn from_deployment(deployment: &Deployment) -> Self {
        let generation = deployment.metadata.generation.unwrap_or(0);
        let desired = deployment
            .spec
            .as_ref()
            .and_then(|s| s.replicas)
            .unwrap_or(1);
        let status = deployment.status.clone().unwrap_or_default();

        Self {
            namespace: deployment.metadata.namespace.clone().unwrap_or_default(),
            name: deployment.metadata.name.clone().unwrap_or_default(),
            generation,
            available: status.available_replicas.unwrap_or(0) > 0,
            progressing: status.observed_generation.unwrap_or(0) < generation
                || status.updated_replicas.unwrap_or(0) < desired,
        }
    }

    /// Rollout state of a DaemonSet
    pub fn from_daemonset(daemonset: &DaemonSet) -> Self {
        let generation = daemonset.metadata.generation.unwrap_or(0);
        let status = daemonset.status.clone().unwrap_or_default();

        Self {
            namespace: daemonset.metadata.namespace.clone().unwrap_or_default(),
            name: daemonset.metadata.name.clone().unwrap_or_default(),
            generation,
            available: status.number_available.unwrap_or(0) > 0,
            progressing: status.observed_generation.unwrap_or(0) < generation
                || status.updated_number_scheduled.unwrap_or(0) < status.desired_number_scheduled,
        }
    }

    /// Available and Progressing conditions for a controller
    pub fn conditions(&self, controller: &str, kind: WorkloadKind) -> Vec<OperatorCondition> {
        let available = if self.available {
            OperatorCondition::new(
                format!("{}Available", controller),
                ConditionStatus::True,
                REASON_AS_EXPECTED,
                "",
            )
        } else {
            OperatorCondition::new(
                format!("{}Available", controller),
                ConditionStatus::False,
                "Deploying",
                format!("Waiting for {} to deploy pods", kind),
            )
        };

        let progressing = if self.progressing {
            OperatorCondition::new(
                format!("{}Progressing", controller),
                ConditionStatus::True,
                "Deploying",
                format!("Waiting for {} to act on changes", kind),
            )
        } else {
            OperatorCondition::new(
                format!("{}Progressing", controller),
                ConditionStatus::False,
                REASON_AS_EXPECTED,
                "",
            )
        };

        vec![available, progressing]
    }
}

// =============================================================================
// Workload Controller
// =============================================================================

pub struct WorkloadController {
    name: String,
    kind: WorkloadKind,
    client: Arc<dyn OperatorClient>,
    applier: Arc<dyn ResourceApplier>,
    asset_fn: AssetFn,
    file: String,
    config: OperatorConfig,
}

impl WorkloadController {
    /// Controller for the driver's controller-service Deployment
    pub fn controller_service(
        name: impl Into<String>,
        asset_fn: AssetFn,
        file: impl Into<String>,
        client: Arc<dyn OperatorClient>,
        applier: Arc<dyn ResourceApplier>,
        config: OperatorConfig,
    ) -> Self {
        Self {
            name: name.into(),
            kind: WorkloadKind::Deployment,
            client,
            applier,
            asset_fn,
            file: file.into(),
            config,
        }
    }

    /// Controller for the driver's node-service DaemonSet
    pub fn node_service(
        name: impl Into<String>,
        asset_fn: AssetFn,
        file: impl Into<String>,
        client: Arc<dyn OperatorClient>,
        applier: Arc<dyn ResourceApplier>,
        config: OperatorConfig,
    ) -> Self {
        Self {
            kind: WorkloadKind::DaemonSet,
            ..Self::controller_service(name, asset_fn, file, client, applier, config)
        }
    }

    pub fn kind(&self) -> WorkloadKind {
        self.kind
    }

    /// Render, apply and inspect the workload
    async fn rollout(&self, object: DynamicObject) -> Result<RolloutStatus> {
        let kind = object.types.as_ref().map(|t| t.kind.as_str()).unwrap_or_default();
        if kind != self.kind.kind() {
            return Err(Error::InvalidManifest {
                asset: self.file.clone(),
                reason: format!("expected a {}, found {}", self.kind, kind),
            });
        }

        let applied = serde_json::to_value(self.applier.apply(object).await?)?;
        Ok(match self.kind {
            WorkloadKind::Deployment => {
                RolloutStatus::from_deployment(&serde_json::from_value(applied)?)
            }
            WorkloadKind::DaemonSet => {
                RolloutStatus::from_daemonset(&serde_json::from_value(applied)?)
            }
        })
    }

    fn degraded(&self, error: Option<&Error>) -> OperatorCondition {
        let r#type = format!("{}Degraded", self.name);
        match error {
            Some(e) => OperatorCondition::new(
                r#type,
                ConditionStatus::True,
                REASON_SYNC_ERROR,
                e.to_string(),
            ),
            None => OperatorCondition::new(r#type, ConditionStatus::False, REASON_AS_EXPECTED, ""),
        }
    }
}

#[async_trait]
impl Controller for WorkloadController {
    fn name(&self) -> &str {
        &self.name
    }

    async fn sync(&self) -> Result<()> {
        let instance = self.client.get_instance().await?;
        if !instance.spec.management_state.is_managed() {
            debug!(
                "{}: skipping sync, management state is {}",
                self.name, instance.spec.management_state
            );
            return Ok(());
        }

        let vars = self.config.template_vars(instance.spec.log_level);
        let result = match assets::load_manifest(self.asset_fn, &self.file, &vars) {
            Ok(object) => self.rollout(object).await,
            Err(e) => Err(e),
        };

        let rollout = match result {
            Ok(rollout) => rollout,
            Err(e) => {
                self.client.update_conditions(vec![self.degraded(Some(&e))]).await?;
                return Err(e);
            }
        };

        let mut conditions = rollout.conditions(&self.name, self.kind);
        conditions.push(self.degraded(None));
        self.client.update_conditions(conditions).await?;

        self.client
            .update_generation(GenerationStatus {
                group: "apps".to_string(),
                resource: self.kind.resource().to_string(),
                namespace: rollout.namespace.clone(),
                name: rollout.name.clone(),
                last_generation: rollout.generation,
            })
            .await?;

        if rollout.progressing {
            info!(
                "{}: {} {}/{} is rolling out",
                self.name, self.kind, rollout.namespace, rollout.name
            );
        }
        Ok(())
    }
}
