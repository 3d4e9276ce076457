//! Static Resources Controller
//!
//! Applies a fixed, ordered list of bundled manifests. Failures on one file
//! don't stop the rest; they are collected into a single Degraded condition.

use super::{Controller, REASON_AS_EXPECTED, REASON_SYNC_ERROR};
use crate::assets::{self, AssetFn};
use crate::client::{OperatorClient, ResourceApplier};
use crate::crd::{ConditionStatus, OperatorCondition};
use crate::error::{Error, Result};
use async_trait::async_trait;
use std::collections::BTreeMap;
use std::sync::Arc;
use tracing::{debug, warn};

pub struct StaticResourcesController {
    name: String,
    client: Arc<dyn OperatorClient>,
    applier: Arc<dyn ResourceApplier>,
    asset_fn: AssetFn,
    files: Vec<String>,
    vars: BTreeMap<String, String>,
}

impl StaticResourcesController {
    pub fn new(
        name: impl Into<String>,
        client: Arc<dyn OperatorClient>,
        applier: Arc<dyn ResourceApplier>,
        asset_fn: AssetFn,
        files: &[&str],
        namespace: &str,
    ) -> Self {
        let mut vars = BTreeMap::new();
        vars.insert("NAMESPACE".to_string(), namespace.to_string());

        Self {
            name: name.into(),
            client,
            applier,
            asset_fn,
            files: files.iter().map(|f| f.to_string()).collect(),
            vars,
        }
    }

    fn degraded_type(&self) -> String {
        format!("{}Degraded", self.name)
    }

    async fn apply_file(&self, file: &str) -> Result<()> {
        let object = assets::load_manifest(self.asset_fn, file, &self.vars)?;
        self.applier.apply(object).await?;
        debug!("{}: applied {}", self.name, file);
        Ok(())
    }
}

#[async_trait]
impl Controller for StaticResourcesController {
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

        let mut failures = Vec::new();
        for file in &self.files {
            if let Err(e) = self.apply_file(file).await {
                warn!("{}: failed to apply {}: {}", self.name, file, e);
                failures.push(format!("{}: {}", file, e));
            }
        }

        if failures.is_empty() {
            return self
                .client
                .update_conditions(vec![OperatorCondition::new(
                    self.degraded_type(),
                    ConditionStatus::False,
                    REASON_AS_EXPECTED,
                    "",
                )])
                .await;
        }

        let message = failures.join("\n");
        self.client
            .update_conditions(vec![OperatorCondition::new(
                self.degraded_type(),
                ConditionStatus::True,
                REASON_SYNC_ERROR,
                message.clone(),
            )])
            .await?;

        Err(Error::StaticResourceSync {
            controller: self.name.clone(),
            failures: failures.len(),
            message,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::client::fake::{FakeApplier, FakeOperatorClient};
    use crate::crd::ManagementState;
    use crate::operator::STATIC_ASSETS;
    use assert_matches::assert_matches;

    fn controller(
        state: ManagementState,
    ) -> (StaticResourcesController, Arc<FakeOperatorClient>, Arc<FakeApplier>) {
        let client = Arc::new(FakeOperatorClient::with_state(state));
        let applier = Arc::new(FakeApplier::new());
        let controller = StaticResourcesController::new(
            "TestStaticResources",
            client.clone(),
            applier.clone(),
            assets::asset,
            STATIC_ASSETS,
            "csi-ns",
        );
        (controller, client, applier)
    }

    #[tokio::test]
    async fn test_applies_every_file_in_order() {
        let (controller, client, applier) = controller(ManagementState::Managed);
        controller.sync().await.unwrap();

        let applied = applier.applied();
        assert_eq!(applied.len(), STATIC_ASSETS.len());
        assert_eq!(
            applied[0].metadata.name.as_deref(),
            Some("openstack-cinder-config")
        );
        assert_eq!(applied[0].metadata.namespace.as_deref(), Some("csi-ns"));
        assert_eq!(
            applied.last().and_then(|o| o.metadata.name.as_deref()),
            Some("openstack-cinder-csi-snapshotter-binding")
        );

        let condition = client.condition("TestStaticResourcesDegraded").unwrap();
        assert_eq!(condition.status, ConditionStatus::False);
    }

    #[tokio::test]
    async fn test_failures_are_aggregated() {
        let (controller, client, applier) = controller(ManagementState::Managed);
        applier.fail_on("standard-csi");
        applier.fail_on("openstack-cinder-privileged-role");

        let err = controller.sync().await.unwrap_err();
        assert_matches!(err, Error::StaticResourceSync { failures: 2, .. });

        // The remaining manifests are still applied
        assert_eq!(applier.applied().len(), STATIC_ASSETS.len() - 2);

        let condition = client.condition("TestStaticResourcesDegraded").unwrap();
        assert_eq!(condition.status, ConditionStatus::True);
        assert_eq!(condition.reason.as_deref(), Some(REASON_SYNC_ERROR));
        let message = condition.message.unwrap();
        assert!(message.contains("storageclass.yaml"));
        assert!(message.contains("rbac/privileged_role.yaml"));
    }

    #[tokio::test]
    async fn test_unmanaged_skips_apply() {
        let (controller, client, applier) = controller(ManagementState::Unmanaged);
        controller.sync().await.unwrap();

        assert!(applier.applied().is_empty());
        assert!(client.condition("TestStaticResourcesDegraded").is_none());
    }

    #[tokio::test]
    async fn test_unknown_asset_degrades() {
        let client = Arc::new(FakeOperatorClient::with_state(ManagementState::Managed));
        let applier = Arc::new(FakeApplier::new());
        let controller = StaticResourcesController::new(
            "Broken",
            client.clone(),
            applier,
            assets::asset,
            &["missing.yaml"],
            "csi-ns",
        );

        assert!(controller.sync().await.is_err());
        let condition = client.condition("BrokenDegraded").unwrap();
        assert!(condition.message.unwrap().contains("missing.yaml"));
    }
}
