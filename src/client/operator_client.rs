//! Operator Client
//!
//! Reads the ClusterCSIDriver instance and writes controller status back
//! through the status subresource.

use crate::crd::{ClusterCSIDriver, ClusterCSIDriverStatus, GenerationStatus, OperatorCondition};
use crate::error::{Error, Result};
use async_trait::async_trait;
use kube::api::{Api, Patch, PatchParams};
use kube::Client;
use tracing::debug;

/// Access to the operator's configuration object
#[async_trait]
pub trait OperatorClient: Send + Sync {
    /// Fetch the current instance
    async fn get_instance(&self) -> Result<ClusterCSIDriver>;

    /// Merge conditions into status, leaving other controllers' conditions intact
    async fn update_conditions(&self, conditions: Vec<OperatorCondition>) -> Result<()>;

    /// Record the generation of a rolled out workload
    async fn update_generation(&self, generation: GenerationStatus) -> Result<()>;
}

/// [`OperatorClient`] backed by the cluster API
pub struct KubeOperatorClient {
    api: Api<ClusterCSIDriver>,
    instance_name: String,
}

impl KubeOperatorClient {
    pub fn new(client: Client, instance_name: impl Into<String>) -> Self {
        Self {
            api: Api::all(client),
            instance_name: instance_name.into(),
        }
    }

    /// Apply a status mutation with optimistic locking on the resource version
    async fn patch_status<F>(&self, mutate: F) -> Result<()>
    where
        F: FnOnce(&mut ClusterCSIDriverStatus) + Send,
    {
        let instance = self.get_instance().await?;
        let mut status = instance.status.clone().unwrap_or_default();
        mutate(&mut status);
        status.observed_generation = instance.metadata.generation;

        if instance.status.as_ref() == Some(&status) {
            return Ok(());
        }

        let patch = serde_json::json!({
            "metadata": { "resourceVersion": instance.metadata.resource_version },
            "status": status,
        });
        self.api
            .patch_status(&self.instance_name, &PatchParams::default(), &Patch::Merge(&patch))
            .await?;

        debug!("Updated status of ClusterCSIDriver {}", self.instance_name);
        Ok(())
    }
}

#[async_trait]
impl OperatorClient for KubeOperatorClient {
    async fn get_instance(&self) -> Result<ClusterCSIDriver> {
        self.api
            .get_opt(&self.instance_name)
            .await?
            .ok_or_else(|| Error::ResourceNotFound {
                kind: "ClusterCSIDriver".to_string(),
                name: self.instance_name.clone(),
            })
    }

    async fn update_conditions(&self, conditions: Vec<OperatorCondition>) -> Result<()> {
        self.patch_status(move |status| {
            for condition in conditions {
                status.set_condition(condition);
            }
        })
        .await
    }

    async fn update_generation(&self, generation: GenerationStatus) -> Result<()> {
        self.patch_status(move |status| status.set_generation(generation))
            .await
    }
}
