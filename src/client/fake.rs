//! In-memory clients for controller tests

use super::{OperatorClient, ResourceApplier};
use crate::crd::{
    ClusterCSIDriver, ClusterCSIDriverSpec, GenerationStatus, ManagementState, OperatorCondition,
};
use crate::error::{Error, Result};
use async_trait::async_trait;
use kube::api::DynamicObject;
use parking_lot::Mutex;
use std::collections::{BTreeMap, BTreeSet};

/// Operator client holding a single instance in memory
pub struct FakeOperatorClient {
    instance: Mutex<Option<ClusterCSIDriver>>,
}

impl FakeOperatorClient {
    pub fn new(spec: ClusterCSIDriverSpec) -> Self {
        let mut instance = ClusterCSIDriver::new(crate::operator::INSTANCE_NAME, spec);
        instance.metadata.generation = Some(1);
        Self {
            instance: Mutex::new(Some(instance)),
        }
    }

    pub fn with_state(state: ManagementState) -> Self {
        Self::new(ClusterCSIDriverSpec {
            management_state: state,
            ..Default::default()
        })
    }

    pub fn missing() -> Self {
        Self {
            instance: Mutex::new(None),
        }
    }

    pub fn set_spec(&self, spec: ClusterCSIDriverSpec) {
        if let Some(instance) = self.instance.lock().as_mut() {
            instance.spec = spec;
        }
    }

    pub fn condition(&self, r#type: &str) -> Option<OperatorCondition> {
        self.instance
            .lock()
            .as_ref()
            .and_then(|i| i.status.as_ref())
            .and_then(|s| s.conditions.iter().find(|c| c.r#type == r#type).cloned())
    }

    pub fn generations(&self) -> Vec<GenerationStatus> {
        self.instance
            .lock()
            .as_ref()
            .and_then(|i| i.status.as_ref())
            .map(|s| s.generations.clone())
            .unwrap_or_default()
    }

    fn not_found() -> Error {
        Error::ResourceNotFound {
            kind: "ClusterCSIDriver".to_string(),
            name: crate::operator::INSTANCE_NAME.to_string(),
        }
    }
}

#[async_trait]
impl OperatorClient for FakeOperatorClient {
    async fn get_instance(&self) -> Result<ClusterCSIDriver> {
        self.instance.lock().clone().ok_or_else(Self::not_found)
    }

    async fn update_conditions(&self, conditions: Vec<OperatorCondition>) -> Result<()> {
        let mut guard = self.instance.lock();
        let instance = guard.as_mut().ok_or_else(Self::not_found)?;
        let status = instance.status.get_or_insert_with(Default::default);
        for condition in conditions {
            status.set_condition(condition);
        }
        Ok(())
    }

    async fn update_generation(&self, generation: GenerationStatus) -> Result<()> {
        let mut guard = self.instance.lock();
        let instance = guard.as_mut().ok_or_else(Self::not_found)?;
        instance
            .status
            .get_or_insert_with(Default::default)
            .set_generation(generation);
        Ok(())
    }
}

/// Applier that records objects and can be told to fail or report status
#[derive(Default)]
pub struct FakeApplier {
    applied: Mutex<Vec<DynamicObject>>,
    failing: Mutex<BTreeSet<String>>,
    statuses: Mutex<BTreeMap<String, serde_json::Value>>,
    generation: Mutex<Option<i64>>,
}

impl FakeApplier {
    pub fn new() -> Self {
        Self::default()
    }

    /// Fail every apply of an object with this name
    pub fn fail_on(&self, name: &str) {
        self.failing.lock().insert(name.to_string());
    }

    /// Attach a status to every returned object with this name
    pub fn set_status(&self, name: &str, status: serde_json::Value) {
        self.statuses.lock().insert(name.to_string(), status);
    }

    /// Generation stamped on returned objects
    pub fn set_generation(&self, generation: i64) {
        *self.generation.lock() = Some(generation);
    }

    pub fn applied_names(&self) -> Vec<String> {
        self.applied
            .lock()
            .iter()
            .filter_map(|o| o.metadata.name.clone())
            .collect()
    }

    pub fn applied(&self) -> Vec<DynamicObject> {
        self.applied.lock().clone()
    }
}

#[async_trait]
impl ResourceApplier for FakeApplier {
    async fn apply(&self, object: DynamicObject) -> Result<DynamicObject> {
        let name = object.metadata.name.clone().unwrap_or_default();
        if self.failing.lock().contains(&name) {
            return Err(Error::Internal(format!("injected failure for {}", name)));
        }

        self.applied.lock().push(object.clone());

        let mut returned = object;
        returned.metadata.generation = *self.generation.lock();
        if let Some(status) = self.statuses.lock().get(&name) {
            returned.data["status"] = status.clone();
        }
        Ok(returned)
    }
}
