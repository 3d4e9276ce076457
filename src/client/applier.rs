//! Resource Applier
//!
//! Server-side apply for the untyped manifests the operator ships. The set
//! of kinds is closed: only what the bundled manifests contain is mapped.

use crate::error::{Error, Result};
use async_trait::async_trait;
use k8s_openapi::api::apps::v1::{DaemonSet, Deployment};
use k8s_openapi::api::core::v1::{ConfigMap, ServiceAccount};
use k8s_openapi::api::rbac::v1::{ClusterRole, ClusterRoleBinding, Role, RoleBinding};
use k8s_openapi::api::storage::v1::{CSIDriver, StorageClass};
use kube::api::{Api, DynamicObject, Patch, PatchParams};
use kube::discovery::ApiResource;
use kube::Client;
use tracing::debug;

/// Applies manifests to the cluster
#[async_trait]
pub trait ResourceApplier: Send + Sync {
    /// Apply the object and return the server's view of it
    async fn apply(&self, object: DynamicObject) -> Result<DynamicObject>;
}

/// API resource and scope of a supported kind
#[derive(Debug, Clone)]
pub struct KindInfo {
    pub resource: ApiResource,
    pub namespaced: bool,
}

/// Map an `apiVersion`/`kind` pair onto its API resource
pub fn resolve_kind(api_version: &str, kind: &str) -> Result<KindInfo> {
    let (resource, namespaced) = match (api_version, kind) {
        ("v1", "ConfigMap") => (ApiResource::erase::<ConfigMap>(&()), true),
        ("v1", "ServiceAccount") => (ApiResource::erase::<ServiceAccount>(&()), true),
        ("storage.k8s.io/v1", "StorageClass") => (ApiResource::erase::<StorageClass>(&()), false),
        ("storage.k8s.io/v1", "CSIDriver") => (ApiResource::erase::<CSIDriver>(&()), false),
        ("rbac.authorization.k8s.io/v1", "ClusterRole") => {
            (ApiResource::erase::<ClusterRole>(&()), false)
        }
        ("rbac.authorization.k8s.io/v1", "ClusterRoleBinding") => {
            (ApiResource::erase::<ClusterRoleBinding>(&()), false)
        }
        ("rbac.authorization.k8s.io/v1", "Role") => (ApiResource::erase::<Role>(&()), true),
        ("rbac.authorization.k8s.io/v1", "RoleBinding") => {
            (ApiResource::erase::<RoleBinding>(&()), true)
        }
        ("apps/v1", "Deployment") => (ApiResource::erase::<Deployment>(&()), true),
        ("apps/v1", "DaemonSet") => (ApiResource::erase::<DaemonSet>(&()), true),
        _ => {
            return Err(Error::UnsupportedKind {
                api_version: api_version.to_string(),
                kind: kind.to_string(),
            })
        }
    };

    Ok(KindInfo {
        resource,
        namespaced,
    })
}

/// [`ResourceApplier`] using forced server-side apply
pub struct KubeApplier {
    client: Client,
    field_manager: String,
}

impl KubeApplier {
    pub fn new(client: Client, field_manager: impl Into<String>) -> Self {
        Self {
            client,
            field_manager: field_manager.into(),
        }
    }
}

#[async_trait]
impl ResourceApplier for KubeApplier {
    async fn apply(&self, object: DynamicObject) -> Result<DynamicObject> {
        let types = object.types.clone().ok_or_else(|| Error::InvalidManifest {
            asset: object.metadata.name.clone().unwrap_or_default(),
            reason: "missing apiVersion or kind".to_string(),
        })?;
        let name = object
            .metadata
            .name
            .clone()
            .ok_or_else(|| Error::InvalidManifest {
                asset: types.kind.clone(),
                reason: "missing metadata.name".to_string(),
            })?;
        let info = resolve_kind(&types.api_version, &types.kind)?;

        let api: Api<DynamicObject> = if info.namespaced {
            let namespace = object
                .metadata
                .namespace
                .clone()
                .ok_or_else(|| Error::InvalidManifest {
                    asset: name.clone(),
                    reason: format!("{} must be namespaced", types.kind),
                })?;
            Api::namespaced_with(self.client.clone(), &namespace, &info.resource)
        } else {
            Api::all_with(self.client.clone(), &info.resource)
        };

        let applied = api
            .patch(
                &name,
                &PatchParams::apply(&self.field_manager).force(),
                &Patch::Apply(&object),
            )
            .await?;

        debug!(kind = %types.kind, name = %name, "Applied manifest");
        Ok(applied)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use assert_matches::assert_matches;

    #[test]
    fn test_resolve_cluster_scoped_kind() {
        let info = resolve_kind("storage.k8s.io/v1", "CSIDriver").unwrap();
        assert!(!info.namespaced);
        assert_eq!(info.resource.plural, "csidrivers");
        assert_eq!(info.resource.group, "storage.k8s.io");
    }

    #[test]
    fn test_resolve_namespaced_kind() {
        let info = resolve_kind("apps/v1", "DaemonSet").unwrap();
        assert!(info.namespaced);
        assert_eq!(info.resource.plural, "daemonsets");
    }

    #[test]
    fn test_resolve_unknown_kind() {
        assert_matches!(
            resolve_kind("v1", "Secret"),
            Err(Error::UnsupportedKind { kind, .. }) if kind == "Secret"
        );
    }

    #[test]
    fn test_every_bundled_kind_resolves() {
        for name in crate::assets::asset_names() {
            let template = crate::assets::asset(name).unwrap();
            let value: serde_json::Value = serde_yaml::from_str(template).unwrap();
            let api_version = value["apiVersion"].as_str().unwrap();
            let kind = value["kind"].as_str().unwrap();
            assert!(
                resolve_kind(api_version, kind).is_ok(),
                "{} uses unsupported kind {}",
                name,
                kind
            );
        }
    }
}
