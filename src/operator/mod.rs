//! OpenStack Cinder CSI Driver Operator
//!
//! Fixed names of the operator, its operand and the manifests it manages,
//! plus the entry point that wires the controllers together.

pub mod starter;

pub use starter::*;

/// Namespace shared by the operator and its operand
pub const DEFAULT_NAMESPACE: &str = "openshift-cluster-csi-drivers";

/// Name of this operator, also used as field manager and event reporter
pub const OPERATOR_NAME: &str = "openstack-cinder-csi-driver-operator";

/// Name of the managed CSI driver
pub const OPERAND_NAME: &str = "openstack-cinder-csi-driver";

/// Name of the ClusterCSIDriver instance configuring this operator
pub const INSTANCE_NAME: &str = "cinder.csi.openstack.org";

/// Manifests kept in sync by the static resources controller, in apply order
pub const STATIC_ASSETS: &[&str] = &[
    "configmap.yaml",
    "storageclass.yaml",
    "csidriver.yaml",
    "controller_sa.yaml",
    "node_sa.yaml",
    "rbac/attacher_role.yaml",
    "rbac/attacher_binding.yaml",
    "rbac/privileged_role.yaml",
    "rbac/controller_privileged_binding.yaml",
    "rbac/node_privileged_binding.yaml",
    "rbac/provisioner_role.yaml",
    "rbac/provisioner_binding.yaml",
    "rbac/resizer_role.yaml",
    "rbac/resizer_binding.yaml",
    "rbac/snapshotter_role.yaml",
    "rbac/snapshotter_binding.yaml",
];

/// Template of the driver's controller Deployment
pub const CONTROLLER_ASSET: &str = "controller.yaml";

/// Template of the driver's node DaemonSet
pub const NODE_ASSET: &str = "node.yaml";

pub const STATIC_RESOURCES_CONTROLLER: &str = "OpenStackCinderDriverStaticResourcesController";
pub const CONTROLLER_SERVICE_CONTROLLER: &str = "OpenStackCinderDriverControllerServiceController";
pub const NODE_SERVICE_CONTROLLER: &str = "OpenStackCinderDriverNodeServiceController";

#[cfg(test)]
mod tests {
    use super::*;
    use crate::assets;

    #[test]
    fn test_constants() {
        assert_eq!(DEFAULT_NAMESPACE, "openshift-cluster-csi-drivers");
        assert_eq!(OPERATOR_NAME, "openstack-cinder-csi-driver-operator");
        assert_eq!(OPERAND_NAME, "openstack-cinder-csi-driver");
        assert_eq!(INSTANCE_NAME, "cinder.csi.openstack.org");
    }

    #[test]
    fn test_static_assets_resolve() {
        assert_eq!(STATIC_ASSETS.len(), 16);
        for name in STATIC_ASSETS {
            assert!(assets::asset(name).is_ok(), "{} is not bundled", name);
        }
        assert!(assets::asset(CONTROLLER_ASSET).is_ok());
        assert!(assets::asset(NODE_ASSET).is_ok());
    }

    #[test]
    fn test_bundle_has_no_extra_assets() {
        let bundled: Vec<&str> = assets::asset_names().collect();
        let mut expected: Vec<&str> = STATIC_ASSETS.to_vec();
        expected.push(CONTROLLER_ASSET);
        expected.push(NODE_ASSET);
        assert_eq!(bundled, expected);
    }

    #[test]
    fn test_storage_class_uses_driver_name() {
        let storage_class = assets::asset("storageclass.yaml").unwrap();
        assert!(storage_class.contains(&format!("provisioner: {}", INSTANCE_NAME)));
        let csi_driver = assets::asset("csidriver.yaml").unwrap();
        assert!(csi_driver.contains(&format!("name: {}", INSTANCE_NAME)));
    }
}
