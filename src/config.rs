//! Operator Configuration
//!
//! Runtime settings assembled from the command line and environment.

use crate::crd::LogLevel;
use crate::operator::{DEFAULT_NAMESPACE, INSTANCE_NAME, OPERAND_NAME, OPERATOR_NAME};
use std::collections::BTreeMap;
use std::time::Duration;

// =============================================================================
// Images
// =============================================================================

/// Container images substituted into the workload templates
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ImageConfig {
    pub driver: String,
    pub provisioner: String,
    pub attacher: String,
    pub resizer: String,
    pub snapshotter: String,
    pub node_driver_registrar: String,
    pub liveness_probe: String,
}

impl Default for ImageConfig {
    fn default() -> Self {
        Self {
            driver: "registry.k8s.io/provider-os/cinder-csi-plugin:v1.29.0".to_string(),
            provisioner: "registry.k8s.io/sig-storage/csi-provisioner:v4.0.0".to_string(),
            attacher: "registry.k8s.io/sig-storage/csi-attacher:v4.5.0".to_string(),
            resizer: "registry.k8s.io/sig-storage/csi-resizer:v1.10.0".to_string(),
            snapshotter: "registry.k8s.io/sig-storage/csi-snapshotter:v7.0.0".to_string(),
            node_driver_registrar: "registry.k8s.io/sig-storage/csi-node-driver-registrar:v2.10.0"
                .to_string(),
            liveness_probe: "registry.k8s.io/sig-storage/livenessprobe:v2.12.0".to_string(),
        }
    }
}

impl ImageConfig {
    /// Template placeholders keyed by name, without the `${}` wrapper
    pub fn template_vars(&self) -> BTreeMap<String, String> {
        [
            ("DRIVER_IMAGE", &self.driver),
            ("PROVISIONER_IMAGE", &self.provisioner),
            ("ATTACHER_IMAGE", &self.attacher),
            ("RESIZER_IMAGE", &self.resizer),
            ("SNAPSHOTTER_IMAGE", &self.snapshotter),
            ("NODE_DRIVER_REGISTRAR_IMAGE", &self.node_driver_registrar),
            ("LIVENESS_PROBE_IMAGE", &self.liveness_probe),
        ]
        .into_iter()
        .map(|(k, v)| (k.to_string(), v.clone()))
        .collect()
    }
}

// =============================================================================
// Operator Configuration
// =============================================================================

/// Configuration for the operator process
#[derive(Debug, Clone)]
pub struct OperatorConfig {
    /// Namespace shared by the operator and its operand
    pub namespace: String,
    /// Name of the ClusterCSIDriver instance to act on
    pub instance_name: String,
    /// Name of the managed operand
    pub operand_name: String,
    /// Field manager used for server-side apply
    pub field_manager: String,
    /// Workload images
    pub images: ImageConfig,
    /// Periodic resync for every controller
    pub resync_interval: Duration,
    /// Maximum number of concurrent controller syncs
    pub workers: usize,
}

impl Default for OperatorConfig {
    fn default() -> Self {
        Self {
            namespace: DEFAULT_NAMESPACE.to_string(),
            instance_name: INSTANCE_NAME.to_string(),
            operand_name: OPERAND_NAME.to_string(),
            field_manager: OPERATOR_NAME.to_string(),
            images: ImageConfig::default(),
            resync_interval: Duration::from_secs(60),
            workers: 1,
        }
    }
}

impl OperatorConfig {
    /// Placeholders for a workload template at the given operand verbosity
    pub fn template_vars(&self, log_level: LogLevel) -> BTreeMap<String, String> {
        let mut vars = self.images.template_vars();
        vars.insert("NAMESPACE".to_string(), self.namespace.clone());
        vars.insert("LOG_LEVEL".to_string(), log_level.verbosity().to_string());
        vars
    }
}
