//! Custom Resource Definitions
//!
//! - ClusterCSIDriver: cluster-scoped operator configuration and status

pub mod cluster_csi_driver;

pub use cluster_csi_driver::*;
