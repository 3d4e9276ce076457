//! OpenStack Cinder CSI Driver Operator
//!
//! A Kubernetes operator that installs the OpenStack Cinder CSI driver and
//! keeps it converged with the ClusterCSIDriver `cinder.csi.openstack.org`.
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                            Controller Set                               │
//! ├─────────────────────────────────────────────────────────────────────────┤
//! │  ┌──────────────┐ ┌──────────────┐ ┌──────────────┐ ┌─────────────────┐ │
//! │  │  Log Level   │ │  Management  │ │    Static    │ │ Controller/Node │ │
//! │  │              │ │    State     │ │  Resources   │ │    Services     │ │
//! │  └──────┬───────┘ └──────┬───────┘ └──────┬───────┘ └────────┬────────┘ │
//! │         └────────────────┴────────┬───────┴──────────────────┘          │
//! │                                   │                                     │
//! │                  ┌────────────────┴────────────────┐                    │
//! │                  │  Operator Client  /  Applier    │                    │
//! │                  └────────────────┬────────────────┘                    │
//! ├───────────────────────────────────┼─────────────────────────────────────┤
//! │  Informers (Deployments, DaemonSets, ClusterCSIDriver) ──► Trigger      │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! # Modules
//!
//! - [`operator`]: Fixed names, asset list and the `run_operator` entry point
//! - [`controllers`]: The controllers and the set that runs them
//! - [`client`]: Operator client and server-side applier
//! - [`assets`]: Manifests bundled into the binary
//! - [`crd`]: Custom Resource Definitions
//! - [`error`]: Error types and handling

pub mod assets;
pub mod client;
pub mod config;
pub mod controllers;
pub mod crd;
pub mod error;
pub mod events;
pub mod informers;
pub mod logging;
pub mod metrics;
pub mod operator;
pub mod server;

// Re-export commonly used types
pub use client::{KubeApplier, KubeOperatorClient, OperatorClient, ResourceApplier};

pub use config::{ImageConfig, OperatorConfig};

pub use controllers::{Controller, ControllerSet};

pub use crd::{
    ClusterCSIDriver, ClusterCSIDriverSpec, ClusterCSIDriverStatus, ConditionStatus, LogLevel,
    ManagementState, OperatorCondition,
};

pub use error::{Error, ErrorAction, Result};

pub use operator::{
    run_operator, ControllerContext, DEFAULT_NAMESPACE, INSTANCE_NAME, OPERAND_NAME,
    OPERATOR_NAME,
};

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Library name
pub const NAME: &str = env!("CARGO_PKG_NAME");
