//! ClusterCSIDriver CRD
//!
//! The operator's configuration object. One instance per driver, named after
//! the driver itself, holds the desired management state and log levels, and
//! receives the conditions reported by every controller.

use chrono::{DateTime, Utc};
use kube::CustomResource;
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

// =============================================================================
// ClusterCSIDriver CRD
// =============================================================================

/// ClusterCSIDriver configures the lifecycle of a CSI driver installation.
#[derive(CustomResource, Debug, Clone, Default, PartialEq, Serialize, Deserialize, JsonSchema)]
#[kube(
    group = "operator.openshift.io",
    version = "v1",
    kind = "ClusterCSIDriver",
    plural = "clustercsidrivers",
    status = "ClusterCSIDriverStatus",
    printcolumn = r#"{"name": "ManagementState", "type": "string", "jsonPath": ".spec.managementState"}"#,
    printcolumn = r#"{"name": "Age", "type": "date", "jsonPath": ".metadata.creationTimestamp"}"#,
    namespaced = false
)]
#[serde(rename_all = "camelCase")]
pub struct ClusterCSIDriverSpec {
    /// Whether and how the operator should manage the driver
    #[serde(default)]
    pub management_state: ManagementState,

    /// Verbosity of the driver containers
    #[serde(default)]
    pub log_level: LogLevel,

    /// Verbosity of the operator itself
    #[serde(default)]
    pub operator_log_level: LogLevel,
}

// =============================================================================
// Sub-Types
// =============================================================================

/// Management state of the operand
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
pub enum ManagementState {
    #[default]
    Managed,
    Unmanaged,
    Removed,
    Force,
}

impl ManagementState {
    /// Whether controllers should actively reconcile the operand
    pub fn is_managed(&self) -> bool {
        matches!(self, ManagementState::Managed | ManagementState::Force)
    }
}

impl std::fmt::Display for ManagementState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ManagementState::Managed => write!(f, "Managed"),
            ManagementState::Unmanaged => write!(f, "Unmanaged"),
            ManagementState::Removed => write!(f, "Removed"),
            ManagementState::Force => write!(f, "Force"),
        }
    }
}

/// Log verbosity shared by the operator and its operand
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
pub enum LogLevel {
    #[default]
    Normal,
    Debug,
    Trace,
    TraceAll,
}

impl LogLevel {
    /// Numeric `--v` verbosity passed to the driver containers
    pub fn verbosity(&self) -> u8 {
        match self {
            LogLevel::Normal => 2,
            LogLevel::Debug => 4,
            LogLevel::Trace => 6,
            LogLevel::TraceAll => 8,
        }
    }

    /// Tracing level used for the operator process
    pub fn tracing_level(&self) -> tracing::Level {
        match self {
            LogLevel::Normal => tracing::Level::INFO,
            LogLevel::Debug => tracing::Level::DEBUG,
            LogLevel::Trace | LogLevel::TraceAll => tracing::Level::TRACE,
        }
    }
}

impl std::fmt::Display for LogLevel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            LogLevel::Normal => write!(f, "Normal"),
            LogLevel::Debug => write!(f, "Debug"),
            LogLevel::Trace => write!(f, "Trace"),
            LogLevel::TraceAll => write!(f, "TraceAll"),
        }
    }
}

// =============================================================================
// Status
// =============================================================================

/// Status of the ClusterCSIDriver
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct ClusterCSIDriverStatus {
    /// Generation of the spec last acted upon
    #[serde(default)]
    pub observed_generation: Option<i64>,

    /// Conditions reported by the controllers
    #[serde(default)]
    pub conditions: Vec<OperatorCondition>,

    /// Last observed generation of each managed workload
    #[serde(default)]
    pub generations: Vec<GenerationStatus>,
}

/// Condition reported by a single controller
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct OperatorCondition {
    /// Type of condition
    pub r#type: String,
    /// Status: True, False, Unknown
    pub status: ConditionStatus,
    /// Last transition time
    #[serde(default)]
    #[schemars(with = "Option<String>")]
    pub last_transition_time: Option<DateTime<Utc>>,
    /// Machine-readable reason
    #[serde(default)]
    pub reason: Option<String>,
    /// Human-readable message
    #[serde(default)]
    pub message: Option<String>,
}

impl OperatorCondition {
    pub fn new(
        r#type: impl Into<String>,
        status: ConditionStatus,
        reason: impl Into<String>,
        message: impl Into<String>,
    ) -> Self {
        let message = message.into();
        Self {
            r#type: r#type.into(),
            status,
            last_transition_time: Some(Utc::now()),
            reason: Some(reason.into()),
            message: (!message.is_empty()).then_some(message),
        }
    }
}

/// Condition status values
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
pub enum ConditionStatus {
    True,
    False,
    Unknown,
}

/// Generation of a workload the operator rolled out
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct GenerationStatus {
    pub group: String,
    pub resource: String,
    pub namespace: String,
    pub name: String,
    pub last_generation: i64,
}

// =============================================================================
// Implementations
// =============================================================================

impl ClusterCSIDriverStatus {
    /// Set a condition, replacing existing if same type
    ///
    /// The transition time is only moved when the status actually changes.
    pub fn set_condition(&mut self, mut condition: OperatorCondition) {
        if let Some(existing) = self
            .conditions
            .iter_mut()
            .find(|c| c.r#type == condition.r#type)
        {
            if existing.status == condition.status {
                condition.last_transition_time = existing.last_transition_time;
            }
            *existing = condition;
        } else {
            self.conditions.push(condition);
        }
    }

    /// Record a workload generation, replacing the entry for the same object
    pub fn set_generation(&mut self, generation: GenerationStatus) {
        if let Some(existing) = self.generations.iter_mut().find(|g| {
            g.group == generation.group
                && g.resource == generation.resource
                && g.namespace == generation.namespace
                && g.name == generation.name
        }) {
            *existing = generation;
        } else {
            self.generations.push(generation);
        }
    }
}
