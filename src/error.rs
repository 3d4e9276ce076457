//! Error types for the Cinder CSI driver operator
//!
//! Provides structured error types for asset loading, manifest rendering,
//! cluster API access and controller synchronization.

use std::time::Duration;
use thiserror::Error;

/// Unified error type for the operator
#[derive(Error, Debug)]
pub enum Error {
    // =========================================================================
    // Internal Errors
    // =========================================================================
    #[error("Internal error: {0}")]
    Internal(String),

    #[error("Configuration error: {0}")]
    Configuration(String),

    /// Returned by the operator run loop once its context is cancelled
    #[error("stopped")]
    Stopped,

    // =========================================================================
    // Kubernetes Errors
    // =========================================================================
    #[error("Kubernetes API error: {0}")]
    Kube(#[from] kube::Error),

    #[error("Kubeconfig error: {0}")]
    KubeConfig(#[from] kube::config::InferConfigError),

    #[error("Resource not found: {kind}/{name}")]
    ResourceNotFound { kind: String, name: String },

    #[error("Unsupported resource kind: {api_version}/{kind}")]
    UnsupportedKind { api_version: String, kind: String },

    // =========================================================================
    // Asset Errors
    // =========================================================================
    #[error("Asset not found: {name}")]
    AssetNotFound { name: String },

    #[error("Invalid manifest {asset}: {reason}")]
    InvalidManifest { asset: String, reason: String },

    #[error("Unresolved placeholder {placeholder} in {asset}")]
    UnresolvedPlaceholder { asset: String, placeholder: String },

    // =========================================================================
    // Controller Errors
    // =========================================================================
    #[error("{controller} failed to sync {failures} resource(s): {message}")]
    StaticResourceSync {
        controller: String,
        failures: usize,
        message: String,
    },

    #[error("Log level change failed: {0}")]
    LogLevel(String),

    // =========================================================================
    // Metrics Errors
    // =========================================================================
    #[error("Metrics error: {0}")]
    Metrics(#[from] prometheus::Error),

    // =========================================================================
    // Parse Errors
    // =========================================================================
    #[error("YAML parse error: {0}")]
    YamlParse(#[from] serde_yaml::Error),

    #[error("JSON parse error: {0}")]
    JsonParse(#[from] serde_json::Error),
}

/// Action to take on error during a controller sync
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorAction {
    /// Requeue with exponential backoff
    RequeueWithBackoff,
    /// Requeue after specific duration
    RequeueAfter(Duration),
    /// Don't requeue, wait for changes
    NoRequeue,
}

impl Error {
    /// Determine what action to take for this error
    pub fn action(&self) -> ErrorAction {
        match self {
            // Transient errors - retry with backoff
            Error::Kube(_) | Error::StaticResourceSync { .. } => ErrorAction::RequeueWithBackoff,

            // The operator instance may simply not exist yet
            Error::ResourceNotFound { .. } => ErrorAction::RequeueAfter(Duration::from_secs(30)),

            // Bundled content and configuration errors won't fix themselves
            Error::Configuration(_)
            | Error::Stopped
            | Error::KubeConfig(_)
            | Error::UnsupportedKind { .. }
            | Error::AssetNotFound { .. }
            | Error::InvalidManifest { .. }
            | Error::UnresolvedPlaceholder { .. }
            | Error::YamlParse(_) => ErrorAction::NoRequeue,

            // All other errors - retry with backoff
            _ => ErrorAction::RequeueWithBackoff,
        }
    }
}

/// Result type alias for the operator
pub type Result<T> = std::result::Result<T, Error>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_actions() {
        let err = Error::ResourceNotFound {
            kind: "ClusterCSIDriver".into(),
            name: "cinder.csi.openstack.org".into(),
        };
        assert_eq!(
            err.action(),
            ErrorAction::RequeueAfter(Duration::from_secs(30))
        );

        let err = Error::AssetNotFound {
            name: "missing.yaml".into(),
        };
        assert_eq!(err.action(), ErrorAction::NoRequeue);

        let err = Error::StaticResourceSync {
            controller: "StaticResources".into(),
            failures: 2,
            message: "boom".into(),
        };
        assert_eq!(err.action(), ErrorAction::RequeueWithBackoff);
    }

    #[test]
    fn test_bundled_content_errors_not_requeued() {
        let err = Error::UnresolvedPlaceholder {
            asset: "controller.yaml".into(),
            placeholder: "${DRIVER_IMAGE}".into(),
        };
        assert_eq!(err.action(), ErrorAction::NoRequeue);
        assert_eq!(
            Error::Configuration("invalid".into()).action(),
            ErrorAction::NoRequeue
        );
    }

    #[test]
    fn test_stopped_message() {
        assert_eq!(Error::Stopped.to_string(), "stopped");
        assert_eq!(Error::Stopped.action(), ErrorAction::NoRequeue);
    }
}
