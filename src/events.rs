//! Event Publishing
//!
//! Controller failures are surfaced as Kubernetes Events on the
//! ClusterCSIDriver instance. Publishing is best effort.

use crate::crd::ClusterCSIDriver;
use crate::operator::OPERATOR_NAME;
use k8s_openapi::api::core::v1::ObjectReference;
use kube::runtime::events::{Event, EventType, Recorder, Reporter};
use kube::{Client, Resource};
use std::sync::Arc;
use tracing::warn;

/// Publishes events about the operator instance
#[derive(Clone, Default)]
pub struct EventPublisher {
    recorder: Option<Arc<Recorder>>,
}

impl EventPublisher {
    /// Publisher that only logs
    pub fn disabled() -> Self {
        Self::default()
    }

    /// Publisher attached to the named ClusterCSIDriver
    pub fn new(client: Client, instance_name: &str) -> Self {
        let reporter = Reporter {
            controller: OPERATOR_NAME.to_string(),
            instance: std::env::var("POD_NAME").ok(),
        };
        Self {
            recorder: Some(Arc::new(Recorder::new(
                client,
                reporter,
                instance_reference(instance_name),
            ))),
        }
    }

    pub async fn warning(&self, reason: &str, action: &str, note: String) {
        self.publish(EventType::Warning, reason, action, note).await;
    }

    pub async fn normal(&self, reason: &str, action: &str, note: String) {
        self.publish(EventType::Normal, reason, action, note).await;
    }

    async fn publish(&self, type_: EventType, reason: &str, action: &str, note: String) {
        let Some(recorder) = &self.recorder else {
            return;
        };

        let event = Event {
            type_,
            reason: reason.to_string(),
            note: Some(note),
            action: action.to_string(),
            secondary: None,
        };
        if let Err(e) = recorder.publish(event).await {
            warn!("Failed to publish event {}: {}", reason, e);
        }
    }
}

/// Object reference to the cluster-scoped operator instance
pub fn instance_reference(instance_name: &str) -> ObjectReference {
    ObjectReference {
        api_version: Some(ClusterCSIDriver::api_version(&()).to_string()),
        kind: Some(ClusterCSIDriver::kind(&()).to_string()),
        name: Some(instance_name.to_string()),
        ..Default::default()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_instance_reference() {
        let reference = instance_reference("cinder.csi.openstack.org");
        assert_eq!(reference.api_version.as_deref(), Some("operator.openshift.io/v1"));
        assert_eq!(reference.kind.as_deref(), Some("ClusterCSIDriver"));
        assert_eq!(reference.name.as_deref(), Some("cinder.csi.openstack.org"));
        assert!(reference.namespace.is_none());
    }

    #[tokio::test]
    async fn test_disabled_publisher_is_silent() {
        EventPublisher::disabled()
            .warning("SyncFailed", "Sync", "nothing happens".to_string())
            .await;
    }
}
