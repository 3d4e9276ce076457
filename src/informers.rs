//! Informers
//!
//! Watches on the objects the controllers care about. Every watch event
//! bumps a shared [`Trigger`]; the controllers resync whenever it moves.

use crate::crd::ClusterCSIDriver;
use futures::StreamExt;
use k8s_openapi::api::apps::v1::{DaemonSet, Deployment};
use kube::runtime::{watcher, WatchStreamExt};
use kube::{Api, Client, Resource};
use serde::de::DeserializeOwned;
use std::fmt::Debug;
use std::sync::Arc;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

/// Shared change notification for all controllers
#[derive(Clone)]
pub struct Trigger {
    tx: Arc<watch::Sender<u64>>,
}

impl Default for Trigger {
    fn default() -> Self {
        Self::new()
    }
}

impl Trigger {
    pub fn new() -> Self {
        let (tx, _rx) = watch::channel(0);
        Self { tx: Arc::new(tx) }
    }

    /// Signal that something changed
    pub fn fire(&self) {
        self.tx.send_modify(|generation| *generation = generation.wrapping_add(1));
    }

    /// New receiver that has seen every change so far
    pub fn subscribe(&self) -> watch::Receiver<u64> {
        self.tx.subscribe()
    }
}

/// Namespace-scoped workload informers plus the operator instance informer
pub struct Informers {
    client: Client,
    namespace: String,
    instance_name: String,
    trigger: Trigger,
}

impl Informers {
    pub fn new(
        client: Client,
        namespace: impl Into<String>,
        instance_name: impl Into<String>,
        trigger: Trigger,
    ) -> Self {
        Self {
            client,
            namespace: namespace.into(),
            instance_name: instance_name.into(),
            trigger,
        }
    }

    /// Start all watches; they run until `shutdown` is cancelled
    pub fn start(&self, shutdown: CancellationToken) -> Vec<JoinHandle<()>> {
        let deployments: Api<Deployment> = Api::namespaced(self.client.clone(), &self.namespace);
        let daemonsets: Api<DaemonSet> = Api::namespaced(self.client.clone(), &self.namespace);
        let instances: Api<ClusterCSIDriver> = Api::all(self.client.clone());
        let instance_config =
            watcher::Config::default().fields(&format!("metadata.name={}", self.instance_name));

        vec![
            tokio::spawn(watch_resource(
                deployments,
                watcher::Config::default(),
                self.trigger.clone(),
                shutdown.clone(),
            )),
            tokio::spawn(watch_resource(
                daemonsets,
                watcher::Config::default(),
                self.trigger.clone(),
                shutdown.clone(),
            )),
            tokio::spawn(watch_resource(
                instances,
                instance_config,
                self.trigger.clone(),
                shutdown,
            )),
        ]
    }
}

/// Forward watch events of one resource type into the trigger
async fn watch_resource<K>(
    api: Api<K>,
    config: watcher::Config,
    trigger: Trigger,
    shutdown: CancellationToken,
) where
    K: Resource + Clone + DeserializeOwned + Debug + Send + 'static,
    K::DynamicType: Default,
{
    let kind = K::kind(&K::DynamicType::default()).to_string();
    let mut events = watcher(api, config).default_backoff().boxed();
    info!("Watching {}", kind);

    loop {
        tokio::select! {
            _ = shutdown.cancelled() => break,
            event = events.next() => match event {
                Some(Ok(_)) => {
                    debug!("{} changed", kind);
                    trigger.fire();
                }
                Some(Err(e)) => warn!("{} watch error: {}", kind, e),
                None => break,
            },
        }
    }

    info!("Stopped watching {}", kind);
}
