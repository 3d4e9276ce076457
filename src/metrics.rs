//! Controller Metrics
//!
//! Prometheus counters for controller syncs, registered on the registry
//! served by the metrics endpoint.

use crate::error::Result;
use prometheus::{IntCounterVec, Opts, Registry};

/// Per-controller sync counters
#[derive(Clone)]
pub struct ControllerMetrics {
    syncs: IntCounterVec,
    sync_errors: IntCounterVec,
}

impl ControllerMetrics {
    /// Create the counters and register them
    pub fn new(registry: &Registry) -> Result<Self> {
        let syncs = IntCounterVec::new(
            Opts::new(
                "csi_operator_controller_syncs_total",
                "Total number of controller sync attempts",
            ),
            &["controller"],
        )?;
        let sync_errors = IntCounterVec::new(
            Opts::new(
                "csi_operator_controller_sync_errors_total",
                "Total number of failed controller sync attempts",
            ),
            &["controller"],
        )?;

        registry.register(Box::new(syncs.clone()))?;
        registry.register(Box::new(sync_errors.clone()))?;

        Ok(Self { syncs, sync_errors })
    }

    #[inline]
    pub fn record_sync(&self, controller: &str) {
        self.syncs.with_label_values(&[controller]).inc();
    }

    #[inline]
    pub fn record_error(&self, controller: &str) {
        self.sync_errors.with_label_values(&[controller]).inc();
    }

    pub fn sync_count(&self, controller: &str) -> u64 {
        self.syncs.with_label_values(&[controller]).get()
    }

    pub fn error_count(&self, controller: &str) -> u64 {
        self.sync_errors.with_label_values(&[controller]).get()
    }
}
