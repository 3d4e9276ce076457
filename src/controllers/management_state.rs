//! Management State Controller
//!
//! Reports whether the requested management state can be honoured.

use super::{Controller, REASON_AS_EXPECTED};
use crate::client::OperatorClient;
use crate::crd::{ConditionStatus, ManagementState, OperatorCondition};
use crate::error::Result;
use async_trait::async_trait;
use std::sync::Arc;
use tracing::debug;

pub const MANAGEMENT_STATE_CONTROLLER: &str = "ManagementStateController";

/// Condition type owned by this controller
pub const MANAGEMENT_STATE_DEGRADED: &str = "ManagementStateDegraded";

pub struct ManagementStateController {
    operand_name: String,
    supports_removal: bool,
    client: Arc<dyn OperatorClient>,
}

impl ManagementStateController {
    pub fn new(
        operand_name: impl Into<String>,
        supports_removal: bool,
        client: Arc<dyn OperatorClient>,
    ) -> Self {
        Self {
            operand_name: operand_name.into(),
            supports_removal,
            client,
        }
    }

    fn condition_for(&self, state: ManagementState) -> OperatorCondition {
        match state {
            ManagementState::Removed if !self.supports_removal => OperatorCondition::new(
                MANAGEMENT_STATE_DEGRADED,
                ConditionStatus::True,
                "Removed",
                format!("Removed is not supported for {}", self.operand_name),
            ),
            ManagementState::Unmanaged => OperatorCondition::new(
                MANAGEMENT_STATE_DEGRADED,
                ConditionStatus::False,
                "Unmanaged",
                "",
            ),
            _ => OperatorCondition::new(
                MANAGEMENT_STATE_DEGRADED,
                ConditionStatus::False,
                REASON_AS_EXPECTED,
                "",
            ),
        }
    }
}

#[async_trait]
impl Controller for ManagementStateController {
    fn name(&self) -> &str {
        MANAGEMENT_STATE_CONTROLLER
    }

    async fn sync(&self) -> Result<()> {
        let instance = self.client.get_instance().await?;
        let state = instance.spec.management_state;
        debug!("Management state of {} is {}", self.operand_name, state);

        self.client
            .update_conditions(vec![self.condition_for(state)])
            .await
    }
}
