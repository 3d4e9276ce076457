//! Controllers
//!
//! Each controller converges one aspect of the CSI driver installation and
//! reports its outcome as conditions on the ClusterCSIDriver. The
//! [`ControllerSet`] drives them from informer triggers and periodic resync.

pub mod controller_set;
pub mod log_level;
pub mod management_state;
pub mod static_resources;
pub mod workload;

pub use controller_set::*;
pub use log_level::*;
pub use management_state::*;
pub use static_resources::*;
pub use workload::*;

use crate::error::Result;
use async_trait::async_trait;

/// Condition reason for a healthy controller
pub const REASON_AS_EXPECTED: &str = "AsExpected";

/// Condition reason for a failed sync
pub const REASON_SYNC_ERROR: &str = "SyncError";

/// A single reconciliation loop
#[async_trait]
pub trait Controller: Send + Sync {
    /// Name used for conditions, logs and metrics
    fn name(&self) -> &str;

    /// Converge once
    async fn sync(&self) -> Result<()>;
}
