//! Log Level Controller
//!
//! Follows `spec.operatorLogLevel` and adjusts the operator's own tracing
//! filter when it changes. `Normal` maps to the level the process was
//! started with, so `--log-level` stays in effect until the instance asks
//! for more.

use super::Controller;
use crate::client::OperatorClient;
use crate::crd::LogLevel;
use crate::error::Result;
use crate::logging::LogLevelSetter;
use async_trait::async_trait;
use parking_lot::Mutex;
use std::sync::Arc;
use tracing::info;

pub const LOG_LEVEL_CONTROLLER: &str = "LogLevelController";

pub struct LogLevelController {
    client: Arc<dyn OperatorClient>,
    setter: Arc<dyn LogLevelSetter>,
    current: Mutex<LogLevel>,
}

impl LogLevelController {
    pub fn new(client: Arc<dyn OperatorClient>, setter: Arc<dyn LogLevelSetter>) -> Self {
        Self {
            client,
            setter,
            // The process starts at its base level
            current: Mutex::new(LogLevel::Normal),
        }
    }
}

#[async_trait]
impl Controller for LogLevelController {
    fn name(&self) -> &str {
        LOG_LEVEL_CONTROLLER
    }

    async fn sync(&self) -> Result<()> {
        let desired = self.client.get_instance().await?.spec.operator_log_level;
        if *self.current.lock() == desired {
            return Ok(());
        }

        let level = match desired {
            LogLevel::Normal => self.setter.base_level(),
            other => other.tracing_level(),
        };
        self.setter.set_level(level)?;
        *self.current.lock() = desired;
        info!("Operator log level set to {}", desired);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::client::fake::FakeOperatorClient;
    use crate::crd::ClusterCSIDriverSpec;
    use tracing::Level;

    struct RecordingSetter {
        base: Level,
        levels: Mutex<Vec<Level>>,
    }

    impl RecordingSetter {
        fn new(base: Level) -> Arc<Self> {
            Arc::new(Self {
                base,
                levels: Mutex::new(Vec::new()),
            })
        }
    }

    impl LogLevelSetter for RecordingSetter {
        fn set_level(&self, level: Level) -> Result<()> {
            self.levels.lock().push(level);
            Ok(())
        }

        fn base_level(&self) -> Level {
            self.base
        }
    }

    fn with_level(level: LogLevel) -> ClusterCSIDriverSpec {
        ClusterCSIDriverSpec {
            operator_log_level: level,
            ..Default::default()
        }
    }

    #[tokio::test]
    async fn test_only_applies_changes() {
        let client = Arc::new(FakeOperatorClient::new(ClusterCSIDriverSpec::default()));
        let setter = RecordingSetter::new(Level::INFO);
        let controller = LogLevelController::new(client.clone(), setter.clone());

        controller.sync().await.unwrap();
        controller.sync().await.unwrap();
        assert!(setter.levels.lock().is_empty());

        client.set_spec(with_level(LogLevel::Trace));
        controller.sync().await.unwrap();
        controller.sync().await.unwrap();
        assert_eq!(*setter.levels.lock(), vec![Level::TRACE]);
    }

    #[tokio::test]
    async fn test_normal_keeps_command_line_level() {
        let client = Arc::new(FakeOperatorClient::new(ClusterCSIDriverSpec::default()));
        let setter = RecordingSetter::new(Level::DEBUG);
        let controller = LogLevelController::new(client.clone(), setter.clone());

        controller.sync().await.unwrap();
        assert!(setter.levels.lock().is_empty());

        client.set_spec(with_level(LogLevel::TraceAll));
        controller.sync().await.unwrap();
        client.set_spec(with_level(LogLevel::Normal));
        controller.sync().await.unwrap();
        assert_eq!(*setter.levels.lock(), vec![Level::TRACE, Level::DEBUG]);
    }
}
