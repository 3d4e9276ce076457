//! Logging Setup
//!
//! Installs the global tracing subscriber. The level filter sits behind a
//! reload layer so the operator's verbosity can follow the
//! `operatorLogLevel` field of the ClusterCSIDriver at runtime.

use crate::error::{Error, Result};
use tracing::Level;
use tracing_subscriber::{fmt, prelude::*, reload, EnvFilter, Registry};

/// Directives always appended to the level filter
const QUIET_DEPENDENCIES: &[&str] = &["hyper=warn", "kube=info", "tower=warn", "rustls=warn"];

/// Changes the process log level
pub trait LogLevelSetter: Send + Sync {
    fn set_level(&self, level: Level) -> Result<()>;

    /// Level the process started with, used for `operatorLogLevel: Normal`
    fn base_level(&self) -> Level {
        Level::INFO
    }
}

/// Parse a `--log-level` flag value, falling back to INFO
pub fn parse_level(value: &str) -> Level {
    match value.to_lowercase().as_str() {
        "trace" => Level::TRACE,
        "debug" => Level::DEBUG,
        "info" => Level::INFO,
        "warn" => Level::WARN,
        "error" => Level::ERROR,
        _ => Level::INFO,
    }
}

/// Build the filter for a level, honouring `RUST_LOG` on top
pub fn build_filter(level: Level) -> EnvFilter {
    let mut filter = EnvFilter::from_default_env().add_directive(level.into());
    for directive in QUIET_DEPENDENCIES {
        if let Ok(directive) = directive.parse() {
            filter = filter.add_directive(directive);
        }
    }
    filter
}

/// Handle onto the installed filter
pub struct ReloadHandle {
    handle: reload::Handle<EnvFilter, Registry>,
    base: Level,
}

impl LogLevelSetter for ReloadHandle {
    fn set_level(&self, level: Level) -> Result<()> {
        self.handle
            .reload(build_filter(level))
            .map_err(|e| Error::LogLevel(e.to_string()))
    }

    fn base_level(&self) -> Level {
        self.base
    }
}

/// Install the global subscriber and return a handle for level changes
pub fn init_logging(level: Level, json: bool) -> ReloadHandle {
    let (filter, handle) = reload::Layer::new(build_filter(level));

    if json {
        tracing_subscriber::registry()
            .with(filter)
            .with(fmt::layer().json())
            .init();
    } else {
        tracing_subscriber::registry()
            .with(filter)
            .with(fmt::layer().with_target(true))
            .init();
    }

    ReloadHandle {
        handle,
        base: level,
    }
}
