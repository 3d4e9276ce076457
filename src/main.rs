//! OpenStack Cinder CSI Driver Operator
//!
//! Command-line entry point. The `start` subcommand runs the operator until
//! it receives SIGINT or SIGTERM.

use clap::{Args, Parser, Subcommand};
use std::process::ExitCode;
use std::sync::atomic::AtomicBool;
use std::sync::Arc;
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use tracing::{error, info};

use cinder_csi_operator::logging::{init_logging, parse_level};
use cinder_csi_operator::metrics::ControllerMetrics;
use cinder_csi_operator::server::{run_health_server, run_metrics_server};
use cinder_csi_operator::{
    run_operator, ControllerContext, ImageConfig, OperatorConfig, Result, DEFAULT_NAMESPACE,
    INSTANCE_NAME, OPERATOR_NAME,
};

// =============================================================================
// CLI Arguments
// =============================================================================

/// OpenShift OpenStack Cinder CSI Driver Operator
#[derive(Parser, Debug)]
#[command(
    name = "openstack-cinder-csi-driver-operator",
    author,
    version,
    about,
    long_about = None,
    subcommand_required = true,
    arg_required_else_help = true
)]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Start the OpenStack Cinder CSI Driver Operator
    Start(StartArgs),
}

#[derive(Args, Debug)]
struct StartArgs {
    /// Namespace of the operator and its operand
    #[arg(long, env = "OPERATOR_NAMESPACE", default_value = DEFAULT_NAMESPACE)]
    namespace: String,

    /// Log level (trace, debug, info, warn, error)
    ///
    /// Used while the ClusterCSIDriver's operatorLogLevel is Normal; higher
    /// operatorLogLevel values override it at runtime.
    #[arg(long, env = "LOG_LEVEL", default_value = "info")]
    log_level: String,

    /// Output logs as JSON
    #[arg(long, env = "LOG_JSON")]
    log_json: bool,

    /// Health server bind address
    #[arg(long, env = "HEALTH_ADDR", default_value = "0.0.0.0:8081")]
    health_addr: String,

    /// Metrics server bind address
    #[arg(long, env = "METRICS_ADDR", default_value = "0.0.0.0:8080")]
    metrics_addr: String,

    /// Periodic resync interval in seconds
    #[arg(long, env = "RESYNC_SECS", default_value = "60")]
    resync_secs: u64,

    /// CSI driver image
    #[arg(long, env = "DRIVER_IMAGE")]
    driver_image: Option<String>,

    /// external-provisioner sidecar image
    #[arg(long, env = "PROVISIONER_IMAGE")]
    provisioner_image: Option<String>,

    /// external-attacher sidecar image
    #[arg(long, env = "ATTACHER_IMAGE")]
    attacher_image: Option<String>,

    /// external-resizer sidecar image
    #[arg(long, env = "RESIZER_IMAGE")]
    resizer_image: Option<String>,

    /// external-snapshotter sidecar image
    #[arg(long, env = "SNAPSHOTTER_IMAGE")]
    snapshotter_image: Option<String>,

    /// node-driver-registrar sidecar image
    #[arg(long, env = "NODE_DRIVER_REGISTRAR_IMAGE")]
    node_driver_registrar_image: Option<String>,

    /// livenessprobe sidecar image
    #[arg(long, env = "LIVENESS_PROBE_IMAGE")]
    liveness_probe_image: Option<String>,
}

impl StartArgs {
    fn operator_config(&self) -> OperatorConfig {
        let defaults = ImageConfig::default();
        let pick = |flag: &Option<String>, default: String| flag.clone().unwrap_or(default);

        OperatorConfig {
            namespace: self.namespace.clone(),
            images: ImageConfig {
                driver: pick(&self.driver_image, defaults.driver),
                provisioner: pick(&self.provisioner_image, defaults.provisioner),
                attacher: pick(&self.attacher_image, defaults.attacher),
                resizer: pick(&self.resizer_image, defaults.resizer),
                snapshotter: pick(&self.snapshotter_image, defaults.snapshotter),
                node_driver_registrar: pick(
                    &self.node_driver_registrar_image,
                    defaults.node_driver_registrar,
                ),
                liveness_probe: pick(&self.liveness_probe_image, defaults.liveness_probe),
            },
            resync_interval: Duration::from_secs(self.resync_secs),
            ..Default::default()
        }
    }
}

// =============================================================================
// Main
// =============================================================================

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();

    let result = match cli.command {
        Command::Start(args) => start(args).await,
    };

    match result {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("{}", e);
            ExitCode::FAILURE
        }
    }
}

async fn start(args: StartArgs) -> Result<()> {
    let log_handle = init_logging(parse_level(&args.log_level), args.log_json);
    let config = args.operator_config();

    info!("Starting {}", OPERATOR_NAME);
    info!("  Version: {}", cinder_csi_operator::VERSION);
    info!("  Namespace: {}", config.namespace);
    info!("  Instance: {}", INSTANCE_NAME);

    let registry = prometheus::Registry::new();
    let metrics = ControllerMetrics::new(&registry)?;
    let kube_config = kube::Config::infer().await?;

    let shutdown = CancellationToken::new();
    let ready = Arc::new(AtomicBool::new(false));
    tokio::spawn(shutdown_on_signal(shutdown.clone()));

    // Start health server
    let health_addr = args.health_addr.clone();
    let health_ready = ready.clone();
    let health_shutdown = shutdown.clone();
    tokio::spawn(async move {
        if let Err(e) = run_health_server(&health_addr, health_ready, health_shutdown).await {
            error!("Health server error: {}", e);
        }
    });

    // Start metrics server
    let metrics_addr = args.metrics_addr.clone();
    let metrics_shutdown = shutdown.clone();
    tokio::spawn(async move {
        if let Err(e) = run_metrics_server(&metrics_addr, registry, metrics_shutdown).await {
            error!("Metrics server error: {}", e);
        }
    });

    run_operator(ControllerContext {
        kube_config,
        config,
        shutdown,
        log_level: Arc::new(log_handle),
        metrics,
        ready,
    })
    .await
}

// =============================================================================
// Signals
// =============================================================================

async fn shutdown_on_signal(shutdown: CancellationToken) {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            error!("Failed to listen for SIGINT: {}", e);
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(e) => {
                error!("Failed to listen for SIGTERM: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => info!("Received SIGINT"),
        _ = terminate => info!("Received SIGTERM"),
    }
    shutdown.cancel();
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::error::ErrorKind;

    #[test]
    fn test_no_subcommand_shows_usage() {
        let err = Cli::try_parse_from(["openstack-cinder-csi-driver-operator"]).unwrap_err();
        assert_eq!(
            err.kind(),
            ErrorKind::DisplayHelpOnMissingArgumentOrSubcommand
        );
        assert_ne!(err.exit_code(), 0);
        assert!(err.to_string().contains("Usage"));
    }

    #[test]
    fn test_unknown_subcommand_fails() {
        let err =
            Cli::try_parse_from(["openstack-cinder-csi-driver-operator", "stop"]).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::InvalidSubcommand);
    }

    #[test]
    fn test_start_defaults() {
        let cli = Cli::try_parse_from(["openstack-cinder-csi-driver-operator", "start"]).unwrap();
        let Command::Start(args) = cli.command;
        assert_eq!(args.health_addr, "0.0.0.0:8081");
        assert_eq!(args.metrics_addr, "0.0.0.0:8080");

        let config = args.operator_config();
        assert_eq!(config.resync_interval, Duration::from_secs(60));
        assert_eq!(config.instance_name, INSTANCE_NAME);
    }

    #[test]
    fn test_image_flags_override_defaults() {
        let cli = Cli::try_parse_from([
            "openstack-cinder-csi-driver-operator",
            "start",
            "--driver-image",
            "quay.io/example/cinder:dev",
        ])
        .unwrap();
        let Command::Start(args) = cli.command;
        let config = args.operator_config();
        assert_eq!(config.images.driver, "quay.io/example/cinder:dev");
        assert_eq!(config.images.attacher, ImageConfig::default().attacher);
    }

    #[test]
    fn test_cli_is_well_formed() {
        use clap::CommandFactory;
        Cli::command().debug_assert();
    }
}
