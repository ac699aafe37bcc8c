mod config;

use clap::Parser;
use config::{Config, LoggingConfig, MetricsConfig};
use metrics_exporter_statsd::StatsdBuilder;
use std::path::PathBuf;
use std::process::ExitCode;
use tokio::signal;
use tracing_subscriber::EnvFilter;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;

const METRICS_PREFIX: &str = "mock_vdc";

#[derive(Parser, Debug)]
#[command(name = "mock-vdc", about = "Mock virtual data container")]
struct Cli {
    /// YAML config file. Flags below override its values.
    #[arg(long)]
    config: Option<PathBuf>,

    /// Port to listen on
    #[arg(long)]
    port: Option<u16>,

    /// Forward trace headers to the log collector
    #[arg(long, num_args = 0..=1, default_missing_value = "true")]
    trace: Option<bool>,

    /// DAL address to use, fake data is served if empty
    #[arg(long)]
    dal: Option<String>,

    /// Log collector address to use, nothing is sent if empty
    #[arg(long)]
    log: Option<String>,
}

impl Cli {
    fn load_config(&self) -> Result<Config, config::ConfigError> {
        let mut config = match &self.config {
            Some(path) => Config::from_file(path)?,
            None => Config::default(),
        };

        let vdc = &mut config.vdc;
        if let Some(port) = self.port {
            vdc.listener.port = port;
        }
        if let Some(trace) = self.trace {
            vdc.trace = trace;
        }
        if let Some(dal) = &self.dal {
            vdc.dal = Some(dal.clone());
        }
        if let Some(log) = &self.log {
            vdc.log = Some(log.clone());
        }

        Ok(config)
    }
}

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();

    let config = match cli.load_config() {
        Ok(config) => config,
        Err(e) => {
            eprintln!("{e}");
            return ExitCode::FAILURE;
        }
    };

    let _sentry = init_logging(config.common.logging.as_ref());
    if let Some(metrics) = &config.common.metrics {
        init_metrics(metrics);
    }

    tracing::info!(
        port = config.vdc.listener.port,
        dal = config.vdc.dal_address().unwrap_or("none"),
        log = config.vdc.log_endpoint().unwrap_or("none"),
        trace = config.vdc.trace_enabled(),
        "Starting mock-vdc"
    );

    match vdc::run(config.vdc, shutdown_signal()).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            tracing::error!(error = %e, "mock-vdc failed");
            ExitCode::FAILURE
        }
    }
}

fn init_logging(logging: Option<&LoggingConfig>) -> Option<sentry::ClientInitGuard> {
    let guard = logging.map(|logging| {
        sentry::init((
            logging.sentry_dsn.as_str(),
            sentry::ClientOptions {
                release: sentry::release_name!(),
                ..Default::default()
            },
        ))
    });

    tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with(tracing_subscriber::fmt::layer())
        .with(guard.as_ref().map(|_| sentry::integrations::tracing::layer()))
        .init();

    guard
}

fn init_metrics(metrics: &MetricsConfig) {
    let recorder = match StatsdBuilder::from(metrics.statsd_host.clone(), metrics.statsd_port)
        .build(Some(METRICS_PREFIX))
    {
        Ok(recorder) => recorder,
        Err(e) => {
            tracing::warn!(error = %e, "Could not set up statsd exporter, metrics are disabled");
            return;
        }
    };

    if metrics::set_global_recorder(recorder).is_err() {
        tracing::warn!("A metrics recorder is already installed");
        return;
    }
    shared::metrics_defs::describe_all(vdc::metrics_defs::ALL_METRICS);
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            tracing::error!(error = %e, "Failed to install Ctrl+C handler");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(e) => {
                tracing::error!(error = %e, "Failed to install SIGTERM handler");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        () = ctrl_c => tracing::info!("Received Ctrl+C"),
        () = terminate => tracing::info!("Received SIGTERM"),
    }
}
