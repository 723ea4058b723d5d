//! Qolaba MCP bridge.
//!
//! Exposes the Qolaba AI API (image synthesis and editing, text-to-speech,
//! chat, vector storage) as MCP tools over stdio, with an optional HTTP
//! sidecar for health probes and Prometheus metrics.

mod http;
mod tools;

use clap::{Parser, Subcommand};
use qolaba_mcp_client::{ApiClient, ClientConfig};
use qolaba_mcp_core::{
    ApiConnectivityCheck, ConfigurationCheck, HealthService, MetricsCollector, Orchestrator,
};
use qolaba_mcp_protocol::{serve_stdio, ServerIdentity};
use std::net::SocketAddr;
use std::sync::Arc;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

#[derive(Parser)]
#[command(name = "qolaba-mcp")]
#[command(author, version, about = "MCP bridge for the Qolaba AI API", long_about = None)]
struct Cli {
    /// Enable verbose logging
    #[arg(short, long)]
    verbose: bool,

    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
    /// Serve MCP over stdio (the default)
    Serve,
    /// Start the health/metrics HTTP sidecar
    Http {
        /// Address to bind to
        #[arg(short, long, default_value = "127.0.0.1:8080")]
        address: SocketAddr,
    },
    /// Run health checks and print the report
    Health,
    /// Show the resolved configuration (secrets redacted)
    Config,
    /// Print version information
    Version,
}

/// Everything the subcommands share.
struct Services {
    metrics: Arc<MetricsCollector>,
    health: Arc<HealthService>,
    orchestrator: Arc<Orchestrator>,
}

fn build_services(config: ClientConfig) -> anyhow::Result<Services> {
    let metrics = Arc::new(MetricsCollector::new());
    let client = Arc::new(ApiClient::with_telemetry(
        config.clone(),
        metrics.clone(),
    )?);
    let orchestrator = Arc::new(Orchestrator::new(Arc::clone(&client), Arc::clone(&metrics)));

    let mut health = HealthService::new();
    health.register(Arc::new(ConfigurationCheck::new(config)));
    health.register(Arc::new(ApiConnectivityCheck::new(client)));

    Ok(Services {
        metrics,
        health: Arc::new(health),
        orchestrator,
    })
}

/// Logs go to stderr: stdout is the MCP transport.
fn init_logging(verbose: bool) {
    let default_level = if verbose { "debug" } else { "info" };
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));

    tracing_subscriber::registry()
        .with(filter)
        .with(fmt::layer().with_writer(std::io::stderr).with_target(true))
        .init();
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    init_logging(cli.verbose);

    let config = ClientConfig::from_env();

    match cli.command.unwrap_or(Commands::Serve) {
        Commands::Serve => {
            config.validate()?;
            let services = build_services(config)?;
            let registry = Arc::new(tools::build_registry(
                services.orchestrator,
                services.health,
            ));
            serve_stdio(registry, ServerIdentity::default()).await?;
        }
        Commands::Http { address } => {
            config.validate()?;
            let services = build_services(config)?;
            http::serve(
                http::AppState {
                    health: services.health,
                    metrics: services.metrics,
                },
                address,
            )
            .await?;
        }
        Commands::Health => {
            let services = build_services(config)?;
            let report = services.health.status().await;
            println!("{}", serde_json::to_string_pretty(&report)?);
            if !report.is_healthy() {
                std::process::exit(1);
            }
        }
        Commands::Config => {
            println!("{:#?}", config);
        }
        Commands::Version => {
            println!("qolaba-mcp {}", env!("CARGO_PKG_VERSION"));
        }
    }

    Ok(())
}
