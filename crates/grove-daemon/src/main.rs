//! Grove daemon - background convergence for graph database fleets
//!
//! `groved` wires the record store, the credential store, and the remote
//! connector into one scheduler, then serves liveness and readiness probes
//! while the per-kind workers sweep.

use clap::Parser;
use grove_controller::RequeueConfig;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

mod config;
mod connector;
mod error;
mod scheduler;
mod server;

use config::DaemonConfig;
use error::DaemonResult;
use server::Server;

/// Grove daemon CLI
#[derive(Parser)]
#[command(name = "groved")]
#[command(about = "Grove daemon - declarative convergence for graph database servers", long_about = None)]
#[command(version)]
struct Cli {
    /// Bind address for the liveness and readiness endpoint
    #[arg(long, env = "GROVE_HEALTH_ADDR", default_value = "127.0.0.1:8081")]
    health_addr: std::net::SocketAddr,

    /// Take part in leader election before reconciling
    #[arg(long, env = "GROVE_LEADER_ELECT", default_value_t = false)]
    leader_elect: bool,

    /// Log level (trace, debug, info, warn, error)
    #[arg(short, long, env = "GROVE_LOG_LEVEL", default_value = "info")]
    log_level: String,

    /// Log in JSON format
    #[arg(long, env = "GROVE_LOG_JSON", default_value_t = false)]
    json: bool,
}

#[tokio::main]
async fn main() -> DaemonResult<()> {
    let cli = Cli::parse();

    let env_filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| cli.log_level.clone().into());

    if cli.json {
        tracing_subscriber::registry()
            .with(env_filter)
            .with(tracing_subscriber::fmt::layer().json())
            .init();
    } else {
        tracing_subscriber::registry()
            .with(env_filter)
            .with(tracing_subscriber::fmt::layer())
            .init();
    }

    let config = DaemonConfig {
        health_addr: cli.health_addr,
        leader_elect: cli.leader_elect,
        requeue: RequeueConfig::from_env(),
        ..DaemonConfig::default()
    };

    println!("groved v{}", env!("CARGO_PKG_VERSION"));

    if config.leader_elect {
        // Single-process deployment; the flag is honored as already-elected.
        tracing::info!("Leader election requested; running as the sole leader");
    }

    Server::new(config).run().await
}
