//! Daemon lifecycle and health endpoint

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use axum::extract::State;
use axum::routing::get;
use axum::{Json, Router};
use chrono::{DateTime, Utc};
use grove_controller::{ServerResolver, Stores};
use grove_remote::InMemoryCredentialStore;
use grove_store::MemoryStore;
use serde::Serialize;
use tokio::net::TcpListener;
use tokio::sync::{broadcast, watch};
use tower_http::trace::TraceLayer;

use crate::config::DaemonConfig;
use crate::connector::HttpConnector;
use crate::error::{DaemonError, DaemonResult};
use crate::scheduler::{PassEvent, Scheduler};

/// Grove daemon: the scheduler plus a health endpoint.
pub struct Server {
    config: DaemonConfig,
    scheduler: Arc<Scheduler>,
}

impl Server {
    /// Wire the store, the resolver, and the scheduler from `config`.
    ///
    /// The bundled store and credential backends are in-process; durable
    /// backends plug in at the `ResourceStore` and `CredentialStore` traits.
    pub fn new(config: DaemonConfig) -> Self {
        let store = Arc::new(MemoryStore::new());
        let stores = Stores::from_memory(store);
        let credentials = Arc::new(InMemoryCredentialStore::new());
        let connector = Arc::new(HttpConnector::new());
        let resolver = Arc::new(ServerResolver::new(
            stores.servers.clone(),
            credentials,
            connector,
        ));

        let scheduler = Arc::new(Scheduler::new(
            stores,
            resolver,
            config.requeue,
            config.sweep_interval,
        ));

        Self { config, scheduler }
    }

    /// Run until the process is asked to stop.
    pub async fn run(self) -> DaemonResult<()> {
        let (shutdown_tx, shutdown_rx) = watch::channel(false);

        let events = self.scheduler.subscribe();
        let workers = tokio::spawn(self.scheduler.clone().run(shutdown_rx));

        let state = AppState::new();
        tokio::spawn(count_passes(events, state.passes.clone()));

        let app = health_router(state);
        let listener = TcpListener::bind(self.config.health_addr).await?;
        tracing::info!(addr = %self.config.health_addr, "Health endpoint listening");

        axum::serve(listener, app)
            .with_graceful_shutdown(shutdown_signal())
            .await
            .map_err(|err| DaemonError::Server(err.to_string()))?;

        tracing::info!("Shutting down");
        let _ = shutdown_tx.send(true);
        let _ = workers.await;

        Ok(())
    }
}

/// State behind the health endpoints.
#[derive(Clone)]
struct AppState {
    version: &'static str,
    started_at: DateTime<Utc>,
    passes: Arc<AtomicU64>,
}

impl AppState {
    fn new() -> Self {
        Self {
            version: env!("CARGO_PKG_VERSION"),
            started_at: Utc::now(),
            passes: Arc::new(AtomicU64::new(0)),
        }
    }

    fn uptime_secs(&self) -> i64 {
        (Utc::now() - self.started_at).num_seconds()
    }
}

/// Tally pass outcomes for the readiness report.
async fn count_passes(mut events: broadcast::Receiver<PassEvent>, passes: Arc<AtomicU64>) {
    loop {
        match events.recv().await {
            Ok(_) => {
                passes.fetch_add(1, Ordering::Relaxed);
            }
            Err(broadcast::error::RecvError::Lagged(missed)) => {
                passes.fetch_add(missed, Ordering::Relaxed);
            }
            Err(broadcast::error::RecvError::Closed) => break,
        }
    }
}

/// Routes for the liveness and readiness probes.
fn health_router(state: AppState) -> Router {
    Router::new()
        .route("/healthz", get(healthz))
        .route("/readyz", get(readyz))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

#[derive(Debug, Serialize)]
struct HealthResponse {
    status: &'static str,
    version: String,
}

async fn healthz(State(state): State<AppState>) -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok",
        version: state.version.to_string(),
    })
}

#[derive(Debug, Serialize)]
struct ReadyResponse {
    status: &'static str,
    uptime_secs: i64,
    passes: u64,
}

async fn readyz(State(state): State<AppState>) -> Json<ReadyResponse> {
    Json(ReadyResponse {
        status: "ready",
        uptime_secs: state.uptime_secs(),
        passes: state.passes.load(Ordering::Relaxed),
    })
}

/// Resolves when the process receives ctrl-c or a terminate signal.
async fn shutdown_signal() {
    let ctrl_c = async {
        tokio::signal::ctrl_c()
            .await
            .expect("Failed to install Ctrl+C handler");
    };

    #[cfg(unix)]
    let terminate = async {
        tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate())
            .expect("Failed to install signal handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {
            tracing::info!("Received Ctrl+C, initiating graceful shutdown");
        }
        _ = terminate => {
            tracing::info!("Received terminate signal, initiating graceful shutdown");
        }
    }
}
