//! Daemon configuration
//!
//! Flags and environment are read once at startup into this struct and
//! passed down explicitly; nothing reconfigures a running daemon.

use std::net::SocketAddr;
use std::time::Duration;

use grove_controller::RequeueConfig;

/// Settings assembled from CLI flags and the environment.
#[derive(Debug, Clone, Copy)]
pub struct DaemonConfig {
    /// Bind address for the liveness and readiness endpoint.
    pub health_addr: SocketAddr,

    /// Whether the process was asked to run leader election.
    pub leader_elect: bool,

    /// How often each worker scans its kind for due records.
    pub sweep_interval: Duration,

    /// Requeue intervals handed to every driver.
    pub requeue: RequeueConfig,
}

impl Default for DaemonConfig {
    fn default() -> Self {
        Self {
            health_addr: SocketAddr::from(([127, 0, 0, 1], 8081)),
            leader_elect: false,
            sweep_interval: Duration::from_secs(10),
            requeue: RequeueConfig::default(),
        }
    }
}
