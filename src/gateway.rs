//! Gateway orchestrator: owns the route table and the listener lifecycle
//!
//! The route table is compiled once in [`Gateway::new`] and shared with
//! every connection; there is no reload path.

use crate::config::GatewayConfig;
use crate::entrypoint::{self, GatewayContext};
use crate::error::{GatewayError, Result};
use crate::observability::access_log::AccessLog;
use crate::router::RouteTable;
use crate::{GatewayState, HealthStatus};
use std::net::SocketAddr;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, RwLock};
use std::time::Instant;

/// State and start time shared between the gateway and its listener, so
/// `Gateway::health` and `GET /health` report the same snapshot.
pub(crate) struct Lifecycle {
    state: RwLock<GatewayState>,
    start_time: Instant,
}

impl Lifecycle {
    pub(crate) fn new() -> Self {
        Self {
            state: RwLock::new(GatewayState::Created),
            start_time: Instant::now(),
        }
    }

    pub(crate) fn state(&self) -> GatewayState {
        self.state.read().unwrap_or_else(|e| e.into_inner()).clone()
    }

    fn set_state(&self, new_state: GatewayState) {
        let mut state = self.state.write().unwrap_or_else(|e| e.into_inner());
        tracing::debug!(from = %*state, to = %new_state, "State transition");
        *state = new_state;
    }

    pub(crate) fn health(&self, routes: usize, total_requests: u64) -> HealthStatus {
        HealthStatus {
            state: self.state(),
            uptime_secs: self.start_time.elapsed().as_secs(),
            routes,
            total_requests,
        }
    }
}

/// The main Gateway: coordinates all components
pub struct Gateway {
    /// Validated configuration
    config: GatewayConfig,
    /// Immutable route table
    table: Arc<RouteTable>,
    /// Shared with the entrypoint; counts completed requests
    access_log: Arc<AccessLog>,
    /// Runtime state and start time, shared with the listener
    lifecycle: Arc<Lifecycle>,
    /// Shutdown flag
    shutdown: AtomicBool,
    /// Bound listener address once started
    local_addr: RwLock<Option<SocketAddr>>,
    /// Accept loop task handle
    handles: RwLock<Vec<tokio::task::JoinHandle<()>>>,
}

impl Gateway {
    /// Create a new gateway from configuration
    pub fn new(config: GatewayConfig) -> Result<Self> {
        config.validate()?;
        let table = RouteTable::from_config(&config)?;

        Ok(Self {
            config,
            table: Arc::new(table),
            access_log: Arc::new(AccessLog::new()),
            lifecycle: Arc::new(Lifecycle::new()),
            shutdown: AtomicBool::new(false),
            local_addr: RwLock::new(None),
            handles: RwLock::new(Vec::new()),
        })
    }

    /// Start the gateway: binds the listener and begins accepting connections
    pub async fn start(&self) -> Result<()> {
        if self.state() != GatewayState::Created {
            return Err(GatewayError::Other(format!(
                "Gateway cannot start from state '{}'",
                self.state()
            )));
        }
        self.set_state(GatewayState::Starting);

        match self.bind().await {
            Ok(addr) => {
                self.set_state(GatewayState::Running);
                tracing::info!(
                    address = %addr,
                    environment = self.config.environment,
                    "Gateway is running"
                );
                Ok(())
            }
            Err(e) => {
                self.set_state(GatewayState::Stopped);
                Err(e)
            }
        }
    }

    async fn bind(&self) -> Result<SocketAddr> {
        let addr = self.config.listen_addr()?;
        let context = Arc::new(GatewayContext::new(
            &self.config,
            self.table.clone(),
            self.access_log.clone(),
            self.lifecycle.clone(),
        )?);

        self.log_route_table();

        let (local_addr, handle) = entrypoint::start_http_entrypoint(addr, context).await?;
        *self.local_addr.write().unwrap_or_else(|e| e.into_inner()) = Some(local_addr);
        self.handles
            .write()
            .unwrap_or_else(|e| e.into_inner())
            .push(handle);
        Ok(local_addr)
    }

    fn log_route_table(&self) {
        tracing::info!(
            routes = self.table.len(),
            default_port = self.table.default_port(),
            upstream_host = self.config.upstream_host,
            "Route table compiled"
        );
        for entry in self.table.entries() {
            tracing::info!(
                prefix = entry.prefix,
                port = entry.port,
                kind = ?entry.kind,
                app = entry.app,
                "Route"
            );
        }
    }

    /// Initiate graceful shutdown
    pub async fn shutdown(&self) {
        if self.shutdown.swap(true, Ordering::SeqCst) {
            return; // Already shutting down
        }

        self.set_state(GatewayState::Stopping);
        tracing::info!("Gateway shutting down");

        let handles: Vec<_> = self
            .handles
            .write()
            .unwrap_or_else(|e| e.into_inner())
            .drain(..)
            .collect();
        for handle in handles {
            handle.abort();
            let _ = handle.await;
        }

        self.set_state(GatewayState::Stopped);
        let health = self.health();
        tracing::info!(
            uptime_secs = health.uptime_secs,
            total_requests = health.total_requests,
            "Gateway stopped"
        );
    }

    /// Wait for a shutdown signal (Ctrl+C)
    pub async fn wait_for_shutdown(&self) -> Result<()> {
        tokio::signal::ctrl_c().await?;
        self.shutdown().await;
        Ok(())
    }

    /// Get the current gateway state
    pub fn state(&self) -> GatewayState {
        self.lifecycle.state()
    }

    /// Get a health status snapshot
    pub fn health(&self) -> HealthStatus {
        self.lifecycle
            .health(self.table.len(), self.access_log.total_entries())
    }

    /// Address the listener is bound to, once started
    pub fn local_addr(&self) -> Option<SocketAddr> {
        *self.local_addr.read().unwrap_or_else(|e| e.into_inner())
    }

    /// Get the configuration
    pub fn config(&self) -> &GatewayConfig {
        &self.config
    }

    /// Get the compiled route table
    pub fn route_table(&self) -> &RouteTable {
        &self.table
    }

    /// Check if the gateway is running
    pub fn is_running(&self) -> bool {
        self.state() == GatewayState::Running
    }

    fn set_state(&self, new_state: GatewayState) {
        self.lifecycle.set_state(new_state);
    }
}
