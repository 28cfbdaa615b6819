//! # Universal Gateway
//!
//! A path-prefix reverse proxy that puts every frontend dev server and API
//! of the monorepo behind one origin, with WebSocket passthrough so Vite
//! HMR keeps working.
//!
//! ## Architecture
//!
//! ```text
//! Entrypoint → Middleware (CORS, request log) → Dispatcher → Backend
//!                                                  │
//!         upgrade │ utility endpoint │ prefix │ shared asset (referer) │ 404
//! ```
//!
//! ## Core Features
//!
//! - **Prefix routing**: segment-boundary prefix match, APIs before frontends
//! - **Shared assets**: `/@vite`, `/src`, `/node_modules`... routed by referer
//! - **WebSocket tunnel**: raw byte relay, subprotocols untouched
//! - **Utility endpoints**: health, debug, service-worker neutralization
//!
//! ## Quick Start
//!
//! ```rust,ignore
//! use universal_gateway::{config::GatewayConfig, Gateway};
//!
//! #[tokio::main]
//! async fn main() -> universal_gateway::Result<()> {
//!     let config = GatewayConfig::from_file("gateway.hcl").await?;
//!     let gateway = Gateway::new(config)?;
//!     gateway.start().await?;
//!     gateway.wait_for_shutdown().await
//! }
//! ```

pub mod config;
pub(crate) mod endpoints;
pub(crate) mod entrypoint;
pub mod error;
pub mod gateway;
pub(crate) mod middleware;
pub(crate) mod observability;
pub(crate) mod proxy;
pub mod router;

// Re-export main types
pub use error::{GatewayError, Result};
pub use gateway::Gateway;
pub use router::{matches_prefix, RouteTable};

use serde::{Deserialize, Serialize};

/// Gateway runtime state
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Default)]
pub enum GatewayState {
    /// Gateway has been created but not yet started
    #[default]
    Created,
    /// Gateway is binding its listener
    Starting,
    /// Gateway is actively accepting and proxying requests
    Running,
    /// Gateway is stopping its listener
    Stopping,
    /// Gateway has fully stopped
    Stopped,
}

impl std::fmt::Display for GatewayState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Created => write!(f, "created"),
            Self::Starting => write!(f, "starting"),
            Self::Running => write!(f, "running"),
            Self::Stopping => write!(f, "stopping"),
            Self::Stopped => write!(f, "stopped"),
        }
    }
}

/// Gateway health status snapshot
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct HealthStatus {
    /// Current gateway state
    pub state: GatewayState,
    /// Uptime in seconds since the gateway was created
    pub uptime_secs: u64,
    /// Frontend plus API prefix count
    pub routes: usize,
    /// Total requests handled since start
    pub total_requests: u64,
}
