//! Structured access log: one JSON line per completed request
//!
//! Emitted under the `access_log` tracing target so it can be filtered
//! separately (`RUST_LOG=access_log=info`).

use crate::middleware::RequestContext;
use serde::{Deserialize, Serialize};
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Instant;

/// How a request was dispatched
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum Dispatch {
    /// Answered by the middleware chain (CORS preflight)
    ShortCircuit,
    /// Built-in utility endpoint
    Utility,
    /// Matched a configured prefix
    Prefix,
    /// Shared asset resolved via referer
    SharedAsset,
    /// WebSocket upgrade
    Upgrade,
    /// No route
    NotFound,
    /// Dispatcher failure
    Error,
}

/// A single access log entry
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AccessLogEntry {
    /// RFC 3339 timestamp
    pub timestamp: String,
    pub client_ip: String,
    pub method: String,
    /// Path with query
    pub path: String,
    pub referer: Option<String>,
    pub user_agent: Option<String>,
    pub status: u16,
    pub duration_ms: u64,
    pub dispatch: Dispatch,
    /// Backend authority the request was forwarded to
    pub target: Option<String>,
}

/// Access log manager: emits entries and counts them
pub struct AccessLog {
    total_entries: AtomicU64,
}

impl AccessLog {
    pub fn new() -> Self {
        Self {
            total_entries: AtomicU64::new(0),
        }
    }

    /// Start tracking a request. Returns a RequestTracker to measure duration.
    pub fn start_request(&self) -> RequestTracker {
        RequestTracker {
            start: Instant::now(),
        }
    }

    /// Record and emit a log entry
    pub fn record(&self, entry: &AccessLogEntry) {
        self.total_entries.fetch_add(1, Ordering::Relaxed);
        tracing::info!(
            target: "access_log",
            method = entry.method,
            path = entry.path,
            status = entry.status,
            duration_ms = entry.duration_ms,
            upstream = entry.target.as_deref().unwrap_or("-"),
            "{}",
            serde_json::to_string(entry).unwrap_or_default()
        );
    }

    /// Number of entries recorded since start
    pub fn total_entries(&self) -> u64 {
        self.total_entries.load(Ordering::Relaxed)
    }
}

impl Default for AccessLog {
    fn default() -> Self {
        Self::new()
    }
}

/// Tracks request duration
pub struct RequestTracker {
    start: Instant,
}

impl RequestTracker {
    /// Elapsed time in milliseconds since the request started
    pub fn elapsed_ms(&self) -> u64 {
        self.start.elapsed().as_millis() as u64
    }

    /// Build an access log entry from the tracked request
    pub fn build_entry(
        &self,
        ctx: &RequestContext,
        status: u16,
        dispatch: Dispatch,
        target: Option<String>,
    ) -> AccessLogEntry {
        AccessLogEntry {
            timestamp: chrono::Utc::now().to_rfc3339(),
            client_ip: ctx.client_ip.clone(),
            method: ctx.method.clone(),
            path: ctx.path_and_query.clone(),
            referer: ctx.referer.clone(),
            user_agent: ctx.user_agent.clone(),
            status,
            duration_ms: self.elapsed_ms(),
            dispatch,
            target,
        }
    }
}
