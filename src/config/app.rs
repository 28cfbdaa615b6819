//! App and API configuration: the backends the gateway routes to

use serde::{Deserialize, Serialize};

/// A frontend application served by a development server
///
/// # Example
///
/// ```hcl
/// apps "arcade" {
///   name        = "Arcade"
///   description = "Retro game collection"
///   port        = 5174
///   routes      = ["/arcade", "/retro-games"]
/// }
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AppConfig {
    /// Display name for the landing page
    #[serde(default)]
    pub name: String,

    /// Short description for the landing page
    #[serde(default)]
    pub description: String,

    /// Dev server port on the upstream host
    pub port: u16,

    /// Path prefixes routed to this app (first one is the canonical link)
    pub routes: Vec<String>,
}

impl AppConfig {
    pub(crate) fn new(name: &str, description: &str, port: u16, routes: &[&str]) -> Self {
        Self {
            name: name.to_string(),
            description: description.to_string(),
            port,
            routes: routes.iter().map(|r| r.to_string()).collect(),
        }
    }

    /// Canonical link for this app (its first route)
    pub fn entry_path(&self) -> &str {
        self.routes.first().map(|r| r.as_str()).unwrap_or("/")
    }
}

/// An API backend
///
/// # Example
///
/// ```hcl
/// apis "arcade" {
///   port   = 8002
///   routes = ["/api/arcade"]
/// }
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ApiConfig {
    /// Display name
    #[serde(default)]
    pub name: String,

    /// API server port on the upstream host
    pub port: u16,

    /// Path prefixes routed to this API
    pub routes: Vec<String>,
}

impl ApiConfig {
    pub(crate) fn new(name: &str, port: u16, routes: &[&str]) -> Self {
        Self {
            name: name.to_string(),
            port,
            routes: routes.iter().map(|r| r.to_string()).collect(),
        }
    }
}
