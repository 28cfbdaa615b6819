//! Configuration types for the gateway
//!
//! The built-in defaults describe the monorepo's dev layout (four frontend
//! dev servers on 5173-5176, four APIs on 8001-8004). An HCL file can replace
//! any part of it; `PORT` and `NODE_ENV` are applied on top.

mod app;

pub use app::{ApiConfig, AppConfig};

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::net::SocketAddr;
use std::path::Path;
use std::time::Duration;

use crate::error::{GatewayError, Result};

/// Top-level gateway configuration
///
/// # HCL Example
///
/// ```hcl
/// listen      = "0.0.0.0:3000"
/// default_app = "finclamp"
///
/// apps "finclamp" {
///   name   = "FinClamp"
///   port   = 5173
///   routes = ["/calculators", "/games"]
/// }
///
/// apis "finclamp" {
///   port   = 8001
///   routes = ["/api/finclamp"]
/// }
/// ```
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GatewayConfig {
    /// Listen address in "host:port" format
    #[serde(default = "default_listen")]
    pub listen: String,

    /// Environment label (`development`, `production`, ...)
    #[serde(default = "default_environment")]
    pub environment: String,

    /// Host every backend port lives on
    #[serde(default = "default_upstream_host")]
    pub upstream_host: String,

    /// App that receives shared-asset and upgrade requests nobody claims
    #[serde(default = "default_app")]
    pub default_app: String,

    /// Frontend apps, in referer-priority order
    #[serde(default = "default_apps")]
    pub apps: IndexMap<String, AppConfig>,

    /// API backends
    #[serde(default = "default_apis")]
    pub apis: IndexMap<String, ApiConfig>,

    /// Paths shared by every dev server (bundler internals, icons, manifest)
    #[serde(default = "default_shared_assets")]
    pub shared_assets: Vec<String>,

    /// Serve `/debug-route` (default: on outside production)
    #[serde(default)]
    pub expose_debug: Option<bool>,

    /// Upstream connect timeout in milliseconds (default: 5000)
    #[serde(default = "default_connect_timeout")]
    pub connect_timeout_ms: u64,

    /// Upstream idle timeout between reads in milliseconds (default: 30000)
    #[serde(default = "default_idle_timeout")]
    pub idle_timeout_ms: u64,
}

fn default_listen() -> String {
    "0.0.0.0:3000".to_string()
}

fn default_environment() -> String {
    "development".to_string()
}

fn default_upstream_host() -> String {
    "localhost".to_string()
}

fn default_app() -> String {
    "finclamp".to_string()
}

fn default_apps() -> IndexMap<String, AppConfig> {
    let mut apps = IndexMap::new();
    apps.insert(
        "finclamp".to_string(),
        AppConfig::new(
            "FinClamp",
            "Financial calculators and games",
            5173,
            &["/finclamp", "/finance", "/calculator", "/calculators", "/games"],
        ),
    );
    apps.insert(
        "arcade".to_string(),
        AppConfig::new("Arcade", "Retro game collection", 5174, &["/arcade", "/retro-games"]),
    );
    apps.insert(
        "engaged".to_string(),
        AppConfig::new(
            "Engaged",
            "Wedding planning platform",
            5175,
            &["/engaged", "/wedding", "/planning"],
        ),
    );
    apps.insert(
        "skips".to_string(),
        AppConfig::new("Skips", "Fitness tracking", 5176, &["/skips", "/fitness", "/tracker"]),
    );
    apps
}

fn default_apis() -> IndexMap<String, ApiConfig> {
    let mut apis = IndexMap::new();
    apis.insert(
        "finclamp".to_string(),
        ApiConfig::new("FinClamp API", 8001, &["/api/finclamp"]),
    );
    apis.insert(
        "arcade".to_string(),
        ApiConfig::new("Arcade API", 8002, &["/api/arcade"]),
    );
    apis.insert(
        "engaged".to_string(),
        ApiConfig::new("Engaged API", 8003, &["/api/engaged"]),
    );
    apis.insert(
        "skips".to_string(),
        ApiConfig::new("Skips API", 8004, &["/api/skips"]),
    );
    apis
}

fn default_shared_assets() -> Vec<String> {
    [
        "/@vite",
        "/@react-refresh",
        "/@fs",
        "/@id",
        "/src",
        "/node_modules",
        "/favicon.ico",
        "/favicon.svg",
        "/manifest.json",
    ]
    .iter()
    .map(|s| s.to_string())
    .collect()
}

fn default_connect_timeout() -> u64 {
    5_000
}

fn default_idle_timeout() -> u64 {
    30_000
}

impl GatewayConfig {
    /// Load configuration from an HCL file.
    pub async fn from_file(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let content = tokio::fs::read_to_string(path).await.map_err(|e| {
            GatewayError::Config(format!(
                "Failed to read config file {}: {}",
                path.display(),
                e
            ))
        })?;
        Self::from_hcl(&content)
    }

    /// Parse configuration from an HCL string
    pub fn from_hcl(content: &str) -> Result<Self> {
        hcl::from_str(content)
            .map_err(|e| GatewayError::Config(format!("Failed to parse HCL config: {}", e)))
    }

    /// Apply `PORT` / `NODE_ENV` style overrides.
    ///
    /// `port` replaces only the port of the listen address; the host is kept.
    pub fn apply_env(&mut self, port: Option<&str>, environment: Option<&str>) -> Result<()> {
        if let Some(port) = port.map(str::trim).filter(|p| !p.is_empty()) {
            let port: u16 = port
                .parse()
                .map_err(|_| GatewayError::Config(format!("Invalid PORT value '{}'", port)))?;
            let host = self
                .listen
                .rsplit_once(':')
                .map(|(host, _)| host)
                .filter(|h| !h.is_empty())
                .unwrap_or("0.0.0.0");
            self.listen = format!("{}:{}", host, port);
        }
        if let Some(env) = environment.map(str::trim).filter(|e| !e.is_empty()) {
            self.environment = env.to_string();
        }
        Ok(())
    }

    /// Read overrides from the process environment
    pub fn apply_process_env(&mut self) -> Result<()> {
        let port = std::env::var("PORT").ok();
        let environment = std::env::var("NODE_ENV").ok();
        self.apply_env(port.as_deref(), environment.as_deref())
    }

    /// Validate the configuration for consistency
    pub fn validate(&self) -> Result<()> {
        self.listen_addr()?;

        if self.apps.is_empty() {
            return Err(GatewayError::Config(
                "At least one app must be configured".to_string(),
            ));
        }
        if !self.apps.contains_key(&self.default_app) {
            return Err(GatewayError::Config(format!(
                "Default app '{}' is not configured",
                self.default_app
            )));
        }

        // Every prefix maps to exactly one port
        let mut seen = HashSet::new();
        let apps = self
            .apps
            .iter()
            .map(|(name, app)| (name, app.port, &app.routes));
        let apis = self
            .apis
            .iter()
            .map(|(name, api)| (name, api.port, &api.routes));

        for (name, port, routes) in apps.chain(apis) {
            if port == 0 {
                return Err(GatewayError::Config(format!(
                    "'{}' has an invalid port 0",
                    name
                )));
            }
            for route in routes {
                validate_prefix(name, route)?;
                if !seen.insert(route.as_str()) {
                    return Err(GatewayError::Config(format!(
                        "Route prefix '{}' is configured more than once",
                        route
                    )));
                }
            }
        }

        for asset in &self.shared_assets {
            validate_prefix("shared_assets", asset)?;
        }

        Ok(())
    }

    /// Parsed listen address
    pub fn listen_addr(&self) -> Result<SocketAddr> {
        self.listen.parse().map_err(|e| {
            GatewayError::Config(format!("Invalid listen address '{}': {}", self.listen, e))
        })
    }

    /// Whether `/debug-route` is served
    pub fn debug_enabled(&self) -> bool {
        self.expose_debug
            .unwrap_or_else(|| !self.environment.eq_ignore_ascii_case("production"))
    }

    pub fn connect_timeout(&self) -> Duration {
        Duration::from_millis(self.connect_timeout_ms)
    }

    pub fn idle_timeout(&self) -> Duration {
        Duration::from_millis(self.idle_timeout_ms)
    }
}

fn validate_prefix(owner: &str, prefix: &str) -> Result<()> {
    if !prefix.starts_with('/') || prefix.len() < 2 || prefix.ends_with('/') {
        return Err(GatewayError::Config(format!(
            "'{}': route prefix '{}' must start with '/' and must not end with '/'",
            owner, prefix
        )));
    }
    Ok(())
}

impl Default for GatewayConfig {
    fn default() -> Self {
        Self {
            listen: default_listen(),
            environment: default_environment(),
            upstream_host: default_upstream_host(),
            default_app: default_app(),
            apps: default_apps(),
            apis: default_apis(),
            shared_assets: default_shared_assets(),
            expose_debug: None,
            connect_timeout_ms: default_connect_timeout(),
            idle_timeout_ms: default_idle_timeout(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = GatewayConfig::default();
        assert_eq!(config.listen, "0.0.0.0:3000");
        assert_eq!(config.apps.len(), 4);
        assert_eq!(config.apis.len(), 4);
        assert_eq!(config.apps["finclamp"].port, 5173);
        assert_eq!(config.apps["skips"].port, 5176);
        assert_eq!(config.apis["engaged"].port, 8003);
        assert_eq!(config.connect_timeout(), Duration::from_secs(5));
        assert_eq!(config.idle_timeout(), Duration::from_secs(30));
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_default_app_order_is_stable() {
        let config = GatewayConfig::default();
        let names: Vec<&str> = config.apps.keys().map(|k| k.as_str()).collect();
        assert_eq!(names, vec!["finclamp", "arcade", "engaged", "skips"]);
    }

    #[test]
    fn test_parse_minimal_config() {
        let config = GatewayConfig::from_hcl(r#"listen = "127.0.0.1:4000""#).unwrap();
        assert_eq!(config.listen, "127.0.0.1:4000");
        // Unspecified sections keep the built-in table
        assert_eq!(config.apps.len(), 4);
        assert_eq!(config.apis.len(), 4);
    }

    #[test]
    fn test_parse_full_config() {
        let hcl = r#"
            listen        = "127.0.0.1:3100"
            environment   = "production"
            upstream_host = "127.0.0.1"
            default_app   = "main"
            expose_debug  = true
            connect_timeout_ms = 1000
            idle_timeout_ms    = 2000
            shared_assets = ["/@vite"]

            apps "main" {
                name   = "Main"
                port   = 6000
                routes = ["/main"]
            }
            apps "side" {
                port   = 6001
                routes = ["/side", "/other"]
            }
            apis "main" {
                port   = 7000
                routes = ["/api/main"]
            }
        "#;
        let config = GatewayConfig::from_hcl(hcl).unwrap();
        assert_eq!(config.environment, "production");
        assert_eq!(config.upstream_host, "127.0.0.1");
        assert_eq!(config.default_app, "main");
        assert_eq!(config.apps.len(), 2);
        assert_eq!(config.apps.get_index(1).unwrap().0, "side");
        assert_eq!(config.apps["side"].routes, vec!["/side", "/other"]);
        assert_eq!(config.apis["main"].port, 7000);
        assert_eq!(config.shared_assets, vec!["/@vite"]);
        assert_eq!(config.connect_timeout(), Duration::from_millis(1000));
        assert!(config.debug_enabled());
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_sample_config_matches_defaults() {
        let config = GatewayConfig::from_hcl(include_str!("../../gateway.hcl")).unwrap();
        config.validate().unwrap();
        let defaults = GatewayConfig::default();
        assert_eq!(
            config.apps.keys().collect::<Vec<_>>(),
            defaults.apps.keys().collect::<Vec<_>>()
        );
        for (name, app) in &config.apps {
            assert_eq!(app.port, defaults.apps[name].port);
            assert_eq!(app.routes, defaults.apps[name].routes);
        }
        assert_eq!(config.apis.len(), defaults.apis.len());
        assert_eq!(config.shared_assets, defaults.shared_assets);
    }

    #[test]
    fn test_parse_invalid_hcl() {
        let result = GatewayConfig::from_hcl("listen = ");
        assert!(result.is_err());
        assert!(result.unwrap_err().to_string().contains("HCL"));
    }

    #[test]
    fn test_validate_duplicate_prefix() {
        let mut config = GatewayConfig::default();
        config
            .apps
            .get_mut("arcade")
            .unwrap()
            .routes
            .push("/games".to_string());
        let err = config.validate().unwrap_err();
        assert!(err.to_string().contains("more than once"));
    }

    #[test]
    fn test_validate_duplicate_across_apps_and_apis() {
        let mut config = GatewayConfig::default();
        config.apis["skips"].routes.push("/skips".to_string());
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_validate_bad_prefix() {
        for bad in ["arcade", "/", "/arcade/"] {
            let mut config = GatewayConfig::default();
            config.apps["arcade"].routes = vec![bad.to_string()];
            assert!(config.validate().is_err(), "prefix {:?} should be rejected", bad);
        }
    }

    #[test]
    fn test_validate_unknown_default_app() {
        let config = GatewayConfig {
            default_app: "nope".to_string(),
            ..GatewayConfig::default()
        };
        let err = config.validate().unwrap_err();
        assert!(err.to_string().contains("Default app 'nope'"));
    }

    #[test]
    fn test_validate_zero_port() {
        let mut config = GatewayConfig::default();
        config.apis["arcade"].port = 0;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_validate_bad_listen() {
        let config = GatewayConfig {
            listen: "not-an-address".to_string(),
            ..GatewayConfig::default()
        };
        assert!(config
            .validate()
            .unwrap_err()
            .to_string()
            .contains("Invalid listen address"));
    }

    #[test]
    fn test_apply_env_port() {
        let mut config = GatewayConfig::default();
        config.apply_env(Some("8080"), None).unwrap();
        assert_eq!(config.listen, "0.0.0.0:8080");
        assert_eq!(config.environment, "development");
    }

    #[test]
    fn test_apply_env_keeps_host() {
        let mut config = GatewayConfig {
            listen: "127.0.0.1:3000".to_string(),
            ..GatewayConfig::default()
        };
        config.apply_env(Some("3999"), Some("production")).unwrap();
        assert_eq!(config.listen, "127.0.0.1:3999");
        assert_eq!(config.environment, "production");
    }

    #[test]
    fn test_apply_env_invalid_port() {
        let mut config = GatewayConfig::default();
        assert!(config.apply_env(Some("http"), None).is_err());
        assert!(config.apply_env(Some("70000"), None).is_err());
    }

    #[test]
    fn test_apply_env_empty_is_ignored() {
        let mut config = GatewayConfig::default();
        config.apply_env(Some(""), Some("  ")).unwrap();
        assert_eq!(config.listen, "0.0.0.0:3000");
        assert_eq!(config.environment, "development");
    }

    #[test]
    fn test_debug_enabled_by_environment() {
        let mut config = GatewayConfig::default();
        assert!(config.debug_enabled());
        config.environment = "production".to_string();
        assert!(!config.debug_enabled());
        config.expose_debug = Some(true);
        assert!(config.debug_enabled());
    }

    #[tokio::test]
    async fn test_from_file() {
        let file = tempfile::NamedTempFile::new().unwrap();
        std::fs::write(file.path(), r#"environment = "staging""#).unwrap();
        let config = GatewayConfig::from_file(file.path()).await.unwrap();
        assert_eq!(config.environment, "staging");
    }

    #[tokio::test]
    async fn test_from_missing_file() {
        let result = GatewayConfig::from_file("/nonexistent/gateway.hcl").await;
        assert!(result.unwrap_err().to_string().contains("Failed to read"));
    }
}
