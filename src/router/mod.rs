//! Route table: path-prefix resolution to backend ports
//!
//! Resolution order for a request:
//! 1. Prefix match against API then frontend entries (segment boundary)
//! 2. Shared asset paths resolve through referer inference
//! 3. Otherwise unmatched (404)
//!
//! The table is built once at startup and never mutated.

mod referer;

pub use referer::{RefererRule, RefererRules};

use crate::config::GatewayConfig;
use crate::error::{GatewayError, Result};
use indexmap::IndexMap;
use serde::Serialize;

/// Which kind of backend an entry points to
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum RouteKind {
    Frontend,
    Api,
}

/// One prefix → port mapping
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RouteEntry {
    pub prefix: String,
    pub port: u16,
    pub kind: RouteKind,
    /// Owning app or API name from the configuration
    pub app: String,
}

/// Where a request goes
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProxyTarget {
    pub host: String,
    pub port: u16,
}

impl ProxyTarget {
    /// `host:port` authority
    pub fn authority(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }

    /// Base URL without trailing slash
    pub fn base_url(&self) -> String {
        format!("http://{}", self.authority())
    }
}

impl std::fmt::Display for ProxyTarget {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.authority())
    }
}

/// Result of resolving a request path
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Resolution<'a> {
    /// Matched a configured prefix
    Prefix(&'a RouteEntry),
    /// Shared asset path; port inferred from the referer
    SharedAsset(u16),
    /// Nothing claims this path
    Unmatched,
}

impl Resolution<'_> {
    /// Resolved port, if any
    pub fn port(&self) -> Option<u16> {
        match self {
            Resolution::Prefix(entry) => Some(entry.port),
            Resolution::SharedAsset(port) => Some(*port),
            Resolution::Unmatched => None,
        }
    }
}

/// Prefix maps exposed by the 404 body and the debug endpoint
#[derive(Debug, Clone, Serialize)]
pub struct RoutesSnapshot {
    pub frontend: IndexMap<String, u16>,
    pub api: IndexMap<String, u16>,
}

impl RoutesSnapshot {
    pub fn len(&self) -> usize {
        self.frontend.len() + self.api.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Immutable route table
#[derive(Debug, Clone)]
pub struct RouteTable {
    /// API entries first, then frontend entries; first match wins
    entries: Vec<RouteEntry>,
    shared_assets: Vec<String>,
    referer: RefererRules,
    upstream_host: String,
}

impl RouteTable {
    /// Build the table from a validated configuration
    pub fn from_config(config: &GatewayConfig) -> Result<Self> {
        let default_port = config
            .apps
            .get(&config.default_app)
            .map(|app| app.port)
            .ok_or_else(|| {
                GatewayError::Config(format!(
                    "Default app '{}' is not configured",
                    config.default_app
                ))
            })?;

        let api_entries = config.apis.iter().flat_map(|(name, api)| {
            api.routes.iter().map(move |prefix| RouteEntry {
                prefix: prefix.clone(),
                port: api.port,
                kind: RouteKind::Api,
                app: name.clone(),
            })
        });
        let frontend_entries = config.apps.iter().flat_map(|(name, app)| {
            app.routes.iter().map(move |prefix| RouteEntry {
                prefix: prefix.clone(),
                port: app.port,
                kind: RouteKind::Frontend,
                app: name.clone(),
            })
        });

        Ok(Self {
            entries: api_entries.chain(frontend_entries).collect(),
            shared_assets: config.shared_assets.clone(),
            referer: RefererRules::from_config(config, default_port),
            upstream_host: config.upstream_host.clone(),
        })
    }

    /// First entry whose prefix matches `path` at a segment boundary
    pub fn resolve_by_prefix(&self, path: &str) -> Option<&RouteEntry> {
        self.entries
            .iter()
            .find(|entry| matches_prefix(path, &entry.prefix))
    }

    /// Port for a shared-asset request, inferred from its referer
    pub fn resolve_by_referer(&self, referer: Option<&str>) -> u16 {
        self.referer.resolve(referer)
    }

    /// Whether `path` belongs to the shared (app-agnostic) asset set
    pub fn is_shared_asset(&self, path: &str) -> bool {
        self.shared_assets
            .iter()
            .any(|asset| matches_prefix(path, asset))
    }

    /// Full resolution for a plain HTTP request
    pub fn resolve(&self, path: &str, referer: Option<&str>) -> Resolution<'_> {
        if let Some(entry) = self.resolve_by_prefix(path) {
            return Resolution::Prefix(entry);
        }
        if self.is_shared_asset(path) {
            return Resolution::SharedAsset(self.resolve_by_referer(referer));
        }
        Resolution::Unmatched
    }

    /// Port for a protocol upgrade: the path decides first, then the
    /// referer, then the default app. Never fails.
    pub fn resolve_upgrade(&self, path: &str, referer: Option<&str>) -> u16 {
        if let Some(entry) = self.resolve_by_prefix(path) {
            return entry.port;
        }
        self.referer
            .infer(path)
            .or_else(|| referer.and_then(|r| self.referer.infer(r)))
            .unwrap_or(self.referer.default_port())
    }

    /// Target for a resolved port
    pub fn target(&self, port: u16) -> ProxyTarget {
        ProxyTarget {
            host: self.upstream_host.clone(),
            port,
        }
    }

    pub fn default_port(&self) -> u16 {
        self.referer.default_port()
    }

    pub fn entries(&self) -> &[RouteEntry] {
        &self.entries
    }

    /// Number of configured prefixes
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Frontend and API prefix maps, in configuration order
    pub fn routes_snapshot(&self) -> RoutesSnapshot {
        let mut frontend = IndexMap::new();
        let mut api = IndexMap::new();
        for entry in &self.entries {
            match entry.kind {
                RouteKind::Frontend => frontend.insert(entry.prefix.clone(), entry.port),
                RouteKind::Api => api.insert(entry.prefix.clone(), entry.port),
            };
        }
        RoutesSnapshot { frontend, api }
    }
}

/// Segment-boundary prefix match: `/games` matches `/games` and
/// `/games/x` but not `/gamesomething`.
pub fn matches_prefix(path: &str, prefix: &str) -> bool {
    match path.strip_prefix(prefix) {
        Some(rest) => rest.is_empty() || rest.starts_with('/') || prefix.ends_with('/'),
        None => false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn table() -> RouteTable {
        RouteTable::from_config(&GatewayConfig::default()).unwrap()
    }

    #[test]
    fn test_matches_prefix() {
        assert!(matches_prefix("/games", "/games"));
        assert!(matches_prefix("/games/", "/games"));
        assert!(matches_prefix("/games/finance-quest", "/games"));
        assert!(!matches_prefix("/gamesomething", "/games"));
        assert!(!matches_prefix("/game", "/games"));
        assert!(!matches_prefix("/other/games", "/games"));
    }

    #[test]
    fn test_table_size() {
        let table = table();
        assert_eq!(table.len(), 17);
        let snapshot = table.routes_snapshot();
        assert_eq!(snapshot.frontend.len(), 13);
        assert_eq!(snapshot.api.len(), 4);
        assert_eq!(snapshot.len(), table.len());
    }

    #[test]
    fn test_resolve_by_prefix_every_default_route() {
        let table = table();
        let expected = [
            ("/finclamp", 5173),
            ("/finance", 5173),
            ("/calculator", 5173),
            ("/calculators", 5173),
            ("/games", 5173),
            ("/arcade", 5174),
            ("/retro-games", 5174),
            ("/engaged", 5175),
            ("/wedding", 5175),
            ("/planning", 5175),
            ("/skips", 5176),
            ("/fitness", 5176),
            ("/tracker", 5176),
            ("/api/finclamp", 8001),
            ("/api/arcade", 8002),
            ("/api/engaged", 8003),
            ("/api/skips", 8004),
        ];
        for (prefix, port) in expected {
            let nested = format!("{}/deep/path", prefix);
            assert_eq!(table.resolve_by_prefix(prefix).map(|e| e.port), Some(port));
            assert_eq!(table.resolve_by_prefix(&nested).map(|e| e.port), Some(port));
        }
    }

    #[test]
    fn test_calculator_does_not_shadow_calculators() {
        let table = table();
        let entry = table.resolve_by_prefix("/calculators").unwrap();
        assert_eq!(entry.prefix, "/calculators");
    }

    #[test]
    fn test_resolve_by_prefix_no_substring_match() {
        let table = table();
        assert!(table.resolve_by_prefix("/gamesomething").is_none());
        assert!(table.resolve_by_prefix("/api/arcadex").is_none());
        assert!(table.resolve_by_prefix("/api").is_none());
        assert!(table.resolve_by_prefix("/").is_none());
    }

    #[test]
    fn test_api_entry_kind() {
        let table = table();
        let entry = table.resolve_by_prefix("/api/skips/sessions").unwrap();
        assert_eq!(entry.kind, RouteKind::Api);
        assert_eq!(entry.app, "skips");
    }

    #[test]
    fn test_resolve_shared_asset_by_referer() {
        let table = table();
        assert_eq!(
            table.resolve("/@vite/client", Some("http://localhost:3000/arcade")),
            Resolution::SharedAsset(5174)
        );
        assert_eq!(
            table.resolve("/src/main.tsx", Some("http://localhost:3000/skips/today")),
            Resolution::SharedAsset(5176)
        );
        assert_eq!(
            table.resolve("/favicon.ico", None),
            Resolution::SharedAsset(5173)
        );
    }

    #[test]
    fn test_prefix_beats_referer() {
        let table = table();
        let resolution = table.resolve("/calculators", Some("http://localhost:3000/arcade"));
        assert_eq!(resolution.port(), Some(5173));
        assert!(matches!(resolution, Resolution::Prefix(_)));
    }

    #[test]
    fn test_resolve_unmatched() {
        let table = table();
        assert_eq!(table.resolve("/unknown-path", None), Resolution::Unmatched);
        assert_eq!(
            table.resolve("/unknown-path", Some("http://localhost:3000/arcade")),
            Resolution::Unmatched
        );
        assert_eq!(Resolution::Unmatched.port(), None);
    }

    #[test]
    fn test_is_shared_asset() {
        let table = table();
        assert!(table.is_shared_asset("/@vite/client"));
        assert!(table.is_shared_asset("/@react-refresh"));
        assert!(table.is_shared_asset("/node_modules/.vite/deps/react.js"));
        assert!(table.is_shared_asset("/manifest.json"));
        assert!(!table.is_shared_asset("/srcs"));
        assert!(!table.is_shared_asset("/sw.js"));
    }

    #[test]
    fn test_resolve_upgrade() {
        let table = table();
        // Path prefix first
        assert_eq!(table.resolve_upgrade("/engaged/ws", None), 5175);
        // Path beats referer
        assert_eq!(
            table.resolve_upgrade("/arcade", Some("http://localhost:3000/skips")),
            5174
        );
        // Referer when the path is anonymous
        assert_eq!(
            table.resolve_upgrade("/", Some("http://localhost:3000/arcade")),
            5174
        );
        // App path nested inside an unrelated path
        assert_eq!(table.resolve_upgrade("/hmr/skips", None), 5176);
        // Default
        assert_eq!(table.resolve_upgrade("/", None), 5173);
    }

    #[test]
    fn test_target() {
        let table = table();
        let target = table.target(5174);
        assert_eq!(target.authority(), "localhost:5174");
        assert_eq!(target.base_url(), "http://localhost:5174");
        assert_eq!(target.to_string(), "localhost:5174");
        assert_eq!(table.default_port(), 5173);
    }

    #[test]
    fn test_snapshot_serialization() {
        let snapshot = table().routes_snapshot();
        let json = serde_json::to_value(&snapshot).unwrap();
        assert_eq!(json["frontend"]["/arcade"], 5174);
        assert_eq!(json["api"]["/api/finclamp"], 8001);
    }

    #[test]
    fn test_missing_default_app() {
        let config = GatewayConfig {
            default_app: "missing".to_string(),
            ..GatewayConfig::default()
        };
        assert!(RouteTable::from_config(&config).is_err());
    }
}
