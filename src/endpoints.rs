//! Utility endpoints: health, debug, service-worker neutralization,
//! landing page and the JSON error bodies the dispatcher returns.
//!
//! Everything here is answered by the gateway itself; nothing is proxied.

use crate::config::GatewayConfig;
use crate::error::GatewayError;
use crate::middleware::RequestContext;
use crate::proxy::{full_body, GatewayBody};
use crate::router::{RouteTable, RoutesSnapshot};
use crate::HealthStatus;
use http::header::{HeaderValue, CACHE_CONTROL, CONTENT_TYPE, EXPIRES, PRAGMA};
use http::Response;
use serde::Serialize;
use serde_json::json;

// ---------------------------------------------------------------------------
// Response types
// ---------------------------------------------------------------------------

/// Body of `GET /health`
#[derive(Debug, Clone, Serialize)]
pub struct HealthReport {
    pub status: &'static str,
    pub timestamp: String,
    pub gateway: &'static str,
    pub version: &'static str,
    pub environment: String,
    /// State, uptime, route count and request total
    #[serde(flatten)]
    pub health: HealthStatus,
}

/// One card on the landing page
#[derive(Debug, Clone)]
struct AppLink {
    name: String,
    description: String,
    href: String,
}

/// A response produced by the gateway itself
#[derive(Debug, Clone)]
pub struct UtilityResponse {
    /// HTTP status code
    pub status: u16,
    /// Content-Type header
    pub content_type: &'static str,
    /// Response body
    pub body: String,
    /// Send `Cache-Control: no-cache` and friends
    pub no_cache: bool,
}

impl UtilityResponse {
    pub(crate) fn json(status: u16, body: serde_json::Value) -> Self {
        Self {
            status,
            content_type: "application/json",
            body: body.to_string(),
            no_cache: false,
        }
    }

    fn html(body: String) -> Self {
        Self {
            status: 200,
            content_type: "text/html; charset=utf-8",
            body,
            no_cache: false,
        }
    }

    fn javascript(body: String) -> Self {
        Self {
            status: 200,
            content_type: "application/javascript",
            body,
            no_cache: true,
        }
    }

    fn uncached(mut self) -> Self {
        self.no_cache = true;
        self
    }

    /// `404` body listing every configured prefix
    pub fn not_found(path: &str, routes: &RoutesSnapshot) -> Self {
        let frontend: Vec<&String> = routes.frontend.keys().collect();
        let api: Vec<&String> = routes.api.keys().collect();
        Self::json(
            404,
            json!({
                "error": "Route Not Found",
                "message": format!("No route configured for: {}", path),
                "availableRoutes": {
                    "frontend": frontend,
                    "api": api,
                },
                "suggestion": "Check available routes above",
            }),
        )
    }

    /// `500` body for a dispatcher failure
    pub fn internal_error(message: &str) -> Self {
        Self::json(
            500,
            json!({
                "error": "Internal Server Error",
                "message": message,
                "timestamp": timestamp(),
            }),
        )
    }

    /// `502`/`504` body for a backend that could not be reached or timed out
    pub fn upstream_error(err: &GatewayError, port: u16, route: &str) -> Self {
        let status = err.status_code();
        let body = if status == http::StatusCode::GATEWAY_TIMEOUT {
            json!({
                "error": "Gateway Timeout",
                "message": format!("Port {} did not respond in time", port),
                "route": route,
            })
        } else {
            json!({
                "error": "Bad Gateway",
                "message": format!("Failed to proxy to port {}", port),
                "route": route,
            })
        };
        Self::json(status.as_u16(), body)
    }

    /// Convert into a hyper response
    pub fn into_response(self) -> Response<GatewayBody> {
        let mut response = Response::new(full_body(self.body));
        *response.status_mut() = http::StatusCode::from_u16(self.status)
            .unwrap_or(http::StatusCode::INTERNAL_SERVER_ERROR);

        let headers = response.headers_mut();
        headers.insert(CONTENT_TYPE, HeaderValue::from_static(self.content_type));
        if self.no_cache {
            headers.insert(
                CACHE_CONTROL,
                HeaderValue::from_static("no-cache, no-store, must-revalidate"),
            );
            headers.insert(PRAGMA, HeaderValue::from_static("no-cache"));
            headers.insert(EXPIRES, HeaderValue::from_static("0"));
        }
        response
    }
}

// ---------------------------------------------------------------------------
// Endpoint handler
// ---------------------------------------------------------------------------

/// Built-in endpoints answered before routing
pub struct UtilityEndpoints {
    environment: String,
    listen_port: u16,
    debug_enabled: bool,
    apps: Vec<AppLink>,
    /// Where `/clear-sw` sends the user afterwards
    primary_href: String,
    routes: RoutesSnapshot,
}

impl UtilityEndpoints {
    pub fn new(config: &GatewayConfig, table: &RouteTable) -> Self {
        let apps = config
            .apps
            .iter()
            .map(|(key, app)| AppLink {
                name: if app.name.is_empty() {
                    key.clone()
                } else {
                    app.name.clone()
                },
                description: app.description.clone(),
                href: app.entry_path().to_string(),
            })
            .collect();

        let primary_href = config
            .apps
            .get(&config.default_app)
            .map(|app| app.entry_path().to_string())
            .unwrap_or_else(|| "/".to_string());

        Self {
            environment: config.environment.clone(),
            listen_port: config.listen_addr().map(|a| a.port()).unwrap_or(0),
            debug_enabled: config.debug_enabled(),
            apps,
            primary_href,
            routes: table.routes_snapshot(),
        }
    }

    /// Answer `GET` and `HEAD` requests for the built-in paths; `None`
    /// lets the request continue to routing. The caller drops the body
    /// for `HEAD`.
    pub fn handle(&self, ctx: &RequestContext, health: &HealthStatus) -> Option<UtilityResponse> {
        if ctx.method != "GET" && ctx.method != "HEAD" {
            return None;
        }

        match ctx.path.as_str() {
            "/health" => Some(self.health(health)),
            "/debug-route" if self.debug_enabled => Some(self.debug_route(ctx)),
            "/clear-sw" => Some(UtilityResponse::html(clear_sw_page(&self.primary_href)).uncached()),
            "/sw.js" | "/OrgRJ/sw.js" => Some(UtilityResponse::javascript(
                SELF_UNREGISTERING_SW.to_string(),
            )),
            "/" => Some(UtilityResponse::html(self.landing_page())),
            _ => None,
        }
    }

    pub fn health_report(&self, health: &HealthStatus) -> HealthReport {
        HealthReport {
            status: "healthy",
            timestamp: timestamp(),
            gateway: env!("CARGO_PKG_NAME"),
            version: env!("CARGO_PKG_VERSION"),
            environment: self.environment.clone(),
            health: health.clone(),
        }
    }

    fn health(&self, health: &HealthStatus) -> UtilityResponse {
        let body = serde_json::to_value(self.health_report(health)).unwrap_or_default();
        UtilityResponse::json(200, body)
    }

    fn debug_route(&self, ctx: &RequestContext) -> UtilityResponse {
        UtilityResponse::json(
            200,
            json!({
                "message": "Gateway routing debug",
                "timestamp": timestamp(),
                "requestUrl": ctx.path_and_query,
                "requestPath": ctx.path,
                "headers": {
                    "referer": ctx.referer,
                    "userAgent": ctx.user_agent,
                    "host": ctx.host,
                },
                "routeMap": self.routes.frontend,
                "apiMap": self.routes.api,
            }),
        )
    }

    fn landing_page(&self) -> String {
        let cards: String = self
            .apps
            .iter()
            .map(|app| {
                format!(
                    r#"      <div class="app-card">
        <div class="app-name">{name}</div>
        <div class="app-desc">{desc}</div>
        <a href="{href}" class="app-link">Open {name}</a>
      </div>
"#,
                    name = escape_html(&app.name),
                    desc = escape_html(&app.description),
                    href = escape_html(&app.href),
                )
            })
            .collect();

        let debug_link = if self.debug_enabled {
            r#" | <a href="/debug-route">Debug Info</a>"#
        } else {
            ""
        };

        format!(
            r#"<!DOCTYPE html>
<html>
<head>
  <title>Universal Gateway</title>
  <style>
    body {{ font-family: Arial, sans-serif; margin: 40px; background: #f5f5f5; }}
    .container {{ max-width: 800px; margin: 0 auto; background: white; padding: 40px; border-radius: 10px; }}
    .app-grid {{ display: grid; grid-template-columns: repeat(auto-fit, minmax(200px, 1fr)); gap: 20px; margin: 30px 0; }}
    .app-card {{ padding: 20px; border: 1px solid #ddd; border-radius: 8px; text-align: center; }}
    .app-name {{ font-weight: bold; margin-bottom: 5px; }}
    .app-desc {{ font-size: 0.9em; color: #666; margin-bottom: 15px; }}
    .app-link {{ display: inline-block; padding: 8px 16px; background: #007bff; color: white; text-decoration: none; border-radius: 4px; }}
    .status {{ margin: 20px 0; padding: 15px; background: #e8f5e8; border-radius: 5px; }}
  </style>
</head>
<body>
  <div class="container">
    <h1>Universal Gateway</h1>
    <div class="status">
      <strong>Status:</strong> Running on port {port} |
      <strong>Routes:</strong> {frontend} frontend + {api} API
    </div>
    <h2>Frontend Applications</h2>
    <div class="app-grid">
{cards}    </div>
    <h2>Quick Links</h2>
    <p>
      <a href="/health">Health Check</a> |
      <a href="/clear-sw">Clear Service Workers</a>{debug_link}
    </p>
  </div>
</body>
</html>
"#,
            port = self.listen_port,
            frontend = self.routes.frontend.len(),
            api = self.routes.api.len(),
            cards = cards,
            debug_link = debug_link,
        )
    }
}

fn timestamp() -> String {
    chrono::Utc::now().to_rfc3339_opts(chrono::SecondsFormat::Millis, true)
}

fn escape_html(input: &str) -> String {
    let mut out = String::with_capacity(input.len());
    for c in input.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&#39;"),
            _ => out.push(c),
        }
    }
    out
}

fn clear_sw_page(primary_href: &str) -> String {
    format!(
        r#"<!DOCTYPE html>
<html>
<head>
  <title>Clear Service Workers</title>
</head>
<body>
  <h1>Service Worker Cleanup</h1>
  <div id="status">Clearing service workers...</div>
  <script>
    async function clearServiceWorkers() {{
      const status = document.getElementById('status');
      if (!('serviceWorker' in navigator)) {{
        status.innerHTML = 'Service workers not supported';
        return;
      }}
      try {{
        const registrations = await navigator.serviceWorker.getRegistrations();
        status.innerHTML = 'Found ' + registrations.length + ' service worker(s)<br>';
        for (const registration of registrations) {{
          status.innerHTML += 'Unregistering: ' + registration.scope + '<br>';
          await registration.unregister();
        }}
        if ('caches' in window) {{
          const names = await caches.keys();
          status.innerHTML += 'Found ' + names.length + ' cache(s)<br>';
          for (const name of names) {{
            status.innerHTML += 'Clearing cache: ' + name + '<br>';
            await caches.delete(name);
          }}
        }}
        status.innerHTML += '<br>All service workers and caches cleared!<br>';
        status.innerHTML += '<a href="{href}">Back to the app</a>';
      }} catch (error) {{
        status.innerHTML += 'Error: ' + error.message;
      }}
    }}
    clearServiceWorkers();
  </script>
</body>
</html>
"#,
        href = escape_html(primary_href)
    )
}

/// Replaces any app service worker so it never intercepts proxied fetches
const SELF_UNREGISTERING_SW: &str = r#"// Gateway service worker: disables itself so the proxy sees every request
self.addEventListener('install', () => {
  self.skipWaiting();
});

self.addEventListener('activate', (event) => {
  event.waitUntil(
    Promise.all([
      caches.keys().then((names) => Promise.all(names.map((name) => caches.delete(name)))),
      self.clients.claim(),
    ]).then(() => self.registration.unregister())
  );
});

self.addEventListener('fetch', () => {
  // Intentionally empty: requests go straight to the network
});
"#;
