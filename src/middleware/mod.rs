//! Middleware pipeline: ingress request/response transformations
//!
//! Middlewares run in order before dispatch and in reverse order on the
//! way out. Any middleware may short-circuit with its own response.

mod cors;
mod request_log;

pub use cors::CorsMiddleware;
pub use request_log::RequestLogMiddleware;

use crate::error::Result;
use async_trait::async_trait;
use http::Response;
use std::net::SocketAddr;
use std::sync::Arc;

/// Per-request facts used for routing decisions and logs. Never persisted.
#[derive(Debug, Clone)]
pub struct RequestContext {
    /// Client IP address
    pub client_ip: String,
    pub method: String,
    /// Path without query
    pub path: String,
    /// Path with query, as received
    pub path_and_query: String,
    pub referer: Option<String>,
    pub user_agent: Option<String>,
    pub host: Option<String>,
}

impl RequestContext {
    /// Capture the routing-relevant parts of an incoming request
    pub fn from_parts(parts: &http::request::Parts, remote_addr: SocketAddr) -> Self {
        let header = |name: http::header::HeaderName| {
            parts
                .headers
                .get(name)
                .and_then(|v| v.to_str().ok())
                .map(|s| s.to_string())
        };

        Self {
            client_ip: remote_addr.ip().to_string(),
            method: parts.method.as_str().to_string(),
            path: parts.uri.path().to_string(),
            path_and_query: parts
                .uri
                .path_and_query()
                .map(|pq| pq.as_str().to_string())
                .unwrap_or_else(|| "/".to_string()),
            referer: header(http::header::REFERER),
            user_agent: header(http::header::USER_AGENT),
            host: header(http::header::HOST),
        }
    }
}

/// Middleware trait: process a request and optionally short-circuit
#[async_trait]
pub trait Middleware: Send + Sync {
    /// Process the request. Return Ok(None) to continue the pipeline,
    /// or Ok(Some(response)) to short-circuit with an immediate response.
    async fn handle_request(
        &self,
        req: &mut http::request::Parts,
        ctx: &RequestContext,
    ) -> Result<Option<Response<Vec<u8>>>>;

    /// Process the response (optional, default is pass-through)
    async fn handle_response(&self, _resp: &mut http::response::Parts) -> Result<()> {
        Ok(())
    }

    /// Middleware name for logging
    fn name(&self) -> &str;
}

/// Ordered middleware pipeline
pub struct Pipeline {
    middlewares: Vec<Arc<dyn Middleware>>,
}

impl Pipeline {
    /// The gateway's ingress chain: CORS first (so preflights are answered
    /// before anything else), then request logging.
    pub fn standard() -> Self {
        Self::new(vec![
            Arc::new(CorsMiddleware::permissive()),
            Arc::new(RequestLogMiddleware::new()),
        ])
    }

    /// Build a pipeline from explicit middlewares
    pub fn new(middlewares: Vec<Arc<dyn Middleware>>) -> Self {
        Self { middlewares }
    }

    /// Create an empty pipeline
    #[cfg(test)]
    pub fn empty() -> Self {
        Self::new(Vec::new())
    }

    /// Execute the request through all middlewares.
    /// Returns Some(response) if any middleware short-circuits.
    pub async fn process_request(
        &self,
        parts: &mut http::request::Parts,
        ctx: &RequestContext,
    ) -> Result<Option<Response<Vec<u8>>>> {
        for mw in &self.middlewares {
            if let Some(response) = mw.handle_request(parts, ctx).await? {
                tracing::debug!(middleware = mw.name(), "Middleware short-circuited request");
                return Ok(Some(response));
            }
        }
        Ok(None)
    }

    /// Execute the response through all middlewares (reverse order)
    pub async fn process_response(&self, parts: &mut http::response::Parts) -> Result<()> {
        for mw in self.middlewares.iter().rev() {
            mw.handle_response(parts).await?;
        }
        Ok(())
    }

    /// Number of middlewares in the pipeline
    pub fn len(&self) -> usize {
        self.middlewares.len()
    }

    /// Whether the pipeline is empty
    #[cfg(test)]
    pub fn is_empty(&self) -> bool {
        self.middlewares.is_empty()
    }
}

impl Default for Pipeline {
    fn default() -> Self {
        Self::standard()
    }
}

#[cfg(test)]
pub(crate) fn test_ctx(parts: &http::request::Parts) -> RequestContext {
    RequestContext::from_parts(parts, "127.0.0.1:50000".parse().unwrap())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_empty_pipeline() {
        let pipeline = Pipeline::empty();
        assert!(pipeline.is_empty());
        assert_eq!(pipeline.len(), 0);
    }

    #[test]
    fn test_standard_pipeline() {
        let pipeline = Pipeline::standard();
        assert_eq!(pipeline.len(), 2);
        assert_eq!(pipeline.middlewares[0].name(), "cors");
        assert_eq!(pipeline.middlewares[1].name(), "request-log");
    }

    #[test]
    fn test_request_context_from_parts() {
        let (parts, _) = http::Request::builder()
            .uri("/calculators?in=emi")
            .header("Referer", "http://localhost:3000/arcade")
            .header("User-Agent", "Mozilla/5.0 (X11)")
            .header("Host", "localhost:3000")
            .body(())
            .unwrap()
            .into_parts();
        let ctx = test_ctx(&parts);
        assert_eq!(ctx.client_ip, "127.0.0.1");
        assert_eq!(ctx.method, "GET");
        assert_eq!(ctx.path, "/calculators");
        assert_eq!(ctx.path_and_query, "/calculators?in=emi");
        assert_eq!(ctx.referer.as_deref(), Some("http://localhost:3000/arcade"));
        assert_eq!(ctx.user_agent.as_deref(), Some("Mozilla/5.0 (X11)"));
        assert_eq!(ctx.host.as_deref(), Some("localhost:3000"));
    }

    #[test]
    fn test_request_context_missing_headers() {
        let (parts, _) = http::Request::builder()
            .uri("/health")
            .body(())
            .unwrap()
            .into_parts();
        let ctx = test_ctx(&parts);
        assert!(ctx.referer.is_none());
        assert!(ctx.user_agent.is_none());
    }

    #[tokio::test]
    async fn test_empty_pipeline_passthrough() {
        let pipeline = Pipeline::empty();
        let (mut parts, _) = http::Request::builder()
            .uri("/test")
            .body(())
            .unwrap()
            .into_parts();
        let ctx = test_ctx(&parts);
        let result = pipeline.process_request(&mut parts, &ctx).await.unwrap();
        assert!(result.is_none());
    }

    #[tokio::test]
    async fn test_standard_pipeline_short_circuits_options() {
        let pipeline = Pipeline::standard();
        let (mut parts, _) = http::Request::builder()
            .method("OPTIONS")
            .uri("/anything")
            .body(())
            .unwrap()
            .into_parts();
        let ctx = test_ctx(&parts);
        let resp = pipeline
            .process_request(&mut parts, &ctx)
            .await
            .unwrap()
            .unwrap();
        assert_eq!(resp.status(), 200);
    }

    #[tokio::test]
    async fn test_standard_pipeline_response_headers() {
        let pipeline = Pipeline::standard();
        let (mut parts, _) = http::Response::builder()
            .status(502)
            .body(())
            .unwrap()
            .into_parts();
        pipeline.process_response(&mut parts).await.unwrap();
        assert_eq!(parts.headers["access-control-allow-origin"], "*");
    }
}
