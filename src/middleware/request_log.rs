//! Request logging middleware: one ingress line per request

use super::{Middleware, RequestContext};
use crate::error::Result;
use async_trait::async_trait;
use http::Response;

/// Logs method, path, referer and the user agent's product token
pub struct RequestLogMiddleware;

impl RequestLogMiddleware {
    pub fn new() -> Self {
        Self
    }
}

impl Default for RequestLogMiddleware {
    fn default() -> Self {
        Self::new()
    }
}

/// First token of a User-Agent string (`Mozilla/5.0 (X11; ...)` → `Mozilla/5.0`)
fn user_agent_product(user_agent: &str) -> &str {
    user_agent.split_whitespace().next().unwrap_or("")
}

#[async_trait]
impl Middleware for RequestLogMiddleware {
    async fn handle_request(
        &self,
        _req: &mut http::request::Parts,
        ctx: &RequestContext,
    ) -> Result<Option<Response<Vec<u8>>>> {
        tracing::info!(
            client_ip = ctx.client_ip,
            method = ctx.method,
            path = ctx.path_and_query,
            referer = ctx.referer.as_deref().unwrap_or("-"),
            user_agent = ctx.user_agent.as_deref().map(user_agent_product).unwrap_or("-"),
            "Incoming request"
        );
        Ok(None)
    }

    fn name(&self) -> &str {
        "request-log"
    }
}
