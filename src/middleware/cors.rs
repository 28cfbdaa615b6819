//! CORS middleware: Cross-Origin Resource Sharing
//!
//! Every response gets the allow headers; `OPTIONS` is answered here with
//! `200` and an empty body, whatever the path.

use super::{Middleware, RequestContext};
use crate::error::Result;
use async_trait::async_trait;
use http::header::{
    HeaderValue, ACCESS_CONTROL_ALLOW_HEADERS, ACCESS_CONTROL_ALLOW_METHODS,
    ACCESS_CONTROL_ALLOW_ORIGIN,
};
use http::{HeaderMap, Response, StatusCode};

const DEFAULT_METHODS: &str = "GET, POST, PUT, DELETE, OPTIONS";
const DEFAULT_HEADERS: &str = "Origin, X-Requested-With, Content-Type, Accept, Authorization";

/// CORS middleware
pub struct CorsMiddleware {
    allowed_origin: HeaderValue,
    allowed_methods: HeaderValue,
    allowed_headers: HeaderValue,
}

impl CorsMiddleware {
    /// Any origin, the standard verb set, the common request headers
    pub fn permissive() -> Self {
        Self {
            allowed_origin: HeaderValue::from_static("*"),
            allowed_methods: HeaderValue::from_static(DEFAULT_METHODS),
            allowed_headers: HeaderValue::from_static(DEFAULT_HEADERS),
        }
    }

    fn apply(&self, headers: &mut HeaderMap) {
        headers.insert(ACCESS_CONTROL_ALLOW_ORIGIN, self.allowed_origin.clone());
        headers.insert(ACCESS_CONTROL_ALLOW_METHODS, self.allowed_methods.clone());
        headers.insert(ACCESS_CONTROL_ALLOW_HEADERS, self.allowed_headers.clone());
    }
}

impl Default for CorsMiddleware {
    fn default() -> Self {
        Self::permissive()
    }
}

#[async_trait]
impl Middleware for CorsMiddleware {
    async fn handle_request(
        &self,
        req: &mut http::request::Parts,
        _ctx: &RequestContext,
    ) -> Result<Option<Response<Vec<u8>>>> {
        if req.method != http::Method::OPTIONS {
            return Ok(None);
        }

        let mut response = Response::new(Vec::new());
        *response.status_mut() = StatusCode::OK;
        self.apply(response.headers_mut());
        Ok(Some(response))
    }

    async fn handle_response(&self, resp: &mut http::response::Parts) -> Result<()> {
        self.apply(&mut resp.headers);
        Ok(())
    }

    fn name(&self) -> &str {
        "cors"
    }
}
