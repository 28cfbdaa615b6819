//! HTTP reverse proxy: forwards requests to the resolved dev server
//!
//! The full original path (prefix included) and query are forwarded.
//! `Host` is rewritten to the target. The upstream body is streamed back
//! without buffering.

use super::{connection_tokens, is_forwardable, GatewayBody};
use crate::error::{GatewayError, Result};
use crate::router::ProxyTarget;
use bytes::Bytes;
use futures_util::TryStreamExt;
use http_body_util::{BodyExt, StreamBody};
use hyper::body::Frame;
use std::time::Duration;

/// HTTP reverse proxy
pub struct HttpProxy {
    client: reqwest::Client,
    connect_timeout: Duration,
    idle_timeout: Duration,
}

impl HttpProxy {
    /// Create a proxy with explicit connect and idle (between reads) timeouts
    pub fn new(connect_timeout: Duration, idle_timeout: Duration) -> Result<Self> {
        let client = reqwest::Client::builder()
            .connect_timeout(connect_timeout)
            .read_timeout(idle_timeout)
            .redirect(reqwest::redirect::Policy::none())
            .no_proxy()
            .pool_max_idle_per_host(100)
            .build()?;

        Ok(Self {
            client,
            connect_timeout,
            idle_timeout,
        })
    }

    /// Forward an HTTP request to the target backend
    pub async fn forward(
        &self,
        target: &ProxyTarget,
        method: &http::Method,
        path_and_query: &str,
        headers: &http::HeaderMap,
        body: Bytes,
    ) -> Result<ProxyResponse> {
        let upstream_url = format!("{}{}", target.base_url(), path_and_query);

        let mut req_builder = self.client.request(method.clone(), &upstream_url);

        // Host comes from the upstream URL; length is recomputed from the body
        let listed = connection_tokens(headers);
        for (key, value) in headers.iter() {
            if !is_forwardable(key, &listed)
                || *key == http::header::HOST
                || *key == http::header::CONTENT_LENGTH
            {
                continue;
            }
            req_builder = req_builder.header(key.clone(), value.clone());
        }

        let response = req_builder
            .body(body)
            .send()
            .await
            .map_err(|e| self.classify(target, e))?;

        let status = response.status();
        let mut resp_headers = http::HeaderMap::with_capacity(response.headers().len());
        let listed = connection_tokens(response.headers());
        for (key, value) in response.headers().iter() {
            if is_forwardable(key, &listed) {
                resp_headers.append(key.clone(), value.clone());
            }
        }

        let stream = response
            .bytes_stream()
            .map_ok(Frame::data)
            .map_err(GatewayError::from);

        Ok(ProxyResponse {
            status,
            headers: resp_headers,
            body: StreamBody::new(stream).boxed_unsync(),
        })
    }

    /// Map a client error onto the gateway's upstream error kinds
    fn classify(&self, target: &ProxyTarget, e: reqwest::Error) -> GatewayError {
        if e.is_timeout() {
            let limit = if e.is_connect() {
                self.connect_timeout
            } else {
                self.idle_timeout
            };
            GatewayError::UpstreamTimeout(limit.as_millis() as u64)
        } else if e.is_connect() {
            GatewayError::UpstreamUnavailable(format!("Cannot connect to {}: {}", target, e))
        } else {
            GatewayError::Http(e)
        }
    }

    pub fn connect_timeout(&self) -> Duration {
        self.connect_timeout
    }

    pub fn idle_timeout(&self) -> Duration {
        self.idle_timeout
    }
}

/// Response from an upstream backend
pub struct ProxyResponse {
    /// HTTP status code
    pub status: http::StatusCode,
    /// Response headers, hop-by-hop removed
    pub headers: http::HeaderMap,
    /// Streaming response body
    pub body: GatewayBody,
}
