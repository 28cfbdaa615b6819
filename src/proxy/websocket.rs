//! WebSocket proxy: raw tunnel for HMR sockets
//!
//! The upgrade handshake is replayed against the backend over a fresh
//! HTTP/1.1 connection. Once the backend answers `101`, both upgraded
//! connections are spliced together and bytes flow untouched, so
//! subprotocols such as `vite-hmr` and any extensions keep working.

use super::{empty_body, tcp, GatewayBody};
use crate::error::{GatewayError, Result};
use crate::router::ProxyTarget;
use bytes::Bytes;
use http::{Request, Response, StatusCode};
use http_body_util::Empty;
use hyper::client::conn::http1;
use hyper_util::rt::TokioIo;
use std::time::Duration;

/// Check if an HTTP request is a WebSocket upgrade request
pub fn is_websocket_upgrade(headers: &http::HeaderMap) -> bool {
    headers
        .get(http::header::UPGRADE)
        .and_then(|v| v.to_str().ok())
        .map(|v| v.eq_ignore_ascii_case("websocket"))
        .unwrap_or(false)
}

/// Build the handshake request sent to the backend: same method, path,
/// query and headers, with `Host` pointing at the backend.
pub fn build_upstream_handshake(
    parts: &http::request::Parts,
    target: &ProxyTarget,
) -> Result<Request<Empty<Bytes>>> {
    let path_and_query = parts
        .uri
        .path_and_query()
        .map(|pq| pq.as_str())
        .unwrap_or("/");

    let mut builder = Request::builder()
        .method(parts.method.clone())
        .uri(path_and_query);

    for (name, value) in parts.headers.iter() {
        if *name != http::header::HOST {
            builder = builder.header(name, value);
        }
    }

    builder
        .header(http::header::HOST, target.authority())
        .body(Empty::new())
        .map_err(|e| GatewayError::Upgrade(format!("Invalid handshake request: {}", e)))
}

/// Proxy a WebSocket upgrade to `target`.
///
/// Returns the `101` response for the client; the tunnel runs on its own
/// task until either side closes. Any failure before the backend accepts
/// is returned as an error and no socket is established.
pub async fn proxy_upgrade<B>(
    req: Request<B>,
    target: &ProxyTarget,
    connect_timeout: Duration,
    handshake_timeout: Duration,
) -> Result<Response<GatewayBody>>
where
    B: Send + 'static,
{
    let (parts, body) = req.into_parts();
    let handshake = build_upstream_handshake(&parts, target)?;
    let path = parts.uri.path().to_string();
    let req = Request::from_parts(parts, body);

    let stream = tcp::connect_upstream(&target.authority(), connect_timeout).await?;
    let (mut sender, conn) = http1::handshake(TokioIo::new(stream))
        .await
        .map_err(|e| GatewayError::Upgrade(format!("Backend handshake failed: {}", e)))?;

    tokio::spawn(async move {
        if let Err(e) = conn.with_upgrades().await {
            tracing::debug!(error = %e, "Upstream upgrade connection ended");
        }
    });

    let mut upstream_resp =
        match tokio::time::timeout(handshake_timeout, sender.send_request(handshake)).await {
            Ok(Ok(resp)) => resp,
            Ok(Err(e)) => {
                return Err(GatewayError::Upgrade(format!(
                    "Backend {} dropped the upgrade request: {}",
                    target, e
                )))
            }
            Err(_) => {
                return Err(GatewayError::UpstreamTimeout(
                    handshake_timeout.as_millis() as u64,
                ))
            }
        };

    if upstream_resp.status() != StatusCode::SWITCHING_PROTOCOLS {
        return Err(GatewayError::Upgrade(format!(
            "Backend {} rejected the upgrade with {}",
            target,
            upstream_resp.status()
        )));
    }

    let mut response = Response::new(empty_body());
    *response.status_mut() = StatusCode::SWITCHING_PROTOCOLS;
    for (name, value) in upstream_resp.headers().iter() {
        response.headers_mut().append(name, value.clone());
    }

    let target_label = target.to_string();
    tokio::spawn(async move {
        let client_upgrade = hyper::upgrade::on(req);
        let upstream_upgrade = hyper::upgrade::on(&mut upstream_resp);

        match tokio::try_join!(client_upgrade, upstream_upgrade) {
            Ok((client_upgraded, upstream_upgraded)) => {
                tracing::info!(path = %path, upstream = %target_label, "WebSocket tunnel established");
                let mut client = TokioIo::new(client_upgraded);
                let mut upstream = TokioIo::new(upstream_upgraded);
                match tcp::relay(&mut client, &mut upstream).await {
                    Ok((sent, received)) => tracing::debug!(
                        path = %path,
                        upstream = %target_label,
                        sent,
                        received,
                        "WebSocket tunnel closed"
                    ),
                    Err(e) => tracing::debug!(
                        path = %path,
                        upstream = %target_label,
                        error = %e,
                        "WebSocket tunnel ended"
                    ),
                }
            }
            Err(e) => {
                tracing::warn!(path = %path, upstream = %target_label, error = %e, "WebSocket upgrade failed");
            }
        }
    });

    Ok(response)
}
