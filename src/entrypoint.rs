//! Entrypoint: HTTP listener and request dispatcher
//!
//! Accepts connections, runs the middleware chain and dispatches each
//! request: WebSocket upgrade, utility endpoint, prefix proxy, shared-asset
//! proxy, or 404. The handler never fails towards hyper; every error
//! becomes a JSON response.

use crate::config::GatewayConfig;
use crate::endpoints::{UtilityEndpoints, UtilityResponse};
use crate::error::{GatewayError, Result};
use crate::gateway::Lifecycle;
use crate::middleware::{Pipeline, RequestContext};
use crate::observability::access_log::{AccessLog, Dispatch};
use crate::proxy::{full_body, websocket, GatewayBody, HttpProxy};
use crate::router::{Resolution, RouteTable};
use http_body_util::BodyExt;
use hyper::body::Incoming;
use hyper::server::conn::http1;
use hyper::service::service_fn;
use hyper::{Request, Response};
use hyper_util::rt::TokioIo;
use std::convert::Infallible;
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::net::TcpListener;

/// Shared state for request handling
pub struct GatewayContext {
    pub table: Arc<RouteTable>,
    pub http_proxy: HttpProxy,
    pub pipeline: Pipeline,
    pub endpoints: UtilityEndpoints,
    /// Structured access log
    pub access_log: Arc<AccessLog>,
    /// Shared with the gateway for `/health`
    pub lifecycle: Arc<Lifecycle>,
}

impl GatewayContext {
    pub fn new(
        config: &GatewayConfig,
        table: Arc<RouteTable>,
        access_log: Arc<AccessLog>,
        lifecycle: Arc<Lifecycle>,
    ) -> Result<Self> {
        let pipeline = Pipeline::standard();
        tracing::debug!(middlewares = pipeline.len(), "Middleware pipeline built");

        Ok(Self {
            http_proxy: HttpProxy::new(config.connect_timeout(), config.idle_timeout())?,
            pipeline,
            endpoints: UtilityEndpoints::new(config, &table),
            table,
            access_log,
            lifecycle,
        })
    }
}

/// What the dispatcher did with a request
struct Outcome {
    response: Response<GatewayBody>,
    dispatch: Dispatch,
    /// Backend authority, when the request was forwarded
    target: Option<String>,
}

impl Outcome {
    fn local(response: UtilityResponse, dispatch: Dispatch) -> Self {
        Self {
            response: response.into_response(),
            dispatch,
            target: None,
        }
    }
}

/// Bind the HTTP listener and start accepting connections.
///
/// Returns the bound address (useful when binding port 0) and the accept
/// loop's task handle.
pub async fn start_http_entrypoint(
    addr: SocketAddr,
    state: Arc<GatewayContext>,
) -> Result<(SocketAddr, tokio::task::JoinHandle<()>)> {
    let listener = TcpListener::bind(addr)
        .await
        .map_err(|e| GatewayError::Other(format!("Failed to bind {}: {}", addr, e)))?;
    let local_addr = listener.local_addr()?;

    tracing::info!(address = %local_addr, "HTTP entrypoint listening");

    let handle = tokio::spawn(async move {
        loop {
            let (stream, remote_addr) = match listener.accept().await {
                Ok(conn) => conn,
                Err(e) => {
                    tracing::error!(error = %e, "Failed to accept connection");
                    continue;
                }
            };

            let state = state.clone();
            tokio::spawn(async move {
                let io = TokioIo::new(stream);
                let service =
                    service_fn(move |req| handle_http_request(req, remote_addr, state.clone()));
                if let Err(e) = http1::Builder::new()
                    .serve_connection(io, service)
                    .with_upgrades()
                    .await
                {
                    tracing::debug!(error = %e, remote = %remote_addr, "Connection closed with error");
                }
            });
        }
    });

    Ok((local_addr, handle))
}

/// Handle an individual HTTP request
async fn handle_http_request(
    req: Request<Incoming>,
    remote_addr: SocketAddr,
    state: Arc<GatewayContext>,
) -> std::result::Result<Response<GatewayBody>, Infallible> {
    let tracker = state.access_log.start_request();
    let (mut parts, body) = req.into_parts();
    let ctx = RequestContext::from_parts(&parts, remote_addr);

    let outcome = match state.pipeline.process_request(&mut parts, &ctx).await {
        Ok(Some(response)) => Outcome {
            response: response.map(full_body),
            dispatch: Dispatch::ShortCircuit,
            target: None,
        },
        Ok(None) => dispatch(&state, Request::from_parts(parts, body), &ctx).await,
        Err(e) => {
            tracing::error!(error = %e, path = ctx.path, "Middleware error");
            Outcome::local(
                UtilityResponse::internal_error(&e.to_string()),
                Dispatch::Error,
            )
        }
    };

    // Response-phase middleware runs on every response, errors included
    let (mut resp_parts, resp_body) = outcome.response.into_parts();
    if let Err(e) = state.pipeline.process_response(&mut resp_parts).await {
        tracing::warn!(error = %e, "Response middleware error");
    }
    let response = Response::from_parts(resp_parts, resp_body);

    state.access_log.record(&tracker.build_entry(
        &ctx,
        response.status().as_u16(),
        outcome.dispatch,
        outcome.target,
    ));

    Ok(response)
}

async fn dispatch(
    state: &GatewayContext,
    req: Request<Incoming>,
    ctx: &RequestContext,
) -> Outcome {
    if websocket::is_websocket_upgrade(req.headers()) {
        return dispatch_upgrade(state, req, ctx).await;
    }

    let health = state
        .lifecycle
        .health(state.table.len(), state.access_log.total_entries());
    if let Some(mut response) = state.endpoints.handle(ctx, &health) {
        if ctx.method == "HEAD" {
            response.body.clear();
        }
        return Outcome::local(response, Dispatch::Utility);
    }

    let (port, kind) = match state.table.resolve(&ctx.path, ctx.referer.as_deref()) {
        Resolution::Prefix(entry) => (entry.port, Dispatch::Prefix),
        Resolution::SharedAsset(port) => (port, Dispatch::SharedAsset),
        Resolution::Unmatched => {
            tracing::debug!(path = ctx.path, "No route matched");
            return Outcome::local(
                UtilityResponse::not_found(&ctx.path, &state.table.routes_snapshot()),
                Dispatch::NotFound,
            );
        }
    };
    let target = state.table.target(port);

    let (parts, body) = req.into_parts();
    let body = match body.collect().await {
        Ok(collected) => collected.to_bytes(),
        Err(e) => {
            tracing::error!(error = %e, path = ctx.path, "Failed to read request body");
            return Outcome::local(
                UtilityResponse::internal_error("Failed to read request body"),
                Dispatch::Error,
            );
        }
    };

    tracing::debug!(
        method = ctx.method,
        path = ctx.path_and_query,
        upstream = %target,
        "Proxying request"
    );

    match state
        .http_proxy
        .forward(&target, &parts.method, &ctx.path_and_query, &parts.headers, body)
        .await
    {
        Ok(proxy_resp) => {
            let mut response = Response::new(proxy_resp.body);
            *response.status_mut() = proxy_resp.status;
            *response.headers_mut() = proxy_resp.headers;
            Outcome {
                response,
                dispatch: kind,
                target: Some(target.authority()),
            }
        }
        Err(e) => {
            let response = match e.status_code() {
                http::StatusCode::BAD_GATEWAY | http::StatusCode::GATEWAY_TIMEOUT => {
                    tracing::error!(
                        error = %e,
                        path = ctx.path_and_query,
                        upstream = %target,
                        "Proxy error"
                    );
                    UtilityResponse::upstream_error(&e, port, &ctx.path_and_query)
                }
                _ => {
                    tracing::error!(error = %e, path = ctx.path_and_query, "Dispatcher error");
                    UtilityResponse::internal_error(&e.to_string())
                }
            };
            Outcome {
                response: response.into_response(),
                dispatch: kind,
                target: Some(target.authority()),
            }
        }
    }
}

async fn dispatch_upgrade(
    state: &GatewayContext,
    req: Request<Incoming>,
    ctx: &RequestContext,
) -> Outcome {
    let port = state
        .table
        .resolve_upgrade(&ctx.path, ctx.referer.as_deref());
    let target = state.table.target(port);

    tracing::info!(path = ctx.path, upstream = %target, "Upgrading WebSocket connection");

    let response = match websocket::proxy_upgrade(
        req,
        &target,
        state.http_proxy.connect_timeout(),
        state.http_proxy.idle_timeout(),
    )
    .await
    {
        Ok(response) => response,
        Err(e) => {
            tracing::warn!(error = %e, path = ctx.path, upstream = %target, "WebSocket proxy error");
            // The socket is never established, so every failure is a 502
            let err = match e {
                GatewayError::UpstreamUnavailable(_) | GatewayError::Upgrade(_) => e,
                other => GatewayError::Upgrade(other.to_string()),
            };
            UtilityResponse::upstream_error(&err, port, &ctx.path_and_query).into_response()
        }
    };

    Outcome {
        response,
        dispatch: Dispatch::Upgrade,
        target: Some(target.authority()),
    }
}
