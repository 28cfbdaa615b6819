//! Proxy layer: request forwarding to dev servers and APIs
//!
//! Handles plain HTTP (streamed responses) and WebSocket upgrades (raw
//! byte tunnels).

pub mod http_proxy;
pub mod tcp;
pub mod websocket;

pub use http_proxy::HttpProxy;

use crate::error::GatewayError;
use bytes::Bytes;
use http_body_util::combinators::UnsyncBoxBody;
use http_body_util::{BodyExt, Empty, Full};

/// Response body type used throughout the gateway
pub type GatewayBody = UnsyncBoxBody<Bytes, GatewayError>;

/// Body from a complete buffer
pub fn full_body(chunk: impl Into<Bytes>) -> GatewayBody {
    Full::new(chunk.into())
        .map_err(|never| match never {})
        .boxed_unsync()
}

/// Zero-length body
pub fn empty_body() -> GatewayBody {
    Empty::<Bytes>::new()
        .map_err(|never| match never {})
        .boxed_unsync()
}

/// Check if a header is a hop-by-hop header that should not be forwarded
pub(crate) fn is_hop_by_hop(name: &str) -> bool {
    matches!(
        name.to_ascii_lowercase().as_str(),
        "connection"
            | "keep-alive"
            | "proxy-authenticate"
            | "proxy-authorization"
            | "proxy-connection"
            | "te"
            | "trailers"
            | "transfer-encoding"
            | "upgrade"
    )
}

/// Header names listed in `Connection`, lowercased. These are hop-by-hop
/// for this message only and must not be forwarded.
pub(crate) fn connection_tokens(headers: &http::HeaderMap) -> Vec<String> {
    headers
        .get_all(http::header::CONNECTION)
        .iter()
        .filter_map(|v| v.to_str().ok())
        .flat_map(|v| v.split(','))
        .map(|token| token.trim().to_ascii_lowercase())
        .filter(|token| !token.is_empty())
        .collect()
}

/// Hop-by-hop check that also honors the message's `Connection` tokens
pub(crate) fn is_forwardable(name: &http::HeaderName, connection: &[String]) -> bool {
    !is_hop_by_hop(name.as_str()) && !connection.iter().any(|token| token == name.as_str())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_hop_by_hop_headers() {
        assert!(is_hop_by_hop("Connection"));
        assert!(is_hop_by_hop("connection"));
        assert!(is_hop_by_hop("Keep-Alive"));
        assert!(is_hop_by_hop("Transfer-Encoding"));
        assert!(is_hop_by_hop("Upgrade"));
        assert!(is_hop_by_hop("Proxy-Authorization"));

        assert!(!is_hop_by_hop("Content-Type"));
        assert!(!is_hop_by_hop("Authorization"));
        assert!(!is_hop_by_hop("Sec-WebSocket-Protocol"));
        assert!(!is_hop_by_hop("Host"));
    }

    #[test]
    fn test_connection_tokens() {
        let mut headers = http::HeaderMap::new();
        headers.append("connection", "keep-alive, X-Secret".parse().unwrap());
        headers.append("connection", " x-trace ,".parse().unwrap());
        assert_eq!(
            connection_tokens(&headers),
            vec!["keep-alive", "x-secret", "x-trace"]
        );
        assert!(connection_tokens(&http::HeaderMap::new()).is_empty());
    }

    #[test]
    fn test_is_forwardable() {
        let listed = vec!["x-secret".to_string()];
        let secret = http::HeaderName::from_static("x-secret");
        let custom = http::HeaderName::from_static("x-custom");
        assert!(!is_forwardable(&secret, &listed));
        assert!(is_forwardable(&custom, &listed));
        assert!(!is_forwardable(&http::header::UPGRADE, &[]));
        assert!(is_forwardable(&secret, &[]));
    }

    #[tokio::test]
    async fn test_full_body() {
        let body = full_body("hello");
        let bytes = body.collect().await.unwrap().to_bytes();
        assert_eq!(bytes, Bytes::from("hello"));
    }

    #[tokio::test]
    async fn test_empty_body() {
        let bytes = empty_body().collect().await.unwrap().to_bytes();
        assert!(bytes.is_empty());
    }
}
