//! TCP helpers: bounded upstream connects and bidirectional relays

use crate::error::{GatewayError, Result};
use std::time::Duration;
use tokio::io::{AsyncRead, AsyncWrite};
use tokio::net::TcpStream;

/// Connect to an upstream `host:port`, giving up after `timeout`
pub async fn connect_upstream(address: &str, timeout: Duration) -> Result<TcpStream> {
    match tokio::time::timeout(timeout, TcpStream::connect(address)).await {
        Ok(Ok(stream)) => {
            let _ = stream.set_nodelay(true);
            Ok(stream)
        }
        Ok(Err(e)) => Err(GatewayError::UpstreamUnavailable(format!(
            "TCP upstream connection to {} failed: {}",
            address, e
        ))),
        Err(_) => Err(GatewayError::UpstreamTimeout(timeout.as_millis() as u64)),
    }
}

/// Relay bytes both ways until either side closes.
///
/// Returns (client→upstream, upstream→client) byte counts.
pub async fn relay<C, U>(client: &mut C, upstream: &mut U) -> Result<(u64, u64)>
where
    C: AsyncRead + AsyncWrite + Unpin + ?Sized,
    U: AsyncRead + AsyncWrite + Unpin + ?Sized,
{
    tokio::io::copy_bidirectional(client, upstream)
        .await
        .map_err(|e| GatewayError::Other(format!("Relay error: {}", e)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::io::{AsyncReadExt, AsyncWriteExt};
    use tokio::net::TcpListener;

    #[tokio::test]
    async fn test_connect_upstream_refused() {
        let port = {
            let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
            listener.local_addr().unwrap().port()
        };
        let result = connect_upstream(&format!("127.0.0.1:{}", port), Duration::from_secs(1)).await;
        let err = result.unwrap_err();
        assert!(err.to_string().contains("TCP upstream connection"));
        assert_eq!(err.status_code(), http::StatusCode::BAD_GATEWAY);
    }

    #[tokio::test]
    async fn test_connect_upstream_ok() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let stream = connect_upstream(&addr.to_string(), Duration::from_secs(1)).await;
        assert!(stream.is_ok());
    }

    #[tokio::test]
    async fn test_relay_both_directions() {
        let (mut client, mut client_peer) = tokio::io::duplex(64);
        let (mut upstream, mut upstream_peer) = tokio::io::duplex(64);

        let relay_task = tokio::spawn(async move {
            relay(&mut client_peer, &mut upstream_peer).await
        });

        client.write_all(b"ping").await.unwrap();
        let mut buf = [0u8; 4];
        upstream.read_exact(&mut buf).await.unwrap();
        assert_eq!(&buf, b"ping");

        upstream.write_all(b"pong!").await.unwrap();
        let mut buf = [0u8; 5];
        client.read_exact(&mut buf).await.unwrap();
        assert_eq!(&buf, b"pong!");

        drop(client);
        drop(upstream);
        let (up, down) = relay_task.await.unwrap().unwrap();
        assert_eq!(up, 4);
        assert_eq!(down, 5);
    }
}
