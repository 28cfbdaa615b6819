//! Centralized error types for the gateway

use thiserror::Error;

/// Gateway error types
#[derive(Debug, Error)]
pub enum GatewayError {
    /// Invalid or unreadable configuration
    #[error("Configuration error: {0}")]
    Config(String),

    /// HTTP request failed
    #[error("HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),

    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Backend refused or dropped the connection
    #[error("Upstream unavailable: {0}")]
    UpstreamUnavailable(String),

    /// Backend did not connect or answer in time (milliseconds)
    #[error("Upstream timed out after {0}ms")]
    UpstreamTimeout(u64),

    /// Protocol upgrade could not be established
    #[error("Upgrade failed: {0}")]
    Upgrade(String),

    /// Generic error
    #[error("{0}")]
    Other(String),
}

impl GatewayError {
    /// HTTP status code surfaced to the client for this error
    pub fn status_code(&self) -> http::StatusCode {
        match self {
            Self::UpstreamUnavailable(_) | Self::Upgrade(_) | Self::Http(_) => {
                http::StatusCode::BAD_GATEWAY
            }
            Self::UpstreamTimeout(_) => http::StatusCode::GATEWAY_TIMEOUT,
            _ => http::StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

/// Convenience Result type alias
pub type Result<T> = std::result::Result<T, GatewayError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_codes() {
        assert_eq!(
            GatewayError::UpstreamUnavailable("refused".into()).status_code(),
            http::StatusCode::BAD_GATEWAY
        );
        assert_eq!(
            GatewayError::UpstreamTimeout(5000).status_code(),
            http::StatusCode::GATEWAY_TIMEOUT
        );
        assert_eq!(
            GatewayError::Config("bad".into()).status_code(),
            http::StatusCode::INTERNAL_SERVER_ERROR
        );
    }

    #[test]
    fn test_display() {
        assert_eq!(
            GatewayError::UpstreamTimeout(30000).to_string(),
            "Upstream timed out after 30000ms"
        );
        assert!(GatewayError::Config("duplicate prefix".into())
            .to_string()
            .contains("duplicate prefix"));
    }
}
