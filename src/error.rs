use thiserror::Error;

#[derive(Error, Debug)]
pub enum EventClientError {
    #[error("WebSocket connection error: {0}")]
    WebSocketError(#[from] tokio_tungstenite::tungstenite::Error),

    #[error("TLS configuration error: {0}")]
    TlsError(#[from] rustls::Error),

    #[error("URL parsing error: {0}")]
    UrlError(#[from] url::ParseError),

    #[error("Unsupported endpoint scheme '{scheme}' (expected http, https, ws or wss)")]
    UnsupportedScheme { scheme: String },

    #[error("No tokio runtime available to drive the event connection")]
    NoRuntime,

    #[error("Connection timeout after {secs}s")]
    Timeout { secs: u64 },

    #[error("Connection closed unexpectedly")]
    ConnectionClosed,

    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    #[error("Metrics server error: {0}")]
    MetricsError(String),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_messages() {
        assert_eq!(
            EventClientError::Timeout { secs: 10 }.to_string(),
            "Connection timeout after 10s"
        );
        let err = EventClientError::from(url::Url::parse("::").unwrap_err());
        assert!(matches!(err, EventClientError::UrlError(_)));
    }
}
