//! WebSocket error types.
//!
//! Provides error types for watch connection operations.

use std::fmt;

/// WebSocket errors.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum WsError {
    /// Connection failed.
    Connection(String),

    /// WebSocket protocol error.
    Protocol(String),

    /// Failed to serialize message.
    Serialization(String),

    /// Failed to deserialize message.
    Deserialization(String),

    /// Server reported an error.
    Server(String),

    /// Not connected.
    NotConnected,

    /// Invalid configuration.
    InvalidConfig(String),

    /// Send failed.
    SendFailed(String),
}

impl fmt::Display for WsError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Connection(msg) => write!(f, "connection failed: {}", msg),
            Self::Protocol(msg) => write!(f, "protocol error: {}", msg),
            Self::Serialization(msg) => write!(f, "serialization failed: {}", msg),
            Self::Deserialization(msg) => write!(f, "deserialization failed: {}", msg),
            Self::Server(msg) => write!(f, "server error: {}", msg),
            Self::NotConnected => write!(f, "not connected"),
            Self::InvalidConfig(msg) => write!(f, "invalid configuration: {}", msg),
            Self::SendFailed(msg) => write!(f, "send failed: {}", msg),
        }
    }
}

impl std::error::Error for WsError {}

impl From<tokio_tungstenite::tungstenite::Error> for WsError {
    fn from(err: tokio_tungstenite::tungstenite::Error) -> Self {
        Self::Protocol(err.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_ws_error_display() {
        let err = WsError::Connection("refused".to_string());
        assert_eq!(err.to_string(), "connection failed: refused");
    }

    #[test]
    fn test_ws_error_server() {
        let err = WsError::Server("Failed to get resource: forbidden".to_string());
        assert_eq!(
            err.to_string(),
            "server error: Failed to get resource: forbidden"
        );
    }

    #[test]
    fn test_ws_error_not_connected() {
        assert_eq!(WsError::NotConnected.to_string(), "not connected");
    }

    #[test]
    fn test_ws_error_from_tungstenite() {
        let err = WsError::from(tokio_tungstenite::tungstenite::Error::ConnectionClosed);
        assert!(matches!(err, WsError::Protocol(_)));
    }
}
