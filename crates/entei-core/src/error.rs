//! Shared error type across Entei crates.

use thiserror::Error;

/// Stable error codes (used in logs and tests).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorCode {
    /// URL rejected before any socket was opened.
    InvalidUrl,
    /// Resolve, connect, or upgrade failed.
    HandshakeFailed,
    /// Channel envelope could not be decoded.
    MalformedEnvelope,
    /// WebSocket frame violated the framing rules.
    MalformedFrame,
    /// Operation requires an open connection.
    NotConnected,
    /// Connect attempt was overtaken by a disconnect or shutdown.
    Cancelled,
    /// Configuration rejected.
    BadConfig,
    /// Unsupported configuration version.
    UnsupportedVersion,
    /// Internal failure.
    Internal,
}

impl ErrorCode {
    /// String representation used in log fields.
    pub fn as_str(self) -> &'static str {
        match self {
            ErrorCode::InvalidUrl => "INVALID_URL",
            ErrorCode::HandshakeFailed => "HANDSHAKE_FAILED",
            ErrorCode::MalformedEnvelope => "MALFORMED_ENVELOPE",
            ErrorCode::MalformedFrame => "MALFORMED_FRAME",
            ErrorCode::NotConnected => "NOT_CONNECTED",
            ErrorCode::Cancelled => "CANCELLED",
            ErrorCode::BadConfig => "BAD_CONFIG",
            ErrorCode::UnsupportedVersion => "UNSUPPORTED_VERSION",
            ErrorCode::Internal => "INTERNAL",
        }
    }
}

/// Why a WebSocket URL was rejected.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum UrlError {
    #[error("secure websocket (wss://) is not supported")]
    SecureSchemeUnsupported,
    #[error("unsupported scheme: {0}")]
    UnsupportedScheme(String),
    #[error("missing scheme")]
    MissingScheme,
    #[error("invalid host: {0:?}")]
    InvalidHost(String),
    #[error("invalid port: {0:?}")]
    InvalidPort(String),
}

/// Shared result type.
pub type Result<T> = std::result::Result<T, EnteiError>;

/// Unified error type used by core and client.
#[derive(Debug, Error)]
pub enum EnteiError {
    #[error("invalid url: {0}")]
    InvalidUrl(#[from] UrlError),
    #[error("failed to resolve host: {0}")]
    ResolveFailed(String),
    #[error("failed to connect to server: {0}")]
    ConnectFailed(String),
    #[error("websocket handshake failed: {0}")]
    HandshakeFailed(String),
    #[error("malformed envelope: {0}")]
    MalformedEnvelope(String),
    #[error("malformed frame: {0}")]
    MalformedFrame(String),
    #[error("websocket not connected")]
    NotConnected,
    #[error("connect cancelled")]
    Cancelled,
    #[error("bad config: {0}")]
    BadConfig(String),
    #[error("unsupported config version")]
    UnsupportedVersion,
    #[error("internal: {0}")]
    Internal(String),
}

impl EnteiError {
    /// Map to a stable code. Resolve/connect/upgrade failures share one code.
    pub fn code(&self) -> ErrorCode {
        match self {
            EnteiError::InvalidUrl(_) => ErrorCode::InvalidUrl,
            EnteiError::ResolveFailed(_)
            | EnteiError::ConnectFailed(_)
            | EnteiError::HandshakeFailed(_) => ErrorCode::HandshakeFailed,
            EnteiError::MalformedEnvelope(_) => ErrorCode::MalformedEnvelope,
            EnteiError::MalformedFrame(_) => ErrorCode::MalformedFrame,
            EnteiError::NotConnected => ErrorCode::NotConnected,
            EnteiError::Cancelled => ErrorCode::Cancelled,
            EnteiError::BadConfig(_) => ErrorCode::BadConfig,
            EnteiError::UnsupportedVersion => ErrorCode::UnsupportedVersion,
            EnteiError::Internal(_) => ErrorCode::Internal,
        }
    }
}
