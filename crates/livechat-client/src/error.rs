//! Client error types.

use livechat_protocol::ProtocolError;
use thiserror::Error;

/// Result type for client operations.
pub type ClientResult<T> = Result<T, ClientError>;

/// Errors that can occur in the client.
#[derive(Debug, Error)]
pub enum ClientError {
    /// Socket connect, read or write failed.
    #[error("connection error: {0}")]
    Connection(String),

    /// The server rejected the verify handshake.
    #[error("verify rejected with code {code}")]
    Auth { code: i64 },

    /// Every host in the list failed.
    #[error("all {attempted} hosts failed (connected at least once: {ever_connected})")]
    ExhaustedHosts {
        attempted: usize,
        ever_connected: bool,
    },

    /// Credential lookup failed.
    #[error("credential lookup failed: {0}")]
    Credentials(String),

    /// Configuration error.
    #[error("configuration error: {0}")]
    Config(String),

    /// IO error.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Frame codec error.
    #[error("protocol error: {0}")]
    Protocol(#[from] ProtocolError),
}

impl ClientError {
    /// Returns true if the error ends the current host and moves on to the next.
    pub fn triggers_failover(&self) -> bool {
        matches!(
            self,
            Self::Connection(_) | Self::Auth { .. } | Self::Protocol(_)
        )
    }
}

impl From<reqwest::Error> for ClientError {
    fn from(err: reqwest::Error) -> Self {
        Self::Credentials(err.to_string())
    }
}
