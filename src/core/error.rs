use std::io;

use thiserror::Error;

/// Failures seen by the pipeline roles.
///
/// Only `RegistrationRejected` is fatal; everything else is handled by the
/// caller's retry loop or by abandoning the current round.
#[derive(Debug, Error)]
pub enum PipelineError {
    #[error("connection to {addr} refused")]
    ConnectionRefused { addr: String },

    #[error("transport closed by peer")]
    TransportClosed,

    #[error("remote call timed out")]
    Timeout,

    #[error("link is not connected")]
    NotConnected,

    #[error("i/o error: {0}")]
    Io(#[from] io::Error),

    #[error("protocol error: {0}")]
    Protocol(String),

    #[error("registration rejected for {0}")]
    RegistrationRejected(String),

    #[error("remote error: {0}")]
    Remote(String),
}

impl PipelineError {
    /// True when the link that produced this error can no longer be trusted
    /// and must be re-established before the next call.
    pub fn is_transport(&self) -> bool {
        matches!(
            self,
            Self::ConnectionRefused { .. }
                | Self::TransportClosed
                | Self::Timeout
                | Self::NotConnected
                | Self::Io(_)
                | Self::Protocol(_)
        )
    }
}

impl From<serde_json::Error> for PipelineError {
    fn from(err: serde_json::Error) -> Self {
        Self::Protocol(err.to_string())
    }
}
