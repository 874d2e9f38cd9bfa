//! Process-level error types.
//!
//! Per-request failures never show up here: parse failures become `400`
//! envelopes and stream faults end only their own connection.

use thiserror::Error;

/// Errors that stop the server.
#[derive(Debug, Error)]
pub enum ServerError {
    /// The listening socket could not be created.
    #[error("failed to bind to {addr}: {source}")]
    Bind {
        addr: String,
        #[source]
        source: std::io::Error,
    },

    /// `accept` failed under the fatal accept policy.
    #[error("failed to accept connection: {0}")]
    Accept(#[source] std::io::Error),

    /// Runtime setup failed.
    #[error(transparent)]
    Io(#[from] std::io::Error),
}
