use std::io;

use thiserror::Error;

/// Network failure on either transport.
#[derive(Debug, Error)]
pub enum TransportError {
    #[error("failed to bind {addr}: {source}")]
    Bind {
        addr: String,
        #[source]
        source: io::Error,
    },
    #[error("failed to connect to {addr}: {source}")]
    Connect {
        addr: String,
        #[source]
        source: io::Error,
    },
    #[error("accept failed: {0}")]
    Accept(#[source] io::Error),
    #[error("send to {addr} failed: {source}")]
    Send {
        addr: String,
        #[source]
        source: io::Error,
    },
    #[error("receive failed: {0}")]
    Receive(#[source] io::Error),
}
