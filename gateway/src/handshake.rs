//! One-time startup handshake with the upstream control party.
//!
//! No negotiation exists yet. The trait is the hook where authentication or
//! protocol versioning would go; [`NoopHandshake`] always succeeds.

use async_trait::async_trait;
use thiserror::Error;
use wire::TransportError;

#[derive(Debug, Error)]
pub enum HandshakeError {
    #[error("handshake rejected: {0}")]
    Rejected(String),
    #[error("handshake transport failure: {0}")]
    Transport(#[from] TransportError),
}

#[async_trait]
pub trait Handshake: Send + Sync {
    async fn perform(&self) -> Result<(), HandshakeError>;
}

#[derive(Debug, Default, Clone, Copy)]
pub struct NoopHandshake;

#[async_trait]
impl Handshake for NoopHandshake {
    async fn perform(&self) -> Result<(), HandshakeError> {
        Ok(())
    }
}
