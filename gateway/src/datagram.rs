//! UDP ingest: one record per datagram.

use tokio::net::UdpSocket;
use tokio_util::sync::CancellationToken;
use wire::{TransportError, MAX_DATAGRAM_SIZE};

use crate::ingest::{Ingestor, Transport};

/// Receive datagrams until cancelled or the socket fails.
pub async fn receive_loop(
    socket: &UdpSocket,
    ingestor: &Ingestor,
    cancel: &CancellationToken,
) -> Result<(), TransportError> {
    // One spare byte: an oversized datagram is rejected, not truncated.
    let mut buf = vec![0u8; MAX_DATAGRAM_SIZE + 1];
    loop {
        let (len, peer) = tokio::select! {
            _ = cancel.cancelled() => return Ok(()),
            received = socket.recv_from(&mut buf) => received.map_err(TransportError::Receive)?,
        };
        ingestor.ingest(&buf[..len], Transport::Datagram, peer).await;
    }
}
