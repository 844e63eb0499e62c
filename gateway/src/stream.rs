//! TCP ingest: one task per producer connection, one record per line.

use std::io;
use std::net::SocketAddr;

use tokio::io::{AsyncBufRead, AsyncBufReadExt, AsyncReadExt, BufReader};
use tokio::net::{TcpListener, TcpStream};
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};
use wire::{TransportError, MAX_RECORD_LEN};

use crate::ingest::{Ingestor, Transport};

/// Accept producer connections until cancelled or accept fails.
pub async fn accept_loop(
    listener: &TcpListener,
    ingestor: &Ingestor,
    cancel: &CancellationToken,
) -> Result<(), TransportError> {
    loop {
        let (socket, peer) = tokio::select! {
            _ = cancel.cancelled() => return Ok(()),
            accepted = listener.accept() => accepted.map_err(TransportError::Accept)?,
        };
        info!(peer = %peer, "stream producer connected");
        tokio::spawn(read_records(socket, peer, ingestor.clone(), cancel.child_token()));
    }
}

async fn read_records(socket: TcpStream, peer: SocketAddr, ingestor: Ingestor, cancel: CancellationToken) {
    let mut reader = BufReader::new(socket);
    let mut line = Vec::with_capacity(128);
    // Room for a full record plus `\r\n`; anything longer is cut here.
    let limit = (MAX_RECORD_LEN + 2) as u64;

    loop {
        line.clear();
        let mut bounded = (&mut reader).take(limit);
        let read = tokio::select! {
            _ = cancel.cancelled() => break,
            read = bounded.read_until(b'\n', &mut line) => read,
        };
        match read {
            Ok(0) => {
                info!(peer = %peer, "stream producer disconnected");
                break;
            }
            Ok(n) => {
                let truncated = n as u64 == limit && line.last() != Some(&b'\n');
                // A cut line fails decoding as too long and is dropped.
                ingestor.ingest(&line, Transport::Stream, peer).await;
                if truncated {
                    let skipped = tokio::select! {
                        _ = cancel.cancelled() => break,
                        skipped = skip_line(&mut reader) => skipped,
                    };
                    if let Err(e) = skipped {
                        warn!(peer = %peer, error = %e, "stream read failed, closing connection");
                        break;
                    }
                }
            }
            Err(e) => {
                warn!(peer = %peer, error = %e, "stream read failed, closing connection");
                break;
            }
        }
    }
}

/// Discard input up to and including the next `\n`, without buffering it.
async fn skip_line<R: AsyncBufRead + Unpin>(reader: &mut R) -> io::Result<()> {
    loop {
        let buf = reader.fill_buf().await?;
        if buf.is_empty() {
            return Ok(());
        }
        match buf.iter().position(|b| *b == b'\n') {
            Some(end) => {
                reader.consume(end + 1);
                return Ok(());
            }
            None => {
                let len = buf.len();
                reader.consume(len);
            }
        }
    }
}
