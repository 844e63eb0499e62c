//! Gateway lifecycle: bind, handshake, then run the ingest loops.
//!
//! The stream and datagram loops run independently so a silent TCP producer
//! never holds up UDP ingestion. A loop that fails on accept/recv is
//! restarted with exponential backoff.

use std::future::Future;
use std::io;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use event_log::{emit, Channel, Event, EventSink};
use tokio::net::{TcpListener, UdpSocket};
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};
use wire::TransportError;

use crate::aggregate::Aggregate;
use crate::config::GatewayConfig;
use crate::handshake::{Handshake, HandshakeError, NoopHandshake};
use crate::ingest::Ingestor;
use crate::{datagram, liveness, stream};

const INITIAL_BACKOFF: Duration = Duration::from_millis(100);
const MAX_BACKOFF: Duration = Duration::from_secs(5);

pub struct Gateway {
    listener: TcpListener,
    socket: UdpSocket,
    aggregate: Aggregate,
    events: Arc<dyn EventSink>,
    handshake: Arc<dyn Handshake>,
    stale_after: Duration,
}

impl Gateway {
    /// Bind both ingress endpoints. Nothing is read until [`Gateway::run`].
    pub async fn bind(
        config: &GatewayConfig,
        aggregate: Aggregate,
        events: Arc<dyn EventSink>,
    ) -> Result<Self, TransportError> {
        let listener = TcpListener::bind(&config.stream_addr)
            .await
            .map_err(|source| TransportError::Bind {
                addr: config.stream_addr.clone(),
                source,
            })?;
        let socket = UdpSocket::bind(&config.datagram_addr)
            .await
            .map_err(|source| TransportError::Bind {
                addr: config.datagram_addr.clone(),
                source,
            })?;

        Ok(Self {
            listener,
            socket,
            aggregate,
            events,
            handshake: Arc::new(NoopHandshake),
            stale_after: config.stale_after,
        })
    }

    pub fn with_handshake(mut self, handshake: Arc<dyn Handshake>) -> Self {
        self.handshake = handshake;
        self
    }

    pub fn stream_addr(&self) -> io::Result<SocketAddr> {
        self.listener.local_addr()
    }

    pub fn datagram_addr(&self) -> io::Result<SocketAddr> {
        self.socket.local_addr()
    }

    /// Handshake once, then ingest until `cancel` fires.
    ///
    /// A failed handshake is fatal: the error is returned and no record is
    /// ever read.
    pub async fn run(self, cancel: CancellationToken) -> Result<(), HandshakeError> {
        if let Err(e) = self.handshake.perform().await {
            warn!(error = %e, "handshake failed, gateway not started");
            emit(
                &*self.events,
                Event::warning(Channel::Gateway, format!("Handshake with Server failed: {e}")),
            )
            .await;
            return Err(e);
        }
        emit(
            &*self.events,
            Event::info(Channel::Gateway, "Handshake with Server successful"),
        )
        .await;

        info!(
            stream = ?self.listener.local_addr().ok(),
            datagram = ?self.socket.local_addr().ok(),
            "gateway ingesting"
        );

        let ingestor = Ingestor::new(self.aggregate.clone(), self.events.clone());
        let listener = &self.listener;
        let socket = &self.socket;
        let events = &*self.events;

        tokio::join!(
            supervise("stream", events, &cancel, || {
                stream::accept_loop(listener, &ingestor, &cancel)
            }),
            supervise("datagram", events, &cancel, || {
                datagram::receive_loop(socket, &ingestor, &cancel)
            }),
            liveness::monitor(
                self.aggregate.clone(),
                self.stale_after,
                self.events.clone(),
                cancel.clone(),
            ),
        );

        // Connection tasks hold child tokens of `cancel`; they stop with it.
        info!("gateway stopped");
        Ok(())
    }
}

/// Re-run an ingest loop after failures until it returns cleanly.
async fn supervise<F, Fut>(
    name: &'static str,
    events: &dyn EventSink,
    cancel: &CancellationToken,
    mut run_loop: F,
) where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<(), TransportError>>,
{
    let mut backoff = INITIAL_BACKOFF;
    loop {
        let started = Instant::now();
        let Err(e) = run_loop().await else {
            return;
        };

        if started.elapsed() >= MAX_BACKOFF {
            backoff = INITIAL_BACKOFF;
        }
        error!(ingest = name, error = %e, backoff_ms = backoff.as_millis() as u64, "ingest loop failed, restarting");
        emit(
            events,
            Event::warning(Channel::Gateway, format!("Gateway - {name} ingest failed: {e}")),
        )
        .await;

        tokio::select! {
            _ = cancel.cancelled() => return,
            _ = tokio::time::sleep(backoff) => {}
        }
        backoff = (backoff * 2).min(MAX_BACKOFF);
    }
}
