//! Wiring of all five units under one cancellation token.

use std::io;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use event_log::EventSink;
use gateway::{Aggregate, Gateway, HandshakeError, ReportServer};
use sensor_node::{DatagramLink, Link, Producer, ProducerKind, StreamLink};
use tokio::task::JoinSet;
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};
use wire::{Reading, TransportError};

use crate::config::SimulatorConfig;

/// How a unit ended.
#[derive(Debug)]
enum Stopped {
    Producer {
        kind: ProducerKind,
        readings: Vec<Reading>,
        heartbeats: u64,
    },
    Gateway(Result<(), HandshakeError>),
    Report(Result<(), TransportError>),
}

/// What the units reported after shutdown.
#[derive(Debug, Default)]
pub struct Summary {
    /// Temperature readings the producer handed to its link.
    pub temperature_sent: Vec<Reading>,
    /// Humidity readings above the threshold that were sent.
    pub humidity_sent: Vec<Reading>,
    pub heartbeats_sent: u64,
    /// Units that ended with an error or panicked.
    pub failures: Vec<String>,
    /// Some unit did not stop within the grace period and was aborted.
    pub timed_out: bool,
}

impl Summary {
    fn absorb(&mut self, stopped: Stopped) {
        match stopped {
            Stopped::Producer { kind, readings, heartbeats } => match kind {
                ProducerKind::Temperature => self.temperature_sent = readings,
                ProducerKind::Humidity    => self.humidity_sent = readings,
                ProducerKind::Heartbeat   => self.heartbeats_sent = heartbeats,
            },
            Stopped::Gateway(Err(e)) => self.failures.push(format!("gateway: {e}")),
            Stopped::Report(Err(e)) => self.failures.push(format!("report server: {e}")),
            Stopped::Gateway(Ok(())) | Stopped::Report(Ok(())) => {}
        }
    }
}

/// A running network: gateway, report server and three producers.
pub struct Network {
    aggregate: Aggregate,
    stream_addr: SocketAddr,
    datagram_addr: SocketAddr,
    report_addr: SocketAddr,
    cancel: CancellationToken,
    tasks: JoinSet<Stopped>,
}

impl Network {
    /// Bind every endpoint, then spawn all units.
    ///
    /// Producers target the addresses the gateway bound, so ephemeral ports
    /// work.
    pub async fn start(
        config: &SimulatorConfig,
        events: Arc<dyn EventSink>,
    ) -> Result<Self, TransportError> {
        let aggregate = Aggregate::new();
        let gateway = Gateway::bind(&config.gateway, aggregate.clone(), events.clone()).await?;
        let report = ReportServer::bind(
            &config.gateway.report_addr,
            aggregate.clone(),
            config.gateway.stale_after,
        )
        .await?;

        let stream_addr = bound(gateway.stream_addr(), &config.gateway.stream_addr)?;
        let datagram_addr = bound(gateway.datagram_addr(), &config.gateway.datagram_addr)?;
        let report_addr = bound(report.local_addr(), &config.gateway.report_addr)?;

        let temperature = Producer::temperature(StreamLink::new(stream_addr.to_string()), events.clone());
        let humidity = Producer::humidity(DatagramLink::bind(datagram_addr.to_string()).await?, events.clone())
            .with_threshold(config.humidity_threshold);
        let heartbeat = Producer::heartbeat(DatagramLink::bind(datagram_addr.to_string()).await?, events);

        let cancel = CancellationToken::new();
        let mut tasks = JoinSet::new();

        tasks.spawn({
            let cancel = cancel.clone();
            async move { Stopped::Report(report.run(cancel).await) }
        });
        tasks.spawn({
            let cancel = cancel.clone();
            async move {
                let result = gateway.run(cancel.clone()).await;
                if let Err(e) = &result {
                    error!(error = %e, "gateway aborted, stopping the network");
                    cancel.cancel();
                }
                Stopped::Gateway(result)
            }
        });
        tasks.spawn(produce(temperature, cancel.clone()));
        tasks.spawn(produce(humidity, cancel.clone()));
        tasks.spawn(produce(heartbeat, cancel.clone()));

        info!(
            stream = %stream_addr,
            datagram = %datagram_addr,
            report = %report_addr,
            "network started"
        );

        Ok(Self {
            aggregate,
            stream_addr,
            datagram_addr,
            report_addr,
            cancel,
            tasks,
        })
    }

    pub fn aggregate(&self) -> &Aggregate {
        &self.aggregate
    }

    pub fn stream_addr(&self) -> SocketAddr {
        self.stream_addr
    }

    pub fn datagram_addr(&self) -> SocketAddr {
        self.datagram_addr
    }

    pub fn report_addr(&self) -> SocketAddr {
        self.report_addr
    }

    /// Token every unit watches. Cancelling it starts a shutdown.
    pub fn cancellation(&self) -> CancellationToken {
        self.cancel.clone()
    }

    /// Cancel every unit and join them, aborting stragglers after `grace`.
    pub async fn shutdown(mut self, grace: Duration) -> Summary {
        self.cancel.cancel();

        let mut summary = Summary::default();
        loop {
            match tokio::time::timeout(grace, self.tasks.join_next()).await {
                Ok(Some(Ok(stopped))) => summary.absorb(stopped),
                Ok(Some(Err(e))) => {
                    error!(error = %e, "unit failed during shutdown");
                    summary.failures.push(e.to_string());
                }
                Ok(None) => break,
                Err(_) => {
                    warn!(remaining = self.tasks.len(), "shutdown timed out, aborting remaining units");
                    summary.timed_out = true;
                    break;
                }
            }
        }
        self.tasks.abort_all();

        info!(
            temperature = summary.temperature_sent.len(),
            humidity = summary.humidity_sent.len(),
            heartbeats = summary.heartbeats_sent,
            "network stopped"
        );
        summary
    }
}

async fn produce<L: Link + 'static>(mut producer: Producer<L>, cancel: CancellationToken) -> Stopped {
    producer.run(cancel).await;
    Stopped::Producer {
        kind: producer.kind(),
        readings: producer.sent().to_vec(),
        heartbeats: producer.heartbeats_sent(),
    }
}

fn bound(addr: io::Result<SocketAddr>, requested: &str) -> Result<SocketAddr, TransportError> {
    addr.map_err(|source| TransportError::Bind {
        addr: requested.to_string(),
        source,
    })
}
