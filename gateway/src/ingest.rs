//! Decode-and-fold step shared by both ingest loops.

use std::net::SocketAddr;
use std::sync::Arc;

use event_log::{emit, Channel, Event, EventSink};
use tracing::{debug, warn};
use wire::{DecodeError, Record, SensorKind};

use crate::aggregate::Aggregate;

/// Which ingress path a record arrived on.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Transport {
    Stream,
    Datagram,
}

impl Transport {
    pub fn as_str(self) -> &'static str {
        match self {
            Transport::Stream   => "stream",
            Transport::Datagram => "datagram",
        }
    }
}

/// What happened to one inbound record.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IngestOutcome {
    Stored(SensorKind),
    Heartbeat,
    /// Well-formed but of a kind this gateway does not handle.
    Ignored,
    /// Malformed; dropped and reported.
    Dropped,
}

#[derive(Clone)]
pub struct Ingestor {
    aggregate: Aggregate,
    events: Arc<dyn EventSink>,
}

impl Ingestor {
    pub fn new(aggregate: Aggregate, events: Arc<dyn EventSink>) -> Self {
        Self { aggregate, events }
    }

    /// Decode a raw record (a stream line or a datagram) and fold it in.
    pub async fn ingest(&self, bytes: &[u8], transport: Transport, peer: SocketAddr) -> IngestOutcome {
        match wire::decode_bytes(bytes) {
            Ok(record) => self.fold(record, transport, peer).await,
            Err(e) => self.drop_malformed(bytes, e, transport, peer).await,
        }
    }

    async fn fold(&self, record: Record, transport: Transport, peer: SocketAddr) -> IngestOutcome {
        match record {
            Record::Reading(reading) => {
                let kind = reading.kind;
                let message = format!(
                    "Gateway - Received {} Data: {}, Timestamp: {}",
                    kind.label(),
                    reading.value,
                    reading.timestamp
                );
                self.aggregate.record(reading);
                emit(&*self.events, Event::info(Channel::from(kind), message)).await;
                IngestOutcome::Stored(kind)
            }
            Record::Heartbeat(heartbeat) => {
                self.aggregate.record_heartbeat();
                emit(
                    &*self.events,
                    Event::info(
                        Channel::Gateway,
                        format!("Gateway - ALIVE message received at: {}", heartbeat.timestamp),
                    ),
                )
                .await;
                IngestOutcome::Heartbeat
            }
            Record::Unknown { kind } => {
                debug!(kind = %kind, transport = transport.as_str(), peer = %peer, "ignoring unknown record kind");
                IngestOutcome::Ignored
            }
        }
    }

    async fn drop_malformed(
        &self,
        bytes: &[u8],
        error: DecodeError,
        transport: Transport,
        peer: SocketAddr,
    ) -> IngestOutcome {
        let raw = String::from_utf8_lossy(bytes);
        let raw = raw.trim_end();
        warn!(transport = transport.as_str(), peer = %peer, error = %error, raw, "dropping malformed record");
        emit(
            &*self.events,
            Event::warning(
                Channel::Gateway,
                format!("Gateway - Dropped malformed {} record from {peer}: {error}", transport.as_str()),
            ),
        )
        .await;
        IngestOutcome::Dropped
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use event_log::{FakeEventSink, Level};

    fn peer() -> SocketAddr {
        "127.0.0.1:40000".parse().unwrap()
    }

    fn ingestor() -> (Ingestor, Aggregate, FakeEventSink) {
        let aggregate = Aggregate::new();
        let sink = FakeEventSink::new();
        (Ingestor::new(aggregate.clone(), Arc::new(sink.clone())), aggregate, sink)
    }

    #[tokio::test]
    async fn temperature_record_is_stored_and_logged() {
        let (ingestor, aggregate, sink) = ingestor();
        let outcome = ingestor
            .ingest(b"TEMPERATURE|23.5|10:00\n", Transport::Stream, peer())
            .await;

        assert_eq!(outcome, IngestOutcome::Stored(SensorKind::Temperature));
        assert_eq!(aggregate.temperature_history()[0].value, 23.5);
        let logged = sink.on(Channel::Temperature);
        assert_eq!(logged[0].message, "Gateway - Received Temperature Data: 23.5, Timestamp: 10:00");
    }

    #[tokio::test]
    async fn humidity_record_updates_last_value() {
        let (ingestor, aggregate, sink) = ingestor();
        ingestor.ingest(b"HUMIDITY|84.2|t1", Transport::Datagram, peer()).await;
        ingestor.ingest(b"HUMIDITY|86.7|t2", Transport::Datagram, peer()).await;

        assert_eq!(aggregate.humidity_history().len(), 2);
        assert_eq!(aggregate.last_humidity().unwrap().value, 86.7);
        assert_eq!(sink.on(Channel::Humidity).len(), 2);
    }

    #[tokio::test]
    async fn heartbeat_only_refreshes_liveness() {
        let (ingestor, aggregate, sink) = ingestor();
        let outcome = ingestor.ingest(b"ALIVE|09:41", Transport::Datagram, peer()).await;

        assert_eq!(outcome, IngestOutcome::Heartbeat);
        assert!(aggregate.humidity_history().is_empty());
        assert!(aggregate
            .liveness()
            .last_received_at(crate::liveness::ProducerKind::Heartbeat)
            .is_some());
        assert_eq!(sink.on(Channel::Gateway)[0].message, "Gateway - ALIVE message received at: 09:41");
    }

    #[tokio::test]
    async fn malformed_records_are_dropped_and_reported() {
        let (ingestor, aggregate, sink) = ingestor();
        let malformed: [&[u8]; 4] = [b"TEMPERATURE|notanumber|ts", b"GARBAGE", b"HUMIDITY|85", &[0xff, 0xfe]];
        for raw in malformed {
            assert_eq!(
                ingestor.ingest(raw, Transport::Datagram, peer()).await,
                IngestOutcome::Dropped
            );
        }
        let outcome = ingestor.ingest(b"TEMPERATURE|24.1|10:01", Transport::Stream, peer()).await;
        assert_eq!(outcome, IngestOutcome::Stored(SensorKind::Temperature));

        assert_eq!(aggregate.temperature_history().len(), 1);
        let warnings: Vec<_> = sink
            .on(Channel::Gateway)
            .into_iter()
            .filter(|e| e.level == Level::Warning)
            .collect();
        assert_eq!(warnings.len(), 4);
    }

    #[tokio::test]
    async fn unknown_kind_is_ignored_silently() {
        let (ingestor, aggregate, sink) = ingestor();
        let outcome = ingestor.ingest(b"PRESSURE|1013|ts", Transport::Datagram, peer()).await;
        assert_eq!(outcome, IngestOutcome::Ignored);
        assert!(aggregate.temperature_history().is_empty());
        assert!(sink.snapshot().is_empty());
    }
}
