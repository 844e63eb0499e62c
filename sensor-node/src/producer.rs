//! The producer loop shared by all three sensors.
//!
//! A producer samples a value, encodes it, hands it to its [`Link`] and
//! waits out its period. What differs per sensor is the sampler, an optional
//! send threshold and the period; see [`Producer::temperature`],
//! [`Producer::humidity`] and [`Producer::heartbeat`].

use std::sync::Arc;
use std::time::Duration;

use event_log::{emit, Channel, Event, EventSink};
use tokio::time::MissedTickBehavior;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};
use wire::{encode_heartbeat, encode_reading, Heartbeat, Reading, SensorKind, TransportError};

use crate::link::Link;
use crate::sampler::{Sampler, UniformSampler, HUMIDITY_RANGE, TEMPERATURE_RANGE};

/// Humidity readings at or below this value are not transmitted.
pub const DEFAULT_HUMIDITY_THRESHOLD: f64 = 80.0;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProducerKind {
    Temperature,
    Humidity,
    Heartbeat,
}

impl ProducerKind {
    pub fn as_str(self) -> &'static str {
        match self {
            ProducerKind::Temperature => "temperature",
            ProducerKind::Humidity    => "humidity",
            ProducerKind::Heartbeat   => "heartbeat",
        }
    }

    pub fn default_period(self) -> Duration {
        match self {
            ProducerKind::Temperature => Duration::from_millis(1000),
            ProducerKind::Humidity    => Duration::from_millis(1000),
            ProducerKind::Heartbeat   => Duration::from_millis(3000),
        }
    }

    /// Sensor whose readings this producer emits; `None` for the heartbeat.
    pub fn sensor(self) -> Option<SensorKind> {
        match self {
            ProducerKind::Temperature => Some(SensorKind::Temperature),
            ProducerKind::Humidity    => Some(SensorKind::Humidity),
            ProducerKind::Heartbeat   => None,
        }
    }

    /// Event log channel the producer reports on.
    pub fn channel(self) -> Channel {
        match self {
            ProducerKind::Temperature => Channel::Temperature,
            ProducerKind::Humidity    => Channel::Humidity,
            ProducerKind::Heartbeat   => Channel::Gateway,
        }
    }
}

impl std::fmt::Display for ProducerKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Outcome of one producer cycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Tick {
    /// The record reached the link.
    Sent,
    /// The sampled value did not exceed the threshold; nothing was sent.
    BelowThreshold,
    /// The link refused the record; it is dropped, not retried.
    Failed,
}

pub struct Producer<L> {
    kind: ProducerKind,
    period: Duration,
    sampler: Option<Box<dyn Sampler>>,
    threshold: Option<f64>,
    link: L,
    events: Arc<dyn EventSink>,
    sent: Vec<Reading>,
    heartbeats_sent: u64,
}

impl<L: Link> Producer<L> {
    fn new(kind: ProducerKind, link: L, events: Arc<dyn EventSink>) -> Self {
        Self {
            kind,
            period: kind.default_period(),
            sampler: None,
            threshold: None,
            link,
            events,
            sent: Vec::new(),
            heartbeats_sent: 0,
        }
    }

    /// Temperature in [20, 30), sent every second.
    pub fn temperature(link: L, events: Arc<dyn EventSink>) -> Self {
        Self::new(ProducerKind::Temperature, link, events)
            .with_sampler(UniformSampler::new(TEMPERATURE_RANGE))
    }

    /// Humidity in [40, 90), sampled every second, sent only above 80.
    pub fn humidity(link: L, events: Arc<dyn EventSink>) -> Self {
        Self::new(ProducerKind::Humidity, link, events)
            .with_sampler(UniformSampler::new(HUMIDITY_RANGE))
            .with_threshold(DEFAULT_HUMIDITY_THRESHOLD)
    }

    /// `ALIVE` record every three seconds.
    pub fn heartbeat(link: L, events: Arc<dyn EventSink>) -> Self {
        Self::new(ProducerKind::Heartbeat, link, events)
    }

    pub fn with_sampler(mut self, sampler: impl Sampler + 'static) -> Self {
        self.sampler = Some(Box::new(sampler));
        self
    }

    pub fn with_threshold(mut self, threshold: f64) -> Self {
        self.threshold = Some(threshold);
        self
    }

    pub fn with_period(mut self, period: Duration) -> Self {
        self.period = period;
        self
    }

    pub fn kind(&self) -> ProducerKind {
        self.kind
    }

    /// Readings that reached the link, in send order.
    pub fn sent(&self) -> &[Reading] {
        &self.sent
    }

    pub fn heartbeats_sent(&self) -> u64 {
        self.heartbeats_sent
    }

    /// Run one cycle per period until `cancel` fires.
    ///
    /// The first cycle runs immediately. A slow send delays the schedule
    /// instead of bursting to catch up.
    pub async fn run(&mut self, cancel: CancellationToken) {
        let mut ticker = tokio::time::interval(self.period);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
        info!(producer = %self.kind, period_ms = self.period.as_millis() as u64, "producer started");

        loop {
            tokio::select! {
                _ = cancel.cancelled() => break,
                _ = ticker.tick() => {}
            }
            tokio::select! {
                _ = cancel.cancelled() => break,
                _ = self.tick() => {}
            }
        }

        info!(
            producer = %self.kind,
            readings = self.sent.len(),
            heartbeats = self.heartbeats_sent,
            "producer stopped"
        );
    }

    /// Sample, filter, encode and send one record.
    pub async fn tick(&mut self) -> Tick {
        match self.kind.sensor() {
            Some(sensor) => self.measure(sensor).await,
            None => self.beat().await,
        }
    }

    async fn measure(&mut self, sensor: SensorKind) -> Tick {
        let Some(sampler) = self.sampler.as_mut() else {
            warn!(producer = %self.kind, "no sampler configured, skipping cycle");
            return Tick::Failed;
        };
        let value = sampler.sample();

        if let Some(threshold) = self.threshold {
            if value <= threshold {
                debug!(producer = %self.kind, value, threshold, "below threshold, not sent");
                return Tick::BelowThreshold;
            }
        }

        let reading = Reading::now(sensor, value);
        if let Err(e) = self.link.send(&encode_reading(&reading)).await {
            return dropped(self.kind, self.events.as_ref(), e).await;
        }

        emit(
            self.events.as_ref(),
            Event::info(
                self.kind.channel(),
                format!(
                    "{} Sensor - Value: {:.2} - Timestamp: {}",
                    sensor.label(),
                    reading.value,
                    reading.timestamp
                ),
            ),
        )
        .await;
        self.sent.push(reading);
        Tick::Sent
    }

    async fn beat(&mut self) -> Tick {
        let heartbeat = Heartbeat::now();
        if let Err(e) = self.link.send(&encode_heartbeat(&heartbeat)).await {
            return dropped(self.kind, self.events.as_ref(), e).await;
        }

        emit(
            self.events.as_ref(),
            Event::info(
                self.kind.channel(),
                format!("Humidity Sensor - ALIVE message sent at: {}", heartbeat.timestamp),
            ),
        )
        .await;
        self.heartbeats_sent += 1;
        Tick::Sent
    }
}

async fn dropped(kind: ProducerKind, events: &dyn EventSink, error: TransportError) -> Tick {
    warn!(producer = %kind, error = %error, "send failed, record dropped");
    emit(
        events,
        Event::warning(kind.channel(), format!("{kind} producer - Record dropped: {error}")),
    )
    .await;
    Tick::Failed
}
