//! Producer liveness tracking and the staleness monitor.
//!
//! A producer kind is stale once no record of that kind has arrived within
//! the configured window. Staleness is only reported; nothing is disabled.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use event_log::{emit, Channel, Event, EventSink};
use tokio::time::{Instant, MissedTickBehavior};
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};
use wire::SensorKind;

use crate::aggregate::Aggregate;

/// How often the monitor re-evaluates staleness.
pub const CHECK_INTERVAL: Duration = Duration::from_secs(1);

// ------------------------------------------------------------------ //
//  Types                                                              //
// ------------------------------------------------------------------ //

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ProducerKind {
    Temperature,
    Humidity,
    Heartbeat,
}

impl ProducerKind {
    pub const ALL: [ProducerKind; 3] = [
        ProducerKind::Temperature,
        ProducerKind::Humidity,
        ProducerKind::Heartbeat,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            ProducerKind::Temperature => "temperature",
            ProducerKind::Humidity    => "humidity",
            ProducerKind::Heartbeat   => "heartbeat",
        }
    }

    fn off_label(self) -> &'static str {
        match self {
            ProducerKind::Temperature => "TEMP SENSOR",
            ProducerKind::Humidity    => "HUMIDITY SENSOR",
            ProducerKind::Heartbeat   => "HEARTBEAT",
        }
    }
}

impl From<SensorKind> for ProducerKind {
    fn from(kind: SensorKind) -> Self {
        match kind {
            SensorKind::Temperature => ProducerKind::Temperature,
            SensorKind::Humidity    => ProducerKind::Humidity,
        }
    }
}

impl std::fmt::Display for ProducerKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Last arrival per producer kind, relative to when tracking began.
#[derive(Debug, Clone)]
pub struct ProducerLivenessStatus {
    started_at: Instant,
    last_received: HashMap<ProducerKind, Instant>,
}

impl ProducerLivenessStatus {
    pub fn new(started_at: Instant) -> Self {
        Self {
            started_at,
            last_received: HashMap::with_capacity(ProducerKind::ALL.len()),
        }
    }

    pub fn touch(&mut self, kind: ProducerKind, at: Instant) {
        self.last_received.insert(kind, at);
    }

    pub fn last_received_at(&self, kind: ProducerKind) -> Option<Instant> {
        self.last_received.get(&kind).copied()
    }

    /// Time since the last record of `kind`, or since tracking began if none.
    pub fn silence(&self, kind: ProducerKind, now: Instant) -> Duration {
        let since = self.last_received_at(kind).unwrap_or(self.started_at);
        now.saturating_duration_since(since)
    }

    pub fn is_stale(&self, kind: ProducerKind, now: Instant, stale_after: Duration) -> bool {
        self.silence(kind, now) > stale_after
    }

    pub fn stale_kinds(&self, now: Instant, stale_after: Duration) -> Vec<ProducerKind> {
        ProducerKind::ALL
            .into_iter()
            .filter(|kind| self.is_stale(*kind, now, stale_after))
            .collect()
    }
}

// ------------------------------------------------------------------ //
//  Monitor                                                            //
// ------------------------------------------------------------------ //

/// Report transitions into and out of staleness until cancelled.
pub async fn monitor(
    aggregate: Aggregate,
    stale_after: Duration,
    events: Arc<dyn EventSink>,
    cancel: CancellationToken,
) {
    let mut ticker = tokio::time::interval(CHECK_INTERVAL);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
    let mut stale: HashMap<ProducerKind, bool> = HashMap::with_capacity(ProducerKind::ALL.len());

    loop {
        tokio::select! {
            _ = cancel.cancelled() => break,
            _ = ticker.tick() => {}
        }

        let status = aggregate.liveness();
        let now = Instant::now();
        for kind in ProducerKind::ALL {
            let is_stale = status.is_stale(kind, now, stale_after);
            let was_stale = stale.insert(kind, is_stale).unwrap_or(false);
            if is_stale && !was_stale {
                let silent_secs = status.silence(kind, now).as_secs();
                warn!(producer = %kind, silent_secs, "producer inactive");
                emit(
                    &*events,
                    Event::warning(Channel::Gateway, format!("Gateway - {} OFF", kind.off_label())),
                )
                .await;
            } else if was_stale && !is_stale {
                info!(producer = %kind, "producer active again");
                emit(
                    &*events,
                    Event::info(Channel::Gateway, format!("Gateway - {} ON", kind.off_label())),
                )
                .await;
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use event_log::{FakeEventSink, Level};
    use wire::Reading;

    #[tokio::test(start_paused = true)]
    async fn stale_after_window_without_records() {
        let start = Instant::now();
        let mut status = ProducerLivenessStatus::new(start);
        let window = Duration::from_secs(10);

        assert!(status.stale_kinds(start + Duration::from_secs(10), window).is_empty());
        assert_eq!(
            status.stale_kinds(start + Duration::from_secs(11), window),
            ProducerKind::ALL.to_vec()
        );

        status.touch(ProducerKind::Humidity, start + Duration::from_secs(5));
        assert_eq!(
            status.stale_kinds(start + Duration::from_secs(11), window),
            vec![ProducerKind::Temperature, ProducerKind::Heartbeat]
        );
        assert_eq!(
            status.silence(ProducerKind::Humidity, start + Duration::from_secs(11)),
            Duration::from_secs(6)
        );
    }

    #[tokio::test(start_paused = true)]
    async fn monitor_reports_transitions_once() {
        let aggregate = Aggregate::new();
        let sink = FakeEventSink::new();
        let cancel = CancellationToken::new();
        let handle = tokio::spawn(monitor(
            aggregate.clone(),
            Duration::from_secs(10),
            Arc::new(sink.clone()),
            cancel.clone(),
        ));

        tokio::time::sleep(Duration::from_millis(5_500)).await;
        assert!(sink.snapshot().is_empty());

        tokio::time::sleep(Duration::from_millis(10_000)).await;
        let off: Vec<_> = sink.drain().into_iter().map(|e| (e.level, e.message)).collect();
        assert_eq!(
            off,
            vec![
                (Level::Warning, "Gateway - TEMP SENSOR OFF".to_string()),
                (Level::Warning, "Gateway - HUMIDITY SENSOR OFF".to_string()),
                (Level::Warning, "Gateway - HEARTBEAT OFF".to_string()),
            ]
        );

        aggregate.record(Reading::new(SensorKind::Temperature, 22.0, "ts"));
        tokio::time::sleep(Duration::from_millis(1_500)).await;
        let on = sink.drain();
        assert_eq!(on.len(), 1);
        assert_eq!(on[0].level, Level::Info);
        assert_eq!(on[0].message, "Gateway - TEMP SENSOR ON");

        cancel.cancel();
        handle.await.unwrap();
    }

    #[tokio::test(start_paused = true)]
    async fn filtered_humidity_with_heartbeat_never_goes_off() {
        let aggregate = Aggregate::new();
        let sink = FakeEventSink::new();
        let cancel = CancellationToken::new();
        let handle = tokio::spawn(monitor(
            aggregate.clone(),
            Duration::from_secs(10),
            Arc::new(sink.clone()),
            cancel.clone(),
        ));

        // Two minutes of temperature every second and a heartbeat every
        // three, with no humidity reading ever above the threshold.
        for second in 0..120u32 {
            aggregate.record(Reading::new(SensorKind::Temperature, 22.0, "ts"));
            if second % 3 == 0 {
                aggregate.record_heartbeat();
            }
            tokio::time::sleep(Duration::from_secs(1)).await;
        }

        cancel.cancel();
        handle.await.unwrap();
        assert!(aggregate.humidity_history().is_empty());
        let off: Vec<_> = sink
            .snapshot()
            .into_iter()
            .filter(|e| e.message.ends_with("OFF"))
            .map(|e| e.message)
            .collect();
        assert!(off.is_empty(), "{off:?}");
    }
}
