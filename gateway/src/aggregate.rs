//! Shared aggregate state.
//!
//! One mutex guards the whole state: the fold step takes it once per record,
//! and every read clones a snapshot under it. Readers therefore never see a
//! half-applied record, but nothing ties a temperature snapshot to a humidity
//! snapshot taken by a separate call.
//!
//! Histories grow without bound for the lifetime of the process.

use std::sync::{Arc, Mutex, MutexGuard};

use tokio::time::Instant;
use wire::{Reading, SensorKind};

use crate::liveness::{ProducerKind, ProducerLivenessStatus};

#[derive(Debug)]
struct State {
    temperature: Vec<Reading>,
    humidity: Vec<Reading>,
    last_humidity: Option<Reading>,
    liveness: ProducerLivenessStatus,
}

/// Cheaply cloneable handle to the aggregate.
#[derive(Debug, Clone)]
pub struct Aggregate {
    inner: Arc<Mutex<State>>,
}

impl Default for Aggregate {
    fn default() -> Self {
        Self::new()
    }
}

impl Aggregate {
    pub fn new() -> Self {
        Self {
            inner: Arc::new(Mutex::new(State {
                temperature: Vec::new(),
                humidity: Vec::new(),
                last_humidity: None,
                liveness: ProducerLivenessStatus::new(Instant::now()),
            })),
        }
    }

    /// Append a reading to its history and refresh its liveness.
    pub fn record(&self, reading: Reading) {
        let now = Instant::now();
        let mut state = self.lock();
        state.liveness.touch(reading.kind.into(), now);
        match reading.kind {
            SensorKind::Temperature => state.temperature.push(reading),
            SensorKind::Humidity => {
                state.last_humidity = Some(reading.clone());
                state.humidity.push(reading);
            }
        }
    }

    /// The heartbeat is the humidity sensor's ALIVE, so it also keeps
    /// humidity live while readings sit below the send threshold.
    pub fn record_heartbeat(&self) {
        let now = Instant::now();
        let mut state = self.lock();
        state.liveness.touch(ProducerKind::Heartbeat, now);
        state.liveness.touch(ProducerKind::Humidity, now);
    }

    /// Snapshot of one history, oldest first.
    pub fn history(&self, kind: SensorKind) -> Vec<Reading> {
        let state = self.lock();
        match kind {
            SensorKind::Temperature => state.temperature.clone(),
            SensorKind::Humidity    => state.humidity.clone(),
        }
    }

    pub fn temperature_history(&self) -> Vec<Reading> {
        self.history(SensorKind::Temperature)
    }

    pub fn humidity_history(&self) -> Vec<Reading> {
        self.history(SensorKind::Humidity)
    }

    pub fn last_humidity(&self) -> Option<Reading> {
        self.lock().last_humidity.clone()
    }

    pub fn len(&self, kind: SensorKind) -> usize {
        let state = self.lock();
        match kind {
            SensorKind::Temperature => state.temperature.len(),
            SensorKind::Humidity    => state.humidity.len(),
        }
    }

    pub fn liveness(&self) -> ProducerLivenessStatus {
        self.lock().liveness.clone()
    }

    // Every mutation is a single push or assignment, so a poisoned guard
    // still holds a consistent state.
    fn lock(&self) -> MutexGuard<'_, State> {
        self.inner.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}
