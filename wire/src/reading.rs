//! Reading and heartbeat value types.

use chrono::Local;

/// `chrono` format of the timestamp field producers put on the wire.
pub const WIRE_TIMESTAMP_FORMAT: &str = "%d/%m/%Y - %H:%M";

/// The kinds of sensor that produce stored readings.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SensorKind {
    Temperature,
    Humidity,
}

impl SensorKind {
    /// Record tag used in the first wire field.
    pub fn tag(self) -> &'static str {
        match self {
            SensorKind::Temperature => "TEMPERATURE",
            SensorKind::Humidity    => "HUMIDITY",
        }
    }

    pub fn from_tag(s: &str) -> Option<Self> {
        match s {
            "TEMPERATURE" => Some(SensorKind::Temperature),
            "HUMIDITY"    => Some(SensorKind::Humidity),
            _             => None,
        }
    }

    /// Human-readable name used in logs and report pages.
    pub fn label(self) -> &'static str {
        match self {
            SensorKind::Temperature => "Temperature",
            SensorKind::Humidity    => "Humidity",
        }
    }
}

impl std::fmt::Display for SensorKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.tag())
    }
}

/// One timestamped sensor value.
#[derive(Debug, Clone, PartialEq)]
pub struct Reading {
    pub kind: SensorKind,
    pub value: f64,
    /// Producer-side timestamp, carried verbatim.
    pub timestamp: String,
}

impl Reading {
    pub fn new(kind: SensorKind, value: f64, timestamp: impl Into<String>) -> Self {
        Self {
            kind,
            value,
            timestamp: timestamp.into(),
        }
    }

    /// A reading stamped with the current local time.
    pub fn now(kind: SensorKind, value: f64) -> Self {
        Self::new(kind, value, timestamp_now())
    }
}

/// Liveness ping from a producer. Never stored in the histories.
#[derive(Debug, Clone, PartialEq)]
pub struct Heartbeat {
    pub timestamp: String,
}

impl Heartbeat {
    pub fn now() -> Self {
        Self {
            timestamp: timestamp_now(),
        }
    }
}

/// Current local time in [`WIRE_TIMESTAMP_FORMAT`].
pub fn timestamp_now() -> String {
    Local::now().format(WIRE_TIMESTAMP_FORMAT).to_string()
}
