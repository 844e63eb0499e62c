//! EventSink trait and implementations.
//!
//! The event log is the audit trail of the network: every reading a producer
//! sends and every record the gateway folds in is written to the channel it
//! belongs to. Diagnostics go through `tracing`; this is the persisted record.

use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};

use anyhow::Result;
use async_trait::async_trait;
use chrono::{Local, SecondsFormat};
use thiserror::Error;
use tokio::fs::{File, OpenOptions};
use tokio::io::AsyncWriteExt;
use wire::SensorKind;

// ------------------------------------------------------------------ //
//  Domain types                                                       //
// ------------------------------------------------------------------ //

/// Log channel an event belongs to. Each channel is its own file.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Channel {
    Temperature,
    Humidity,
    Gateway,
}

impl Channel {
    /// File name of the channel's log inside the log directory.
    pub fn file_name(self) -> &'static str {
        match self {
            Channel::Temperature => "temperature_log.txt",
            Channel::Humidity    => "humidity_log.txt",
            Channel::Gateway     => "gateway_log.txt",
        }
    }
}

impl From<SensorKind> for Channel {
    fn from(kind: SensorKind) -> Self {
        match kind {
            SensorKind::Temperature => Channel::Temperature,
            SensorKind::Humidity    => Channel::Humidity,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Level {
    Info,
    Warning,
}

impl Level {
    pub fn as_str(self) -> &'static str {
        match self {
            Level::Info    => "INFO",
            Level::Warning => "WARNING",
        }
    }
}

impl std::fmt::Display for Level {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Event {
    pub channel: Channel,
    pub level: Level,
    pub message: String,
}

impl Event {
    pub fn info(channel: Channel, message: impl Into<String>) -> Self {
        Self {
            channel,
            level: Level::Info,
            message: message.into(),
        }
    }

    pub fn warning(channel: Channel, message: impl Into<String>) -> Self {
        Self {
            channel,
            level: Level::Warning,
            message: message.into(),
        }
    }
}

/// The log directory could not be prepared at startup.
#[derive(Debug, Error)]
pub enum ResourceError {
    #[error("cannot create log directory {}: {source}", .path.display())]
    Directory {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("cannot open log file {}: {source}", .path.display())]
    Open {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

// ------------------------------------------------------------------ //
//  Trait                                                              //
// ------------------------------------------------------------------ //

/// Async sink that accepts structured events.
#[async_trait]
pub trait EventSink: Send + Sync {
    async fn record(&self, event: Event) -> Result<()>;
}

/// Record an event, downgrading a sink failure to a warning.
pub async fn emit(sink: &dyn EventSink, event: Event) {
    if let Err(e) = sink.record(event).await {
        tracing::warn!(error = %e, "EventSink write failed (non-fatal)");
    }
}

// ------------------------------------------------------------------ //
//  FakeEventSink (for tests)                                          //
// ------------------------------------------------------------------ //

/// In-memory sink that collects events for test assertions.
#[derive(Debug, Default, Clone)]
pub struct FakeEventSink {
    pub events: Arc<Mutex<Vec<Event>>>,
}

impl FakeEventSink {
    pub fn new() -> Self {
        Self::default()
    }

    /// Consume all events recorded so far (drains the buffer).
    pub fn drain(&self) -> Vec<Event> {
        self.lock().drain(..).collect()
    }

    /// Non-destructive snapshot of the recorded events.
    pub fn snapshot(&self) -> Vec<Event> {
        self.lock().clone()
    }

    /// Recorded events on one channel.
    pub fn on(&self, channel: Channel) -> Vec<Event> {
        self.lock()
            .iter()
            .filter(|e| e.channel == channel)
            .cloned()
            .collect()
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, Vec<Event>> {
        self.events.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

#[async_trait]
impl EventSink for FakeEventSink {
    async fn record(&self, event: Event) -> Result<()> {
        self.lock().push(event);
        Ok(())
    }
}

// ------------------------------------------------------------------ //
//  FileEventSink (production)                                         //
// ------------------------------------------------------------------ //

/// Production sink: one append-only file per channel.
pub struct FileEventSink {
    temperature: tokio::sync::Mutex<File>,
    humidity: tokio::sync::Mutex<File>,
    gateway: tokio::sync::Mutex<File>,
}

impl FileEventSink {
    /// Create `dir` if needed and open the three channel files for append.
    pub async fn open(dir: impl AsRef<Path>) -> Result<Self, ResourceError> {
        let dir = dir.as_ref();
        tokio::fs::create_dir_all(dir)
            .await
            .map_err(|source| ResourceError::Directory {
                path: dir.to_path_buf(),
                source,
            })?;

        Ok(Self {
            temperature: tokio::sync::Mutex::new(open_append(dir, Channel::Temperature).await?),
            humidity: tokio::sync::Mutex::new(open_append(dir, Channel::Humidity).await?),
            gateway: tokio::sync::Mutex::new(open_append(dir, Channel::Gateway).await?),
        })
    }

    fn file(&self, channel: Channel) -> &tokio::sync::Mutex<File> {
        match channel {
            Channel::Temperature => &self.temperature,
            Channel::Humidity    => &self.humidity,
            Channel::Gateway     => &self.gateway,
        }
    }
}

async fn open_append(dir: &Path, channel: Channel) -> Result<File, ResourceError> {
    let path = dir.join(channel.file_name());
    OpenOptions::new()
        .create(true)
        .append(true)
        .open(&path)
        .await
        .map_err(|source| ResourceError::Open { path, source })
}

fn format_line(event: &Event) -> String {
    format!(
        "{} {} {}\n",
        Local::now().to_rfc3339_opts(SecondsFormat::Secs, false),
        event.level,
        event.message
    )
}

#[async_trait]
impl EventSink for FileEventSink {
    async fn record(&self, event: Event) -> Result<()> {
        let line = format_line(&event);
        let mut file = self.file(event.channel).lock().await;
        file.write_all(line.as_bytes()).await?;
        file.flush().await?;
        Ok(())
    }
}
