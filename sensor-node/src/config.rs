//! Sensor node configuration, resolved from environment variables.
//!
//! | Env var                 | Default          |
//! |-------------------------|------------------|
//! | `GATEWAY_STREAM_ADDR`   | `127.0.0.1:3333` |
//! | `GATEWAY_DATAGRAM_ADDR` | `127.0.0.1:5556` |
//! | `HUMIDITY_THRESHOLD`    | `80`             |
//! | `EVENT_LOG_DIR`         | `.`              |

use std::path::PathBuf;

use tracing::warn;

use crate::producer::DEFAULT_HUMIDITY_THRESHOLD;

pub const DEFAULT_STREAM_ADDR: &str = "127.0.0.1:3333";
pub const DEFAULT_DATAGRAM_ADDR: &str = "127.0.0.1:5556";

#[derive(Debug, Clone)]
pub struct NodeConfig {
    /// Gateway TCP listener the temperature producer connects to.
    pub stream_addr: String,
    /// Gateway UDP socket for humidity readings and heartbeats.
    pub datagram_addr: String,
    pub humidity_threshold: f64,
    pub event_log_dir: PathBuf,
}

impl Default for NodeConfig {
    fn default() -> Self {
        Self {
            stream_addr: DEFAULT_STREAM_ADDR.to_string(),
            datagram_addr: DEFAULT_DATAGRAM_ADDR.to_string(),
            humidity_threshold: DEFAULT_HUMIDITY_THRESHOLD,
            event_log_dir: PathBuf::from("."),
        }
    }
}

impl NodeConfig {
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let defaults = Self::default();
        Self {
            stream_addr: lookup("GATEWAY_STREAM_ADDR").unwrap_or(defaults.stream_addr),
            datagram_addr: lookup("GATEWAY_DATAGRAM_ADDR").unwrap_or(defaults.datagram_addr),
            humidity_threshold: threshold(lookup("HUMIDITY_THRESHOLD"))
                .unwrap_or(defaults.humidity_threshold),
            event_log_dir: lookup("EVENT_LOG_DIR")
                .map(PathBuf::from)
                .unwrap_or(defaults.event_log_dir),
        }
    }
}

fn threshold(raw: Option<String>) -> Option<f64> {
    let raw = raw?;
    match raw.trim().parse::<f64>() {
        Ok(v) if v.is_finite() => Some(v),
        _ => {
            warn!(
                key = "HUMIDITY_THRESHOLD",
                value = %raw,
                default = DEFAULT_HUMIDITY_THRESHOLD,
                "unparseable config value, using default"
            );
            None
        }
    }
}
