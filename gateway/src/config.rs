//! Gateway configuration, resolved from environment variables.
//!
//! | Env var                    | Default          |
//! |----------------------------|------------------|
//! | `GATEWAY_STREAM_ADDR`      | `127.0.0.1:3333` |
//! | `GATEWAY_DATAGRAM_ADDR`    | `127.0.0.1:5556` |
//! | `REPORT_ADDR`              | `0.0.0.0:8080`   |
//! | `GATEWAY_STALE_AFTER_SECS` | `10`             |
//! | `EVENT_LOG_DIR`            | `.`              |

use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;

use tracing::warn;

pub const DEFAULT_STREAM_ADDR: &str = "127.0.0.1:3333";
pub const DEFAULT_DATAGRAM_ADDR: &str = "127.0.0.1:5556";
pub const DEFAULT_REPORT_ADDR: &str = "0.0.0.0:8080";
pub const DEFAULT_STALE_AFTER_SECS: u64 = 10;

#[derive(Debug, Clone)]
pub struct GatewayConfig {
    /// TCP listener for the temperature producer.
    pub stream_addr: String,
    /// UDP socket for humidity readings and heartbeats.
    pub datagram_addr: String,
    /// HTTP listener of the report server.
    pub report_addr: String,
    /// Silence after which a producer kind is reported inactive.
    pub stale_after: Duration,
    pub event_log_dir: PathBuf,
}

impl Default for GatewayConfig {
    fn default() -> Self {
        Self {
            stream_addr: DEFAULT_STREAM_ADDR.to_string(),
            datagram_addr: DEFAULT_DATAGRAM_ADDR.to_string(),
            report_addr: DEFAULT_REPORT_ADDR.to_string(),
            stale_after: Duration::from_secs(DEFAULT_STALE_AFTER_SECS),
            event_log_dir: PathBuf::from("."),
        }
    }
}

impl GatewayConfig {
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build from an arbitrary key lookup; missing keys take the default.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let defaults = Self::default();
        Self {
            stream_addr: lookup("GATEWAY_STREAM_ADDR").unwrap_or(defaults.stream_addr),
            datagram_addr: lookup("GATEWAY_DATAGRAM_ADDR").unwrap_or(defaults.datagram_addr),
            report_addr: lookup("REPORT_ADDR").unwrap_or(defaults.report_addr),
            stale_after: Duration::from_secs(parse_or(
                &lookup,
                "GATEWAY_STALE_AFTER_SECS",
                DEFAULT_STALE_AFTER_SECS,
            )),
            event_log_dir: lookup("EVENT_LOG_DIR")
                .map(PathBuf::from)
                .unwrap_or(defaults.event_log_dir),
        }
    }

    /// Every listener on an ephemeral loopback port.
    pub fn loopback_ephemeral() -> Self {
        Self {
            stream_addr: "127.0.0.1:0".to_string(),
            datagram_addr: "127.0.0.1:0".to_string(),
            report_addr: "127.0.0.1:0".to_string(),
            ..Self::default()
        }
    }
}

fn parse_or<T: FromStr + Copy + std::fmt::Display>(
    lookup: &impl Fn(&str) -> Option<String>,
    key: &str,
    default: T,
) -> T {
    match lookup(key) {
        None => default,
        Some(raw) => raw.trim().parse().unwrap_or_else(|_| {
            warn!(key, value = %raw, default = %default, "unparseable config value, using default");
            default
        }),
    }
}
