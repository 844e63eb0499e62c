//! Simulator: gateway, report server and all three producers in one
//! process. Ctrl-C stops every unit.
//!
//! # Environment variables
//! | Var                        | Default          |
//! |----------------------------|------------------|
//! | `GATEWAY_STREAM_ADDR`      | `127.0.0.1:3333` |
//! | `GATEWAY_DATAGRAM_ADDR`    | `127.0.0.1:5556` |
//! | `REPORT_ADDR`              | `0.0.0.0:8080`   |
//! | `GATEWAY_STALE_AFTER_SECS` | `10`             |
//! | `HUMIDITY_THRESHOLD`       | `80`             |
//! | `EVENT_LOG_DIR`            | `.`              |

use std::sync::Arc;
use std::time::Duration;

use anyhow::{bail, Result};
use event_log::{EventSink, FileEventSink};
use simulator::{Network, SimulatorConfig};
use tracing::{error, info};

const SHUTDOWN_GRACE: Duration = Duration::from_secs(2);

#[tokio::main]
async fn main() -> Result<()> {
    dotenvy::dotenv().ok();

    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive("simulator=info".parse()?)
                .add_directive("gateway=info".parse()?)
                .add_directive("sensor_node=info".parse()?),
        )
        .json()
        .init();

    let config = SimulatorConfig::from_env();
    let events: Arc<dyn EventSink> =
        Arc::new(FileEventSink::open(&config.gateway.event_log_dir).await?);

    let network = Network::start(&config, events).await?;
    info!(report = %network.report_addr(), "simulator running, ctrl-c to stop");

    let cancel = network.cancellation();
    tokio::select! {
        signal = tokio::signal::ctrl_c() => match signal {
            Ok(()) => info!("shutdown requested"),
            Err(e) => error!(error = %e, "cannot listen for ctrl-c, shutting down"),
        },
        _ = cancel.cancelled() => info!("network stopped itself"),
    }

    let summary = network.shutdown(SHUTDOWN_GRACE).await;
    if !summary.failures.is_empty() {
        bail!("units failed: {}", summary.failures.join("; "));
    }
    Ok(())
}
