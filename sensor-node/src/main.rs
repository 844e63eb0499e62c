//! Sensor node: runs the temperature, humidity and heartbeat producers
//! against a gateway.
//!
//! # Environment variables
//! | Var                     | Default          |
//! |-------------------------|------------------|
//! | `GATEWAY_STREAM_ADDR`   | `127.0.0.1:3333` |
//! | `GATEWAY_DATAGRAM_ADDR` | `127.0.0.1:5556` |
//! | `HUMIDITY_THRESHOLD`    | `80`             |
//! | `EVENT_LOG_DIR`         | `.`              |

use std::sync::Arc;

use anyhow::Result;
use event_log::{EventSink, FileEventSink};
use sensor_node::{DatagramLink, NodeConfig, Producer, StreamLink};
use tokio_util::sync::CancellationToken;
use tracing::{error, info};

#[tokio::main]
async fn main() -> Result<()> {
    dotenvy::dotenv().ok();

    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive("sensor_node=info".parse()?),
        )
        .json()
        .init();

    let config = NodeConfig::from_env();
    let events: Arc<dyn EventSink> = Arc::new(FileEventSink::open(&config.event_log_dir).await?);
    info!(
        stream = %config.stream_addr,
        datagram = %config.datagram_addr,
        threshold = config.humidity_threshold,
        "sensor node starting"
    );

    let mut temperature = Producer::temperature(StreamLink::new(&config.stream_addr), events.clone());
    let mut humidity = Producer::humidity(DatagramLink::bind(&config.datagram_addr).await?, events.clone())
        .with_threshold(config.humidity_threshold);
    let mut heartbeat = Producer::heartbeat(DatagramLink::bind(&config.datagram_addr).await?, events);

    let cancel = CancellationToken::new();
    tokio::spawn({
        let cancel = cancel.clone();
        async move {
            match tokio::signal::ctrl_c().await {
                Ok(()) => {
                    info!("shutdown requested");
                    cancel.cancel();
                }
                Err(e) => error!(error = %e, "cannot listen for ctrl-c"),
            }
        }
    });

    tokio::join!(
        temperature.run(cancel.clone()),
        humidity.run(cancel.clone()),
        heartbeat.run(cancel),
    );

    info!(
        temperature = temperature.sent().len(),
        humidity = humidity.sent().len(),
        heartbeats = heartbeat.heartbeats_sent(),
        "sensor node stopped"
    );
    Ok(())
}
