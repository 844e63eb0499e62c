//! Gateway service: sensor ingest plus the HTTP report server.
//!
//! Ingests temperature records over TCP and humidity/heartbeat records over
//! UDP, and serves `/temperature`, `/humidity`, `/gethumidity` and `/health`.
//!
//! # Environment variables
//! | Var                        | Default          |
//! |----------------------------|------------------|
//! | `GATEWAY_STREAM_ADDR`      | `127.0.0.1:3333` |
//! | `GATEWAY_DATAGRAM_ADDR`    | `127.0.0.1:5556` |
//! | `REPORT_ADDR`              | `0.0.0.0:8080`   |
//! | `GATEWAY_STALE_AFTER_SECS` | `10`             |
//! | `EVENT_LOG_DIR`            | `.`              |

use std::sync::Arc;

use anyhow::Result;
use event_log::{EventSink, FileEventSink};
use gateway::{Aggregate, Gateway, GatewayConfig, ReportServer};
use tokio_util::sync::CancellationToken;
use tracing::{error, info};

#[tokio::main]
async fn main() -> Result<()> {
    dotenvy::dotenv().ok();

    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive("gateway=info".parse()?),
        )
        .json()
        .init();

    let config = GatewayConfig::from_env();
    let events: Arc<dyn EventSink> = Arc::new(FileEventSink::open(&config.event_log_dir).await?);
    info!(dir = %config.event_log_dir.display(), "event log open");

    let aggregate = Aggregate::new();
    let gateway = Gateway::bind(&config, aggregate.clone(), events).await?;
    let report = ReportServer::bind(&config.report_addr, aggregate, config.stale_after).await?;

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

    let report = tokio::spawn(report.run(cancel.clone()));

    // A failed handshake means nothing is ingested; stop serving too.
    let result = gateway.run(cancel.clone()).await;
    if let Err(e) = &result {
        error!(error = %e, "gateway aborted");
        cancel.cancel();
    }

    report.await??;
    result?;
    Ok(())
}
