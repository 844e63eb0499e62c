//! HTTP report server over the aggregate.
//!
//! Every response is a complete HTML document sent with `Connection: close`;
//! hyper serves each connection on its own task.

use std::io;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use axum::{
    extract::State,
    http::{header, StatusCode},
    response::{Html, IntoResponse, Response},
    routing::{any, get},
    Json, Router,
};
use chrono::Local;
use serde::Serialize;
use tokio::net::TcpListener;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;
use tower_http::trace::TraceLayer;
use tracing::info;
use wire::TransportError;

use crate::aggregate::Aggregate;
use crate::liveness::ProducerKind;
use crate::render::{render, Page};

// ------------------------------------------------------------------ //
//  Shared state                                                       //
// ------------------------------------------------------------------ //

/// Shared state injected into every handler via `State`.
pub struct ReportState {
    pub aggregate: Aggregate,
    /// Window used by `/health` to flag stale producers.
    pub stale_after: Duration,
}

pub fn router(state: Arc<ReportState>) -> Router {
    Router::new()
        .route("/temperature", any(temperature))
        .route("/humidity", any(humidity))
        .route("/gethumidity", any(last_humidity))
        .route("/health", get(health))
        .fallback(not_found)
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

// ------------------------------------------------------------------ //
//  Handlers                                                           //
// ------------------------------------------------------------------ //

fn page(status: StatusCode, body: String) -> Response {
    (status, [(header::CONNECTION, "close")], Html(body)).into_response()
}

pub async fn temperature(State(state): State<Arc<ReportState>>) -> Response {
    let readings = state.aggregate.temperature_history();
    page(StatusCode::OK, render(Page::Temperature(&readings), Local::now()))
}

pub async fn humidity(State(state): State<Arc<ReportState>>) -> Response {
    let readings = state.aggregate.humidity_history();
    page(StatusCode::OK, render(Page::Humidity(&readings), Local::now()))
}

pub async fn last_humidity(State(state): State<Arc<ReportState>>) -> Response {
    let last = state.aggregate.last_humidity();
    page(StatusCode::OK, render(Page::LastHumidity(last.as_ref()), Local::now()))
}

pub async fn not_found() -> Response {
    page(StatusCode::NOT_FOUND, render(Page::NotFound, Local::now()))
}

#[derive(Debug, Serialize)]
pub struct ProducerHealth {
    /// `None` until the first record of this kind arrives.
    pub last_seen_secs_ago: Option<f64>,
    pub stale: bool,
}

#[derive(Debug, Serialize)]
pub struct HealthReport {
    pub status: &'static str,
    pub temperature: ProducerHealth,
    pub humidity: ProducerHealth,
    pub heartbeat: ProducerHealth,
}

/// GET /health
pub async fn health(State(state): State<Arc<ReportState>>) -> impl IntoResponse {
    let status = state.aggregate.liveness();
    let now = Instant::now();
    let producer = |kind: ProducerKind| ProducerHealth {
        last_seen_secs_ago: status
            .last_received_at(kind)
            .map(|at| now.saturating_duration_since(at).as_secs_f64()),
        stale: status.is_stale(kind, now, state.stale_after),
    };

    let report = HealthReport {
        status: if status.stale_kinds(now, state.stale_after).is_empty() {
            "ok"
        } else {
            "degraded"
        },
        temperature: producer(ProducerKind::Temperature),
        humidity: producer(ProducerKind::Humidity),
        heartbeat: producer(ProducerKind::Heartbeat),
    };
    ([(header::CONNECTION, "close")], Json(report))
}

// ------------------------------------------------------------------ //
//  Server                                                             //
// ------------------------------------------------------------------ //

pub struct ReportServer {
    listener: TcpListener,
    state: Arc<ReportState>,
}

impl ReportServer {
    pub async fn bind(
        addr: &str,
        aggregate: Aggregate,
        stale_after: Duration,
    ) -> Result<Self, TransportError> {
        let listener = TcpListener::bind(addr)
            .await
            .map_err(|source| TransportError::Bind {
                addr: addr.to_string(),
                source,
            })?;
        Ok(Self {
            listener,
            state: Arc::new(ReportState {
                aggregate,
                stale_after,
            }),
        })
    }

    pub fn local_addr(&self) -> io::Result<SocketAddr> {
        self.listener.local_addr()
    }

    /// Serve until `cancel` fires, then let in-flight responses finish.
    pub async fn run(self, cancel: CancellationToken) -> Result<(), TransportError> {
        info!(addr = ?self.listener.local_addr().ok(), "report server listening");
        axum::serve(self.listener, router(self.state))
            .with_graceful_shutdown(async move { cancel.cancelled().await })
            .await
            .map_err(TransportError::Accept)?;
        info!("report server stopped");
        Ok(())
    }
}
