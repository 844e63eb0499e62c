//! Gateway and report server of the monitoring network.
//!
//! The gateway ingests producer records from a TCP listener and a UDP socket,
//! folds them into the shared [`Aggregate`], and watches producer liveness.
//! The report server renders the aggregate over HTTP.

pub mod aggregate;
pub mod config;
pub mod datagram;
pub mod gateway;
pub mod handshake;
pub mod ingest;
pub mod liveness;
pub mod render;
pub mod report;
pub mod stream;

pub use aggregate::Aggregate;
pub use config::GatewayConfig;
pub use gateway::Gateway;
pub use handshake::{Handshake, HandshakeError, NoopHandshake};
pub use liveness::{ProducerKind, ProducerLivenessStatus};
pub use report::ReportServer;
