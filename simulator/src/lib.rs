//! The whole monitoring network in one process.
//!
//! [`Network::start`] binds the gateway and report server, then spawns the
//! three producers against the bound addresses. Every unit shares one
//! cancellation token; [`Network::shutdown`] cancels it and joins them.

pub mod config;
pub mod network;

pub use config::SimulatorConfig;
pub use network::{Network, Summary};
