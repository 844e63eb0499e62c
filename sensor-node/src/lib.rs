//! Simulated sensor producers.
//!
//! Three producers share one loop shape and differ in value range, filter,
//! and transport:
//!
//! | Producer    | Values     | Sent when  | Transport | Period |
//! |-------------|------------|------------|-----------|--------|
//! | temperature | [20, 30)   | every tick | TCP       | 1 s    |
//! | humidity    | [40, 90)   | value > 80 | UDP       | 1 s    |
//! | heartbeat   | none       | every tick | UDP       | 3 s    |

pub mod config;
pub mod link;
pub mod producer;
pub mod sampler;

pub use config::NodeConfig;
pub use link::{DatagramLink, Link, StreamLink};
pub use producer::{Producer, ProducerKind, Tick};
pub use sampler::{Sampler, ScriptedSampler, UniformSampler};
