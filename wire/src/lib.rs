//! Wire types shared by the sensor producers and the gateway.
//!
//! Both transports carry the same pipe-delimited ASCII records:
//!
//! ```text
//! TEMPERATURE|23.5|14/03/2024 - 09:41
//! HUMIDITY|84.17203|14/03/2024 - 09:41
//! ALIVE|14/03/2024 - 09:41
//! ```
//!
//! Stream records are newline-terminated; datagram records are one per packet.

pub mod codec;
pub mod error;
pub mod reading;

pub use codec::{
    decode, decode_bytes, encode_heartbeat, encode_reading, DecodeError, Record, MAX_RECORD_LEN,
};
pub use error::TransportError;
pub use reading::{timestamp_now, Heartbeat, Reading, SensorKind, WIRE_TIMESTAMP_FORMAT};

/// Largest datagram payload the gateway will read.
pub const MAX_DATAGRAM_SIZE: usize = MAX_RECORD_LEN;
