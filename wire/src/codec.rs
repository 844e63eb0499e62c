//! Pipe-delimited record codec.
//!
//! Values are written with the default `f64` formatting (shortest string that
//! round-trips). Display rounding to two decimals happens in logs and reports,
//! never here.

use thiserror::Error;

use crate::reading::{Heartbeat, Reading, SensorKind};

/// Tag of the heartbeat record.
pub const HEARTBEAT_TAG: &str = "ALIVE";

/// Longest record accepted on either transport, excluding the line terminator.
pub const MAX_RECORD_LEN: usize = 1024;

const SEPARATOR: char = '|';

/// A decoded wire record.
#[derive(Debug, Clone, PartialEq)]
pub enum Record {
    Reading(Reading),
    Heartbeat(Heartbeat),
    /// A well-formed record whose tag this build does not know.
    Unknown { kind: String },
}

#[derive(Debug, Error, PartialEq)]
pub enum DecodeError {
    #[error("record is not valid UTF-8: {0}")]
    Utf8(#[from] std::str::Utf8Error),
    #[error("record has no `|` separator")]
    MissingSeparator,
    #[error("{kind} record expects {expected} fields, got {actual}")]
    FieldCount {
        kind: &'static str,
        expected: usize,
        actual: usize,
    },
    #[error("invalid value {0:?}")]
    InvalidValue(String),
    #[error("timestamp is empty")]
    EmptyTimestamp,
    #[error("record exceeds {limit} bytes")]
    TooLong { limit: usize },
}

/// Encode a reading as `KIND|value|timestamp` (no line terminator).
pub fn encode_reading(reading: &Reading) -> String {
    format!(
        "{}{SEPARATOR}{}{SEPARATOR}{}",
        reading.kind.tag(),
        reading.value,
        reading.timestamp
    )
}

/// Encode a heartbeat as `ALIVE|timestamp`.
pub fn encode_heartbeat(heartbeat: &Heartbeat) -> String {
    format!("{HEARTBEAT_TAG}{SEPARATOR}{}", heartbeat.timestamp)
}

/// Decode one record. A trailing `\n` or `\r\n` is ignored.
pub fn decode(line: &str) -> Result<Record, DecodeError> {
    let line = line.trim_end_matches(['\r', '\n']);
    if !line.contains(SEPARATOR) {
        return Err(DecodeError::MissingSeparator);
    }

    let fields: Vec<&str> = line.split(SEPARATOR).collect();
    let tag = fields[0];

    if tag == HEARTBEAT_TAG {
        expect_fields(HEARTBEAT_TAG, 2, fields.len())?;
        let timestamp = non_empty_timestamp(fields[1])?;
        return Ok(Record::Heartbeat(Heartbeat { timestamp }));
    }

    let Some(kind) = SensorKind::from_tag(tag) else {
        return Ok(Record::Unknown {
            kind: tag.to_string(),
        });
    };

    expect_fields(kind.tag(), 3, fields.len())?;
    let raw = fields[1].trim();
    let value: f64 = raw
        .parse()
        .map_err(|_| DecodeError::InvalidValue(raw.to_string()))?;
    if !value.is_finite() {
        return Err(DecodeError::InvalidValue(raw.to_string()));
    }
    let timestamp = non_empty_timestamp(fields[2])?;

    Ok(Record::Reading(Reading {
        kind,
        value,
        timestamp,
    }))
}

/// Decode a raw stream line or datagram payload.
pub fn decode_bytes(bytes: &[u8]) -> Result<Record, DecodeError> {
    let record = bytes.strip_suffix(b"\n").unwrap_or(bytes);
    let record = record.strip_suffix(b"\r").unwrap_or(record);
    if record.len() > MAX_RECORD_LEN {
        return Err(DecodeError::TooLong {
            limit: MAX_RECORD_LEN,
        });
    }
    decode(std::str::from_utf8(record)?)
}

fn expect_fields(kind: &'static str, expected: usize, actual: usize) -> Result<(), DecodeError> {
    if actual != expected {
        return Err(DecodeError::FieldCount {
            kind,
            expected,
            actual,
        });
    }
    Ok(())
}

fn non_empty_timestamp(field: &str) -> Result<String, DecodeError> {
    if field.trim().is_empty() {
        return Err(DecodeError::EmptyTimestamp);
    }
    Ok(field.to_string())
}
