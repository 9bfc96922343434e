//! Wire protocol for the pad control network.
//!
//! Every message is a two-byte header followed by a fixed-size, packed,
//! little-endian body. Control messages travel over the TCP control channel
//! with no length prefix; the receiver dispatches on the header and reads
//! exactly the body size for that subtype. Telemetry datagrams may carry
//! several header+body records back to back, and must be parsed to
//! exhaustion.

use thiserror::Error;

pub mod control;
pub mod ids;
pub mod telemetry;

pub use control::{ActAckStatus, ArmAckStatus, ControlMessage, ControlSubtype};
pub use ids::{ActuatorId, ArmLevel, ConnStatus, WarnKind, NUM_ACTUATORS};
pub use telemetry::{parse_datagram, TelemetryMessage, TelemetrySubtype};

/// Wire size of the packet header.
pub const HEADER_LEN: usize = 2;

/// Errors produced while decoding wire bytes.
#[derive(Debug, Error, Clone, Copy, PartialEq, Eq)]
pub enum PacketError {
    #[error("unknown packet type {0}")]
    UnknownType(u8),

    #[error("unknown subtype {subtype} for {kind:?} packet")]
    UnknownSubtype { kind: PacketType, subtype: u8 },

    #[error("truncated packet: wanted {wanted} bytes, got {got}")]
    Truncated { wanted: usize, got: usize },

    #[error("invalid {field} value {value}")]
    InvalidField { field: &'static str, value: u8 },

    #[error("expected telemetry, got {0:?} packet")]
    UnexpectedType(PacketType),
}

/// Top-level packet type carried in the first header byte.
#[repr(u8)]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PacketType {
    Control = 0,
    Telemetry = 1,
}

impl PacketType {
    pub fn from_wire(value: u8) -> Result<Self, PacketError> {
        match value {
            0 => Ok(Self::Control),
            1 => Ok(Self::Telemetry),
            other => Err(PacketError::UnknownType(other)),
        }
    }
}

/// Two-byte packet header: message type and sub-type.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Header {
    pub kind: PacketType,
    pub subtype: u8,
}

impl Header {
    pub fn new(kind: PacketType, subtype: u8) -> Self {
        Self { kind, subtype }
    }

    /// Parse a header from the front of `bytes`.
    pub fn parse(bytes: &[u8]) -> Result<Self, PacketError> {
        if bytes.len() < HEADER_LEN {
            return Err(PacketError::Truncated {
                wanted: HEADER_LEN,
                got: bytes.len(),
            });
        }
        Ok(Self {
            kind: PacketType::from_wire(bytes[0])?,
            subtype: bytes[1],
        })
    }

    pub fn encode(&self, buf: &mut Vec<u8>) {
        buf.push(self.kind as u8);
        buf.push(self.subtype);
    }
}
