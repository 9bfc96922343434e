//! Control channel messages: actuation and arming requests from the
//! operator, acknowledgements from the pad.
//!
//! Request bodies carry raw wire bytes for the actuator ID, state and arming
//! level; validating them is the pad's job, and an out-of-range value must
//! reach the gate so it can be answered with the matching ACK status rather
//! than dropped.

use crate::{Header, PacketError, PacketType, HEADER_LEN};

/// Control message sub-types.
#[repr(u8)]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ControlSubtype {
    ActRequest = 0,
    ActAck = 1,
    ArmRequest = 2,
    ArmAck = 3,
}

impl ControlSubtype {
    pub fn from_wire(value: u8) -> Result<Self, PacketError> {
        match value {
            0 => Ok(Self::ActRequest),
            1 => Ok(Self::ActAck),
            2 => Ok(Self::ArmRequest),
            3 => Ok(Self::ArmAck),
            other => Err(PacketError::UnknownSubtype {
                kind: PacketType::Control,
                subtype: other,
            }),
        }
    }

    /// Whether this subtype is an acknowledgement (pad to client only).
    pub fn is_ack(self) -> bool {
        matches!(self, Self::ActAck | Self::ArmAck)
    }
}

/// Status byte of an actuation acknowledgement.
#[repr(u8)]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ActAckStatus {
    /// The request was processed without error.
    Ok = 0,
    /// The arming level is too low for this actuator.
    Denied = 1,
    /// No actuator has the requested ID.
    NoSuchActuator = 2,
    /// The requested state is not a valid actuator state.
    Invalid = 3,
}

impl ActAckStatus {
    pub fn from_wire(value: u8) -> Option<Self> {
        match value {
            0 => Some(Self::Ok),
            1 => Some(Self::Denied),
            2 => Some(Self::NoSuchActuator),
            3 => Some(Self::Invalid),
            _ => None,
        }
    }
}

/// Status byte of an arming acknowledgement.
#[repr(u8)]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ArmAckStatus {
    /// The requested level has been transitioned to.
    Ok = 0,
    /// The current level cannot transition to the requested level.
    Denied = 1,
    /// The requested level is not a valid arming level.
    Invalid = 2,
}

impl ArmAckStatus {
    pub fn from_wire(value: u8) -> Option<Self> {
        match value {
            0 => Some(Self::Ok),
            1 => Some(Self::Denied),
            2 => Some(Self::Invalid),
            _ => None,
        }
    }
}

/// A message on the TCP control channel.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ControlMessage {
    /// Request to drive actuator `id` to `state` (0 = off, 1 = on).
    ActRequest { id: u8, state: u8 },
    /// Acknowledgement of an actuation request.
    ActAck { id: u8, status: ActAckStatus },
    /// Request to change the arming level.
    ArmRequest { level: u8 },
    /// Acknowledgement of an arming request.
    ArmAck { status: ArmAckStatus },
}

impl ControlMessage {
    pub fn subtype(&self) -> ControlSubtype {
        match self {
            Self::ActRequest { .. } => ControlSubtype::ActRequest,
            Self::ActAck { .. } => ControlSubtype::ActAck,
            Self::ArmRequest { .. } => ControlSubtype::ArmRequest,
            Self::ArmAck { .. } => ControlSubtype::ArmAck,
        }
    }

    /// Fixed body size on the wire for a given subtype.
    pub fn body_len(subtype: ControlSubtype) -> usize {
        match subtype {
            ControlSubtype::ActRequest | ControlSubtype::ActAck => 2,
            ControlSubtype::ArmRequest | ControlSubtype::ArmAck => 1,
        }
    }

    /// Decode a body of exactly `body_len(subtype)` bytes.
    pub fn decode(subtype: ControlSubtype, body: &[u8]) -> Result<Self, PacketError> {
        let wanted = Self::body_len(subtype);
        if body.len() < wanted {
            return Err(PacketError::Truncated {
                wanted,
                got: body.len(),
            });
        }
        Ok(match subtype {
            ControlSubtype::ActRequest => Self::ActRequest {
                id: body[0],
                state: body[1],
            },
            ControlSubtype::ActAck => Self::ActAck {
                id: body[0],
                status: ActAckStatus::from_wire(body[1]).ok_or(PacketError::InvalidField {
                    field: "actuation ack status",
                    value: body[1],
                })?,
            },
            ControlSubtype::ArmRequest => Self::ArmRequest { level: body[0] },
            ControlSubtype::ArmAck => Self::ArmAck {
                status: ArmAckStatus::from_wire(body[0]).ok_or(PacketError::InvalidField {
                    field: "arming ack status",
                    value: body[0],
                })?,
            },
        })
    }

    /// Append header and body to `buf`.
    pub fn encode(&self, buf: &mut Vec<u8>) {
        Header::new(PacketType::Control, self.subtype() as u8).encode(buf);
        match *self {
            Self::ActRequest { id, state } => {
                buf.push(id);
                buf.push(state);
            }
            Self::ActAck { id, status } => {
                buf.push(id);
                buf.push(status as u8);
            }
            Self::ArmRequest { level } => buf.push(level),
            Self::ArmAck { status } => buf.push(status as u8),
        }
    }

    pub fn to_bytes(&self) -> Vec<u8> {
        let mut buf = Vec::with_capacity(HEADER_LEN + Self::body_len(self.subtype()));
        self.encode(&mut buf);
        buf
    }
}
