//! Telemetry messages: sensor measurements and state broadcast from the pad
//! over UDP multicast.
//!
//! A single datagram may hold several records back to back. Receivers take
//! one datagram per read and parse records until the datagram is drained;
//! leftover bytes that cannot form a complete record are a protocol error.

use crate::ids::{ActuatorId, ArmLevel, ConnStatus, WarnKind};
use crate::{Header, PacketError, PacketType, HEADER_LEN};

/// Telemetry message sub-types.
#[repr(u8)]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TelemetrySubtype {
    Temperature = 0,
    Pressure = 1,
    Mass = 2,
    Thrust = 3,
    Arm = 4,
    Actuator = 5,
    Warning = 6,
    Continuity = 7,
    Connection = 8,
}

impl TelemetrySubtype {
    pub fn from_wire(value: u8) -> Result<Self, PacketError> {
        match value {
            0 => Ok(Self::Temperature),
            1 => Ok(Self::Pressure),
            2 => Ok(Self::Mass),
            3 => Ok(Self::Thrust),
            4 => Ok(Self::Arm),
            5 => Ok(Self::Actuator),
            6 => Ok(Self::Warning),
            7 => Ok(Self::Continuity),
            8 => Ok(Self::Connection),
            other => Err(PacketError::UnknownSubtype {
                kind: PacketType::Telemetry,
                subtype: other,
            }),
        }
    }
}

/// A record on the telemetry stream. `time` is milliseconds since the pad
/// server started.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TelemetryMessage {
    /// Temperature in millidegrees Celsius from sensor `id`.
    Temperature { time: u32, millicelsius: i32, id: u8 },
    /// Pressure in thousandths of a PSI from sensor `id`.
    Pressure { time: u32, millipsi: i32, id: u8 },
    /// Mass in grams from load cell `id`.
    Mass { time: u32, grams: i32, id: u8 },
    /// Thrust in Newtons from load cell `id`.
    Thrust { time: u32, newtons: u32, id: u8 },
    /// Current arming level.
    Arm { time: u32, level: ArmLevel },
    /// Current state of one actuator.
    Actuator { time: u32, id: ActuatorId, on: bool },
    /// Threshold warning requiring operator attention.
    Warning { time: u32, kind: WarnKind },
    /// Igniter continuity (true = circuit closed).
    Continuity { time: u32, closed: bool },
    /// Control session status.
    Connection { time: u32, status: ConnStatus },
}

fn decode_bool(field: &'static str, value: u8) -> Result<bool, PacketError> {
    match value {
        0 => Ok(false),
        1 => Ok(true),
        _ => Err(PacketError::InvalidField { field, value }),
    }
}

fn u32_at(body: &[u8]) -> u32 {
    u32::from_le_bytes([body[0], body[1], body[2], body[3]])
}

fn i32_at(body: &[u8]) -> i32 {
    i32::from_le_bytes([body[0], body[1], body[2], body[3]])
}

impl TelemetryMessage {
    pub fn subtype(&self) -> TelemetrySubtype {
        match self {
            Self::Temperature { .. } => TelemetrySubtype::Temperature,
            Self::Pressure { .. } => TelemetrySubtype::Pressure,
            Self::Mass { .. } => TelemetrySubtype::Mass,
            Self::Thrust { .. } => TelemetrySubtype::Thrust,
            Self::Arm { .. } => TelemetrySubtype::Arm,
            Self::Actuator { .. } => TelemetrySubtype::Actuator,
            Self::Warning { .. } => TelemetrySubtype::Warning,
            Self::Continuity { .. } => TelemetrySubtype::Continuity,
            Self::Connection { .. } => TelemetrySubtype::Connection,
        }
    }

    /// Fixed body size on the wire for a given subtype.
    pub fn body_len(subtype: TelemetrySubtype) -> usize {
        match subtype {
            TelemetrySubtype::Temperature
            | TelemetrySubtype::Pressure
            | TelemetrySubtype::Mass
            | TelemetrySubtype::Thrust => 9,
            TelemetrySubtype::Actuator => 6,
            TelemetrySubtype::Arm
            | TelemetrySubtype::Warning
            | TelemetrySubtype::Continuity
            | TelemetrySubtype::Connection => 5,
        }
    }

    /// Decode a body of exactly `body_len(subtype)` bytes.
    pub fn decode(subtype: TelemetrySubtype, body: &[u8]) -> Result<Self, PacketError> {
        let wanted = Self::body_len(subtype);
        if body.len() < wanted {
            return Err(PacketError::Truncated {
                wanted,
                got: body.len(),
            });
        }
        let time = u32_at(body);
        Ok(match subtype {
            TelemetrySubtype::Temperature => Self::Temperature {
                time,
                millicelsius: i32_at(&body[4..]),
                id: body[8],
            },
            TelemetrySubtype::Pressure => Self::Pressure {
                time,
                millipsi: i32_at(&body[4..]),
                id: body[8],
            },
            TelemetrySubtype::Mass => Self::Mass {
                time,
                grams: i32_at(&body[4..]),
                id: body[8],
            },
            TelemetrySubtype::Thrust => Self::Thrust {
                time,
                newtons: u32_at(&body[4..]),
                id: body[8],
            },
            TelemetrySubtype::Arm => Self::Arm {
                time,
                level: ArmLevel::from_wire(body[4]).ok_or(PacketError::InvalidField {
                    field: "arming level",
                    value: body[4],
                })?,
            },
            TelemetrySubtype::Actuator => Self::Actuator {
                time,
                id: ActuatorId::from_wire(body[4]).ok_or(PacketError::InvalidField {
                    field: "actuator id",
                    value: body[4],
                })?,
                on: decode_bool("actuator state", body[5])?,
            },
            TelemetrySubtype::Warning => Self::Warning {
                time,
                kind: WarnKind::from_wire(body[4]).ok_or(PacketError::InvalidField {
                    field: "warning kind",
                    value: body[4],
                })?,
            },
            TelemetrySubtype::Continuity => Self::Continuity {
                time,
                closed: decode_bool("continuity state", body[4])?,
            },
            TelemetrySubtype::Connection => Self::Connection {
                time,
                status: ConnStatus::from_wire(body[4]).ok_or(PacketError::InvalidField {
                    field: "connection status",
                    value: body[4],
                })?,
            },
        })
    }

    /// Append header and body to `buf`. Records appended to the same buffer
    /// form one concatenated datagram.
    pub fn encode(&self, buf: &mut Vec<u8>) {
        Header::new(PacketType::Telemetry, self.subtype() as u8).encode(buf);
        match *self {
            Self::Temperature {
                time,
                millicelsius,
                id,
            } => {
                buf.extend_from_slice(&time.to_le_bytes());
                buf.extend_from_slice(&millicelsius.to_le_bytes());
                buf.push(id);
            }
            Self::Pressure { time, millipsi, id } => {
                buf.extend_from_slice(&time.to_le_bytes());
                buf.extend_from_slice(&millipsi.to_le_bytes());
                buf.push(id);
            }
            Self::Mass { time, grams, id } => {
                buf.extend_from_slice(&time.to_le_bytes());
                buf.extend_from_slice(&grams.to_le_bytes());
                buf.push(id);
            }
            Self::Thrust { time, newtons, id } => {
                buf.extend_from_slice(&time.to_le_bytes());
                buf.extend_from_slice(&newtons.to_le_bytes());
                buf.push(id);
            }
            Self::Arm { time, level } => {
                buf.extend_from_slice(&time.to_le_bytes());
                buf.push(level as u8);
            }
            Self::Actuator { time, id, on } => {
                buf.extend_from_slice(&time.to_le_bytes());
                buf.push(id as u8);
                buf.push(on as u8);
            }
            Self::Warning { time, kind } => {
                buf.extend_from_slice(&time.to_le_bytes());
                buf.push(kind as u8);
            }
            Self::Continuity { time, closed } => {
                buf.extend_from_slice(&time.to_le_bytes());
                buf.push(closed as u8);
            }
            Self::Connection { time, status } => {
                buf.extend_from_slice(&time.to_le_bytes());
                buf.push(status as u8);
            }
        }
    }

    pub fn to_bytes(&self) -> Vec<u8> {
        let mut buf = Vec::with_capacity(HEADER_LEN + Self::body_len(self.subtype()));
        self.encode(&mut buf);
        buf
    }
}

/// Parse every record out of one telemetry datagram.
///
/// The whole datagram must be consumed; trailing bytes that cannot form a
/// complete record are an error.
pub fn parse_datagram(data: &[u8]) -> Result<Vec<TelemetryMessage>, PacketError> {
    let mut records = Vec::new();
    let mut offset = 0;
    while offset < data.len() {
        let header = Header::parse(&data[offset..])?;
        if header.kind != PacketType::Telemetry {
            return Err(PacketError::UnexpectedType(header.kind));
        }
        let subtype = TelemetrySubtype::from_wire(header.subtype)?;
        let body_len = TelemetryMessage::body_len(subtype);
        let start = offset + HEADER_LEN;
        let body = data
            .get(start..start + body_len)
            .ok_or(PacketError::Truncated {
                wanted: body_len,
                got: data.len() - start,
            })?;
        records.push(TelemetryMessage::decode(subtype, body)?);
        offset = start + body_len;
    }
    Ok(records)
}
