//! Protocol identity spaces: arming levels, actuator IDs, connection and
//! warning codes. The numeric values are baked into the wire protocol and
//! must never be reordered.

use std::fmt;

/// Number of actuators on the pad: 12 solenoid valves (one of which is the
/// fire valve), the quick disconnect, the igniter and the dump valve.
pub const NUM_ACTUATORS: usize = 15;

/// Arming level of the pad. Higher levels permit more capabilities.
#[repr(u8)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum ArmLevel {
    /// The pad control box is armed.
    Pad = 0,
    /// Solenoid valve control is permitted.
    Valves = 1,
    /// Ignition circuitry is powered; the quick disconnect may be actuated.
    Ignition = 2,
    /// The quick disconnect has been disconnected; the igniter may be fired.
    Disconnected = 3,
    /// The igniter has fired; the main fire valve may be opened.
    Launch = 4,
}

impl ArmLevel {
    pub fn from_wire(value: u8) -> Option<Self> {
        match value {
            0 => Some(Self::Pad),
            1 => Some(Self::Valves),
            2 => Some(Self::Ignition),
            3 => Some(Self::Disconnected),
            4 => Some(Self::Launch),
            _ => None,
        }
    }

    /// The next level up, if any.
    pub fn next(self) -> Option<Self> {
        Self::from_wire(self as u8 + 1)
    }
}

impl fmt::Display for ArmLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Pad => "Pad armed",
            Self::Valves => "Valves armed",
            Self::Ignition => "Armed for ignition",
            Self::Disconnected => "Quick disconnect disconnected",
            Self::Launch => "Armed for launch",
        })
    }
}

/// Stable wire ID of every actuator on the pad.
///
/// The fire valve occupies the fifth solenoid slot; "XV-5" and "fire valve"
/// are the same device and the same wire ID.
#[repr(u8)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ActuatorId {
    Xv1 = 0,
    Xv2 = 1,
    Xv3 = 2,
    Xv4 = 3,
    FireValve = 4,
    Xv6 = 5,
    Xv7 = 6,
    Xv8 = 7,
    Xv9 = 8,
    Xv10 = 9,
    Xv11 = 10,
    Xv12 = 11,
    QuickDisconnect = 12,
    Igniter = 13,
    Dump = 14,
}

impl ActuatorId {
    /// Every actuator in wire-ID order.
    pub const ALL: [Self; NUM_ACTUATORS] = [
        Self::Xv1,
        Self::Xv2,
        Self::Xv3,
        Self::Xv4,
        Self::FireValve,
        Self::Xv6,
        Self::Xv7,
        Self::Xv8,
        Self::Xv9,
        Self::Xv10,
        Self::Xv11,
        Self::Xv12,
        Self::QuickDisconnect,
        Self::Igniter,
        Self::Dump,
    ];

    pub fn from_wire(value: u8) -> Option<Self> {
        Self::ALL.get(value as usize).copied()
    }

    /// Whether this ID is one of the twelve solenoid valves.
    pub fn is_solenoid(self) -> bool {
        (self as u8) < 12
    }

    /// Human-readable name for logging and display.
    pub fn name(self) -> &'static str {
        match self {
            Self::Xv1 => "XV-1",
            Self::Xv2 => "XV-2",
            Self::Xv3 => "XV-3",
            Self::Xv4 => "XV-4",
            Self::FireValve => "XV-5 (fire valve)",
            Self::Xv6 => "XV-6",
            Self::Xv7 => "XV-7",
            Self::Xv8 => "XV-8",
            Self::Xv9 => "XV-9",
            Self::Xv10 => "XV-10",
            Self::Xv11 => "XV-11",
            Self::Xv12 => "XV-12",
            Self::QuickDisconnect => "Quick disconnect",
            Self::Igniter => "Igniter",
            Self::Dump => "Dump valve",
        }
    }
}

impl fmt::Display for ActuatorId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// State of the single control session, surfaced over telemetry.
#[repr(u8)]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnStatus {
    Connected = 0,
    Reconnecting = 1,
    Disconnected = 2,
}

impl ConnStatus {
    pub fn from_wire(value: u8) -> Option<Self> {
        match value {
            0 => Some(Self::Connected),
            1 => Some(Self::Reconnecting),
            2 => Some(Self::Disconnected),
            _ => None,
        }
    }
}

impl fmt::Display for ConnStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Connected => "connected",
            Self::Reconnecting => "reconnecting",
            Self::Disconnected => "disconnected",
        })
    }
}

/// Warning codes carried by `TELEM.WARN`.
#[repr(u8)]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WarnKind {
    HighPressure = 0,
    HighTemp = 1,
}

impl WarnKind {
    pub fn from_wire(value: u8) -> Option<Self> {
        match value {
            0 => Some(Self::HighPressure),
            1 => Some(Self::HighTemp),
            _ => None,
        }
    }
}

impl fmt::Display for WarnKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::HighPressure => "High pressure",
            Self::HighTemp => "High temperature",
        })
    }
}
