//! The operator's switch panel.
//!
//! Each physical toggle maps to either one actuator or one arming level.
//! Switch state is optimistic: it flips when the edge is dispatched, and the
//! pad's acknowledgement decides what the operator is told.

use packets::{ActAckStatus, ActuatorId, ArmAckStatus, ArmLevel, ControlMessage};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SwitchKind {
    Actuator(ActuatorId),
    Arming(ArmLevel),
}

#[derive(Debug, Clone, Copy)]
pub struct Switch {
    pub kind: SwitchKind,
    pub on: bool,
}

impl Switch {
    pub fn new(kind: SwitchKind) -> Self {
        Self { kind, on: false }
    }

    /// Record an observed edge and produce the request to forward, if any.
    ///
    /// Actuator switches forward their new state directly. Arming switches
    /// request their level on the on-edge; the off-edge requests the panel
    /// retreat for that level (valves-armed drops to pad, everything above
    /// drops to valves-armed, which is the pad's abort path).
    ///
    /// Privilege guard: without the physical arming key in position, the
    /// ignition switch's off-edge is dropped rather than forwarded, because
    /// the pad would otherwise retreat to valves-armed with no key present.
    pub fn edge(&mut self, level: bool, key_present: bool) -> Option<ControlMessage> {
        self.on = level;
        match self.kind {
            SwitchKind::Actuator(id) => Some(ControlMessage::ActRequest {
                id: id as u8,
                state: level as u8,
            }),
            SwitchKind::Arming(arm) => {
                if level {
                    return Some(ControlMessage::ArmRequest { level: arm as u8 });
                }
                match arm {
                    ArmLevel::Pad => None,
                    ArmLevel::Valves => Some(ControlMessage::ArmRequest {
                        level: ArmLevel::Pad as u8,
                    }),
                    ArmLevel::Ignition if !key_present => None,
                    _ => Some(ControlMessage::ArmRequest {
                        level: ArmLevel::Valves as u8,
                    }),
                }
            }
        }
    }
}

/// The standard panel: one switch per actuator in the range box's wiring
/// order, then one per arming level.
pub fn default_panel() -> Vec<Switch> {
    let mut panel = vec![
        Switch::new(SwitchKind::Actuator(ActuatorId::FireValve)),
        Switch::new(SwitchKind::Actuator(ActuatorId::Xv1)),
        Switch::new(SwitchKind::Actuator(ActuatorId::Xv2)),
        Switch::new(SwitchKind::Actuator(ActuatorId::Xv3)),
        Switch::new(SwitchKind::Actuator(ActuatorId::Xv4)),
        Switch::new(SwitchKind::Actuator(ActuatorId::Xv6)),
        Switch::new(SwitchKind::Actuator(ActuatorId::Xv7)),
        Switch::new(SwitchKind::Actuator(ActuatorId::Xv8)),
        Switch::new(SwitchKind::Actuator(ActuatorId::Xv9)),
        Switch::new(SwitchKind::Actuator(ActuatorId::Xv10)),
        Switch::new(SwitchKind::Actuator(ActuatorId::Xv11)),
        Switch::new(SwitchKind::Actuator(ActuatorId::Xv12)),
        Switch::new(SwitchKind::Actuator(ActuatorId::QuickDisconnect)),
        Switch::new(SwitchKind::Actuator(ActuatorId::Igniter)),
        Switch::new(SwitchKind::Actuator(ActuatorId::Dump)),
    ];
    for level in [
        ArmLevel::Pad,
        ArmLevel::Valves,
        ArmLevel::Ignition,
        ArmLevel::Disconnected,
        ArmLevel::Launch,
    ] {
        panel.push(Switch::new(SwitchKind::Arming(level)));
    }
    panel
}

/// Operator-facing result line for an acknowledgement.
pub fn describe_ack(ack: &ControlMessage) -> &'static str {
    match ack {
        ControlMessage::ActAck { status, .. } => match status {
            ActAckStatus::Ok => "Switch actuated successfully",
            ActAckStatus::Denied => "Permission denied",
            ActAckStatus::NoSuchActuator => "No such actuator exists",
            ActAckStatus::Invalid => "Invalid actuator state",
        },
        ControlMessage::ArmAck { status } => match status {
            ArmAckStatus::Ok => "Arming level changed",
            ArmAckStatus::Denied => "Permission denied",
            ArmAckStatus::Invalid => "No such arming level exists",
        },
        ControlMessage::ActRequest { .. } | ControlMessage::ArmRequest { .. } => {
            "Not an acknowledgement"
        }
    }
}
