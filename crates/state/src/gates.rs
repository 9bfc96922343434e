//! Permission gates: which arming transitions and actuations are allowed.
//!
//! These are pure functions over the protocol types so they can be tested
//! exhaustively without touching locks or hardware.

use packets::{ActuatorId, ArmLevel};

/// Whether the pad may transition from `current` to `requested`.
///
/// Allowed moves:
/// - one step up, never skipping a level;
/// - back down to pad-armed, but only from valves-armed;
/// - an abort from anywhere in the firing sequence back to valves-armed.
pub fn arming_allowed(current: ArmLevel, requested: ArmLevel) -> bool {
    if current.next() == Some(requested) {
        return true;
    }
    if current == ArmLevel::Valves && requested == ArmLevel::Pad {
        return true;
    }
    if requested == ArmLevel::Valves && current >= ArmLevel::Ignition {
        return true;
    }
    false
}

/// Minimum arming level at which an actuator may be driven.
///
/// The dump valve is a safety vent and is operable at any level. The fire
/// valve is a solenoid but is held back until armed-for-launch.
pub fn required_level(id: ActuatorId) -> ArmLevel {
    match id {
        ActuatorId::Dump => ArmLevel::Pad,
        ActuatorId::FireValve => ArmLevel::Launch,
        ActuatorId::QuickDisconnect => ArmLevel::Ignition,
        ActuatorId::Igniter => ArmLevel::Disconnected,
        _ => ArmLevel::Valves,
    }
}

/// Arming transition implied by driving a special actuator, if any.
///
/// Connecting power through the quick disconnect or firing the igniter
/// advances the arming level; releasing them retreats it. An off edge never
/// raises the level.
pub fn implied_transition(id: ActuatorId, on: bool, current: ArmLevel) -> Option<ArmLevel> {
    match (id, on) {
        (ActuatorId::QuickDisconnect, true) if current < ArmLevel::Disconnected => {
            Some(ArmLevel::Disconnected)
        }
        (ActuatorId::QuickDisconnect, false) if current > ArmLevel::Ignition => {
            Some(ArmLevel::Ignition)
        }
        (ActuatorId::Igniter, true) if current < ArmLevel::Launch => Some(ArmLevel::Launch),
        (ActuatorId::Igniter, false) if current > ArmLevel::Disconnected => {
            Some(ArmLevel::Disconnected)
        }
        _ => None,
    }
}
