//! Authoritative in-memory state of the pad control system.
//!
//! One [`PadState`] exists per pad server process. It owns the arming level,
//! the recorded state of every actuator together with its hardware binding,
//! and the control-session status. Reads take a shared lock; every mutation
//! takes the exclusive lock, performs its hardware side effect while holding
//! it, and raises the update signal after the lock is released so telemetry
//! only ever observes committed state.

use std::sync::{PoisonError, RwLock};
use std::time::Duration;

use actuators::Actuator;
use packets::{ActAckStatus, ActuatorId, ArmAckStatus, ArmLevel, ConnStatus, NUM_ACTUATORS};
use thiserror::Error;
use tokio::sync::watch;
use tracing::{error, info};

pub mod gates;

pub use gates::{arming_allowed, implied_transition, required_level};

#[derive(Debug, Error)]
pub enum StateError {
    #[error("no actuator with id {0}")]
    NoSuchActuator(u8),

    #[error("expected {expected} actuators, got {got}")]
    WrongActuatorCount { expected: usize, got: usize },
}

/// Result of waiting on the update signal.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Update {
    Changed,
    TimedOut,
}

/// Wait until the pad state changes or `timeout` elapses.
///
/// The watch channel compares versions, so a wakeup is only reported when
/// state actually changed since the receiver last looked.
pub async fn wait_for_update(rx: &mut watch::Receiver<u64>, timeout: Duration) -> Update {
    match tokio::time::timeout(timeout, rx.changed()).await {
        Ok(_) => Update::Changed,
        Err(_) => Update::TimedOut,
    }
}

struct Slot {
    id: ActuatorId,
    driver: Actuator,
    on: bool,
}

struct Inner {
    arm: ArmLevel,
    conn: ConnStatus,
    actuators: Vec<Slot>,
}

/// Full-state copy taken under a single read lock, used by the telemetry
/// heartbeat to build one consistent datagram.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Snapshot {
    pub arm: ArmLevel,
    pub conn: ConnStatus,
    pub actuators: [(ActuatorId, bool); NUM_ACTUATORS],
}

/// The process-wide pad state. Created once in the daemon and shared by
/// borrow with the controller and telemetry tasks.
pub struct PadState {
    inner: RwLock<Inner>,
    update_tx: watch::Sender<u64>,
}

impl PadState {
    /// Build the pad state over one hardware driver per actuator, in wire-ID
    /// order. The pad starts at the safest level with everything off and no
    /// controller connected.
    pub fn new(drivers: Vec<Actuator>) -> Result<Self, StateError> {
        if drivers.len() != NUM_ACTUATORS {
            return Err(StateError::WrongActuatorCount {
                expected: NUM_ACTUATORS,
                got: drivers.len(),
            });
        }
        let actuators = ActuatorId::ALL
            .into_iter()
            .zip(drivers)
            .map(|(id, driver)| Slot {
                id,
                driver,
                on: false,
            })
            .collect();
        let (update_tx, _) = watch::channel(0);
        Ok(Self {
            inner: RwLock::new(Inner {
                arm: ArmLevel::Pad,
                conn: ConnStatus::Disconnected,
                actuators,
            }),
            update_tx,
        })
    }

    /// Pad state backed entirely by mock actuators, with the observation
    /// handles for each. Used by the daemon when no hardware is configured
    /// and by tests.
    pub fn with_mocks() -> (Self, Vec<actuators::MockCounters>) {
        let mut counters = Vec::with_capacity(NUM_ACTUATORS);
        let drivers = ActuatorId::ALL
            .into_iter()
            .map(|id| {
                let mock = actuators::MockActuator::new(id.name());
                counters.push(mock.counters());
                Actuator::Mock(mock)
            })
            .collect();
        let state = Self::new(drivers).unwrap_or_else(|_| unreachable!());
        (state, counters)
    }

    pub fn arm_level(&self) -> ArmLevel {
        self.read().arm
    }

    pub fn conn_status(&self) -> ConnStatus {
        self.read().conn
    }

    /// Recorded state of one actuator by wire ID.
    pub fn actuator(&self, id: u8) -> Result<bool, StateError> {
        let target = ActuatorId::from_wire(id).ok_or(StateError::NoSuchActuator(id))?;
        Ok(self.read().actuators[target as usize].on)
    }

    pub fn snapshot(&self) -> Snapshot {
        let inner = self.read();
        let mut actuators = [(ActuatorId::Xv1, false); NUM_ACTUATORS];
        for (slot, out) in inner.actuators.iter().zip(actuators.iter_mut()) {
            *out = (slot.id, slot.on);
        }
        Snapshot {
            arm: inner.arm,
            conn: inner.conn,
            actuators,
        }
    }

    /// Subscribe to the update signal. Each committed mutation bumps the
    /// version the receivers watch.
    pub fn subscribe(&self) -> watch::Receiver<u64> {
        self.update_tx.subscribe()
    }

    /// Attempt an arming transition with a raw wire level.
    pub fn try_set_arm(&self, requested: u8) -> ArmAckStatus {
        let Some(requested) = ArmLevel::from_wire(requested) else {
            return ArmAckStatus::Invalid;
        };

        {
            let mut inner = self.write();
            if !gates::arming_allowed(inner.arm, requested) {
                info!(current = %inner.arm, %requested, "arming request denied");
                return ArmAckStatus::Denied;
            }
            info!(from = %inner.arm, to = %requested, "arming transition");
            inner.arm = requested;
        }
        self.signal_update();
        ArmAckStatus::Ok
    }

    /// Attempt to drive an actuator with raw wire ID and state bytes.
    ///
    /// Order of effects on the accept path: hardware first, recorded state
    /// second, implied arming transition third; the update signal fires only
    /// after all three are committed. A hardware failure leaves recorded
    /// state untouched.
    pub fn try_actuate(&self, id: u8, state: u8) -> ActAckStatus {
        let Some(target) = ActuatorId::from_wire(id) else {
            return ActAckStatus::NoSuchActuator;
        };
        let on = match state {
            0 => false,
            1 => true,
            _ => return ActAckStatus::Invalid,
        };

        {
            let mut inner = self.write();
            let current = inner.arm;
            if current < gates::required_level(target) {
                info!(actuator = %target, %current, "actuation denied");
                return ActAckStatus::Denied;
            }

            let slot = &mut inner.actuators[target as usize];
            let driven = if on {
                slot.driver.turn_on()
            } else {
                slot.driver.turn_off()
            };
            if let Err(err) = driven {
                error!(actuator = %target, %err, "actuator hardware failure");
                return ActAckStatus::NoSuchActuator;
            }
            slot.on = on;
            info!(actuator = %target, state = if on { "on" } else { "off" }, "actuated");

            if let Some(next) = gates::implied_transition(target, on, current) {
                info!(from = %current, to = %next, "arming transition (implied)");
                inner.arm = next;
            }
        }
        self.signal_update();
        ActAckStatus::Ok
    }

    /// Record the control-session status and signal telemetry.
    pub fn set_conn_status(&self, status: ConnStatus) {
        {
            let mut inner = self.write();
            if inner.conn == status {
                return;
            }
            info!(%status, "control session status");
            inner.conn = status;
        }
        self.signal_update();
    }

    fn signal_update(&self) {
        self.update_tx.send_modify(|version| *version += 1);
    }

    fn read(&self) -> std::sync::RwLockReadGuard<'_, Inner> {
        self.inner.read().unwrap_or_else(PoisonError::into_inner)
    }

    fn write(&self) -> std::sync::RwLockWriteGuard<'_, Inner> {
        self.inner.write().unwrap_or_else(PoisonError::into_inner)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    fn armed_state(level: ArmLevel) -> (PadState, Vec<actuators::MockCounters>) {
        let (state, counters) = PadState::with_mocks();
        let path: &[ArmLevel] = match level {
            ArmLevel::Pad => &[],
            ArmLevel::Valves => &[ArmLevel::Valves],
            ArmLevel::Ignition => &[ArmLevel::Valves, ArmLevel::Ignition],
            ArmLevel::Disconnected => {
                &[ArmLevel::Valves, ArmLevel::Ignition, ArmLevel::Disconnected]
            }
            ArmLevel::Launch => &[
                ArmLevel::Valves,
                ArmLevel::Ignition,
                ArmLevel::Disconnected,
                ArmLevel::Launch,
            ],
        };
        for step in path {
            assert_eq!(state.try_set_arm(*step as u8), ArmAckStatus::Ok);
        }
        (state, counters)
    }

    #[test]
    fn starts_in_safest_state() {
        let (state, _) = PadState::with_mocks();
        assert_eq!(state.arm_level(), ArmLevel::Pad);
        assert_eq!(state.conn_status(), ConnStatus::Disconnected);
        for id in 0..NUM_ACTUATORS as u8 {
            assert!(!state.actuator(id).unwrap());
        }
    }

    #[test]
    fn wrong_driver_count_is_rejected() {
        assert!(matches!(
            PadState::new(Vec::new()),
            Err(StateError::WrongActuatorCount { expected: 15, got: 0 })
        ));
    }

    #[test]
    fn arming_skip_is_denied() {
        let (state, _) = PadState::with_mocks();
        assert_eq!(state.try_set_arm(2), ArmAckStatus::Denied);
        assert_eq!(state.arm_level(), ArmLevel::Pad);
    }

    #[test]
    fn invalid_arming_level() {
        let (state, _) = PadState::with_mocks();
        assert_eq!(state.try_set_arm(9), ArmAckStatus::Invalid);
    }

    #[test]
    fn valve_denied_until_armed() {
        let (state, counters) = PadState::with_mocks();
        let xv1 = ActuatorId::Xv1 as usize;
        assert_eq!(state.try_actuate(ActuatorId::Xv1 as u8, 1), ActAckStatus::Denied);
        assert_eq!(counters[xv1].total_calls(), 0);

        assert_eq!(state.try_set_arm(1), ArmAckStatus::Ok);
        assert_eq!(state.try_actuate(ActuatorId::Xv1 as u8, 1), ActAckStatus::Ok);
        assert_eq!(counters[xv1].on_calls(), 1);
        assert!(state.actuator(ActuatorId::Xv1 as u8).unwrap());
    }

    #[test]
    fn dump_valve_works_at_pad_level() {
        let (state, counters) = PadState::with_mocks();
        assert_eq!(state.try_actuate(ActuatorId::Dump as u8, 1), ActAckStatus::Ok);
        assert_eq!(counters[ActuatorId::Dump as usize].on_calls(), 1);
    }

    #[test]
    fn unknown_actuator_and_state() {
        let (state, _) = PadState::with_mocks();
        assert_eq!(state.try_actuate(200, 1), ActAckStatus::NoSuchActuator);
        assert_eq!(
            state.try_actuate(ActuatorId::Dump as u8, 7),
            ActAckStatus::Invalid
        );
    }

    #[test]
    fn hardware_failure_leaves_state_untouched() {
        let (state, counters) = armed_state(ArmLevel::Valves);
        counters[ActuatorId::Xv2 as usize].set_fail(true);
        assert_eq!(
            state.try_actuate(ActuatorId::Xv2 as u8, 1),
            ActAckStatus::NoSuchActuator
        );
        assert!(!state.actuator(ActuatorId::Xv2 as u8).unwrap());
    }

    #[test]
    fn quick_disconnect_advances_arming() {
        let (state, _) = armed_state(ArmLevel::Ignition);
        let mut rx = state.subscribe();
        assert!(!rx.has_changed().unwrap());

        assert_eq!(
            state.try_actuate(ActuatorId::QuickDisconnect as u8, 1),
            ActAckStatus::Ok
        );
        assert_eq!(state.arm_level(), ArmLevel::Disconnected);
        assert!(rx.has_changed().unwrap());
    }

    #[test]
    fn igniter_off_retreats_from_launch() {
        let (state, _) = armed_state(ArmLevel::Disconnected);
        assert_eq!(state.try_actuate(ActuatorId::Igniter as u8, 1), ActAckStatus::Ok);
        assert_eq!(state.arm_level(), ArmLevel::Launch);

        assert_eq!(state.try_actuate(ActuatorId::Igniter as u8, 0), ActAckStatus::Ok);
        assert_eq!(state.arm_level(), ArmLevel::Disconnected);
    }

    #[test]
    fn fire_valve_gated_behind_launch() {
        let (state, _) = armed_state(ArmLevel::Disconnected);
        assert_eq!(
            state.try_actuate(ActuatorId::FireValve as u8, 1),
            ActAckStatus::Denied
        );

        assert_eq!(state.try_actuate(ActuatorId::Igniter as u8, 1), ActAckStatus::Ok);
        assert_eq!(state.arm_level(), ArmLevel::Launch);
        assert_eq!(
            state.try_actuate(ActuatorId::FireValve as u8, 1),
            ActAckStatus::Ok
        );
    }

    #[test]
    fn abort_back_to_pad() {
        let (state, _) = armed_state(ArmLevel::Launch);
        assert_eq!(state.try_set_arm(ArmLevel::Valves as u8), ArmAckStatus::Ok);
        assert_eq!(state.arm_level(), ArmLevel::Valves);
        assert_eq!(state.try_set_arm(ArmLevel::Pad as u8), ArmAckStatus::Ok);
        assert_eq!(state.arm_level(), ArmLevel::Pad);
    }

    #[test]
    fn conn_status_signals_only_on_change() {
        let (state, _) = PadState::with_mocks();
        let mut rx = state.subscribe();

        state.set_conn_status(ConnStatus::Disconnected);
        assert!(!rx.has_changed().unwrap());

        state.set_conn_status(ConnStatus::Connected);
        assert!(rx.has_changed().unwrap());
        assert_eq!(state.conn_status(), ConnStatus::Connected);
    }

    #[test]
    fn snapshot_is_consistent() {
        let (state, _) = armed_state(ArmLevel::Valves);
        state.try_actuate(ActuatorId::Xv3 as u8, 1);
        let snapshot = state.snapshot();
        assert_eq!(snapshot.arm, ArmLevel::Valves);
        assert_eq!(snapshot.actuators.len(), NUM_ACTUATORS);
        assert_eq!(snapshot.actuators[ActuatorId::Xv3 as usize], (ActuatorId::Xv3, true));
    }

    #[tokio::test]
    async fn wait_for_update_times_out_when_quiescent() {
        let (state, _) = PadState::with_mocks();
        let mut rx = state.subscribe();
        assert_eq!(
            wait_for_update(&mut rx, Duration::from_millis(20)).await,
            Update::TimedOut
        );
    }

    #[tokio::test]
    async fn wait_for_update_sees_changes() {
        let (state, _) = PadState::with_mocks();
        let mut rx = state.subscribe();
        state.try_set_arm(1);
        assert_eq!(
            wait_for_update(&mut rx, Duration::from_secs(5)).await,
            Update::Changed
        );
    }

    proptest! {
        /// Below the required level, actuation is denied and hardware is
        /// never called; the dump valve is the exception.
        #[test]
        fn gate_rejects_without_hardware_calls(id in 0u8..15, level in 0u8..=4) {
            let target = ActuatorId::from_wire(id).unwrap();
            let level = ArmLevel::from_wire(level).unwrap();
            prop_assume!(level < gates::required_level(target));

            let (state, counters) = armed_state(level);
            let before: u32 = counters.iter().map(|c| c.total_calls()).sum();
            prop_assert_eq!(state.try_actuate(id, 1), ActAckStatus::Denied);
            let after: u32 = counters.iter().map(|c| c.total_calls()).sum();
            prop_assert_eq!(before, after);
        }
    }
}
