//! End-to-end scenarios over real loopback sockets: a pad server with mock
//! actuators, a raw TCP controller and a UDP telemetry receiver.

use std::time::Duration;

use packets::{
    ActAckStatus, ActuatorId, ArmAckStatus, ArmLevel, ConnStatus, ControlMessage,
    TelemetryMessage,
};
use server::ServerError;
use tokio::net::TcpStream;

mod common;

use common::{await_record, request, start_pad};

const RECONNECT_WINDOW: Duration = Duration::from_secs(20);

fn act(id: ActuatorId, state: u8) -> ControlMessage {
    ControlMessage::ActRequest {
        id: id as u8,
        state,
    }
}

fn arm(level: ArmLevel) -> ControlMessage {
    ControlMessage::ArmRequest {
        level: level as u8,
    }
}

fn arm_ok() -> ControlMessage {
    ControlMessage::ArmAck {
        status: ArmAckStatus::Ok,
    }
}

#[tokio::test]
async fn nominal_arm_up() {
    let pad = start_pad(RECONNECT_WINDOW).await;
    let mut ctl = TcpStream::connect(pad.control_addr).await.unwrap();

    assert_eq!(request(&mut ctl, arm(ArmLevel::Valves)).await, arm_ok());
    await_record(&pad.telemetry_rx, |r| {
        matches!(r, TelemetryMessage::Arm { level: ArmLevel::Valves, .. })
    })
    .await;

    assert_eq!(request(&mut ctl, arm(ArmLevel::Ignition)).await, arm_ok());
    await_record(&pad.telemetry_rx, |r| {
        matches!(r, TelemetryMessage::Arm { level: ArmLevel::Ignition, .. })
    })
    .await;

    assert_eq!(pad.state.arm_level(), ArmLevel::Ignition);
}

#[tokio::test]
async fn denied_ignition_bypass() {
    let pad = start_pad(RECONNECT_WINDOW).await;
    let mut ctl = TcpStream::connect(pad.control_addr).await.unwrap();

    assert_eq!(
        request(&mut ctl, arm(ArmLevel::Ignition)).await,
        ControlMessage::ArmAck {
            status: ArmAckStatus::Denied
        }
    );
    assert_eq!(pad.state.arm_level(), ArmLevel::Pad);
}

#[tokio::test]
async fn valve_gate() {
    let pad = start_pad(RECONNECT_WINDOW).await;
    let mut ctl = TcpStream::connect(pad.control_addr).await.unwrap();

    assert_eq!(
        request(&mut ctl, act(ActuatorId::Xv1, 1)).await,
        ControlMessage::ActAck {
            id: ActuatorId::Xv1 as u8,
            status: ActAckStatus::Denied
        }
    );

    assert_eq!(request(&mut ctl, arm(ArmLevel::Valves)).await, arm_ok());
    assert_eq!(
        request(&mut ctl, act(ActuatorId::Xv1, 1)).await,
        ControlMessage::ActAck {
            id: ActuatorId::Xv1 as u8,
            status: ActAckStatus::Ok
        }
    );

    await_record(&pad.telemetry_rx, |r| {
        matches!(
            r,
            TelemetryMessage::Actuator {
                id: ActuatorId::Xv1,
                on: true,
                ..
            }
        )
    })
    .await;
}

#[tokio::test]
async fn quick_disconnect_advances_arming() {
    let pad = start_pad(RECONNECT_WINDOW).await;
    let mut ctl = TcpStream::connect(pad.control_addr).await.unwrap();

    assert_eq!(request(&mut ctl, arm(ArmLevel::Valves)).await, arm_ok());
    assert_eq!(request(&mut ctl, arm(ArmLevel::Ignition)).await, arm_ok());

    assert_eq!(
        request(&mut ctl, act(ActuatorId::QuickDisconnect, 1)).await,
        ControlMessage::ActAck {
            id: ActuatorId::QuickDisconnect as u8,
            status: ActAckStatus::Ok
        }
    );
    assert_eq!(pad.state.arm_level(), ArmLevel::Disconnected);

    await_record(&pad.telemetry_rx, |r| {
        matches!(
            r,
            TelemetryMessage::Arm {
                level: ArmLevel::Disconnected,
                ..
            }
        )
    })
    .await;
}

#[tokio::test]
async fn abort_from_firing_sequence() {
    let pad = start_pad(RECONNECT_WINDOW).await;
    let mut ctl = TcpStream::connect(pad.control_addr).await.unwrap();

    for level in [
        ArmLevel::Valves,
        ArmLevel::Ignition,
        ArmLevel::Disconnected,
        ArmLevel::Launch,
    ] {
        assert_eq!(request(&mut ctl, arm(level)).await, arm_ok());
    }
    assert_eq!(pad.state.arm_level(), ArmLevel::Launch);

    assert_eq!(request(&mut ctl, arm(ArmLevel::Valves)).await, arm_ok());
    assert_eq!(pad.state.arm_level(), ArmLevel::Valves);

    assert_eq!(request(&mut ctl, arm(ArmLevel::Pad)).await, arm_ok());
    assert_eq!(pad.state.arm_level(), ArmLevel::Pad);
}

#[tokio::test]
async fn dump_valve_always_allowed() {
    let pad = start_pad(RECONNECT_WINDOW).await;
    let mut ctl = TcpStream::connect(pad.control_addr).await.unwrap();

    assert_eq!(
        request(&mut ctl, act(ActuatorId::Dump, 1)).await,
        ControlMessage::ActAck {
            id: ActuatorId::Dump as u8,
            status: ActAckStatus::Ok
        }
    );

    await_record(&pad.telemetry_rx, |r| {
        matches!(
            r,
            TelemetryMessage::Actuator {
                id: ActuatorId::Dump,
                on: true,
                ..
            }
        )
    })
    .await;
}

#[tokio::test]
async fn reconnect_window_then_abort() {
    let pad = start_pad(Duration::from_millis(300)).await;

    {
        let mut ctl = TcpStream::connect(pad.control_addr).await.unwrap();
        assert_eq!(request(&mut ctl, arm(ArmLevel::Valves)).await, arm_ok());
        await_record(&pad.telemetry_rx, |r| {
            matches!(
                r,
                TelemetryMessage::Connection {
                    status: ConnStatus::Connected,
                    ..
                }
            )
        })
        .await;
    } // operator killed

    await_record(&pad.telemetry_rx, |r| {
        matches!(
            r,
            TelemetryMessage::Connection {
                status: ConnStatus::Reconnecting,
                ..
            }
        )
    })
    .await;

    let result = pad.controller_task.await.unwrap();
    assert!(matches!(result, Err(ServerError::ReconnectTimeout(_))));

    await_record(&pad.telemetry_rx, |r| {
        matches!(
            r,
            TelemetryMessage::Connection {
                status: ConnStatus::Disconnected,
                ..
            }
        )
    })
    .await;

    // The pad keeps its last state after the abort.
    assert_eq!(pad.state.arm_level(), ArmLevel::Valves);
}

/// Drive the real control-client crate against the server end to end.
#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn control_client_round_trip() {
    let pad = start_pad(RECONNECT_WINDOW).await;
    let addr = pad.control_addr;

    let acks = tokio::task::spawn_blocking(move || {
        let mut panel = client::default_panel();
        let mut pad = client::Pad::connect_forever(addr).expect("connect");

        // Arming switch for valves on, then the dump valve switch on.
        let valves_idx = 16; // arming switches follow the 15 actuator switches
        let dump_idx = 14;
        let first = panel[valves_idx]
            .edge(true, true)
            .expect("edge produces request");
        let ack1 = pad.request(first).expect("arm request");
        let second = panel[dump_idx]
            .edge(true, true)
            .expect("edge produces request");
        let ack2 = pad.request(second).expect("act request");
        (ack1, ack2)
    })
    .await
    .unwrap();

    assert_eq!(acks.0, arm_ok());
    assert_eq!(
        acks.1,
        ControlMessage::ActAck {
            id: ActuatorId::Dump as u8,
            status: ActAckStatus::Ok
        }
    );
    assert_eq!(pad.state.arm_level(), ArmLevel::Valves);
    assert!(pad.state.actuator(ActuatorId::Dump as u8).unwrap());
}
