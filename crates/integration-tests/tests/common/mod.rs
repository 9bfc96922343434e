//! In-process pad server harness for end-to-end scenarios.

use std::net::{Ipv4Addr, SocketAddr};
use std::sync::Arc;
use std::time::Duration;

use packets::{parse_datagram, ControlMessage, ControlSubtype, Header, TelemetryMessage, HEADER_LEN};
use sensors::{AdcSource, MockAdc};
use server::{Controller, ControllerConfig, ServerError, Telemetry, TelemetryConfig, Uptime};
use state::PadState;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::{TcpStream, UdpSocket};
use tokio::task::JoinHandle;

pub struct TestPad {
    pub state: Arc<PadState>,
    pub control_addr: SocketAddr,
    pub telemetry_rx: UdpSocket,
    pub controller_task: JoinHandle<Result<(), ServerError>>,
}

/// Start a pad server on loopback with mock actuators and no sensor
/// channels, so telemetry traffic is heartbeats only.
pub async fn start_pad(reaccept_timeout: Duration) -> TestPad {
    let (state, _) = PadState::with_mocks();
    let state = Arc::new(state);

    let controller = Controller::bind(
        ControllerConfig {
            port: 0,
            reaccept_timeout,
            ..ControllerConfig::default()
        },
        state.clone(),
    )
    .expect("bind controller");
    let control_addr = controller.local_addr().expect("controller addr");

    let telemetry_rx = UdpSocket::bind((Ipv4Addr::LOCALHOST, 0))
        .await
        .expect("bind telemetry receiver");
    let telemetry_port = telemetry_rx.local_addr().expect("receiver addr").port();

    let telemetry = Telemetry::bind(
        TelemetryConfig {
            port: telemetry_port,
            group: Ipv4Addr::LOCALHOST,
            heartbeat_timeout: Duration::from_millis(100),
            sample_period: Duration::from_millis(50),
            ..TelemetryConfig::default()
        },
        state.clone(),
        Uptime::start(),
    )
    .await
    .expect("bind telemetry");

    let controller_task = tokio::spawn(controller.run());
    tokio::spawn(telemetry.run(Box::new(AdcSource::new(
        Box::new(MockAdc::quiescent()),
        Vec::new(),
    ))));

    TestPad {
        state,
        control_addr,
        telemetry_rx,
        controller_task,
    }
}

/// Send one control request and read back its acknowledgement.
pub async fn request(stream: &mut TcpStream, message: ControlMessage) -> ControlMessage {
    stream
        .write_all(&message.to_bytes())
        .await
        .expect("send request");

    let mut raw_header = [0u8; HEADER_LEN];
    stream
        .read_exact(&mut raw_header)
        .await
        .expect("read ack header");
    let header = Header::parse(&raw_header).expect("parse ack header");
    let subtype = ControlSubtype::from_wire(header.subtype).expect("ack subtype");

    let mut body = [0u8; 2];
    let body = &mut body[..ControlMessage::body_len(subtype)];
    stream.read_exact(body).await.expect("read ack body");
    ControlMessage::decode(subtype, body).expect("decode ack")
}

/// Receive telemetry datagrams until one record matches, with a bounded
/// overall wait.
pub async fn await_record<F>(socket: &UdpSocket, mut matches: F) -> TelemetryMessage
where
    F: FnMut(&TelemetryMessage) -> bool,
{
    let deadline = Duration::from_secs(5);
    tokio::time::timeout(deadline, async {
        let mut buf = [0u8; 1500];
        loop {
            let (len, _) = socket.recv_from(&mut buf).await.expect("recv telemetry");
            let records = parse_datagram(&buf[..len]).expect("parse telemetry datagram");
            if let Some(record) = records.into_iter().find(&mut matches) {
                return record;
            }
        }
    })
    .await
    .expect("telemetry record never observed")
}
