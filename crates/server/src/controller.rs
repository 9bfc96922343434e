//! Control channel: TCP accept loop and request handling.
//!
//! At most one controller is connected at a time. When the link drops the
//! pad advertises RECONNECTING over telemetry and waits a bounded window for
//! the operator to come back; if nobody does, the pad refuses further
//! operator intent until a full restart, which surfaces here as a fatal
//! error from [`Controller::run`].

use std::net::{Ipv4Addr, SocketAddr, SocketAddrV4};
use std::sync::Arc;
use std::time::Duration;

use packets::{ConnStatus, ControlMessage, ControlSubtype, Header, PacketType, HEADER_LEN};
use socket2::{Domain, Protocol, SockRef, Socket, TcpKeepalive, Type};
use state::PadState;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::{TcpListener, TcpStream};
use tokio::time::timeout;
use tracing::{error, info, warn};

use crate::ServerError;

#[derive(Debug, Clone)]
pub struct ControllerConfig {
    pub port: u16,
    /// How long a lost controller may take to reconnect before the pad
    /// aborts.
    pub reaccept_timeout: Duration,
    /// TCP keepalive probing; bounds time-to-detect a dead link.
    pub keepalive_idle: Duration,
    pub keepalive_interval: Duration,
    pub keepalive_count: u32,
}

impl Default for ControllerConfig {
    fn default() -> Self {
        Self {
            port: 50001,
            reaccept_timeout: Duration::from_secs(20),
            keepalive_idle: Duration::from_secs(2),
            keepalive_interval: Duration::from_secs(2),
            keepalive_count: 3,
        }
    }
}

/// Why a control session ended.
enum SessionEnd {
    /// Orderly or link-level disconnect.
    Disconnected,
    /// The peer violated the protocol; the connection was dropped.
    ProtocolError,
}

pub struct Controller {
    listener: TcpListener,
    state: Arc<PadState>,
    config: ControllerConfig,
}

impl Controller {
    /// Bind the control listener. Fatal at startup if the port is taken.
    pub fn bind(config: ControllerConfig, state: Arc<PadState>) -> Result<Self, ServerError> {
        let socket = Socket::new(Domain::IPV4, Type::STREAM, Some(Protocol::TCP))?;
        socket.set_reuse_address(true)?;
        let addr = SocketAddrV4::new(Ipv4Addr::UNSPECIFIED, config.port);
        socket.bind(&SocketAddr::V4(addr).into())?;
        // Backlog of one: a second controller queues until the first session
        // dies, preserving the single-client invariant.
        socket.listen(1)?;
        socket.set_nonblocking(true)?;
        let listener = TcpListener::from_std(socket.into())?;
        Ok(Self {
            listener,
            state,
            config,
        })
    }

    /// Actual bound address; useful when configured with port 0.
    pub fn local_addr(&self) -> Result<SocketAddr, ServerError> {
        Ok(self.listener.local_addr()?)
    }

    /// Accept and serve controller sessions until the reconnect window
    /// expires.
    pub async fn run(self) -> Result<(), ServerError> {
        info!(port = self.config.port, "waiting for controller");
        let (mut stream, addr) = self.listener.accept().await?;
        self.configure_stream(&stream)?;
        self.state.set_conn_status(ConnStatus::Connected);
        info!(%addr, "controller connected");

        loop {
            match self.serve(&mut stream).await {
                SessionEnd::Disconnected => warn!("controller disconnected"),
                SessionEnd::ProtocolError => warn!("dropping controller for protocol violation"),
            }
            // Close the dead session before opening the reconnect window.
            drop(stream);

            self.state.set_conn_status(ConnStatus::Reconnecting);
            info!(
                window = ?self.config.reaccept_timeout,
                "waiting for controller to reconnect"
            );
            match timeout(self.config.reaccept_timeout, self.listener.accept()).await {
                Ok(Ok((reconnected, addr))) => {
                    self.configure_stream(&reconnected)?;
                    stream = reconnected;
                    self.state.set_conn_status(ConnStatus::Connected);
                    info!(%addr, "controller reconnected");
                }
                Ok(Err(err)) => return Err(err.into()),
                Err(_) => {
                    self.state.set_conn_status(ConnStatus::Disconnected);
                    error!("controller never reconnected; aborting");
                    return Err(ServerError::ReconnectTimeout(self.config.reaccept_timeout));
                }
            }
        }
    }

    fn configure_stream(&self, stream: &TcpStream) -> Result<(), ServerError> {
        let keepalive = TcpKeepalive::new()
            .with_time(self.config.keepalive_idle)
            .with_interval(self.config.keepalive_interval)
            .with_retries(self.config.keepalive_count);
        SockRef::from(stream).set_tcp_keepalive(&keepalive)?;
        Ok(())
    }

    /// Serve one session: header, body, gate, ACK, repeat.
    async fn serve(&self, stream: &mut TcpStream) -> SessionEnd {
        loop {
            let mut raw_header = [0u8; HEADER_LEN];
            if stream.read_exact(&mut raw_header).await.is_err() {
                return SessionEnd::Disconnected;
            }

            let header = match Header::parse(&raw_header) {
                Ok(header) => header,
                Err(err) => {
                    warn!(%err, "unreadable header on control channel");
                    return SessionEnd::ProtocolError;
                }
            };
            if header.kind != PacketType::Control {
                warn!(kind = ?header.kind, "non-control packet on control channel");
                return SessionEnd::ProtocolError;
            }
            let subtype = match ControlSubtype::from_wire(header.subtype) {
                Ok(subtype) => subtype,
                Err(err) => {
                    warn!(%err, "unknown control subtype");
                    return SessionEnd::ProtocolError;
                }
            };
            if subtype.is_ack() {
                warn!("unexpected acknowledgement from controller");
                return SessionEnd::ProtocolError;
            }

            let mut body = [0u8; 2];
            let body = &mut body[..ControlMessage::body_len(subtype)];
            if stream.read_exact(body).await.is_err() {
                return SessionEnd::Disconnected;
            }

            let ack = match subtype {
                ControlSubtype::ActRequest => {
                    let (id, requested) = (body[0], body[1]);
                    let status = self.state.try_actuate(id, requested);
                    info!(id, requested, ?status, "actuation request");
                    ControlMessage::ActAck { id, status }
                }
                ControlSubtype::ArmRequest => {
                    let level = body[0];
                    let status = self.state.try_set_arm(level);
                    info!(level, ?status, "arming request");
                    ControlMessage::ArmAck { status }
                }
                ControlSubtype::ActAck | ControlSubtype::ArmAck => unreachable!(),
            };

            if stream.write_all(&ack.to_bytes()).await.is_err() {
                return SessionEnd::Disconnected;
            }
        }
    }
}
