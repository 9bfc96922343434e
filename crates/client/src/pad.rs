//! Connection to the pad server's control port.

use std::io::{ErrorKind, Read, Write};
use std::net::{SocketAddr, TcpStream};
use std::time::Duration;

use packets::{ControlMessage, ControlSubtype, Header, PacketType, HEADER_LEN};
use tracing::{info, warn};

use crate::ClientError;

const CONNECT_BACKOFF: Duration = Duration::from_secs(1);

/// Errno classes that mean "the pad is not up yet; keep trying".
pub fn is_retryable_connect(err: &std::io::Error) -> bool {
    matches!(
        err.kind(),
        ErrorKind::ConnectionRefused
            | ErrorKind::TimedOut
            | ErrorKind::NotConnected
            | ErrorKind::NetworkUnreachable
    )
}

/// Errno classes that mean "the session died; reconnect".
pub fn is_connection_lost(err: &std::io::Error) -> bool {
    matches!(
        err.kind(),
        ErrorKind::NotConnected
            | ErrorKind::ConnectionAborted
            | ErrorKind::ConnectionRefused
            | ErrorKind::ConnectionReset
            | ErrorKind::BrokenPipe
            | ErrorKind::UnexpectedEof
    )
}

/// The pad control session.
pub struct Pad {
    stream: TcpStream,
}

impl Pad {
    /// Connect to the pad, retrying forever with a fixed backoff while the
    /// pad is unreachable. Non-retryable errors are returned.
    pub fn connect_forever(addr: SocketAddr) -> Result<Self, ClientError> {
        info!(%addr, "waiting for pad");
        loop {
            match TcpStream::connect(addr) {
                Ok(stream) => {
                    info!(%addr, "connection established");
                    return Ok(Self { stream });
                }
                Err(err) if is_retryable_connect(&err) => {
                    std::thread::sleep(CONNECT_BACKOFF);
                }
                Err(err) => return Err(err.into()),
            }
        }
    }

    /// Send one request and block for its acknowledgement.
    ///
    /// The header and body go out in a single write. The reply must be the
    /// acknowledgement subtype matching the request.
    pub fn request(&mut self, message: ControlMessage) -> Result<ControlMessage, ClientError> {
        let sent = message.subtype();
        let expected = match sent {
            ControlSubtype::ActRequest => ControlSubtype::ActAck,
            ControlSubtype::ArmRequest => ControlSubtype::ArmAck,
            other => other,
        };

        self.stream.write_all(&message.to_bytes())?;

        let mut raw_header = [0u8; HEADER_LEN];
        self.stream.read_exact(&mut raw_header)?;
        let header = Header::parse(&raw_header)?;
        if header.kind != PacketType::Control {
            warn!(kind = ?header.kind, "non-control reply from pad");
            return Err(packets::PacketError::UnexpectedType(header.kind).into());
        }
        let got = ControlSubtype::from_wire(header.subtype)?;
        if got != expected {
            return Err(ClientError::MismatchedAck { sent, got });
        }

        let mut body = [0u8; 2];
        let body = &mut body[..ControlMessage::body_len(got)];
        self.stream.read_exact(body)?;
        Ok(ControlMessage::decode(got, body)?)
    }
}
