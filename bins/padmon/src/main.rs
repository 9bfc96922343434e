//! padmon — telemetry display client.
//!
//! Joins the pad's multicast group and prints one line per telemetry
//! record. Datagram boundaries matter: each receive takes exactly one
//! datagram and every concatenated record in it is parsed before the next
//! receive.

use std::net::{Ipv4Addr, SocketAddr, SocketAddrV4, UdpSocket};

use anyhow::{Context, Result};
use clap::Parser;
use packets::{parse_datagram, TelemetryMessage};
use socket2::{Domain, Protocol, Socket, Type};
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "padmon", about = "Pad telemetry client")]
struct Args {
    /// Telemetry multicast group (must match the pad server's)
    #[arg(short = 'a', long, default_value_t = Ipv4Addr::new(239, 100, 110, 210))]
    addr: Ipv4Addr,

    /// Telemetry UDP port
    #[arg(short = 'p', long, default_value_t = 50002)]
    port: u16,
}

/// Bind the telemetry socket with address reuse so several monitors can
/// share one machine, and join the multicast group.
fn subscribe(group: Ipv4Addr, port: u16) -> Result<UdpSocket> {
    let socket = Socket::new(Domain::IPV4, Type::DGRAM, Some(Protocol::UDP))?;
    socket.set_reuse_address(true)?;
    #[cfg(unix)]
    socket.set_reuse_port(true)?;
    let bind = SocketAddrV4::new(Ipv4Addr::UNSPECIFIED, port);
    socket
        .bind(&SocketAddr::V4(bind).into())
        .with_context(|| format!("binding udp port {port}"))?;
    if group.is_multicast() {
        socket
            .join_multicast_v4(&group, &Ipv4Addr::UNSPECIFIED)
            .with_context(|| format!("joining multicast group {group}"))?;
    }
    Ok(socket.into())
}

fn render(record: &TelemetryMessage) -> String {
    match *record {
        TelemetryMessage::Temperature {
            time,
            millicelsius,
            id,
        } => format!("Thermocouple #{id}: {} C @ {time} ms", millicelsius / 1000),
        TelemetryMessage::Pressure { time, millipsi, id } => {
            format!("Pressure transducer #{id}: {} PSI @ {time} ms", millipsi / 1000)
        }
        TelemetryMessage::Mass { time, grams, id } => {
            format!("Load cell #{id}: {} kg @ {time} ms", grams / 1000)
        }
        TelemetryMessage::Thrust { time, newtons, id } => {
            format!("Thrust load cell #{id}: {newtons} N @ {time} ms")
        }
        TelemetryMessage::Arm { time, level } => {
            format!("Arming state change to: {level} @ {time} ms")
        }
        TelemetryMessage::Actuator { time, id, on } => {
            format!("{id}: {} @ {time} ms", if on { "on" } else { "off" })
        }
        TelemetryMessage::Warning { time, kind } => format!("WARNING: {kind} @ {time} ms"),
        TelemetryMessage::Continuity { time, closed } => format!(
            "Igniter continuity: {} @ {time} ms",
            if closed { "continuous" } else { "open circuit" }
        ),
        TelemetryMessage::Connection { time, status } => {
            format!("Control session {status} @ {time} ms")
        }
    }
}

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with_writer(std::io::stderr)
        .init();

    let args = Args::parse();
    let socket = subscribe(args.addr, args.port)?;
    eprintln!("Listening on {}:{}", args.addr, args.port);

    let mut buf = [0u8; 1500];
    loop {
        let (len, _) = socket.recv_from(&mut buf).context("receiving datagram")?;
        // A malformed or non-telemetry datagram means something else owns
        // this group/port; bail rather than print garbage.
        let records = parse_datagram(&buf[..len]).context("malformed telemetry datagram")?;
        for record in &records {
            println!("{}", render(record));
        }
    }
}
