//! Telemetry publishers: sensor sampling and the full-state heartbeat.
//!
//! Both loops share one UDP socket and the same multicast destination. Each
//! pass builds a complete datagram of concatenated records and hands it to a
//! single `send_to`, so records from the two publishers never interleave
//! inside a datagram.

use std::net::{Ipv4Addr, SocketAddr, SocketAddrV4};
use std::sync::Arc;
use std::time::Duration;

use packets::{TelemetryMessage, WarnKind};
use sensors::{Measurement, SensorSource};
use state::{wait_for_update, PadState};
use tokio::net::UdpSocket;
use tracing::{debug, info, warn};

use crate::{ServerError, Uptime};

#[derive(Debug, Clone)]
pub struct TelemetryConfig {
    pub port: u16,
    /// Multicast group (or unicast peer, in tests) the stream is sent to.
    pub group: Ipv4Addr,
    /// Quiescent-state heartbeat period.
    pub heartbeat_timeout: Duration,
    /// Sensor sampling period.
    pub sample_period: Duration,
    /// Above this pressure a HIGH_PRESSURE warning rides along.
    pub max_pressure_millipsi: i32,
    /// Above this temperature a HIGH_TEMP warning rides along.
    pub max_temp_millicelsius: i32,
}

impl Default for TelemetryConfig {
    fn default() -> Self {
        Self {
            port: 50002,
            group: Ipv4Addr::new(239, 100, 110, 210),
            heartbeat_timeout: Duration::from_secs(5),
            sample_period: Duration::from_millis(100),
            max_pressure_millipsi: 900_000,
            max_temp_millicelsius: 60_000,
        }
    }
}

/// The telemetry task. Owns the UDP socket; [`Telemetry::run`] drives the
/// sampler and heartbeat concurrently until the socket fails.
pub struct Telemetry {
    socket: Arc<UdpSocket>,
    dest: SocketAddr,
    state: Arc<PadState>,
    uptime: Uptime,
    config: TelemetryConfig,
}

impl Telemetry {
    pub async fn bind(
        config: TelemetryConfig,
        state: Arc<PadState>,
        uptime: Uptime,
    ) -> Result<Self, ServerError> {
        let socket = UdpSocket::bind((Ipv4Addr::UNSPECIFIED, 0)).await?;
        if config.group.is_multicast() {
            socket.set_multicast_ttl_v4(1)?;
        }
        let dest = SocketAddr::V4(SocketAddrV4::new(config.group, config.port));
        info!(%dest, "telemetry stream ready");
        Ok(Self {
            socket: Arc::new(socket),
            dest,
            state,
            uptime,
            config,
        })
    }

    pub async fn run(self, source: Box<dyn SensorSource>) -> Result<(), ServerError> {
        tokio::try_join!(
            heartbeat_loop(
                self.socket.clone(),
                self.dest,
                self.state.clone(),
                self.uptime,
                self.config.heartbeat_timeout,
            ),
            sampler_loop(
                self.socket,
                self.dest,
                source,
                self.uptime,
                &self.config,
            ),
        )?;
        Ok(())
    }
}

/// Emit the full state snapshot whenever state changes, and at least once
/// per heartbeat timeout so the stream stays live when quiescent.
async fn heartbeat_loop(
    socket: Arc<UdpSocket>,
    dest: SocketAddr,
    state: Arc<PadState>,
    uptime: Uptime,
    heartbeat_timeout: Duration,
) -> Result<(), ServerError> {
    let mut updates = state.subscribe();
    loop {
        let snapshot = state.snapshot();
        let time = uptime.now_ms();
        let mut datagram = Vec::with_capacity(256);
        TelemetryMessage::Arm {
            time,
            level: snapshot.arm,
        }
        .encode(&mut datagram);
        TelemetryMessage::Connection {
            time,
            status: snapshot.conn,
        }
        .encode(&mut datagram);
        for (id, on) in snapshot.actuators {
            TelemetryMessage::Actuator { time, id, on }.encode(&mut datagram);
        }
        socket.send_to(&datagram, dest).await?;
        debug!(time, arm = %snapshot.arm, "heartbeat sent");

        wait_for_update(&mut updates, heartbeat_timeout).await;
    }
}

/// Sample every source each pass and publish one concatenated datagram,
/// appending threshold warnings when a reading is out of range.
async fn sampler_loop(
    socket: Arc<UdpSocket>,
    dest: SocketAddr,
    mut source: Box<dyn SensorSource>,
    uptime: Uptime,
    config: &TelemetryConfig,
) -> Result<(), ServerError> {
    let mut ticker = tokio::time::interval(config.sample_period);
    loop {
        ticker.tick().await;
        let measurements = match source.sample() {
            Ok(measurements) => measurements,
            Err(err) => {
                warn!(%err, "sensor sampling failed");
                continue;
            }
        };
        if measurements.is_empty() {
            continue;
        }

        let time = uptime.now_ms();
        let mut datagram = Vec::with_capacity(measurements.len() * 16);
        let mut warned_pressure = false;
        let mut warned_temp = false;
        for measurement in &measurements {
            let message = to_message(*measurement, time);
            message.encode(&mut datagram);

            match message {
                TelemetryMessage::Pressure { millipsi, .. }
                    if millipsi > config.max_pressure_millipsi && !warned_pressure =>
                {
                    warned_pressure = true;
                    warn!(millipsi, "pressure above threshold");
                    TelemetryMessage::Warning {
                        time,
                        kind: WarnKind::HighPressure,
                    }
                    .encode(&mut datagram);
                }
                TelemetryMessage::Temperature { millicelsius, .. }
                    if millicelsius > config.max_temp_millicelsius && !warned_temp =>
                {
                    warned_temp = true;
                    warn!(millicelsius, "temperature above threshold");
                    TelemetryMessage::Warning {
                        time,
                        kind: WarnKind::HighTemp,
                    }
                    .encode(&mut datagram);
                }
                _ => {}
            }
        }
        socket.send_to(&datagram, dest).await?;
    }
}

fn to_message(measurement: Measurement, time: u32) -> TelemetryMessage {
    match measurement {
        Measurement::Temperature { id, millicelsius } => TelemetryMessage::Temperature {
            time,
            millicelsius,
            id,
        },
        Measurement::Pressure { id, millipsi } => TelemetryMessage::Pressure { time, millipsi, id },
        Measurement::Mass { id, grams } => TelemetryMessage::Mass { time, grams, id },
        Measurement::Thrust { id, newtons } => TelemetryMessage::Thrust { time, newtons, id },
        Measurement::Continuity { closed } => TelemetryMessage::Continuity { time, closed },
    }
}
