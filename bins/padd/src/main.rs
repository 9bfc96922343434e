//! padd — pad server daemon.
//!
//! Owns the pad state and runs the two server tasks: the controller task
//! handling the single operator session over TCP, and the telemetry task
//! publishing sensor samples and state heartbeats over UDP multicast.

use std::net::Ipv4Addr;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use actuators::{Actuator, ActuatorConfig, MockActuator};
use anyhow::{bail, Context, Result};
use clap::Parser;
use packets::ActuatorId;
use sensors::{
    AdcSource, ChannelConfig, ChannelKind, CompositeSource, MassCalibration, MassSource, MockAdc,
    MockMassSensor, ReplaySource, SensorSource,
};
use serde::Deserialize;
use server::{Controller, ControllerConfig, Telemetry, TelemetryConfig, Uptime};
use state::PadState;
use tracing::{error, info, warn};
use tracing_appender::rolling::{RollingFileAppender, Rotation};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

#[derive(Parser)]
#[command(name = "padd", about = "Pad server daemon")]
struct Args {
    /// Telemetry UDP port
    #[arg(short = 't', long, default_value_t = 50002)]
    telemetry_port: u16,

    /// Controller TCP port
    #[arg(short = 'c', long, default_value_t = 50001)]
    control_port: u16,

    /// Telemetry multicast group
    #[arg(short = 'a', long, default_value_t = Ipv4Addr::new(239, 100, 110, 210))]
    multicast_addr: Ipv4Addr,

    /// Replay telemetry from a recorded data file instead of sampling
    #[arg(short = 'f', long)]
    data_file: Option<PathBuf>,

    /// Path to configuration file
    #[arg(long, default_value = "config/pad.toml")]
    config: PathBuf,

    /// Log level (trace, debug, info, warn, error)
    #[arg(long, default_value = "info")]
    log_level: String,

    /// Directory for rolling file logs; stdout only when omitted
    #[arg(long)]
    log_dir: Option<PathBuf>,
}

/// Configuration file structure (pad.toml).
#[derive(Debug, Deserialize, Default)]
#[serde(default)]
struct FileConfig {
    controller: ControllerSection,
    telemetry: TelemetrySection,
    /// Hardware bindings; actuators without an entry are mocks.
    #[serde(rename = "actuator")]
    actuators: Vec<ActuatorEntry>,
    /// ADC channel table; used when no replay file is given.
    #[serde(rename = "channel")]
    channels: Vec<ChannelConfig>,
    /// Digital load cell; omitted means no mass telemetry.
    mass: Option<MassSection>,
}

#[derive(Debug, Deserialize)]
struct MassSection {
    #[serde(default)]
    sensor_id: u8,
    known_mass_grams: f64,
    known_point: f64,
    /// Recorded zero point from the last bench tare.
    #[serde(default)]
    zero_point: f64,
    /// Raw level the mock load cell rests at.
    #[serde(default)]
    resting_raw: f64,
}

#[derive(Debug, Deserialize)]
#[serde(default)]
struct ControllerSection {
    reaccept_timeout_secs: u64,
    keepalive_idle_secs: u64,
    keepalive_interval_secs: u64,
    keepalive_count: u32,
}

impl Default for ControllerSection {
    fn default() -> Self {
        Self {
            reaccept_timeout_secs: 20,
            keepalive_idle_secs: 2,
            keepalive_interval_secs: 2,
            keepalive_count: 3,
        }
    }
}

#[derive(Debug, Deserialize)]
#[serde(default)]
struct TelemetrySection {
    heartbeat_secs: u64,
    sample_hz: u32,
    max_pressure_millipsi: i32,
    max_temp_millicelsius: i32,
}

impl Default for TelemetrySection {
    fn default() -> Self {
        Self {
            heartbeat_secs: 5,
            sample_hz: 10,
            max_pressure_millipsi: 900_000,
            max_temp_millicelsius: 60_000,
        }
    }
}

#[derive(Debug, Deserialize)]
struct ActuatorEntry {
    id: u8,
    #[serde(flatten)]
    config: ActuatorConfig,
}

impl FileConfig {
    fn load(path: &Path) -> Result<Self> {
        if path.exists() {
            let content = std::fs::read_to_string(path)
                .with_context(|| format!("reading {}", path.display()))?;
            let config = toml::from_str(&content)
                .with_context(|| format!("parsing {}", path.display()))?;
            Ok(config)
        } else {
            warn!(path = %path.display(), "Config file not found, using defaults");
            Ok(Self::default())
        }
    }
}

/// Default ADC channel table for the standard pad instrumentation.
fn default_channels() -> Vec<ChannelConfig> {
    let channel = |channel, sensor_id, kind| ChannelConfig {
        channel,
        sensor_id,
        kind,
        max_psi: None,
        steinhart_hart: None,
    };
    vec![
        channel(0, 0, ChannelKind::Temperature),
        channel(1, 1, ChannelKind::Temperature),
        channel(2, 1, ChannelKind::Pressure),
        channel(3, 2, ChannelKind::Pressure),
        channel(4, 4, ChannelKind::Pressure),
        channel(5, 0, ChannelKind::Thrust),
        channel(6, 0, ChannelKind::Continuity),
    ]
}

/// One driver per actuator in wire-ID order; unconfigured slots get mocks.
fn build_actuators(entries: &[ActuatorEntry]) -> Vec<Actuator> {
    ActuatorId::ALL
        .into_iter()
        .map(|id| {
            match entries.iter().find(|entry| entry.id == id as u8) {
                Some(entry) => Actuator::from_config(id.name(), &entry.config),
                None => Actuator::Mock(MockActuator::new(id.name())),
            }
        })
        .collect()
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    if args.telemetry_port == args.control_port {
        bail!(
            "cannot use the same port ({}) for both telemetry and control",
            args.control_port
        );
    }

    // The guard must live for the whole run so file logs are flushed.
    let _log_guard = init_logging(args.log_dir.as_deref(), &args.log_level)?;

    let file_config = FileConfig::load(&args.config)?;
    let uptime = Uptime::start();

    let state = Arc::new(PadState::new(build_actuators(&file_config.actuators))?);

    let controller = Controller::bind(
        ControllerConfig {
            port: args.control_port,
            reaccept_timeout: Duration::from_secs(file_config.controller.reaccept_timeout_secs),
            keepalive_idle: Duration::from_secs(file_config.controller.keepalive_idle_secs),
            keepalive_interval: Duration::from_secs(
                file_config.controller.keepalive_interval_secs,
            ),
            keepalive_count: file_config.controller.keepalive_count,
        },
        state.clone(),
    )
    .context("binding control port")?;

    let telemetry = Telemetry::bind(
        TelemetryConfig {
            port: args.telemetry_port,
            group: args.multicast_addr,
            heartbeat_timeout: Duration::from_secs(file_config.telemetry.heartbeat_secs),
            sample_period: Duration::from_secs(1) / file_config.telemetry.sample_hz.max(1),
            max_pressure_millipsi: file_config.telemetry.max_pressure_millipsi,
            max_temp_millicelsius: file_config.telemetry.max_temp_millicelsius,
        },
        state.clone(),
        uptime,
    )
    .await
    .context("binding telemetry socket")?;

    let source: Box<dyn SensorSource> = match &args.data_file {
        Some(path) => {
            info!(path = %path.display(), "replaying telemetry from file");
            Box::new(ReplaySource::open(path).context("opening replay file")?)
        }
        None => {
            let channels = if file_config.channels.is_empty() {
                default_channels()
            } else {
                file_config.channels
            };
            let mut sources: Vec<Box<dyn SensorSource>> = vec![Box::new(AdcSource::new(
                Box::new(MockAdc::quiescent()),
                channels,
            ))];
            if let Some(mass) = &file_config.mass {
                sources.push(Box::new(MassSource::with_calibration(
                    MockMassSensor::steady(mass.resting_raw),
                    mass.sensor_id,
                    MassCalibration {
                        zero_point: mass.zero_point,
                        known_mass_grams: mass.known_mass_grams,
                        known_point: mass.known_point,
                    },
                )));
            }
            Box::new(CompositeSource::new(sources))
        }
    };

    info!(
        control = args.control_port,
        telemetry = args.telemetry_port,
        group = %args.multicast_addr,
        "Starting padd"
    );

    let mut controller_task = tokio::spawn(controller.run());
    let mut telemetry_task = tokio::spawn(telemetry.run(source));

    tokio::select! {
        _ = tokio::signal::ctrl_c() => {
            info!("Terminating server");
            controller_task.abort();
            telemetry_task.abort();
            let _ = controller_task.await;
            let _ = telemetry_task.await;
            Ok(())
        }
        result = &mut controller_task => {
            telemetry_task.abort();
            match result {
                Ok(Ok(())) => Ok(()),
                Ok(Err(err)) => {
                    error!(%err, "controller task failed");
                    Err(err.into())
                }
                Err(join) => Err(join).context("controller task panicked"),
            }
        }
        result = &mut telemetry_task => {
            controller_task.abort();
            match result {
                Ok(Ok(())) => Ok(()),
                Ok(Err(err)) => {
                    error!(%err, "telemetry task failed");
                    Err(err.into())
                }
                Err(join) => Err(join).context("telemetry task panicked"),
            }
        }
    }
}

fn init_logging(
    log_dir: Option<&Path>,
    level: &str,
) -> Result<Option<tracing_appender::non_blocking::WorkerGuard>> {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));

    let stdout_layer = tracing_subscriber::fmt::layer()
        .with_target(true)
        .with_thread_ids(false);

    match log_dir {
        Some(dir) => {
            std::fs::create_dir_all(dir)
                .with_context(|| format!("creating log directory {}", dir.display()))?;
            let file_appender = RollingFileAppender::new(Rotation::DAILY, dir, "padd.log");
            let (non_blocking_file, guard) = tracing_appender::non_blocking(file_appender);
            let file_layer = tracing_subscriber::fmt::layer()
                .with_writer(non_blocking_file)
                .with_ansi(false)
                .with_target(true);
            tracing_subscriber::registry()
                .with(filter)
                .with(stdout_layer)
                .with(file_layer)
                .init();
            Ok(Some(guard))
        }
        None => {
            tracing_subscriber::registry()
                .with(filter)
                .with(stdout_layer)
                .init();
            Ok(None)
        }
    }
}
