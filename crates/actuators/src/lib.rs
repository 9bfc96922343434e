//! On/off actuator capability for the pad server.
//!
//! Every pad-side device that responds to on/off (solenoid valve, servo,
//! ignition circuit) is driven through one of three variants: a GPIO line,
//! a PWM servo channel, or a mock that only logs. Each variant owns its
//! typed device configuration; the pad state holds the actuator and calls
//! it while the state write lock is held, which serializes hardware access.

use std::fs::OpenOptions;
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, AtomicU32, Ordering};
use std::sync::Arc;

use serde::Deserialize;
use thiserror::Error;
use tracing::info;

/// Default PWM carrier frequency. Most servos want a pulse every few
/// milliseconds; 250 Hz gives headroom for out-of-spec pulse widths.
pub const DEFAULT_PWM_FREQUENCY_HZ: u32 = 250;

#[derive(Debug, Error)]
pub enum ActuatorError {
    #[error("failed to drive {device}: {source}")]
    Io {
        device: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("injected mock failure")]
    Injected,
}

/// An actuator and its hardware binding.
pub enum Actuator {
    Gpio(GpioActuator),
    Pwm(PwmActuator),
    Mock(MockActuator),
}

impl Actuator {
    pub fn turn_on(&mut self) -> Result<(), ActuatorError> {
        match self {
            Self::Gpio(gpio) => gpio.write_level(true),
            Self::Pwm(pwm) => pwm.send_pulse(false),
            Self::Mock(mock) => mock.set(true),
        }
    }

    pub fn turn_off(&mut self) -> Result<(), ActuatorError> {
        match self {
            Self::Gpio(gpio) => gpio.write_level(false),
            Self::Pwm(pwm) => pwm.send_pulse(true),
            Self::Mock(mock) => mock.set(false),
        }
    }

    /// Build an actuator from a config table entry.
    pub fn from_config(name: &str, config: &ActuatorConfig) -> Self {
        match config.kind {
            ActuatorKind::Gpio => Self::Gpio(GpioActuator::new(&config.device)),
            ActuatorKind::Pwm => Self::Pwm(PwmActuator::new(
                &config.device,
                config.open_duty_ns,
                config.close_duty_ns,
                config.frequency_hz,
            )),
            ActuatorKind::Mock => Self::Mock(MockActuator::new(name)),
        }
    }
}

/// Hardware binding of one actuator in the daemon config file.
#[derive(Debug, Clone, Deserialize)]
pub struct ActuatorConfig {
    pub kind: ActuatorKind,
    #[serde(default)]
    pub device: PathBuf,
    #[serde(default = "default_open_duty")]
    pub open_duty_ns: u32,
    #[serde(default = "default_close_duty")]
    pub close_duty_ns: u32,
    #[serde(default = "default_frequency")]
    pub frequency_hz: u32,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ActuatorKind {
    Gpio,
    Pwm,
    Mock,
}

fn default_open_duty() -> u32 {
    2_000_000
}

fn default_close_duty() -> u32 {
    1_000_000
}

fn default_frequency() -> u32 {
    DEFAULT_PWM_FREQUENCY_HZ
}

/// Signal-level GPIO output. The device is opened, written and closed per
/// actuation so a wedged line never holds a descriptor.
pub struct GpioActuator {
    device: PathBuf,
}

impl GpioActuator {
    pub fn new(device: impl Into<PathBuf>) -> Self {
        Self {
            device: device.into(),
        }
    }

    fn write_level(&self, high: bool) -> Result<(), ActuatorError> {
        write_file(&self.device, if high { b"1" } else { b"0" })
    }
}

/// PWM servo channel. Turning the valve on sends the close-duty pulse and
/// turning it off sends the open-duty pulse; the plumbing is normally open.
pub struct PwmActuator {
    /// Channel directory containing `period`, `duty_cycle` and `enable`.
    device: PathBuf,
    open_duty_ns: u32,
    close_duty_ns: u32,
    frequency_hz: u32,
}

impl PwmActuator {
    pub fn new(
        device: impl Into<PathBuf>,
        open_duty_ns: u32,
        close_duty_ns: u32,
        frequency_hz: u32,
    ) -> Self {
        Self {
            device: device.into(),
            open_duty_ns,
            close_duty_ns,
            frequency_hz,
        }
    }

    fn send_pulse(&self, open: bool) -> Result<(), ActuatorError> {
        let period_ns = 1_000_000_000 / self.frequency_hz;
        let duty_ns = if open {
            self.open_duty_ns
        } else {
            self.close_duty_ns
        };

        write_file(&self.device.join("period"), period_ns.to_string().as_bytes())?;
        write_file(
            &self.device.join("duty_cycle"),
            duty_ns.to_string().as_bytes(),
        )?;
        write_file(&self.device.join("enable"), b"1")
    }
}

fn write_file(path: &Path, bytes: &[u8]) -> Result<(), ActuatorError> {
    let io = |source| ActuatorError::Io {
        device: path.to_path_buf(),
        source,
    };
    let mut file = OpenOptions::new().write(true).open(path).map_err(io)?;
    file.write_all(bytes).map_err(io)
}

/// Mock actuator: logs transitions and counts calls so tests can assert on
/// hardware activity. Failure injection exercises the hardware-error path.
pub struct MockActuator {
    name: String,
    counters: MockCounters,
}

impl MockActuator {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            counters: MockCounters::default(),
        }
    }

    /// Handle for observing this mock from a test.
    pub fn counters(&self) -> MockCounters {
        self.counters.clone()
    }

    fn set(&self, on: bool) -> Result<(), ActuatorError> {
        if self.counters.fail.load(Ordering::SeqCst) {
            return Err(ActuatorError::Injected);
        }
        if on {
            self.counters.on_calls.fetch_add(1, Ordering::SeqCst);
        } else {
            self.counters.off_calls.fetch_add(1, Ordering::SeqCst);
        }
        info!(actuator = %self.name, state = if on { "on" } else { "off" }, "mock actuation");
        Ok(())
    }
}

/// Shared observation handle for a [`MockActuator`].
#[derive(Clone, Default)]
pub struct MockCounters {
    on_calls: Arc<AtomicU32>,
    off_calls: Arc<AtomicU32>,
    fail: Arc<AtomicBool>,
}

impl MockCounters {
    pub fn on_calls(&self) -> u32 {
        self.on_calls.load(Ordering::SeqCst)
    }

    pub fn off_calls(&self) -> u32 {
        self.off_calls.load(Ordering::SeqCst)
    }

    pub fn total_calls(&self) -> u32 {
        self.on_calls() + self.off_calls()
    }

    /// Make every subsequent hardware call fail.
    pub fn set_fail(&self, fail: bool) {
        self.fail.store(fail, Ordering::SeqCst);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn mock_counts_calls() {
        let mut act = Actuator::Mock(MockActuator::new("XV-1"));
        let counters = match &act {
            Actuator::Mock(mock) => mock.counters(),
            _ => unreachable!(),
        };

        act.turn_on().unwrap();
        act.turn_on().unwrap();
        act.turn_off().unwrap();
        assert_eq!(counters.on_calls(), 2);
        assert_eq!(counters.off_calls(), 1);
    }

    #[test]
    fn mock_failure_injection() {
        let mock = MockActuator::new("Igniter");
        let counters = mock.counters();
        let mut act = Actuator::Mock(mock);

        counters.set_fail(true);
        assert!(matches!(act.turn_on(), Err(ActuatorError::Injected)));
        assert_eq!(counters.total_calls(), 0);

        counters.set_fail(false);
        act.turn_on().unwrap();
        assert_eq!(counters.on_calls(), 1);
    }

    #[test]
    fn gpio_reports_missing_device() {
        let mut act = Actuator::Gpio(GpioActuator::new("/nonexistent/gpio99"));
        match act.turn_on() {
            Err(ActuatorError::Io { device, .. }) => {
                assert_eq!(device, PathBuf::from("/nonexistent/gpio99"));
            }
            other => panic!("expected io error, got {other:?}"),
        }
    }

    #[test]
    fn config_defaults() {
        let config: ActuatorConfig = toml::from_str("kind = \"mock\"").unwrap();
        assert_eq!(config.kind, ActuatorKind::Mock);
        assert_eq!(config.frequency_hz, DEFAULT_PWM_FREQUENCY_HZ);
    }
}
