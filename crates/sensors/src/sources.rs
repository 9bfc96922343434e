//! ADC-backed sensor source.

use serde::Deserialize;

use crate::calibration::{self, SteinhartHart};
use crate::{Measurement, SensorError, SensorSource};

/// An analog converter: trigger one conversion pass, then read channels.
///
/// Binding this to a real ADS1115-style converter is platform work; the
/// core ships [`MockAdc`] for desktop runs and tests.
pub trait AdcDevice: Send {
    fn trigger(&mut self) -> Result<(), SensorError>;
    fn read(&mut self, channel: u8) -> Result<i16, SensorError>;
}

/// What a configured ADC channel measures.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ChannelKind {
    Pressure,
    Thrust,
    Temperature,
    Continuity,
}

/// One ADC channel binding from the daemon config file.
#[derive(Debug, Clone, Deserialize)]
pub struct ChannelConfig {
    pub channel: u8,
    pub sensor_id: u8,
    pub kind: ChannelKind,
    /// Pressure transducer full-scale, PSI. Sensors 4 and 5 are the
    /// 2500 PSI units on the feed side; the rest are 1000 PSI.
    #[serde(default)]
    pub max_psi: Option<f64>,
    /// Thermistor coefficient override.
    #[serde(default)]
    pub steinhart_hart: Option<SteinhartHart>,
}

impl ChannelConfig {
    fn max_psi(&self) -> f64 {
        self.max_psi.unwrap_or(match self.sensor_id {
            4 | 5 => 2500.0,
            _ => 1000.0,
        })
    }

    fn coefficients(&self) -> SteinhartHart {
        self.steinhart_hart
            .unwrap_or_else(|| SteinhartHart::for_sensor(self.sensor_id))
    }
}

/// Samples every configured channel off one ADC device per pass.
pub struct AdcSource {
    device: Box<dyn AdcDevice>,
    channels: Vec<ChannelConfig>,
}

impl AdcSource {
    pub fn new(device: Box<dyn AdcDevice>, channels: Vec<ChannelConfig>) -> Self {
        Self { device, channels }
    }
}

impl SensorSource for AdcSource {
    fn sample(&mut self) -> Result<Vec<Measurement>, SensorError> {
        self.device.trigger()?;
        let mut out = Vec::with_capacity(self.channels.len());
        for config in &self.channels {
            let raw = self.device.read(config.channel)?;
            let voltage = calibration::adc_voltage(raw);
            out.push(match config.kind {
                ChannelKind::Pressure => Measurement::Pressure {
                    id: config.sensor_id,
                    millipsi: calibration::pressure_millipsi(voltage, config.max_psi()),
                },
                ChannelKind::Thrust => Measurement::Thrust {
                    id: config.sensor_id,
                    newtons: calibration::thrust_newtons(voltage),
                },
                ChannelKind::Temperature => Measurement::Temperature {
                    id: config.sensor_id,
                    millicelsius: config.coefficients().millicelsius(voltage),
                },
                ChannelKind::Continuity => Measurement::Continuity {
                    closed: calibration::continuity_closed(voltage),
                },
            });
        }
        Ok(out)
    }
}

/// Fixed-level mock converter.
pub struct MockAdc {
    levels: [i16; 8],
}

impl MockAdc {
    pub fn new(levels: [i16; 8]) -> Self {
        Self { levels }
    }

    /// All channels idle at a benign live-zero voltage.
    pub fn quiescent() -> Self {
        Self::new([Self::raw_from_volts(1.0); 8])
    }

    /// Raw count producing approximately `volts` after conversion.
    pub fn raw_from_volts(volts: f64) -> i16 {
        (volts * 32768.0 / calibration::ADC_FSR_VOLTS) as i16
    }
}

impl AdcDevice for MockAdc {
    fn trigger(&mut self) -> Result<(), SensorError> {
        Ok(())
    }

    fn read(&mut self, channel: u8) -> Result<i16, SensorError> {
        self.levels
            .get(channel as usize)
            .copied()
            .ok_or(SensorError::NoSuchChannel(channel))
    }
}
