//! Sensor sampling for the pad server's telemetry stream.
//!
//! A [`SensorSource`] yields typed measurements each sampling pass. The ADC
//! source drives real (or mock) converter hardware through per-channel
//! calibrations; the replay source loops over a recorded CSV file and exists
//! so the rest of the system can be exercised with no hardware at all.

use thiserror::Error;

pub mod calibration;
mod mass;
mod replay;
mod sources;

pub use calibration::{MassCalibration, SteinhartHart};
pub use mass::{CompositeSource, MassSensor, MassSource, MockMassSensor};
pub use replay::ReplaySource;
pub use sources::{AdcDevice, AdcSource, ChannelConfig, ChannelKind, MockAdc};

#[derive(Debug, Error)]
pub enum SensorError {
    #[error("i/o error on {path}: {source}")]
    Io {
        path: std::path::PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("no adc channel {0}")]
    NoSuchChannel(u8),
}

/// One calibrated reading. Timestamps are applied by the telemetry task when
/// the measurement is serialized.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Measurement {
    /// Temperature in millidegrees Celsius.
    Temperature { id: u8, millicelsius: i32 },
    /// Pressure in thousandths of a PSI.
    Pressure { id: u8, millipsi: i32 },
    /// Mass in grams.
    Mass { id: u8, grams: i32 },
    /// Thrust in Newtons.
    Thrust { id: u8, newtons: u32 },
    /// Igniter continuity.
    Continuity { closed: bool },
}

/// A source of measurements, polled once per sampling pass.
pub trait SensorSource: Send {
    fn sample(&mut self) -> Result<Vec<Measurement>, SensorError>;
}
