//! Digital load-cell mass source.
//!
//! Unlike the analog channels, the mass load cell arrives over its own
//! digital bus and needs a zero point established at startup: the bridge
//! drifts between assemblies, so the pad tares itself against an empty
//! stand, then interpolates against one known calibration weight.

use std::time::Duration;

use tracing::{info, warn};

use crate::calibration::MassCalibration;
use crate::{Measurement, SensorError, SensorSource};

/// Readings to throw away while the bridge settles.
const TARE_DISCARD: usize = 10;
/// Readings averaged into the zero point.
const TARE_SAMPLES: usize = 10;
/// Pause between tare readings.
const TARE_INTERVAL: Duration = Duration::from_millis(100);

/// A digital load cell producing raw force counts. Binding the real bus is
/// platform work; [`MockMassSensor`] stands in everywhere else.
pub trait MassSensor: Send {
    /// The latest raw reading, or `None` when no fresh sample is available.
    fn fetch(&mut self) -> Result<Option<f64>, SensorError>;
}

/// Mass source: tares at construction, then reports calibrated grams for
/// every fresh reading.
pub struct MassSource<S> {
    sensor: S,
    sensor_id: u8,
    calibration: MassCalibration,
}

impl<S: MassSensor> MassSource<S> {
    /// Tare the load cell and build the source. Readings that fail during
    /// taring are retried, as a settling bridge drops samples.
    pub fn calibrated(
        mut sensor: S,
        sensor_id: u8,
        known_mass_grams: f64,
        known_point: f64,
    ) -> Result<Self, SensorError> {
        let mut kept = Vec::with_capacity(TARE_SAMPLES);
        let mut discarded = 0;
        while kept.len() < TARE_SAMPLES {
            match sensor.fetch()? {
                Some(_) if discarded < TARE_DISCARD => discarded += 1,
                Some(raw) => kept.push(raw),
                None => {}
            }
            std::thread::sleep(TARE_INTERVAL);
        }

        let zero_point = MassCalibration::tare(&kept, 0);
        info!(zero_point, "load cell tared");
        Ok(Self {
            sensor,
            sensor_id,
            calibration: MassCalibration {
                zero_point,
                known_mass_grams,
                known_point,
            },
        })
    }

    /// Build the source with a previously recorded calibration, skipping the
    /// startup tare.
    pub fn with_calibration(sensor: S, sensor_id: u8, calibration: MassCalibration) -> Self {
        Self {
            sensor,
            sensor_id,
            calibration,
        }
    }
}

impl<S: MassSensor> SensorSource for MassSource<S> {
    fn sample(&mut self) -> Result<Vec<Measurement>, SensorError> {
        match self.sensor.fetch()? {
            Some(raw) => Ok(vec![Measurement::Mass {
                id: self.sensor_id,
                grams: self.calibration.grams(raw),
            }]),
            None => Ok(Vec::new()),
        }
    }
}

/// Scripted mock load cell.
pub struct MockMassSensor {
    readings: Vec<Option<f64>>,
    next: usize,
}

impl MockMassSensor {
    /// Cycle through `readings` forever.
    pub fn new(readings: Vec<Option<f64>>) -> Self {
        Self { readings, next: 0 }
    }

    /// A load cell resting at a fixed raw value.
    pub fn steady(raw: f64) -> Self {
        Self::new(vec![Some(raw)])
    }
}

impl MassSensor for MockMassSensor {
    fn fetch(&mut self) -> Result<Option<f64>, SensorError> {
        if self.readings.is_empty() {
            return Ok(None);
        }
        let reading = self.readings[self.next % self.readings.len()];
        self.next += 1;
        Ok(reading)
    }
}

/// Runs several sources as one sampling pass, concatenating their output.
pub struct CompositeSource {
    sources: Vec<Box<dyn SensorSource>>,
}

impl CompositeSource {
    pub fn new(sources: Vec<Box<dyn SensorSource>>) -> Self {
        Self { sources }
    }
}

impl SensorSource for CompositeSource {
    fn sample(&mut self) -> Result<Vec<Measurement>, SensorError> {
        let mut out = Vec::new();
        for source in &mut self.sources {
            match source.sample() {
                Ok(measurements) => out.extend(measurements),
                // One failed bus must not silence the others.
                Err(err) => warn!(%err, "sensor source failed this pass"),
            }
        }
        Ok(out)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn steady_sensor_reads_its_calibrated_mass() {
        let sensor = MockMassSensor::steady(1500.0);
        let mut source = MassSource::with_calibration(
            sensor,
            0,
            MassCalibration {
                zero_point: 1000.0,
                known_mass_grams: 500.0,
                known_point: 2000.0,
            },
        );
        assert_eq!(
            source.sample().unwrap(),
            vec![Measurement::Mass { id: 0, grams: 250 }]
        );
    }

    #[test]
    fn stale_sensor_yields_nothing() {
        let mut source = MassSource::with_calibration(
            MockMassSensor::new(vec![None]),
            0,
            MassCalibration {
                zero_point: 0.0,
                known_mass_grams: 1.0,
                known_point: 1.0,
            },
        );
        assert_eq!(source.sample().unwrap(), Vec::new());
    }

    #[test]
    fn composite_concatenates_sources() {
        let a = MassSource::with_calibration(
            MockMassSensor::steady(2.0),
            0,
            MassCalibration {
                zero_point: 0.0,
                known_mass_grams: 1000.0,
                known_point: 1.0,
            },
        );
        let b = MassSource::with_calibration(
            MockMassSensor::steady(3.0),
            1,
            MassCalibration {
                zero_point: 0.0,
                known_mass_grams: 1000.0,
                known_point: 1.0,
            },
        );
        let mut composite = CompositeSource::new(vec![Box::new(a), Box::new(b)]);
        assert_eq!(
            composite.sample().unwrap(),
            vec![
                Measurement::Mass { id: 0, grams: 2000 },
                Measurement::Mass { id: 1, grams: 3000 },
            ]
        );
    }
}
