//! Per-channel calibration curves.
//!
//! Raw ADC counts become voltages through the converter's full-scale range,
//! then each channel type maps voltage to its physical quantity. The
//! constants match the pad's installed transducers and are part of the
//! system's calibration record; change them only against new bench data.

/// ADC full-scale range in volts at PGA setting 0.
pub const ADC_FSR_VOLTS: f64 = 6.144;

/// Thermistor bridge reference resistance in ohms.
pub const THERMISTOR_REF_OHMS: f64 = 2948.0;

/// Thermistor bridge supply voltage.
pub const THERMISTOR_SUPPLY_VOLTS: f64 = 4.945;

/// Continuity Schmitt threshold: at or below this the circuit reads open.
pub const CONTINUITY_THRESHOLD_VOLTS: f64 = 1.0;

/// Load cell output span in volts.
pub const THRUST_MAX_VOLTS: f64 = 5.053;

/// Load cell thrust at full output, in Newtons.
pub const THRUST_MAX_NEWTONS: f64 = 11120.5;

/// Convert a signed 16-bit ADC count to volts.
pub fn adc_voltage(raw: i16) -> f64 {
    f64::from(raw) * ADC_FSR_VOLTS / 32768.0
}

fn map_value(value: f64, in_min: f64, in_max: f64, out_min: f64, out_max: f64) -> f64 {
    let slope = (out_max - out_min) / (in_max - in_min);
    out_min + slope * (value - in_min)
}

/// Pressure transducer: linear 1-5 V over 0..`max_psi`, in thousandths of a
/// PSI. Below the 1 V live-zero the transducer is unpowered or disconnected
/// and the reading is clamped to zero.
pub fn pressure_millipsi(voltage: f64, max_psi: f64) -> i32 {
    if voltage < 1.0 {
        return 0;
    }
    (1000.0 * map_value(voltage, 1.0, 5.0, 0.0, max_psi)) as i32
}

/// Load cell: linear 0-5.053 V over 0..11120.5 N.
pub fn thrust_newtons(voltage: f64) -> u32 {
    map_value(voltage, 0.0, THRUST_MAX_VOLTS, 0.0, THRUST_MAX_NEWTONS).max(0.0) as u32
}

/// Igniter continuity: voltage above the threshold means the circuit is
/// closed.
pub fn continuity_closed(voltage: f64) -> bool {
    voltage > CONTINUITY_THRESHOLD_VOLTS
}

/// Steinhart-Hart coefficients for one thermistor.
#[derive(Debug, Clone, Copy, PartialEq, serde::Deserialize)]
pub struct SteinhartHart {
    pub a: f64,
    pub b: f64,
    pub c: f64,
}

impl SteinhartHart {
    /// Bench-fitted coefficients for thermistor 1.
    pub const THERMISTOR_1: Self = Self {
        a: 1.403e-3,
        b: 2.373e-4,
        c: 9.827e-8,
    };

    /// Bench-fitted coefficients for thermistor 2.
    pub const THERMISTOR_2: Self = Self {
        a: 1.468e-3,
        b: 2.383e-4,
        c: 1.007e-7,
    };

    /// Coefficients installed for a given sensor ID.
    pub fn for_sensor(id: u8) -> Self {
        if id == 0 {
            Self::THERMISTOR_1
        } else {
            Self::THERMISTOR_2
        }
    }

    /// Thermistor temperature in millidegrees Celsius. Non-positive voltage
    /// or resistance reads zero (open bridge).
    pub fn millicelsius(&self, voltage: f64) -> i32 {
        if voltage <= 0.0 {
            return 0;
        }
        let resistance = THERMISTOR_REF_OHMS / ((THERMISTOR_SUPPLY_VOLTS / voltage) - 1.0);
        if resistance <= 0.0 {
            return 0;
        }
        let ln_r = resistance.ln();
        let kelvin = 1.0 / (self.a + self.b * ln_r + self.c * ln_r.powi(3));
        ((kelvin - 273.15) * 1000.0) as i32
    }
}

/// Load cell mass calibration: a tared zero point and one known weight.
#[derive(Debug, Clone, Copy, PartialEq, serde::Deserialize)]
pub struct MassCalibration {
    pub zero_point: f64,
    pub known_mass_grams: f64,
    pub known_point: f64,
}

impl MassCalibration {
    pub fn grams(&self, raw: f64) -> i32 {
        let span = self.known_point - self.zero_point;
        if span == 0.0 {
            return 0;
        }
        ((raw - self.zero_point) * self.known_mass_grams / span) as i32
    }

    /// Compute a zero point the way the pad does at startup: discard the
    /// first readings while the bridge settles, then average the rest.
    pub fn tare(samples: &[f64], discard: usize) -> f64 {
        let kept = &samples[discard.min(samples.len())..];
        if kept.is_empty() {
            return 0.0;
        }
        kept.iter().sum::<f64>() / kept.len() as f64
    }
}
