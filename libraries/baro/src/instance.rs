use hal::BaroSample;

/// Physical medium a pressure sensor is measuring
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum BaroType {
    /// Air pressure; altitude from the barometric formula
    #[default]
    Air,
    /// Water pressure; depth from the hydrostatic gradient
    Water,
}

/// Calibration lifecycle of a sensor slot
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum CalibrationState {
    /// Slot not claimed by any backend
    #[default]
    Unregistered,
    /// Claimed, but no ground reference has been taken yet
    Uncalibrated,
    /// Ground reference taken; stays here for the rest of the run
    Calibrated,
}

/// Pressure and temperature recorded as the altitude zero point
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct GroundReference {
    /// Ground pressure in Pascals
    pub pressure: f32,
    /// Ground temperature in Celsius
    pub temperature: f32,
}

impl Default for GroundReference {
    fn default() -> Self {
        Self {
            pressure: 0.0,
            temperature: 15.0,
        }
    }
}

/// One sensor slot of the frontend
#[derive(Debug, Clone, Copy)]
pub(crate) struct SensorInstance {
    pub(crate) kind: BaroType,
    /// Multiplier from backend-reported units to Pascals
    pub(crate) precision_multiplier: u8,
    pub(crate) last_update_ms: Option<u32>,
    pub(crate) healthy: bool,
    pub(crate) alt_ok: bool,
    pub(crate) state: CalibrationState,
    pub(crate) pressure: f32,
    pub(crate) temperature: f32,
    pub(crate) altitude: f32,
    pub(crate) ground: GroundReference,
}

impl Default for SensorInstance {
    fn default() -> Self {
        Self {
            kind: BaroType::Air,
            precision_multiplier: 1,
            last_update_ms: None,
            healthy: false,
            alt_ok: false,
            state: CalibrationState::Unregistered,
            pressure: 0.0,
            temperature: 0.0,
            altitude: 0.0,
            ground: GroundReference::default(),
        }
    }
}

impl SensorInstance {
    /// Store a backend sample, scaling its pressure to Pascals
    pub(crate) fn ingest(&mut self, sample: BaroSample, now_ms: u32) {
        let pressure = sample.pressure * f32::from(self.precision_multiplier);
        let timestamp = if sample.timestamp_ms == 0 {
            now_ms
        } else {
            sample.timestamp_ms
        };
        self.ingest_pascals(pressure, sample.temperature, timestamp);
    }

    pub(crate) fn ingest_pascals(&mut self, pressure: f32, temperature: f32, timestamp_ms: u32) {
        self.pressure = pressure;
        self.temperature = temperature;
        self.last_update_ms = Some(timestamp_ms);
    }

    /// At least one sample with a usable pressure has arrived
    pub(crate) fn has_valid_reading(&self) -> bool {
        self.last_update_ms.is_some() && self.pressure.is_finite() && self.pressure > 0.0
    }

    pub(crate) fn refresh_health(&mut self, now_ms: u32, timeout_ms: u32) {
        self.healthy = match self.last_update_ms {
            Some(last) => {
                let age = now_ms.wrapping_sub(last);
                // samples stamped ahead of the clock count as fresh
                let age = if age > u32::MAX / 2 { 0 } else { age };
                age < timeout_ms && self.has_valid_reading()
            }
            None => false,
        };
    }

    pub(crate) fn calibrated(&self) -> bool {
        self.state == CalibrationState::Calibrated
    }

    /// Healthy, altitude ok and calibrated
    pub(crate) fn usable(&self) -> bool {
        self.healthy && self.alt_ok && self.calibrated()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_ingest_applies_precision_multiplier() {
        let mut sensor = SensorInstance {
            precision_multiplier: 10,
            ..Default::default()
        };
        sensor.ingest(BaroSample::new(10_132.5, 12.0), 40);
        assert_eq!(sensor.pressure, 101_325.0);
        assert_eq!(sensor.temperature, 12.0);
        assert_eq!(sensor.last_update_ms, Some(40));
    }

    #[test]
    fn test_ingest_keeps_backend_timestamp() {
        let mut sensor = SensorInstance::default();
        sensor.ingest(BaroSample::at(100_000.0, 20.0, 1234), 99);
        assert_eq!(sensor.last_update_ms, Some(1234));
    }

    #[test]
    fn test_health_window() {
        let mut sensor = SensorInstance::default();
        sensor.refresh_health(0, 500);
        assert!(!sensor.healthy, "no sample yet");

        sensor.ingest(BaroSample::new(100_000.0, 20.0), 1000);
        sensor.refresh_health(1499, 500);
        assert!(sensor.healthy);
        sensor.refresh_health(1500, 500);
        assert!(!sensor.healthy, "sample is stale");
    }

    #[test]
    fn test_zero_pressure_is_unhealthy() {
        let mut sensor = SensorInstance::default();
        sensor.ingest(BaroSample::new(0.0, 20.0), 1000);
        sensor.refresh_health(1000, 500);
        assert!(!sensor.healthy);
        assert!(!sensor.has_valid_reading());
    }

    #[test]
    fn test_future_sample_counts_as_fresh() {
        let mut sensor = SensorInstance::default();
        sensor.ingest(BaroSample::at(95_000.0, 10.0, 2000), 0);
        sensor.refresh_health(1000, 500);
        assert!(sensor.healthy);
    }

    #[test]
    fn test_usable_needs_all_flags() {
        let mut sensor = SensorInstance::default();
        sensor.healthy = true;
        sensor.alt_ok = true;
        assert!(!sensor.usable());
        sensor.state = CalibrationState::Calibrated;
        assert!(sensor.usable());
        sensor.alt_ok = false;
        assert!(!sensor.usable());
    }
}
