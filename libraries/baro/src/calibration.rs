use hal::Clock;
use log::{debug, info, warn};

use crate::frontend::{Baro, ExternalTemperature};
use crate::instance::{BaroType, CalibrationState, GroundReference};

impl<C: Clock> Baro<C> {
    /// Take the current readings of every registered sensor as its ground
    /// reference.
    ///
    /// Sensors that have not produced a usable reading yet stay
    /// uncalibrated. Water sensors are referenced to the persisted base
    /// pressure, which is taken from the current reading when it is unset or
    /// a reset was requested.
    pub fn calibrate(&mut self) {
        for i in 0..self.num_sensors {
            if !self.sensors[i].has_valid_reading() {
                warn!("baro: instance {} has no valid reading, not calibrated", i);
                continue;
            }

            let temperature = self.get_calibration_temperature_of(i);
            let sensor = &mut self.sensors[i];
            let pressure = match sensor.kind {
                BaroType::Air => sensor.pressure,
                BaroType::Water => {
                    let options = &mut self.options;
                    if options.base_pressure <= 0.0 || options.reset_base_pressure {
                        options.base_pressure = sensor.pressure;
                        options.reset_base_pressure = false;
                        info!("baro: water base pressure set to {}", sensor.pressure);
                    }
                    options.base_pressure
                }
            };

            sensor.ground = GroundReference {
                pressure,
                temperature,
            };
            sensor.state = CalibrationState::Calibrated;
            info!(
                "baro: instance {} calibrated at {} Pa {} C",
                i, pressure, temperature
            );
            self.derive_altitude(i);
        }

        self.eas2tas_cache = None;
        self.save_params();
    }

    /// Move every healthy sensor's ground pressure a fraction of the way
    /// toward its current pressure.
    ///
    /// Only meaningful while the vehicle is stationary on the ground. The
    /// ground temperature is left alone.
    pub fn update_calibration(&mut self) {
        let fraction = self.config.calibration_update_fraction;
        for i in 0..self.num_sensors {
            if !self.healthy_of(i) {
                continue;
            }
            let sensor = &mut self.sensors[i];
            sensor.ground.pressure += fraction * (sensor.pressure - sensor.ground.pressure);
        }

        self.eas2tas_cache = None;
        self.save_params();
    }

    /// Supply an outside air temperature in Celsius, e.g. from an airspeed
    /// sensor, used for calibration until it times out
    pub fn set_external_temperature(&mut self, temperature: f32) {
        if !temperature.is_finite() {
            warn!("baro: ignoring external temperature {}", temperature);
            return;
        }
        let now = self.clock.millis();
        debug!("baro: external temperature {} C", temperature);
        self.external_temperature = Some(ExternalTemperature {
            temperature,
            set_ms: now,
        });
    }

    /// Temperature the primary sensor would be calibrated with
    pub fn get_calibration_temperature(&self) -> f32 {
        self.get_calibration_temperature_of(self.primary)
    }

    /// Temperature instance `instance` would be calibrated with: a fresh
    /// external temperature as given, else the sensor temperature capped
    /// when a cap is configured
    pub fn get_calibration_temperature_of(&self, instance: usize) -> f32 {
        let now = self.clock.millis();
        let timeout = self.config.external_temperature_timeout_ms;

        match self.external_temperature {
            Some(external) if now.wrapping_sub(external.set_ms) < timeout => {
                external.temperature
            }
            // the cap only guards against board self-heating
            _ => {
                let temperature = self.sensors[instance].temperature;
                match self.config.max_calibration_temperature {
                    Some(cap) => temperature.min(cap),
                    None => temperature,
                }
            }
        }
    }
}
