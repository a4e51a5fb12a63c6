//! Barometer frontend: instance registry, update cycle and accessors

use alloc::boxed::Box;

use hal::{BaroBackend, BaroSample, BaroSink, Clock, InstanceHandle};
use heapless::Vec;
use log::{debug, info};
#[allow(unused_imports)]
use num_traits::Float;

use crate::atmosphere::{
    altitude_difference, water_depth, Atmosphere, C_TO_KELVIN, ISA_GAS_CONSTANT, SSL_AIR_DENSITY,
};
use crate::config::{BaroConfig, BaroOptions, BaroParams, ParamStore};
use crate::derivative::DerivativeFilter;
use crate::error::{check, BaroError, BaroResult};
use crate::hil::HilState;
use crate::instance::{BaroType, CalibrationState, GroundReference, SensorInstance};
use crate::notify::CalibrationNotifier;

/// Maximum number of sensor instances
pub const BARO_MAX_INSTANCES: usize = 3;

/// Maximum number of backend drivers
pub const BARO_MAX_DRIVERS: usize = 3;

/// EAS2TAS value and the primary altitude it was computed at
#[derive(Debug, Clone, Copy)]
pub(crate) struct Eas2TasCache {
    altitude: f32,
    value: f32,
}

/// Temperature injected by another sensor, e.g. an airspeed sensor
#[derive(Debug, Clone, Copy)]
pub(crate) struct ExternalTemperature {
    pub(crate) temperature: f32,
    pub(crate) set_ms: u32,
}

/// Collects what a backend publishes during one update
#[derive(Default)]
struct PendingSample(Option<BaroSample>);

impl BaroSink for PendingSample {
    fn publish(&mut self, sample: BaroSample) {
        self.0 = Some(sample);
    }
}

/// Barometer frontend.
///
/// Owns up to [`BARO_MAX_INSTANCES`] sensor slots, the backends feeding
/// them, and everything derived from their readings. Accessors without an
/// instance argument read the primary instance; the `_of` variants take an
/// explicit instance index, and panic when it is outside the slot table.
pub struct Baro<C: Clock> {
    pub(crate) clock: C,
    pub(crate) config: BaroConfig,
    pub(crate) options: BaroOptions,
    store: Option<Box<dyn ParamStore>>,
    notifier: Option<Box<dyn CalibrationNotifier>>,

    pub(crate) sensors: [SensorInstance; BARO_MAX_INSTANCES],
    pub(crate) num_sensors: usize,
    drivers: Vec<Box<dyn BaroBackend>, BARO_MAX_DRIVERS>,
    pub(crate) primary: usize,

    alt_offset_active: f32,
    pub(crate) eas2tas_cache: Option<Eas2TasCache>,
    pub(crate) external_temperature: Option<ExternalTemperature>,
    climb_rate_filter: DerivativeFilter<7>,

    pub(crate) hil: HilState,
    pub(crate) hil_mode: bool,

    last_notify_ms: Option<u32>,
    notified_ground: [Option<GroundReference>; BARO_MAX_INSTANCES],
}

impl<C: Clock> Baro<C> {
    /// Create a frontend with no sensors
    pub fn new(config: BaroConfig, clock: C) -> BaroResult<Self> {
        config.validate()?;

        Ok(Self {
            clock,
            config,
            options: BaroOptions::default(),
            store: None,
            notifier: None,
            sensors: [SensorInstance::default(); BARO_MAX_INSTANCES],
            num_sensors: 0,
            drivers: Vec::new(),
            primary: 0,
            alt_offset_active: 0.0,
            eas2tas_cache: None,
            external_temperature: None,
            climb_rate_filter: DerivativeFilter::new(),
            hil: HilState::default(),
            hil_mode: false,
            last_notify_ms: None,
            notified_ground: [None; BARO_MAX_INSTANCES],
        })
    }

    /// Attach persistent storage and load the saved parameters from it
    pub fn with_param_store(mut self, mut store: Box<dyn ParamStore>) -> BaroResult<Self> {
        if let Some(params) = store.load() {
            params.validate()?;
            self.options = params.options;
            for (sensor, ground) in self.sensors.iter_mut().zip(params.ground) {
                sensor.ground = ground;
            }
            // the drift offset is not ramped in from zero after a restart
            self.alt_offset_active = params.options.alt_offset;
            info!(
                "baro: loaded parameters, primary {} base pressure {}",
                params.options.primary_baro, params.options.base_pressure
            );
        }
        self.store = Some(store);
        Ok(self)
    }

    /// Attach the ground-station notification channel
    pub fn with_notifier(mut self, notifier: Box<dyn CalibrationNotifier>) -> Self {
        self.notifier = Some(notifier);
        self
    }

    /// Tunables in use
    pub fn config(&self) -> &BaroConfig {
        &self.config
    }

    /// Current persisted parameter set
    pub fn params(&self) -> BaroParams {
        let mut ground = [GroundReference::default(); BARO_MAX_INSTANCES];
        for (slot, sensor) in ground.iter_mut().zip(self.sensors.iter()) {
            *slot = sensor.ground;
        }
        BaroParams {
            options: self.options,
            ground,
        }
    }

    pub(crate) fn save_params(&mut self) {
        let params = self.params();
        if let Some(store) = self.store.as_mut() {
            store.save(&params);
        }
    }

    // Registry

    /// Claim the next free sensor slot.
    ///
    /// Panics when all [`BARO_MAX_INSTANCES`] slots are taken: the table
    /// size is fixed, so this is a startup configuration defect.
    pub fn register_sensor(&mut self) -> InstanceHandle {
        if self.num_sensors >= BARO_MAX_INSTANCES {
            panic!(
                "baro: too many sensors, only {} slots available",
                BARO_MAX_INSTANCES
            );
        }
        let index = self.num_sensors;
        self.sensors[index].state = CalibrationState::Uncalibrated;
        self.num_sensors += 1;
        info!("baro: registered instance {}", index);
        InstanceHandle::new(index as u8)
    }

    /// Claim a slot and install the backend that publishes into it.
    ///
    /// `build` receives the claimed handle. Panics when the slot or driver
    /// table is full.
    pub fn add_backend<F>(&mut self, build: F) -> InstanceHandle
    where
        F: FnOnce(InstanceHandle) -> Box<dyn BaroBackend>,
    {
        let handle = self.register_sensor();
        let backend = build(handle);
        assert_eq!(
            backend.instance(),
            handle,
            "baro: backend must publish into the slot it was given"
        );
        if self.drivers.push(backend).is_err() {
            panic!(
                "baro: too many drivers, only {} available",
                BARO_MAX_DRIVERS
            );
        }
        handle
    }

    /// Number of registered sensors
    pub fn num_instances(&self) -> usize {
        self.num_sensors
    }

    /// Set the medium measured by an instance
    pub fn set_type(&mut self, instance: usize, kind: BaroType) {
        self.sensors[instance].kind = kind;
    }

    /// Medium measured by an instance
    pub fn get_type(&self, instance: usize) -> BaroType {
        self.sensors[instance].kind
    }

    /// Set the multiplier from backend-reported pressure to Pascals
    pub fn set_precision_multiplier(&mut self, instance: usize, multiplier: u8) {
        self.sensors[instance].precision_multiplier = multiplier;
    }

    /// Multiplier from backend-reported pressure to Pascals
    pub fn get_precision_multiplier(&self, instance: usize) -> u8 {
        self.sensors[instance].precision_multiplier
    }

    /// Calibration lifecycle state of an instance
    pub fn calibration_state(&self, instance: usize) -> CalibrationState {
        self.sensors[instance].state
    }

    /// Ingest a reading for `handle` from a backend running outside the
    /// update cycle.
    ///
    /// The last reading before an update wins. Readings for an instance
    /// under HIL control are dropped.
    pub fn publish(&mut self, handle: InstanceHandle, sample: BaroSample) {
        let index = handle.index();
        if self.hil_controls(index) {
            debug!("baro: dropped backend sample for HIL instance {}", index);
            return;
        }
        let now = self.clock.millis();
        self.sensors[index].ingest(sample, now);
    }

    /// Let backends take intermediate readings between updates
    pub fn accumulate(&mut self) {
        let hil_target = self.hil_target();
        for driver in self.drivers.iter_mut() {
            if Some(driver.instance().index()) != hil_target {
                driver.accumulate();
            }
        }
    }

    // Update cycle

    /// Run one update cycle.
    ///
    /// Polls the backends (or substitutes HIL data), refreshes health and
    /// derived altitude of every instance, resolves the primary, feeds the
    /// climb rate filter, refreshes EAS2TAS, ramps the drift offset and
    /// notifies the ground station of changed ground references.
    pub fn update(&mut self) {
        let now = self.clock.millis();

        self.poll_backends(now);
        if self.hil_mode {
            self.apply_hil_sample(now);
        }

        let timeout = self.config.health_timeout_ms;
        for i in 0..self.num_sensors {
            self.sensors[i].refresh_health(now, timeout);
            if self.sensors[i].healthy {
                self.derive_altitude(i);
            }
        }
        if self.hil_mode {
            self.apply_hil_altitude();
        }

        self.select_primary();
        if self.healthy() {
            let altitude = self.get_altitude();
            let timestamp = self.get_last_update();
            self.climb_rate_filter.update(altitude, timestamp);
        }
        self.get_eas2tas();

        self.ramp_drift_offset();
        self.notify_ground_reference(now);
    }

    fn poll_backends(&mut self, now: u32) {
        let hil_target = self.hil_target();
        for driver in self.drivers.iter_mut() {
            let index = driver.instance().index();
            if Some(index) == hil_target {
                continue;
            }
            let mut pending = PendingSample::default();
            driver.update(&mut pending);
            if let Some(sample) = pending.0 {
                self.sensors[index].ingest(sample, now);
            }
        }
    }

    /// Recompute the altitude of instance `i` from its ground reference
    pub(crate) fn derive_altitude(&mut self, i: usize) {
        let offset = self.alt_offset_active;
        let specific_gravity = self.options.specific_gravity;
        let max_altitude = self.config.max_altitude_m;

        let sensor = &mut self.sensors[i];
        let altitude = match sensor.kind {
            BaroType::Air => altitude_difference(
                sensor.ground.pressure,
                sensor.pressure,
                sensor.ground.temperature,
            ),
            BaroType::Water => {
                water_depth(sensor.ground.pressure, sensor.pressure, specific_gravity)
            }
        };

        sensor.alt_ok = altitude.is_finite() && altitude.abs() <= max_altitude;
        if sensor.alt_ok {
            sensor.altitude = altitude + offset;
        }
    }

    /// The user's choice when it is healthy, else the first healthy
    /// instance, else the user's choice if registered, else 0
    fn select_primary(&mut self) {
        let preferred = usize::from(self.options.primary_baro);
        let registered = preferred < self.num_sensors;

        self.primary = if registered && self.healthy_of(preferred) {
            preferred
        } else if let Some(i) = (0..self.num_sensors).find(|&i| self.healthy_of(i)) {
            i
        } else if registered {
            preferred
        } else {
            0
        };
    }

    fn ramp_drift_offset(&mut self) {
        let step = self.config.drift_step_m;
        let diff = self.options.alt_offset - self.alt_offset_active;
        self.alt_offset_active += diff.clamp(-step, step);
    }

    fn notify_ground_reference(&mut self, now: u32) {
        let Some(notifier) = self.notifier.as_mut() else {
            return;
        };
        if let Some(last) = self.last_notify_ms {
            if now.wrapping_sub(last) < self.config.notify_interval_ms {
                return;
            }
        }

        let threshold_pa = self.config.notify_threshold_pa;
        let threshold_c = self.config.notify_threshold_c;
        for i in 0..self.num_sensors {
            let sensor = &self.sensors[i];
            if !sensor.calibrated() {
                continue;
            }
            let ground = sensor.ground;
            let material = match self.notified_ground[i] {
                Some(notified) => {
                    (ground.pressure - notified.pressure).abs() >= threshold_pa
                        || (ground.temperature - notified.temperature).abs() >= threshold_c
                }
                None => true,
            };
            if material {
                debug!(
                    "baro: notifying ground reference of instance {}: {} Pa {} C",
                    i, ground.pressure, ground.temperature
                );
                notifier.ground_reference_changed(i, ground.pressure, ground.temperature);
                self.notified_ground[i] = Some(ground);
                self.last_notify_ms = Some(now);
            }
        }
    }

    // Primary selection and health

    /// Index of the instance currently used as primary
    pub fn primary(&self) -> usize {
        self.primary
    }

    /// Choose the primary instance and persist the choice
    pub fn set_primary_baro(&mut self, instance: usize) -> BaroResult<()> {
        if instance >= self.num_sensors {
            return Err(BaroError::InvalidInstance {
                instance,
                registered: self.num_sensors,
            });
        }
        self.options.primary_baro = instance as u8;
        self.select_primary();
        self.save_params();
        info!("baro: primary instance set to {}", instance);
        Ok(())
    }

    /// Primary sensor is healthy, its altitude is ok and it is calibrated
    pub fn healthy(&self) -> bool {
        self.healthy_of(self.primary)
    }

    /// Sensor is healthy, its altitude is ok and it is calibrated
    pub fn healthy_of(&self, instance: usize) -> bool {
        self.sensors[instance].usable()
    }

    /// Every registered sensor is healthy; false with no sensors
    pub fn all_healthy(&self) -> bool {
        self.num_sensors > 0 && (0..self.num_sensors).all(|i| self.healthy_of(i))
    }

    // Accessors

    /// Pressure in Pascals
    pub fn get_pressure(&self) -> f32 {
        self.get_pressure_of(self.primary)
    }

    pub fn get_pressure_of(&self, instance: usize) -> f32 {
        self.sensors[instance].pressure
    }

    /// Temperature in Celsius
    pub fn get_temperature(&self) -> f32 {
        self.get_temperature_of(self.primary)
    }

    pub fn get_temperature_of(&self, instance: usize) -> f32 {
        self.sensors[instance].temperature
    }

    /// Altitude in meters relative to the last calibration, including the
    /// active drift offset
    pub fn get_altitude(&self) -> f32 {
        self.get_altitude_of(self.primary)
    }

    pub fn get_altitude_of(&self, instance: usize) -> f32 {
        self.sensors[instance].altitude
    }

    /// Ground pressure in Pascals; valid after calibration
    pub fn get_ground_pressure(&self) -> f32 {
        self.get_ground_pressure_of(self.primary)
    }

    pub fn get_ground_pressure_of(&self, instance: usize) -> f32 {
        self.sensors[instance].ground.pressure
    }

    /// Ground temperature in Celsius; valid after calibration
    pub fn get_ground_temperature(&self) -> f32 {
        self.get_ground_temperature_of(self.primary)
    }

    pub fn get_ground_temperature_of(&self, instance: usize) -> f32 {
        self.sensors[instance].ground.temperature
    }

    /// Time of the last accepted sample in milliseconds
    pub fn get_last_update(&self) -> u32 {
        self.get_last_update_of(self.primary)
    }

    pub fn get_last_update_of(&self, instance: usize) -> u32 {
        self.sensors[instance].last_update_ms.unwrap_or(0)
    }

    /// Height of `pressure` above `base_pressure`, using the primary's
    /// ground temperature
    pub fn get_altitude_difference(&self, base_pressure: f32, pressure: f32) -> f32 {
        altitude_difference(base_pressure, pressure, self.get_ground_temperature())
    }

    // Derived air data

    /// Air density relative to standard sea level.
    ///
    /// Standard atmosphere density ratio at the primary altitude, scaled by
    /// the ratio of the ground density at calibration to standard sea level
    /// density. 1.0 while there is no usable ground reference.
    pub fn get_air_density_ratio(&self) -> f32 {
        let atmosphere = Atmosphere::at_altitude(self.get_altitude());
        let ground = self.sensors[self.primary].ground;
        let ground_density =
            ground.pressure / (ISA_GAS_CONSTANT * (ground.temperature + C_TO_KELVIN));
        let ratio = atmosphere.sigma * ground_density / SSL_AIR_DENSITY;
        if ratio.is_finite() && ratio > 0.0 {
            ratio
        } else {
            1.0
        }
    }

    /// Scale factor from equivalent to true airspeed.
    ///
    /// Cached until the primary altitude moves by more than the configured
    /// hysteresis or the ground reference changes.
    pub fn get_eas2tas(&mut self) -> f32 {
        let altitude = self.get_altitude();
        if let Some(cache) = self.eas2tas_cache {
            if (altitude - cache.altitude).abs() <= self.config.eas2tas_altitude_hysteresis_m {
                return cache.value;
            }
        }

        let value = 1.0 / self.get_air_density_ratio().sqrt();
        self.eas2tas_cache = Some(Eas2TasCache { altitude, value });
        value
    }

    /// Climb rate in m/s, positive up
    pub fn get_climb_rate(&mut self) -> f32 {
        if self.hil_mode && self.hil.have_alt {
            return self.hil.climb_rate;
        }
        self.climb_rate_filter.slope()
    }

    // Drift injection

    /// Request a drift offset in meters; the active offset ramps toward it
    pub fn set_baro_drift_altitude(&mut self, altitude: f32) -> BaroResult<()> {
        check("alt_offset", altitude, true)?;
        self.options.alt_offset = altitude;
        self.save_params();
        Ok(())
    }

    /// Drift offset currently added to altitudes
    pub fn get_baro_drift_offset(&self) -> f32 {
        self.alt_offset_active
    }

    // Water sensor options

    /// Set the specific gravity of the fluid above water sensors
    pub fn set_specific_gravity(&mut self, specific_gravity: f32) -> BaroResult<()> {
        check("specific_gravity", specific_gravity, specific_gravity > 0.0)?;
        self.options.specific_gravity = specific_gravity;
        self.save_params();
        Ok(())
    }

    /// Set the persistent water surface pressure; zero clears it
    pub fn set_base_pressure(&mut self, pressure: f32) -> BaroResult<()> {
        check("base_pressure", pressure, pressure >= 0.0)?;
        self.options.base_pressure = pressure;
        self.save_params();
        Ok(())
    }

    /// Request a new water base pressure at the next calibration
    pub fn set_reset_base_pressure(&mut self, reset: bool) {
        self.options.reset_base_pressure = reset;
        self.save_params();
    }
}
