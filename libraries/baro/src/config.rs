//! Frontend configuration and persisted parameters
//!
//! [`BaroConfig`] holds the tunables fixed when the frontend is built.
//! [`BaroParams`] is the set of values that survive a restart; it is loaded
//! from and saved to a [`ParamStore`] supplied by the composition root.

#[cfg(any(test, feature = "std"))]
use std::sync::{Arc, Mutex};

use crate::error::{check, BaroResult};
use crate::instance::GroundReference;
use crate::BARO_MAX_INSTANCES;

/// Build-time tunables of the frontend
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BaroConfig {
    /// A sensor without a sample for this long is unhealthy
    pub health_timeout_ms: u32,

    /// How long an externally supplied temperature stays valid
    pub external_temperature_timeout_ms: u32,

    /// Fraction of the ground-to-current pressure error removed by each
    /// incremental calibration update, in (0, 1]
    pub calibration_update_fraction: f32,

    /// Largest change of the active drift offset per update, in meters
    pub drift_step_m: f32,

    /// Primary altitude change that invalidates the cached EAS2TAS, in meters
    pub eas2tas_altitude_hysteresis_m: f32,

    /// Derived altitudes beyond ± this many meters are not plausible
    pub max_altitude_m: f32,

    /// Minimum spacing between calibration notifications
    pub notify_interval_ms: u32,

    /// Ground pressure change worth notifying, in Pascals
    pub notify_threshold_pa: f32,

    /// Ground temperature change worth notifying, in degrees Celsius
    pub notify_threshold_c: f32,

    /// Cap on the sensor temperature used for calibration, for boards whose
    /// barometer self-heats
    pub max_calibration_temperature: Option<f32>,
}

impl Default for BaroConfig {
    fn default() -> Self {
        Self {
            health_timeout_ms: 500,
            external_temperature_timeout_ms: 5000,
            calibration_update_fraction: 0.1,
            drift_step_m: 0.05,
            eas2tas_altitude_hysteresis_m: 25.0,
            max_altitude_m: 40_000.0,
            notify_interval_ms: 10_000,
            notify_threshold_pa: 1.0,
            notify_threshold_c: 0.5,
            max_calibration_temperature: None,
        }
    }
}

impl BaroConfig {
    /// Check every tunable is finite and in range
    pub fn validate(&self) -> BaroResult<()> {
        check(
            "health_timeout_ms",
            self.health_timeout_ms as f32,
            self.health_timeout_ms > 0,
        )?;
        check(
            "calibration_update_fraction",
            self.calibration_update_fraction,
            self.calibration_update_fraction > 0.0 && self.calibration_update_fraction <= 1.0,
        )?;
        check("drift_step_m", self.drift_step_m, self.drift_step_m > 0.0)?;
        check(
            "eas2tas_altitude_hysteresis_m",
            self.eas2tas_altitude_hysteresis_m,
            self.eas2tas_altitude_hysteresis_m >= 0.0,
        )?;
        check("max_altitude_m", self.max_altitude_m, self.max_altitude_m > 0.0)?;
        check(
            "notify_threshold_pa",
            self.notify_threshold_pa,
            self.notify_threshold_pa >= 0.0,
        )?;
        check(
            "notify_threshold_c",
            self.notify_threshold_c,
            self.notify_threshold_c >= 0.0,
        )?;
        if let Some(cap) = self.max_calibration_temperature {
            check("max_calibration_temperature", cap, true)?;
        }
        Ok(())
    }
}

/// User options of the frontend, persisted across restarts
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BaroOptions {
    /// Instance the user wants as primary
    pub primary_baro: u8,

    /// Specific gravity of the fluid above a water sensor: 1.00 for fresh
    /// water, 1.024 for salt water
    pub specific_gravity: f32,

    /// Persistent surface pressure for water sensors in Pascals, zero when
    /// unset
    pub base_pressure: f32,

    /// Take a new base pressure at the next calibration
    pub reset_base_pressure: bool,

    /// Requested altitude drift offset in meters
    pub alt_offset: f32,
}

impl Default for BaroOptions {
    fn default() -> Self {
        Self {
            primary_baro: 0,
            specific_gravity: 1.0,
            base_pressure: 0.0,
            reset_base_pressure: false,
            alt_offset: 0.0,
        }
    }
}

impl BaroOptions {
    /// Check every option is finite and in range
    pub fn validate(&self) -> BaroResult<()> {
        check(
            "specific_gravity",
            self.specific_gravity,
            self.specific_gravity > 0.0,
        )?;
        check("base_pressure", self.base_pressure, self.base_pressure >= 0.0)?;
        check("alt_offset", self.alt_offset, true)?;
        Ok(())
    }
}

/// Everything the frontend persists
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct BaroParams {
    /// User options
    pub options: BaroOptions,
    /// Ground reference of every slot
    pub ground: [GroundReference; BARO_MAX_INSTANCES],
}

impl BaroParams {
    /// Check the options and ground references
    pub fn validate(&self) -> BaroResult<()> {
        self.options.validate()?;
        for ground in &self.ground {
            check("ground_pressure", ground.pressure, ground.pressure >= 0.0)?;
            check("ground_temperature", ground.temperature, true)?;
        }
        Ok(())
    }
}

/// Persistent parameter storage
pub trait ParamStore: Send {
    /// Previously saved parameters, if any
    fn load(&mut self) -> Option<BaroParams>;

    /// Replace the saved parameters
    fn save(&mut self, params: &BaroParams);
}

/// In-memory parameter store.
///
/// Clones share the stored value, so a caller can keep a handle and inspect
/// what the frontend saved.
#[cfg(any(test, feature = "std"))]
#[derive(Debug, Clone, Default)]
pub struct MemoryParamStore {
    saved: Arc<Mutex<Option<BaroParams>>>,
}

#[cfg(any(test, feature = "std"))]
impl MemoryParamStore {
    /// Empty store
    pub fn new() -> Self {
        Self::default()
    }

    /// Store pre-seeded with `params`
    pub fn with_params(params: BaroParams) -> Self {
        Self {
            saved: Arc::new(Mutex::new(Some(params))),
        }
    }

    /// Last saved parameters
    pub fn saved(&self) -> Option<BaroParams> {
        // a panic while holding the lock cannot leave a partial value behind
        *self.saved.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

#[cfg(any(test, feature = "std"))]
impl ParamStore for MemoryParamStore {
    fn load(&mut self) -> Option<BaroParams> {
        self.saved()
    }

    fn save(&mut self, params: &BaroParams) {
        *self.saved.lock().unwrap_or_else(|poisoned| poisoned.into_inner()) = Some(*params);
    }
}
