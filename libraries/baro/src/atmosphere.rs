//! Standard atmosphere model and barometric altitude
//!
//! Troposphere/stratosphere piecewise model: temperature falls linearly with
//! geopotential height up to the tropopause at 11 km and is constant above
//! it, where pressure decays exponentially.

#[allow(unused_imports)]
use num_traits::Float;

/// Sea level pressure of the standard atmosphere in Pascals
pub const SSL_AIR_PRESSURE: f32 = 101_325.0;

/// Sea level air density of the standard atmosphere in kg/m³
pub const SSL_AIR_DENSITY: f32 = 1.225;

/// Sea level temperature of the standard atmosphere in Kelvin
pub const SSL_AIR_TEMPERATURE: f32 = 288.15;

/// Specific gas constant of dry air in J/(kg·K)
pub const ISA_GAS_CONSTANT: f32 = 287.05;

/// Offset between Celsius and Kelvin
pub const C_TO_KELVIN: f32 = 273.15;

/// Hydrostatic pressure gradient of fresh water in Pa/m
pub const FRESH_WATER_PRESSURE_GRADIENT: f32 = 9800.0;

const EARTH_RADIUS_KM: f32 = 6369.0;
// g0 * M / R, in K/km
const GMR: f32 = 34.163195;
const TROPOPAUSE_KM: f32 = 11.0;
const LAPSE_RATE_K_PER_KM: f32 = 6.5;
const TROPOPAUSE_TEMPERATURE: f32 = 216.65;
const TROPOPAUSE_PRESSURE_RATIO: f32 = 0.223_361_1;

/// Ratios of the local atmosphere to standard sea level conditions
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Atmosphere {
    /// Density ratio ρ/ρ0
    pub sigma: f32,
    /// Pressure ratio p/p0
    pub delta: f32,
    /// Temperature ratio T/T0
    pub theta: f32,
}

impl Atmosphere {
    /// Standard atmosphere at a geometric altitude in meters
    pub fn at_altitude(altitude_m: f32) -> Self {
        simple_atmosphere(altitude_m * 0.001)
    }

    /// Static pressure in Pascals
    pub fn pressure(&self) -> f32 {
        SSL_AIR_PRESSURE * self.delta
    }

    /// Static temperature in Celsius
    pub fn temperature(&self) -> f32 {
        SSL_AIR_TEMPERATURE * self.theta - C_TO_KELVIN
    }
}

/// Standard atmosphere at a geometric altitude in kilometers
pub fn simple_atmosphere(altitude_km: f32) -> Atmosphere {
    // geometric to geopotential height
    let h = altitude_km * EARTH_RADIUS_KM / (altitude_km + EARTH_RADIUS_KM);

    let (theta, delta) = if h < TROPOPAUSE_KM {
        let theta = (SSL_AIR_TEMPERATURE - LAPSE_RATE_K_PER_KM * h) / SSL_AIR_TEMPERATURE;
        (theta, theta.powf(GMR / LAPSE_RATE_K_PER_KM))
    } else {
        let theta = TROPOPAUSE_TEMPERATURE / SSL_AIR_TEMPERATURE;
        let delta = TROPOPAUSE_PRESSURE_RATIO
            * (-GMR * (h - TROPOPAUSE_KM) / TROPOPAUSE_TEMPERATURE).exp();
        (theta, delta)
    };

    Atmosphere {
        sigma: delta / theta,
        delta,
        theta,
    }
}

/// Height in meters of `pressure` above `base_pressure`.
///
/// Closed form of the barometric formula for the tropospheric lapse rate,
/// referenced to the ground temperature in Celsius. Within ±2.5 m of the
/// standard atmosphere tables up to 11 km. Higher pressure than the base
/// gives a negative height.
pub fn altitude_difference(base_pressure: f32, pressure: f32, ground_temperature: f32) -> f32 {
    let temp = ground_temperature + C_TO_KELVIN;
    let scaling = pressure / base_pressure;
    153.8462 * temp * (1.0 - (0.190259 * scaling.ln()).exp())
}

/// Height in meters of a water pressure sensor relative to its surface
/// reference. Below the surface is negative.
pub fn water_depth(base_pressure: f32, pressure: f32, specific_gravity: f32) -> f32 {
    (base_pressure - pressure) / (FRESH_WATER_PRESSURE_GRADIENT * specific_gravity)
}
