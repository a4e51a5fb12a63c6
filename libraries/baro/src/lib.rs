#![cfg_attr(not(any(test, feature = "std")), no_std)]

//! Multi-instance barometer frontend
//!
//! [`Baro`] aggregates up to three pressure sensors fed by [`hal::BaroBackend`]
//! drivers, calibrates them against a ground reference and derives altitude,
//! climb rate and air data for the primary sensor.

extern crate alloc;

pub mod atmosphere;
mod calibration;
mod clock;
mod config;
pub mod derivative;
mod error;
mod frontend;
mod hil;
mod instance;
mod notify;

pub use atmosphere::Atmosphere;
#[cfg(feature = "std")]
pub use clock::MonotonicClock;
pub use clock::{Clock, ManualClock};
pub use config::{BaroConfig, BaroOptions, BaroParams, ParamStore};
#[cfg(any(test, feature = "std"))]
pub use config::MemoryParamStore;
pub use derivative::DerivativeFilter;
pub use error::{BaroError, BaroResult};
pub use frontend::{Baro, BARO_MAX_DRIVERS, BARO_MAX_INSTANCES};
pub use hal::{BaroBackend, BaroSample, BaroSink, InstanceHandle};
pub use hil::HilReading;
pub use instance::{BaroType, CalibrationState, GroundReference};
pub use notify::CalibrationNotifier;
