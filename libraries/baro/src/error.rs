use log::warn;
use thiserror::Error;

/// Errors reported by the barometer frontend's configuration surface
#[derive(Error, Debug, Clone, Copy, PartialEq)]
pub enum BaroError {
    /// A tunable or persisted option is non-finite or out of range
    #[error("Invalid configuration value {value} for {parameter}")]
    InvalidConfig {
        /// Name of the rejected option
        parameter: &'static str,
        /// The rejected value
        value: f32,
    },

    /// The instance index does not name a registered sensor
    #[error("Instance {instance} is not registered ({registered} sensors registered)")]
    InvalidInstance {
        /// Requested instance index
        instance: usize,
        /// Number of registered sensors
        registered: usize,
    },
}

/// Result type for barometer frontend operations
pub type BaroResult<T> = Result<T, BaroError>;

/// Reject `value` for `parameter` unless it is finite and `valid` holds
pub(crate) fn check(parameter: &'static str, value: f32, valid: bool) -> BaroResult<()> {
    if value.is_finite() && valid {
        Ok(())
    } else {
        warn!("baro: rejected {} = {}", parameter, value);
        Err(BaroError::InvalidConfig { parameter, value })
    }
}
