//! Ground-station side channel for calibration changes

/// Receives the new ground reference of an instance.
///
/// The frontend rate limits calls, so implementations may forward every
/// call to a telemetry link.
pub trait CalibrationNotifier: Send {
    /// The ground reference of `instance` changed materially
    fn ground_reference_changed(&mut self, instance: usize, pressure: f32, temperature: f32);
}

impl<F> CalibrationNotifier for F
where
    F: FnMut(usize, f32, f32) + Send,
{
    fn ground_reference_changed(&mut self, instance: usize, pressure: f32, temperature: f32) {
        self(instance, pressure, temperature)
    }
}
