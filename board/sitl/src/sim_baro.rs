use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use baro::{Atmosphere, BaroBackend, BaroSample, BaroSink, Clock, InstanceHandle, ManualClock};

/// Scripted vertical flight, altitude above the field in meters
#[derive(Debug, Clone, Copy)]
pub struct FlightProfile {
    pub field_elevation: f32,
    pub ground_time_ms: u32,
    pub climb_rate: f32,
    pub cruise_altitude: f32,
    pub cruise_time_ms: u32,
    pub descent_rate: f32,
}

impl FlightProfile {
    /// Altitude above the field at `t_ms` since takeoff clearance
    pub fn altitude_at(&self, t_ms: u32) -> f32 {
        if t_ms < self.ground_time_ms {
            return 0.0;
        }
        let t = (t_ms - self.ground_time_ms) as f32 * 0.001;
        let climb_time = self.cruise_altitude / self.climb_rate;
        let cruise_end = climb_time + self.cruise_time_ms as f32 * 0.001;

        if t < climb_time {
            self.climb_rate * t
        } else if t < cruise_end {
            self.cruise_altitude
        } else {
            (self.cruise_altitude - self.descent_rate * (t - cruise_end)).max(0.0)
        }
    }

    /// Total time from start until touchdown
    pub fn duration_ms(&self) -> u32 {
        let climb = self.cruise_altitude / self.climb_rate;
        let descent = self.cruise_altitude / self.descent_rate;
        self.ground_time_ms + self.cruise_time_ms + ((climb + descent) * 1000.0) as u32
    }
}

/// Knobs the scenario turns on a running simulated sensor
#[derive(Debug, Clone, Default)]
pub struct SimBaroControl {
    dropped: Arc<AtomicBool>,
}

impl SimBaroControl {
    fn is_dropped(&self) -> bool {
        self.dropped.load(Ordering::Relaxed)
    }

    pub fn set_dropped(&self, dropped: bool) {
        self.dropped.store(dropped, Ordering::Relaxed);
    }
}

/// Simulated barometer sampling the standard atmosphere along a profile.
///
/// Takes a reading on every `accumulate` and publishes the average on
/// `update`, the way a driver polling a fast sensor from a timer would.
pub struct SimBaro {
    handle: InstanceHandle,
    clock: ManualClock,
    profile: FlightProfile,
    /// Backend reports pressure in units of this many Pascals
    resolution_pa: u8,
    /// Board heating seen by the sensor's temperature reading
    self_heating: f32,
    /// Fixed pressure error in Pascals
    bias_pa: f32,
    noise_seed: u32,
    control: SimBaroControl,

    pressure_sum: f32,
    temperature_sum: f32,
    count: u32,
}

impl SimBaro {
    pub fn new(
        handle: InstanceHandle,
        clock: ManualClock,
        profile: FlightProfile,
        resolution_pa: u8,
        self_heating: f32,
        bias_pa: f32,
    ) -> Self {
        Self {
            handle,
            clock,
            profile,
            resolution_pa,
            self_heating,
            bias_pa,
            noise_seed: 0x2545_f491 ^ handle.index() as u32,
            control: SimBaroControl::default(),
            pressure_sum: 0.0,
            temperature_sum: 0.0,
            count: 0,
        }
    }

    pub fn control(&self) -> SimBaroControl {
        self.control.clone()
    }

    // xorshift, uniform in [-1, 1)
    fn noise(&mut self) -> f32 {
        let mut x = self.noise_seed;
        x ^= x << 13;
        x ^= x >> 17;
        x ^= x << 5;
        self.noise_seed = x;
        (x as f32 / u32::MAX as f32) * 2.0 - 1.0
    }

    fn sample(&mut self) {
        let altitude = self.profile.altitude_at(self.clock.millis());
        let atmosphere = Atmosphere::at_altitude(self.profile.field_elevation + altitude);
        let pressure = atmosphere.pressure() + self.bias_pa + 2.0 * self.noise();

        self.pressure_sum += pressure;
        self.temperature_sum += atmosphere.temperature() + self.self_heating;
        self.count += 1;
    }
}

impl BaroBackend for SimBaro {
    fn instance(&self) -> InstanceHandle {
        self.handle
    }

    fn update(&mut self, sink: &mut dyn BaroSink) {
        if self.control.is_dropped() {
            self.count = 0;
            self.pressure_sum = 0.0;
            self.temperature_sum = 0.0;
            return;
        }
        if self.count == 0 {
            self.sample();
        }

        let count = self.count as f32;
        let pressure = self.pressure_sum / count / f32::from(self.resolution_pa);
        let temperature = self.temperature_sum / count;
        sink.publish(BaroSample::new(pressure, temperature));

        self.count = 0;
        self.pressure_sum = 0.0;
        self.temperature_sum = 0.0;
    }

    fn accumulate(&mut self) {
        if !self.control.is_dropped() {
            self.sample();
        }
    }
}
