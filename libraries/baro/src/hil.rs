//! Hardware-in-the-loop and log replay override
//!
//! In HIL mode the frontend stops polling the backend of the HIL target
//! instance and uses injected data in its place. Everything downstream of
//! ingestion runs unchanged over the injected values.

use hal::Clock;
use log::{debug, warn};

use crate::atmosphere::Atmosphere;
use crate::error::{BaroError, BaroResult};
use crate::frontend::Baro;

/// A full-fidelity HIL reading for one instance
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct HilReading {
    /// Pressure in Pascals
    pub pressure: f32,
    /// Temperature in Celsius
    pub temperature: f32,
    /// Altitude in meters, replacing the derived altitude
    pub altitude: f32,
    /// Climb rate in m/s, positive up
    pub climb_rate: f32,
    /// Sample time in milliseconds; zero means the frontend clock
    pub last_update_ms: u32,
}

#[derive(Debug, Clone, Copy, Default)]
pub(crate) struct HilState {
    pub(crate) instance: Option<usize>,
    pub(crate) pressure: f32,
    pub(crate) temperature: f32,
    pub(crate) altitude: f32,
    pub(crate) climb_rate: f32,
    pub(crate) last_update_ms: u32,
    pub(crate) updated: bool,
    pub(crate) have_alt: bool,
    pub(crate) have_last_update: bool,
}

impl<C: Clock> Baro<C> {
    /// Switch to HIL substitution for the rest of the run
    pub fn set_hil_mode(&mut self) {
        debug!("baro: HIL mode enabled");
        self.hil_mode = true;
    }

    /// Whether HIL substitution is active
    pub fn hil_mode(&self) -> bool {
        self.hil_mode
    }

    /// Inject a standard atmosphere reading for `altitude_msl` meters.
    /// Altitude is derived from it as usual.
    ///
    /// The first injection targets the primary instance of that moment.
    /// Later calls keep feeding the same instance, so a primary change
    /// during replay does not move the HIL data to another sensor.
    pub fn set_hil_altitude(&mut self, altitude_msl: f32) {
        if self.num_sensors == 0 {
            warn!("baro: HIL altitude ignored, no sensor registered");
            return;
        }
        let instance = self.hil.instance.unwrap_or(self.primary);
        let atmosphere = Atmosphere::at_altitude(altitude_msl);
        self.hil = HilState {
            instance: Some(instance),
            pressure: atmosphere.pressure(),
            temperature: atmosphere.temperature(),
            updated: true,
            ..Default::default()
        };
    }

    /// Inject a complete reading for `instance`, including the altitude and
    /// climb rate reported while it is in force
    pub fn set_hil(&mut self, instance: usize, reading: HilReading) -> BaroResult<()> {
        if instance >= self.num_sensors {
            return Err(BaroError::InvalidInstance {
                instance,
                registered: self.num_sensors,
            });
        }
        self.hil = HilState {
            instance: Some(instance),
            pressure: reading.pressure,
            temperature: reading.temperature,
            altitude: reading.altitude,
            climb_rate: reading.climb_rate,
            last_update_ms: reading.last_update_ms,
            updated: true,
            have_alt: true,
            have_last_update: reading.last_update_ms != 0,
        };
        Ok(())
    }

    /// Instance whose backend is replaced by HIL data
    pub(crate) fn hil_target(&self) -> Option<usize> {
        if self.hil_mode {
            self.hil.instance
        } else {
            None
        }
    }

    pub(crate) fn hil_controls(&self, instance: usize) -> bool {
        self.hil_target() == Some(instance)
    }

    /// Consume pending HIL data as the target instance's sample
    pub(crate) fn apply_hil_sample(&mut self, now: u32) {
        let hil = &mut self.hil;
        let Some(instance) = hil.instance else {
            return;
        };
        if !hil.updated {
            return;
        }
        hil.updated = false;

        let timestamp = if hil.have_last_update {
            hil.last_update_ms
        } else {
            now
        };
        debug!(
            "baro: HIL sample for instance {}: {} Pa {} C",
            instance, hil.pressure, hil.temperature
        );
        self.sensors[instance].ingest_pascals(hil.pressure, hil.temperature, timestamp);
    }

    /// Replace the derived altitude with the injected one
    pub(crate) fn apply_hil_altitude(&mut self) {
        if !self.hil.have_alt {
            return;
        }
        if let Some(instance) = self.hil.instance {
            let sensor = &mut self.sensors[instance];
            sensor.altitude = self.hil.altitude;
            sensor.alt_ok = true;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{BaroConfig, ManualClock};
    use alloc::boxed::Box;
    use alloc::sync::Arc;
    use core::sync::atomic::{AtomicU32, Ordering};
    use hal::{BaroBackend, BaroSample, BaroSink, InstanceHandle};

    #[derive(Clone, Default)]
    struct Counter(Arc<AtomicU32>);

    impl Counter {
        fn get(&self) -> u32 {
            self.0.load(Ordering::Relaxed)
        }

        fn bump(&self) {
            self.0.fetch_add(1, Ordering::Relaxed);
        }
    }

    struct CountingBackend {
        handle: InstanceHandle,
        polls: Counter,
    }

    impl BaroBackend for CountingBackend {
        fn instance(&self) -> InstanceHandle {
            self.handle
        }

        fn update(&mut self, sink: &mut dyn BaroSink) {
            self.polls.bump();
            sink.publish(BaroSample::new(101_325.0, 15.0));
        }
    }

    fn hil_baro() -> (ManualClock, Counter, Baro<ManualClock>) {
        let clock = ManualClock::new();
        let polls = Counter::default();
        let counter = polls.clone();
        let mut baro = Baro::new(BaroConfig::default(), clock.clone()).unwrap();
        baro.add_backend(move |handle| {
            Box::new(CountingBackend {
                handle,
                polls: counter,
            })
        });
        (clock, polls, baro)
    }

    #[test]
    fn test_hil_data_ignored_outside_hil_mode() {
        let (clock, polls, mut baro) = hil_baro();
        baro.set_hil_altitude(1000.0);
        clock.advance(100);
        baro.update();
        assert!(!baro.hil_mode());
        assert_eq!(polls.get(), 1);
        assert_eq!(baro.get_pressure(), 101_325.0);
    }

    #[test]
    fn test_hil_altitude_drives_derivation() {
        let (clock, polls, mut baro) = hil_baro();
        clock.advance(100);
        baro.update();
        baro.calibrate();

        baro.set_hil_mode();
        baro.set_hil_altitude(250.0);
        clock.advance(100);
        baro.update();

        assert_eq!(polls.get(), 1, "backend must not be polled in HIL mode");
        assert!(baro.healthy());
        let altitude = baro.get_altitude();
        assert!((altitude - 250.0).abs() < 1.0, "got {}", altitude);
        assert!((baro.get_temperature() - 13.375).abs() < 0.01);
    }

    #[test]
    fn test_hil_altitude_without_sensors_is_ignored() {
        let mut baro = Baro::new(BaroConfig::default(), ManualClock::new()).unwrap();
        baro.set_hil_mode();
        baro.set_hil_altitude(100.0);
        baro.update();
        assert_eq!(baro.get_pressure(), 0.0);
    }

    #[test]
    fn test_full_hil_overrides_altitude_and_climb_rate() {
        let (clock, polls, mut baro) = hil_baro();
        clock.set(1000);
        baro.set_hil_mode();
        baro.set_hil(
            0,
            HilReading {
                pressure: 95_000.0,
                temperature: 10.0,
                altitude: 500.0,
                climb_rate: 1.5,
                last_update_ms: 1000,
            },
        )
        .unwrap();
        baro.update();

        assert_eq!(polls.get(), 0);
        assert_eq!(baro.get_pressure_of(0), 95_000.0);
        assert_eq!(baro.get_temperature_of(0), 10.0);
        assert_eq!(baro.get_altitude_of(0), 500.0);
        assert_eq!(baro.get_last_update_of(0), 1000);
        assert_eq!(baro.get_climb_rate(), 1.5);
    }

    #[test]
    fn test_hil_sample_consumed_once() {
        let (clock, _polls, mut baro) = hil_baro();
        baro.set_hil_mode();
        baro.set_hil(
            0,
            HilReading {
                pressure: 95_000.0,
                temperature: 10.0,
                altitude: 500.0,
                climb_rate: 0.0,
                last_update_ms: 0,
            },
        )
        .unwrap();
        clock.set(200);
        baro.update();
        assert_eq!(baro.get_last_update(), 200);

        clock.set(900);
        baro.update();
        assert_eq!(baro.get_last_update(), 200, "no new HIL data arrived");
        assert!(!baro.sensors[0].healthy);
    }

    #[test]
    fn test_backend_publish_dropped_for_hil_instance() {
        let (_clock, _polls, mut baro) = hil_baro();
        baro.set_hil_mode();
        baro.set_hil_altitude(0.0);
        baro.update();
        baro.publish(InstanceHandle::new(0), BaroSample::new(50_000.0, 0.0));
        baro.update();
        assert!((baro.get_pressure() - 101_325.0).abs() < 0.5);
    }

    #[test]
    fn test_hil_altitude_target_survives_primary_change() {
        let clock = ManualClock::new();
        let mut baro = Baro::new(BaroConfig::default(), clock.clone()).unwrap();
        let first = baro.register_sensor();
        let second = baro.register_sensor();
        baro.publish(first, BaroSample::new(101_325.0, 15.0));
        baro.publish(second, BaroSample::new(101_325.0, 15.0));
        baro.update();
        baro.calibrate();

        baro.set_hil_mode();
        baro.set_hil_altitude(100.0);
        clock.advance(100);
        baro.publish(second, BaroSample::new(101_325.0, 15.0));
        baro.update();

        baro.set_primary_baro(1).unwrap();
        clock.advance(100);
        baro.publish(second, BaroSample::new(101_325.0, 15.0));
        baro.update();
        assert_eq!(baro.primary(), 1);

        baro.set_hil_altitude(200.0);
        clock.advance(100);
        baro.publish(second, BaroSample::new(101_325.0, 15.0));
        baro.update();

        let expected = Atmosphere::at_altitude(200.0).pressure();
        assert!((baro.get_pressure_of(0) - expected).abs() < 0.5);
        assert_eq!(baro.get_pressure_of(1), 101_325.0);
    }

    #[test]
    fn test_set_hil_rejects_unregistered_instance() {
        let (_clock, _polls, mut baro) = hil_baro();
        let reading = HilReading {
            pressure: 95_000.0,
            temperature: 10.0,
            altitude: 500.0,
            climb_rate: 1.5,
            last_update_ms: 0,
        };
        assert_eq!(
            baro.set_hil(1, reading),
            Err(BaroError::InvalidInstance {
                instance: 1,
                registered: 1
            })
        );
    }
}
