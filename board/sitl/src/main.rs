use anyhow::Context;
use baro::{Baro, BaroConfig, Clock, HilReading, ManualClock, MemoryParamStore};
use log::{info, warn};
use sim_baro::{FlightProfile, SimBaro, SimBaroControl};

mod sim_baro;

/// Frontend update period, 10 Hz
const UPDATE_PERIOD_MS: u32 = 100;
/// Backend accumulate calls per update
const ACCUMULATE_PER_UPDATE: u32 = 4;

const WARMUP_MS: u32 = 2_000;
const CALIBRATION_MS: u32 = 3_000;

const FIELD_ELEVATION_M: f32 = 250.0;

enum State {
    WarmingUp,
    Calibrating,
    Flying,
    Replaying,
    Stopping,
}

/// Recorded altitude, climb rate pairs replayed through the HIL path
const REPLAY: [(f32, f32); 8] = [
    (40.0, 0.0),
    (40.5, 5.0),
    (41.0, 5.0),
    (41.5, 5.0),
    (42.0, 5.0),
    (42.0, 0.0),
    (41.8, -2.0),
    (41.6, -2.0),
];

fn main() -> anyhow::Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let clock = ManualClock::new();
    let store = MemoryParamStore::new();
    let mut baro = Baro::new(BaroConfig::default(), clock.clone())
        .context("invalid barometer configuration")?
        .with_param_store(Box::new(store.clone()))
        .context("failed to load barometer parameters")?
        .with_notifier(Box::new(|instance: usize, pressure: f32, temperature: f32| {
            info!(
                "GCS: baro {} ground reference {:.1} Pa {:.1} C",
                instance, pressure, temperature
            );
        }));

    let profile = FlightProfile {
        field_elevation: FIELD_ELEVATION_M,
        ground_time_ms: WARMUP_MS + CALIBRATION_MS + 1_000,
        climb_rate: 3.0,
        cruise_altitude: 60.0,
        cruise_time_ms: 20_000,
        descent_rate: 2.0,
    };

    let mut controls: Vec<SimBaroControl> = Vec::new();
    for (resolution, self_heating, bias) in [(1u8, 0.5f32, 0.0f32), (2, 6.0, 12.0)] {
        let mut control = None;
        let handle = baro.add_backend(|handle| {
            let sim = SimBaro::new(
                handle,
                clock.clone(),
                profile,
                resolution,
                self_heating,
                bias,
            );
            control = Some(sim.control());
            Box::new(sim)
        });
        baro.set_precision_multiplier(handle.index(), resolution);
        controls.extend(control);
    }

    let mut state = State::WarmingUp;
    let mut state_entered_ms = clock.millis();
    let mut replay = REPLAY.iter();
    let mut update_cycle_count: u32 = 0;

    loop {
        for _ in 0..ACCUMULATE_PER_UPDATE {
            clock.advance(UPDATE_PERIOD_MS / ACCUMULATE_PER_UPDATE);
            baro.accumulate();
        }
        baro.update();
        update_cycle_count += 1;

        let now = clock.millis();
        let in_state_ms = now - state_entered_ms;

        match state {
            State::WarmingUp => {
                if in_state_ms >= WARMUP_MS {
                    info!("Calibrating barometers");
                    baro.set_external_temperature(
                        baro::Atmosphere::at_altitude(FIELD_ELEVATION_M).temperature(),
                    );
                    baro.calibrate();
                    state = State::Calibrating;
                    state_entered_ms = now;
                }
            }
            State::Calibrating => {
                baro.update_calibration();
                if in_state_ms >= CALIBRATION_MS {
                    if !baro.all_healthy() {
                        warn!("Not every barometer is healthy after calibration");
                    }
                    info!(
                        "Ground reference {:.1} Pa {:.1} C, EAS2TAS {:.3}",
                        baro.get_ground_pressure(),
                        baro.get_ground_temperature(),
                        baro.get_eas2tas()
                    );
                    state = State::Flying;
                    state_entered_ms = now;
                }
            }
            State::Flying => {
                match in_state_ms {
                    15_000 => {
                        warn!("Injecting dropout on baro 0");
                        controls[0].set_dropped(true);
                    }
                    18_000 => {
                        info!("Baro 0 back online");
                        controls[0].set_dropped(false);
                    }
                    25_000 => {
                        info!("Requesting 2 m drift offset");
                        baro.set_baro_drift_altitude(2.0)
                            .context("rejected drift offset")?;
                    }
                    _ => {}
                }

                if update_cycle_count % 10 == 0 {
                    info!(
                        "t={:>6} ms primary={} alt={:7.2} m (truth {:6.2}) climb={:5.2} m/s eas2tas={:.3} rho={:.3} drift={:.2}",
                        now,
                        baro.primary(),
                        baro.get_altitude(),
                        profile.altitude_at(now),
                        baro.get_climb_rate(),
                        baro.get_eas2tas(),
                        baro.get_air_density_ratio(),
                        baro.get_baro_drift_offset(),
                    );
                }

                if now >= profile.duration_ms() + 2_000 {
                    info!("Switching to HIL replay");
                    baro.set_hil_mode();
                    state = State::Replaying;
                    state_entered_ms = now;
                }
            }
            State::Replaying => match replay.next() {
                Some(&(altitude, climb_rate)) => {
                    let atmosphere = baro::Atmosphere::at_altitude(FIELD_ELEVATION_M + altitude);
                    baro.set_hil(
                        baro.primary(),
                        HilReading {
                            pressure: atmosphere.pressure(),
                            temperature: atmosphere.temperature(),
                            altitude,
                            climb_rate,
                            last_update_ms: 0,
                        },
                    )
                    .context("HIL target is not registered")?;
                    info!(
                        "HIL t={:>6} ms alt={:6.2} m climb={:5.2} m/s",
                        now,
                        baro.get_altitude(),
                        baro.get_climb_rate()
                    );
                }
                None => {
                    state = State::Stopping;
                    state_entered_ms = now;
                }
            },
            State::Stopping => {
                info!("Stopping after {} update cycles", update_cycle_count);
                if let Some(params) = store.saved() {
                    info!(
                        "Saved parameters: primary {} drift {:.2} m ground {:?}",
                        params.options.primary_baro, params.options.alt_offset, params.ground
                    );
                }
                break;
            }
        }
    }
    Ok(())
}
