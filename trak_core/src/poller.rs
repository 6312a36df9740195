//! Sensor sampling with synthetic fallback.
//!
//! A tick reads distance, force, temperature and the home sensor. If any read
//! fails, or the link is down, the whole sample is synthesized and flagged
//! `simulated`; polling failures are never surfaced to callers.

use chrono::Utc;
use rand::Rng;
use tracing::{debug, warn};

use crate::codec::{decode_f32_le, decode_i16};
use crate::core::ControllerCore;
use crate::error::Result;
use crate::events::Event;
use crate::registers::{REG_DISTANCE, REG_FORCE, REG_TEMPERATURE};
use crate::types::SensorSample;

/// Distance as a percentage of `max_travel_mm`, clamped to 0..=100.
pub fn position_pct(distance_mm: f64, max_travel_mm: f64) -> f64 {
    if !distance_mm.is_finite() || !max_travel_mm.is_finite() || max_travel_mm <= 0.0 {
        return 0.0;
    }
    (distance_mm / max_travel_mm * 100.0).clamp(0.0, 100.0)
}

/// Fallback reading: distance in [0, 1000) whole mm, force in [1000, 6000) mN,
/// temperature in [20, 30) °C. The home sensor always reads inactive.
pub fn synthesize<R: Rng + ?Sized>(rng: &mut R, max_travel_mm: f64) -> SensorSample {
    let distance_mm = f64::from(rng.random_range(0u16..1000));
    SensorSample {
        distance_mm,
        force_mn: rng.random_range(1000.0..6000.0),
        temperature_c: rng.random_range(20.0..30.0),
        position_pct: position_pct(distance_mm, max_travel_mm),
        home_sensor_active: false,
        simulated: true,
        timestamp: Utc::now(),
    }
}

impl ControllerCore {
    /// Produce one sample (real if possible), feed it to the safety machine,
    /// retain it as the latest and publish it.
    pub fn read_data(&mut self) -> SensorSample {
        let sample = if self.link.is_connected() {
            match self.read_device_sample() {
                Ok(s) => s,
                Err(e) => {
                    warn!(error = %e, "poll failed; substituting synthetic sample");
                    self.synthetic_sample()
                }
            }
        } else {
            self.synthetic_sample()
        };
        self.sync_link();
        self.observe_sample(&sample);
        self.latest = Some(sample.clone());
        self.events.publish(Event::Sample(sample.clone()));
        sample
    }

    pub(crate) fn poll_tick(&mut self) {
        let sample = self.read_data();
        debug!(
            distance_mm = sample.distance_mm,
            force_mn = sample.force_mn,
            temperature_c = sample.temperature_c,
            simulated = sample.simulated,
            "poll tick"
        );
    }

    fn synthetic_sample(&mut self) -> SensorSample {
        let max = self.cfg.max_travel_mm;
        synthesize(&mut self.rng, max)
    }

    fn read_device_sample(&mut self) -> Result<SensorSample> {
        let distance = self.link.read_registers(REG_DISTANCE, 1)?;
        let force = self.link.read_registers(REG_FORCE, 2)?;
        let temperature = self.link.read_registers(REG_TEMPERATURE, 1)?;
        let home = self.link.read_coils(self.cfg.home_sensor_coil, 1)?;

        let distance_mm = f64::from(decode_i16(distance[0]));
        Ok(SensorSample {
            distance_mm,
            force_mn: f64::from(decode_f32_le(force[0], force[1])),
            temperature_c: f64::from(decode_i16(temperature[0])),
            position_pct: position_pct(distance_mm, self.cfg.max_travel_mm),
            home_sensor_active: home[0],
            simulated: false,
            timestamp: Utc::now(),
        })
    }
}
