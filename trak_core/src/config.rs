use std::time::Duration;

use crate::registers::DEFAULT_HOME_SENSOR_COIL;

/// Runtime parameters of the controller.
#[derive(Debug, Clone, PartialEq)]
pub struct ControllerCfg {
    /// Cadence of the polling loop while connected.
    pub poll_interval: Duration,
    /// Delay before a pulsed coil is written back to false.
    pub pulse_clear: Duration,
    /// Distance that maps to 100 % position.
    pub max_travel_mm: f64,
    pub home_sensor_coil: u16,
    /// Read pushed process parameters back and warn on mismatch.
    pub verify_device_config: bool,
}

impl Default for ControllerCfg {
    fn default() -> Self {
        Self {
            poll_interval: Duration::from_millis(500),
            pulse_clear: Duration::from_millis(2000),
            max_travel_mm: 1000.0,
            home_sensor_coil: DEFAULT_HOME_SENSOR_COIL,
            verify_device_config: true,
        }
    }
}

impl ControllerCfg {
    pub(crate) fn validate(&self) -> Result<(), &'static str> {
        if self.poll_interval.is_zero() {
            return Err("poll_interval must be > 0");
        }
        if self.pulse_clear.is_zero() {
            return Err("pulse_clear must be > 0");
        }
        if !self.max_travel_mm.is_finite() || self.max_travel_mm <= 0.0 {
            return Err("max_travel_mm must be finite and > 0");
        }
        Ok(())
    }
}
