//! `From` implementations bridging `trak_config` types to `trak_core` types.

use std::time::Duration;

use crate::config::ControllerCfg;
use crate::types::DeviceConfig;

// ── ControllerCfg ────────────────────────────────────────────────────────────

impl From<&trak_config::Config> for ControllerCfg {
    fn from(c: &trak_config::Config) -> Self {
        Self {
            poll_interval: Duration::from_millis(c.polling.interval_ms),
            pulse_clear: Duration::from_millis(c.pulse.clear_ms),
            max_travel_mm: c.polling.max_travel_mm,
            home_sensor_coil: c.polling.home_sensor_coil,
            verify_device_config: c.device.verify_readback,
        }
    }
}

// ── DeviceConfig ─────────────────────────────────────────────────────────────

impl From<&trak_config::profiles::TestProfile> for DeviceConfig {
    fn from(p: &trak_config::profiles::TestProfile) -> Self {
        Self {
            path_length_mm: p.path_length_mm,
            threshold_force_mn: p.threshold_force_mn,
            temperature_c: p.temperature_c,
            retraction_length_mm: p.retraction_length_mm,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config_matches_default_cfg() {
        let cfg = ControllerCfg::from(&trak_config::Config::default());
        assert_eq!(cfg, ControllerCfg::default());
    }
}
