use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::codec::encode_i16_field;
use crate::error::{ControlError, Result};
use crate::registers::{
    REG_PATH_LENGTH, REG_RETRACTION_LENGTH, REG_TEMPERATURE_SETPOINT, REG_THRESHOLD_FORCE,
};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum LinkState {
    #[default]
    Disconnected,
    Connecting,
    Connected,
}

/// Last commanded value of each actuator coil, as the controller believes it.
/// Only updated after the device accepted the write.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
pub struct CoilSet {
    pub clamp: bool,
    pub heater: bool,
    pub insertion: bool,
    pub retraction: bool,
    pub homing: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum HomingState {
    #[default]
    Idle,
    Homing,
    AtHome,
}

/// One poll result. `simulated` marks a fallback sample produced while the
/// device was unreachable.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SensorSample {
    pub distance_mm: f64,
    pub force_mn: f64,
    pub temperature_c: f64,
    /// Distance as a fraction of the maximum travel, 0..=100.
    pub position_pct: f64,
    pub home_sensor_active: bool,
    pub simulated: bool,
    pub timestamp: DateTime<Utc>,
}

impl SensorSample {
    pub fn force_n(&self) -> f64 {
        self.force_mn / 1000.0
    }
}

/// Process parameters pushed to the device before a test.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct DeviceConfig {
    pub path_length_mm: i32,
    pub threshold_force_mn: f64,
    pub temperature_c: f64,
    pub retraction_length_mm: f64,
}

impl DeviceConfig {
    /// Register writes for this config, in the order they are sent.
    /// Temperature is transmitted in tenths of a degree.
    pub fn encode(&self) -> Result<[(u16, u16); 4]> {
        Ok([
            (
                REG_PATH_LENGTH,
                encode_i16_field("path_length_mm", f64::from(self.path_length_mm))?,
            ),
            (
                REG_THRESHOLD_FORCE,
                encode_i16_field("threshold_force_mn", self.threshold_force_mn)?,
            ),
            (
                REG_TEMPERATURE_SETPOINT,
                encode_i16_field("temperature_c", self.temperature_c * 10.0).map_err(|_| {
                    ControlError::OutOfRange {
                        field: "temperature_c",
                        value: self.temperature_c,
                    }
                })?,
            ),
            (
                REG_RETRACTION_LENGTH,
                encode_i16_field("retraction_length_mm", self.retraction_length_mm)?,
            ),
        ])
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ConnectionStatus {
    pub connected: bool,
    pub port: String,
    pub timestamp: DateTime<Utc>,
}

/// Raw words behind one sample, for diagnostics.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct RawRegisters {
    pub distance: u16,
    pub force: [u16; 2],
    pub temperature: u16,
    pub home_sensor: bool,
}
