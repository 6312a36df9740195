#![cfg_attr(all(not(debug_assertions), not(test)), deny(warnings))]
#![cfg_attr(
    all(not(debug_assertions), not(test)),
    deny(clippy::all, clippy::pedantic, clippy::nursery)
)]
#![allow(clippy::module_name_repetitions, clippy::missing_errors_doc)]
//! Config schema and test-profile storage for the trackability fixture.
//!
//! - `Config` and sub-structs are deserialized from TOML and validated.
//! - `profiles` reads and writes the named test configurations CSV.
use serde::Deserialize;
use trak_traits::{Parity, SerialSettings};

pub mod profiles;

#[derive(Debug, Deserialize, Clone, Copy, Default, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum ParityCfg {
    None,
    #[default]
    Even,
    Odd,
}

impl From<ParityCfg> for Parity {
    fn from(p: ParityCfg) -> Self {
        match p {
            ParityCfg::None => Parity::None,
            ParityCfg::Even => Parity::Even,
            ParityCfg::Odd => Parity::Odd,
        }
    }
}

#[derive(Debug, Deserialize)]
#[serde(default)]
pub struct LinkCfg {
    /// Serial device, e.g. "COM4" or "/dev/ttyUSB0"
    pub port: String,
    pub baud: u32,
    pub data_bits: u8,
    pub stop_bits: u8,
    pub parity: ParityCfg,
    /// Modbus unit id of the device controller
    pub slave_id: u8,
    /// Per-transaction response timeout (ms)
    pub timeout_ms: u64,
    /// Try to connect once at startup
    pub auto_connect: bool,
}

impl Default for LinkCfg {
    fn default() -> Self {
        Self {
            port: "COM4".into(),
            baud: 9600,
            data_bits: 8,
            stop_bits: 1,
            parity: ParityCfg::Even,
            slave_id: 1,
            timeout_ms: 1000,
            auto_connect: true,
        }
    }
}

impl From<&LinkCfg> for SerialSettings {
    fn from(c: &LinkCfg) -> Self {
        Self {
            port: c.port.clone(),
            baud: c.baud,
            data_bits: c.data_bits,
            stop_bits: c.stop_bits,
            parity: c.parity.into(),
        }
    }
}

#[derive(Debug, Deserialize)]
#[serde(default)]
pub struct PollingCfg {
    pub interval_ms: u64,
    /// Distance reported as 100 % position
    pub max_travel_mm: f64,
    /// Coil address of the home position sensor
    pub home_sensor_coil: u16,
}

impl Default for PollingCfg {
    fn default() -> Self {
        Self {
            interval_ms: 500,
            max_travel_mm: 1000.0,
            home_sensor_coil: 2010,
        }
    }
}

#[derive(Debug, Deserialize)]
#[serde(default)]
pub struct PulseCfg {
    /// Delay before a pulsed START/STOP/RESET coil is written back to false
    pub clear_ms: u64,
}

impl Default for PulseCfg {
    fn default() -> Self {
        Self { clear_ms: 2000 }
    }
}

#[derive(Debug, Deserialize)]
#[serde(default)]
pub struct DeviceCfg {
    /// Read process parameters back after pushing them
    pub verify_readback: bool,
}

impl Default for DeviceCfg {
    fn default() -> Self {
        Self {
            verify_readback: true,
        }
    }
}

#[derive(Debug, Deserialize, Default)]
#[serde(default)]
pub struct Logging {
    pub file: Option<String>,  // path to .log (JSON lines)
    pub level: Option<String>, // "info","debug"
    /// Log rotation policy: "never" | "daily" | "hourly" (default: never)
    pub rotation: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(default)]
pub struct ProfilesCfg {
    /// CSV file holding named test configurations
    pub path: String,
}

impl Default for ProfilesCfg {
    fn default() -> Self {
        Self {
            path: "SCTTM.csv".into(),
        }
    }
}

#[derive(Debug, Deserialize, Default)]
#[serde(default)]
pub struct Config {
    pub link: LinkCfg,
    pub polling: PollingCfg,
    pub pulse: PulseCfg,
    pub device: DeviceCfg,
    pub logging: Logging,
    pub profiles: ProfilesCfg,
}

pub fn load_toml(s: &str) -> Result<Config, toml::de::Error> {
    toml::from_str::<Config>(s)
}

impl Config {
    pub fn validate(&self) -> eyre::Result<()> {
        // Link
        if self.link.port.trim().is_empty() {
            eyre::bail!("link.port must not be empty");
        }
        if self.link.baud == 0 {
            eyre::bail!("link.baud must be > 0");
        }
        if !(5..=8).contains(&self.link.data_bits) {
            eyre::bail!("link.data_bits must be in [5, 8]");
        }
        if !(1..=2).contains(&self.link.stop_bits) {
            eyre::bail!("link.stop_bits must be 1 or 2");
        }
        if !(1..=247).contains(&self.link.slave_id) {
            eyre::bail!("link.slave_id must be in [1, 247]");
        }
        if self.link.timeout_ms == 0 {
            eyre::bail!("link.timeout_ms must be >= 1");
        }

        // Polling
        if self.polling.interval_ms == 0 {
            eyre::bail!("polling.interval_ms must be >= 1");
        }
        if !self.polling.max_travel_mm.is_finite() || self.polling.max_travel_mm <= 0.0 {
            eyre::bail!("polling.max_travel_mm must be > 0");
        }

        // Pulse
        if self.pulse.clear_ms == 0 {
            eyre::bail!("pulse.clear_ms must be >= 1");
        }
        if self.pulse.clear_ms > 60 * 1000 {
            eyre::bail!("pulse.clear_ms is unreasonably large (>60s)");
        }

        // Logging
        if let Some(rotation) = self.logging.rotation.as_deref()
            && !matches!(rotation, "never" | "daily" | "hourly")
        {
            eyre::bail!("logging.rotation must be one of never, daily, hourly");
        }

        Ok(())
    }
}
