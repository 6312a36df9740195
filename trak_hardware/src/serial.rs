//! Physical serial port connector (feature `hardware`).
use std::time::Duration;

use tracing::{debug, info};
use trak_traits::{Connector, Parity, RegisterBus, SerialSettings};

use crate::error::HwError;
use crate::rtu::RtuBus;

/// Opens `SerialSettings::port` and speaks Modbus RTU to `slave_id` on it.
#[derive(Debug, Clone)]
pub struct SerialConnector {
    slave_id: u8,
    timeout: Duration,
}

impl SerialConnector {
    pub fn new(slave_id: u8, timeout: Duration) -> Self {
        Self { slave_id, timeout }
    }
}

fn data_bits(n: u8) -> Result<serialport::DataBits, HwError> {
    match n {
        5 => Ok(serialport::DataBits::Five),
        6 => Ok(serialport::DataBits::Six),
        7 => Ok(serialport::DataBits::Seven),
        8 => Ok(serialport::DataBits::Eight),
        other => Err(HwError::Serial(format!("unsupported data bits: {other}"))),
    }
}

fn stop_bits(n: u8) -> Result<serialport::StopBits, HwError> {
    match n {
        1 => Ok(serialport::StopBits::One),
        2 => Ok(serialport::StopBits::Two),
        other => Err(HwError::Serial(format!("unsupported stop bits: {other}"))),
    }
}

fn parity(p: Parity) -> serialport::Parity {
    match p {
        Parity::None => serialport::Parity::None,
        Parity::Even => serialport::Parity::Even,
        Parity::Odd => serialport::Parity::Odd,
    }
}

impl Connector for SerialConnector {
    fn open(
        &mut self,
        settings: &SerialSettings,
    ) -> Result<Box<dyn RegisterBus>, Box<dyn std::error::Error + Send + Sync>> {
        debug!(port = %settings.port, baud = settings.baud, "opening serial port");
        let port = serialport::new(settings.port.as_str(), settings.baud)
            .data_bits(data_bits(settings.data_bits)?)
            .stop_bits(stop_bits(settings.stop_bits)?)
            .parity(parity(settings.parity))
            .timeout(self.timeout)
            .open()
            .map_err(|e| HwError::Serial(format!("open {}: {e}", settings.port)))?;
        info!(port = %settings.port, slave = self.slave_id, "serial port open");
        Ok(Box::new(RtuBus::new(port, self.slave_id, self.timeout)))
    }
}
