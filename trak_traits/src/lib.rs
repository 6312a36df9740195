//! Hardware seams shared by the controller core and the transports.
//!
//! The core never talks to a serial port directly. It asks a `Connector` to
//! open a `RegisterBus` with the requested `SerialSettings`, then issues
//! register/coil transactions through it.
pub mod clock;

pub use clock::{Clock, MonotonicClock};

/// Parity setting for the serial line.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Parity {
    None,
    #[default]
    Even,
    Odd,
}

/// Serial framing used to open the device link.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SerialSettings {
    pub port: String,
    pub baud: u32,
    pub data_bits: u8,
    pub stop_bits: u8,
    pub parity: Parity,
}

impl SerialSettings {
    /// 9600 baud, 8 data bits, 1 stop bit, even parity.
    pub fn new(port: impl Into<String>) -> Self {
        Self {
            port: port.into(),
            baud: 9600,
            data_bits: 8,
            stop_bits: 1,
            parity: Parity::Even,
        }
    }
}

/// One request/response transaction at a time against the device controller.
///
/// Addresses are protocol addresses (zero-based on the wire).
pub trait RegisterBus: Send {
    fn read_holding_registers(
        &mut self,
        address: u16,
        count: u16,
    ) -> Result<Vec<u16>, Box<dyn std::error::Error + Send + Sync>>;

    fn read_coils(
        &mut self,
        address: u16,
        count: u16,
    ) -> Result<Vec<bool>, Box<dyn std::error::Error + Send + Sync>>;

    fn write_single_register(
        &mut self,
        address: u16,
        value: u16,
    ) -> Result<(), Box<dyn std::error::Error + Send + Sync>>;

    fn write_single_coil(
        &mut self,
        address: u16,
        on: bool,
    ) -> Result<(), Box<dyn std::error::Error + Send + Sync>>;
}

/// Opens the physical link. Called once per connect attempt; never retries.
pub trait Connector: Send {
    fn open(
        &mut self,
        settings: &SerialSettings,
    ) -> Result<Box<dyn RegisterBus>, Box<dyn std::error::Error + Send + Sync>>;
}
