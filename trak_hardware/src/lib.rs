//! Transports for the trackability fixture: Modbus RTU framing, the physical
//! serial connector (feature `hardware`) and a simulated device controller.
pub mod error;
pub mod rtu;
#[cfg(feature = "hardware")]
pub mod serial;
pub mod sim;

pub use rtu::RtuBus;
#[cfg(feature = "hardware")]
pub use serial::SerialConnector;
pub use sim::{MotionProfile, SimConnector, SimulatedPlc, WireOp};
