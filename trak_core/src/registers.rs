//! Device address map.
//!
//! Coils are single-bit outputs (or the home-sensor input) on the device
//! controller; holding registers are 16-bit words. Addresses are the
//! zero-based protocol addresses sent on the wire.

pub const COIL_HOME: u16 = 2001;
pub const COIL_START: u16 = 2002;
pub const COIL_STOP: u16 = 2003;
pub const COIL_RESET: u16 = 2004;
pub const COIL_HEATING: u16 = 2005;
pub const COIL_CLAMP: u16 = 2007;
pub const COIL_INSERTION: u16 = 2008;
pub const COIL_RETRACTION: u16 = 2009;
pub const COIL_MANUAL: u16 = 2070;
/// Home position sensor, read with function 01.
pub const DEFAULT_HOME_SENSOR_COIL: u16 = 2010;

pub const REG_DISTANCE: u16 = 6116;
/// Low word of the force float; the high word follows at 55.
pub const REG_FORCE: u16 = 54;
pub const REG_TEMPERATURE: u16 = 501;

pub const REG_PATH_LENGTH: u16 = 6000;
pub const REG_THRESHOLD_FORCE: u16 = 150;
/// Tenths of a degree Celsius.
pub const REG_TEMPERATURE_SETPOINT: u16 = 510;
pub const REG_RETRACTION_LENGTH: u16 = 122;

/// Output coils the controller drives.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Coil {
    Home,
    Start,
    Stop,
    Reset,
    Heating,
    Clamp,
    Insertion,
    Retraction,
    Manual,
}

impl Coil {
    pub const fn address(self) -> u16 {
        match self {
            Coil::Home => COIL_HOME,
            Coil::Start => COIL_START,
            Coil::Stop => COIL_STOP,
            Coil::Reset => COIL_RESET,
            Coil::Heating => COIL_HEATING,
            Coil::Clamp => COIL_CLAMP,
            Coil::Insertion => COIL_INSERTION,
            Coil::Retraction => COIL_RETRACTION,
            Coil::Manual => COIL_MANUAL,
        }
    }

    pub const fn name(self) -> &'static str {
        match self {
            Coil::Home => "HOME",
            Coil::Start => "START",
            Coil::Stop => "STOP",
            Coil::Reset => "RESET",
            Coil::Heating => "HEATING",
            Coil::Clamp => "CLAMP",
            Coil::Insertion => "INSERTION",
            Coil::Retraction => "RETRACTION",
            Coil::Manual => "MANUAL",
        }
    }
}

impl std::fmt::Display for Coil {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.name())
    }
}

/// Coils that are momentary: written true, then cleared after the pulse window.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PulseCoil {
    Start,
    Stop,
    Reset,
}

impl From<PulseCoil> for Coil {
    fn from(p: PulseCoil) -> Self {
        match p {
            PulseCoil::Start => Coil::Start,
            PulseCoil::Stop => Coil::Stop,
            PulseCoil::Reset => Coil::Reset,
        }
    }
}
