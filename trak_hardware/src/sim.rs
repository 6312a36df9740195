//! Simulated device controller.
//!
//! `SimulatedPlc` is a shared coil/register table. Clones share state, so a
//! test can keep one handle while the controller owns a bus opened through
//! `SimulatedPlc::connector()`. Every accepted write is logged in order.
use std::collections::{HashMap, HashSet};
use std::sync::{Arc, Mutex};

use tracing::trace;
use trak_traits::{Connector, RegisterBus, SerialSettings};

use crate::error::HwError;

/// One write accepted by the simulated device.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WireOp {
    Coil { address: u16, on: bool },
    Register { address: u16, value: u16 },
}

/// Addresses and rates used by the optional motion model.
#[derive(Debug, Clone, Copy)]
pub struct MotionProfile {
    pub distance_register: u16,
    pub insertion_coil: u16,
    pub retraction_coil: u16,
    pub home_coil: u16,
    pub home_sensor_coil: u16,
    /// Travel per distance read while a direction coil is on.
    pub step_mm: i16,
    pub max_mm: i16,
}

#[derive(Debug, Default)]
struct PlcState {
    coils: HashMap<u16, bool>,
    registers: HashMap<u16, u16>,
    writes: Vec<WireOp>,
    faulty: HashSet<u16>,
    faulty_writes: HashSet<u16>,
    unplugged: bool,
    port_missing: bool,
    opens: usize,
    motion: Option<MotionProfile>,
}

impl PlcState {
    fn coil(&self, address: u16) -> bool {
        self.coils.get(&address).copied().unwrap_or(false)
    }

    fn step_motion(&mut self) {
        let Some(m) = self.motion else { return };
        let current = self.registers.get(&m.distance_register).copied().unwrap_or(0) as i16;
        let moved = if self.coil(m.home_coil) {
            current.saturating_sub(m.step_mm.saturating_mul(2))
        } else if self.coil(m.insertion_coil) {
            current.saturating_add(m.step_mm)
        } else if self.coil(m.retraction_coil) {
            current.saturating_sub(m.step_mm)
        } else {
            current
        };
        let next = moved.clamp(0, m.max_mm);
        self.registers.insert(m.distance_register, next as u16);
        self.coils.insert(m.home_sensor_coil, next == 0);
    }
}

#[derive(Debug, Clone, Default)]
pub struct SimulatedPlc {
    state: Arc<Mutex<PlcState>>,
}

impl SimulatedPlc {
    pub fn new() -> Self {
        Self::default()
    }

    /// Enable the motion model: direction coils move the distance register,
    /// HOME drives it back to zero, and the home sensor reads active at zero.
    pub fn with_motion(self, profile: MotionProfile) -> Self {
        self.with(|s| s.motion = Some(profile));
        self
    }

    fn with<R>(&self, f: impl FnOnce(&mut PlcState) -> R) -> R {
        let mut guard = self.state.lock().unwrap_or_else(|p| p.into_inner());
        f(&mut guard)
    }

    pub fn connector(&self) -> SimConnector {
        SimConnector { plc: self.clone() }
    }

    pub fn set_register(&self, address: u16, value: u16) {
        self.with(|s| {
            s.registers.insert(address, value);
        });
    }

    pub fn register(&self, address: u16) -> u16 {
        self.with(|s| s.registers.get(&address).copied().unwrap_or(0))
    }

    pub fn set_coil(&self, address: u16, on: bool) {
        self.with(|s| {
            s.coils.insert(address, on);
        });
    }

    pub fn coil(&self, address: u16) -> bool {
        self.with(|s| s.coil(address))
    }

    /// All accepted writes, oldest first.
    pub fn writes(&self) -> Vec<WireOp> {
        self.with(|s| s.writes.clone())
    }

    /// Values written to one coil, oldest first.
    pub fn coil_writes(&self, address: u16) -> Vec<bool> {
        self.with(|s| {
            s.writes
                .iter()
                .filter_map(|w| match *w {
                    WireOp::Coil { address: a, on } if a == address => Some(on),
                    _ => None,
                })
                .collect()
        })
    }

    pub fn clear_writes(&self) {
        self.with(|s| s.writes.clear());
    }

    /// Reads touching `address` time out until `heal()`.
    pub fn fail_reads_of(&self, address: u16) {
        self.with(|s| {
            s.faulty.insert(address);
        });
    }

    /// Writes to `address` time out until `heal()`.
    pub fn fail_writes_of(&self, address: u16) {
        self.with(|s| {
            s.faulty_writes.insert(address);
        });
    }

    pub fn heal(&self) {
        self.with(|s| {
            s.faulty.clear();
            s.faulty_writes.clear();
        });
    }

    /// Every transaction on an open bus fails with a broken pipe, and new
    /// opens fail, until `replug()`.
    pub fn unplug(&self) {
        self.with(|s| s.unplugged = true);
    }

    pub fn replug(&self) {
        self.with(|s| s.unplugged = false);
    }

    /// Make `open` fail as if the port did not exist.
    pub fn set_port_missing(&self, missing: bool) {
        self.with(|s| s.port_missing = missing);
    }

    /// Number of successful opens.
    pub fn opens(&self) -> usize {
        self.with(|s| s.opens)
    }
}

/// `Connector` handing out buses that share the simulated device state.
#[derive(Debug, Clone)]
pub struct SimConnector {
    plc: SimulatedPlc,
}

impl Connector for SimConnector {
    fn open(
        &mut self,
        settings: &SerialSettings,
    ) -> Result<Box<dyn RegisterBus>, Box<dyn std::error::Error + Send + Sync>> {
        self.plc.with(|s| {
            if s.port_missing || s.unplugged {
                return Err(HwError::Serial(format!("no such port: {}", settings.port)));
            }
            s.opens += 1;
            Ok(())
        })?;
        trace!(port = %settings.port, "simulated port open");
        Ok(Box::new(SimBus {
            plc: self.plc.clone(),
        }))
    }
}

struct SimBus {
    plc: SimulatedPlc,
}

fn unplugged() -> HwError {
    HwError::Io(std::io::Error::new(
        std::io::ErrorKind::BrokenPipe,
        "cable unplugged",
    ))
}

fn span(address: u16, count: u16) -> impl Iterator<Item = u16> {
    (0..count).map(move |i| address.wrapping_add(i))
}

impl RegisterBus for SimBus {
    fn read_holding_registers(
        &mut self,
        address: u16,
        count: u16,
    ) -> Result<Vec<u16>, Box<dyn std::error::Error + Send + Sync>> {
        self.plc.with(|s| {
            if s.unplugged {
                return Err(unplugged().into());
            }
            if span(address, count).any(|a| s.faulty.contains(&a)) {
                return Err(HwError::Timeout.into());
            }
            if s.motion.is_some_and(|m| m.distance_register == address) {
                s.step_motion();
            }
            Ok(span(address, count)
                .map(|a| s.registers.get(&a).copied().unwrap_or(0))
                .collect())
        })
    }

    fn read_coils(
        &mut self,
        address: u16,
        count: u16,
    ) -> Result<Vec<bool>, Box<dyn std::error::Error + Send + Sync>> {
        self.plc.with(|s| {
            if s.unplugged {
                return Err(unplugged().into());
            }
            if span(address, count).any(|a| s.faulty.contains(&a)) {
                return Err(HwError::Timeout.into());
            }
            Ok(span(address, count).map(|a| s.coil(a)).collect())
        })
    }

    fn write_single_register(
        &mut self,
        address: u16,
        value: u16,
    ) -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
        self.plc.with(|s| {
            if s.unplugged {
                return Err(unplugged().into());
            }
            if s.faulty_writes.contains(&address) {
                return Err(HwError::Timeout.into());
            }
            s.registers.insert(address, value);
            s.writes.push(WireOp::Register { address, value });
            Ok(())
        })
    }

    fn write_single_coil(
        &mut self,
        address: u16,
        on: bool,
    ) -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
        self.plc.with(|s| {
            if s.unplugged {
                return Err(unplugged().into());
            }
            if s.faulty_writes.contains(&address) {
                return Err(HwError::Timeout.into());
            }
            s.coils.insert(address, on);
            s.writes.push(WireOp::Coil { address, on });
            Ok(())
        })
    }
}
