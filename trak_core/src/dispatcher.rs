//! Coil commands with interlocks.
//!
//! Every command checks, in order: link connected, safety interlock clear,
//! and (for insertion/retraction) no homing in progress. Rejections never touch the bus.
//! The cached `CoilSet` is only updated after the device accepted the write,
//! so a failed command leaves it exactly as it was.

use tracing::{info, warn};

use crate::core::{ControllerCore, PendingPulse};
use crate::error::{ControlError, Result};
use crate::registers::{Coil, PulseCoil, REG_DISTANCE, REG_FORCE, REG_TEMPERATURE};
use crate::types::{DeviceConfig, HomingState, RawRegisters};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Direction {
    Insert,
    Retract,
}

impl Direction {
    fn coil(self) -> Coil {
        match self {
            Direction::Insert => Coil::Insertion,
            Direction::Retract => Coil::Retraction,
        }
    }

    fn opposing(self) -> Direction {
        match self {
            Direction::Insert => Direction::Retract,
            Direction::Retract => Direction::Insert,
        }
    }
}

impl ControllerCore {
    fn guard(&self) -> Result<()> {
        if !self.link.is_connected() {
            return Err(ControlError::NotConnected);
        }
        if self.safety.locked() {
            return Err(ControlError::SafetyLocked);
        }
        Ok(())
    }

    fn guard_motion(&self) -> Result<()> {
        self.guard()?;
        if self.homing == HomingState::Homing {
            return Err(ControlError::HomingInProgress);
        }
        Ok(())
    }

    fn direction_flag(&mut self, dir: Direction) -> &mut bool {
        match dir {
            Direction::Insert => &mut self.coils.insertion,
            Direction::Retract => &mut self.coils.retraction,
        }
    }

    fn write(&mut self, coil: Coil, on: bool) -> Result<()> {
        self.link.write_coil(coil.address(), on).inspect_err(|e| {
            warn!(coil = %coil, on, error = %e, "coil write failed");
        })
    }

    /// Flip the heater. Not gated by homing and needs no MANUAL mode.
    pub fn toggle_heater(&mut self) -> Result<bool> {
        self.guard()?;
        let next = !self.coils.heater;
        self.write(Coil::Heating, next)?;
        self.coils.heater = next;
        info!(on = next, "heater toggled");
        Ok(next)
    }

    /// Flip the clamp. MANUAL is asserted first. Allowed while homing.
    pub fn toggle_clamp(&mut self) -> Result<bool> {
        self.guard()?;
        let next = !self.coils.clamp;
        self.write(Coil::Manual, true)?;
        self.write(Coil::Clamp, next)?;
        self.coils.clamp = next;
        info!(on = next, "clamp toggled");
        Ok(next)
    }

    pub fn toggle_insertion(&mut self) -> Result<bool> {
        self.drive(Direction::Insert)
    }

    pub fn toggle_retraction(&mut self) -> Result<bool> {
        self.drive(Direction::Retract)
    }

    /// MANUAL, then the opposing direction off, then the requested direction.
    /// Insertion and retraction are never on together.
    fn drive(&mut self, dir: Direction) -> Result<bool> {
        self.guard_motion()?;
        let next = !*self.direction_flag(dir);
        self.write(Coil::Manual, true)?;
        let opposing = dir.opposing();
        self.write(opposing.coil(), false)?;
        *self.direction_flag(opposing) = false;
        self.write(dir.coil(), next)?;
        *self.direction_flag(dir) = next;
        // Only a motion command the device accepted leaves AtHome.
        self.note_motion_command();
        info!(coil = %dir.coil(), on = next, "motion toggled");
        Ok(next)
    }

    /// Start homing: both directions off, then HOME on. HOME stays asserted
    /// until the home sensor reports arrival.
    pub fn pulse_home(&mut self) -> Result<bool> {
        self.guard()?;
        self.write(Coil::Insertion, false)?;
        self.coils.insertion = false;
        self.write(Coil::Retraction, false)?;
        self.coils.retraction = false;
        self.write(Coil::Home, true)?;
        self.coils.homing = true;
        self.enter_homing();
        Ok(true)
    }

    /// Write `coil` true now and schedule the clear after the pulse window.
    pub fn pulse_coil(&mut self, coil: PulseCoil) -> Result<bool> {
        self.guard()?;
        let coil = Coil::from(coil);
        self.write(coil, true)?;
        let due = self.clock.deadline_after(self.cfg.pulse_clear);
        self.pulses.retain(|p| p.coil != coil);
        self.pulses.push(PendingPulse { coil, due });
        info!(coil = %coil, "pulse started");
        Ok(true)
    }

    /// MANUAL on, then every motion coil off.
    pub fn enter_manual_mode(&mut self) -> Result<bool> {
        self.guard()?;
        self.write(Coil::Manual, true)?;
        self.write(Coil::Retraction, false)?;
        self.coils.retraction = false;
        self.write(Coil::Insertion, false)?;
        self.coils.insertion = false;
        self.write(Coil::Clamp, false)?;
        self.coils.clamp = false;
        info!("manual mode");
        Ok(true)
    }

    /// Validate, write and (optionally) read back the process parameters.
    /// Nothing is written if any value is out of range.
    pub fn send_device_config(&mut self, cfg: &DeviceConfig) -> Result<()> {
        self.guard()?;
        let writes = cfg.encode()?;
        for &(address, word) in &writes {
            self.link.write_register(address, word)?;
        }
        info!(?cfg, "device config written");
        if self.cfg.verify_device_config {
            self.verify_device_config(&writes);
        }
        Ok(())
    }

    fn verify_device_config(&mut self, writes: &[(u16, u16)]) {
        for &(address, expected) in writes {
            match self.link.read_registers(address, 1) {
                Ok(words) if words.first() == Some(&expected) => {}
                Ok(words) => warn!(
                    address,
                    expected,
                    actual = ?words.first(),
                    "device config readback mismatch"
                ),
                Err(e) => warn!(address, error = %e, "device config readback failed"),
            }
        }
    }

    /// Raw words behind the live sample registers.
    pub fn debug_registers(&mut self) -> Result<RawRegisters> {
        if !self.link.is_connected() {
            return Err(ControlError::NotConnected);
        }
        let distance = self.link.read_registers(REG_DISTANCE, 1)?;
        let force = self.link.read_registers(REG_FORCE, 2)?;
        let temperature = self.link.read_registers(REG_TEMPERATURE, 1)?;
        let home = self.link.read_coils(self.cfg.home_sensor_coil, 1)?;
        Ok(RawRegisters {
            distance: distance[0],
            force: [force[0], force[1]],
            temperature: temperature[0],
            home_sensor: home[0],
        })
    }
}
