//! Homing and safety state machine.
//!
//! Idle → Homing on `pulse_home`; Homing → AtHome when a real sample reports
//! the home sensor active; AtHome → Idle on the next motion command. Link loss
//! and safety trips drop straight back to Idle. Synthetic samples never drive
//! a transition.

use serde::Serialize;
use tracing::{info, warn};

use crate::core::ControllerCore;
use crate::events::Event;
use crate::registers::Coil;
use crate::types::{CoilSet, HomingState, SensorSample};

/// External safety inputs. Commands are locked while either is tripped.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct SafetySignals {
    pub emergency: bool,
    pub power_present: bool,
}

impl Default for SafetySignals {
    fn default() -> Self {
        Self {
            emergency: false,
            power_present: true,
        }
    }
}

impl SafetySignals {
    pub fn locked(&self) -> bool {
        self.emergency || !self.power_present
    }
}

/// Coils forced off on a safety trip.
const TRIP_COILS: [Coil; 5] = [
    Coil::Insertion,
    Coil::Retraction,
    Coil::Home,
    Coil::Clamp,
    Coil::Heating,
];

impl ControllerCore {
    pub(crate) fn enter_homing(&mut self) {
        if self.homing != HomingState::Homing {
            info!(from = ?self.homing, "homing started");
        }
        self.homing = HomingState::Homing;
    }

    pub(crate) fn note_motion_command(&mut self) {
        if self.homing == HomingState::AtHome {
            self.homing = HomingState::Idle;
        }
    }

    pub(crate) fn observe_sample(&mut self, sample: &SensorSample) {
        if sample.simulated {
            return;
        }
        let active = sample.home_sensor_active;
        if self.last_home_sensor != Some(active) {
            self.last_home_sensor = Some(active);
            self.events.publish(Event::HomeSensorChanged(active));
        }
        if active && self.homing == HomingState::Homing {
            self.homing = HomingState::AtHome;
            self.coils.homing = false;
            if let Err(e) = self.link.write_coil(Coil::Home.address(), false) {
                warn!(error = %e, "failed to release HOME after arrival");
            }
            info!(distance_mm = sample.distance_mm, "home position reached");
        }
    }

    pub(crate) fn reset_homing_on_link_down(&mut self) {
        if self.homing != HomingState::Idle {
            warn!(from = ?self.homing, "link down; homing reset");
        }
        self.homing = HomingState::Idle;
        self.coils.homing = false;
        self.last_home_sensor = None;
    }

    /// Emergency-stop input. Publishes only on change.
    pub fn set_emergency(&mut self, active: bool) {
        if self.safety.emergency == active {
            return;
        }
        self.safety.emergency = active;
        self.events.publish(Event::EmergencyChanged(active));
        if active {
            self.trip("emergency stop");
        } else {
            self.log_release();
        }
    }

    /// Supply-power input; `false` means power was lost. Publishes only on change.
    pub fn set_power(&mut self, present: bool) {
        if self.safety.power_present == present {
            return;
        }
        self.safety.power_present = present;
        self.events.publish(Event::PowerChanged(present));
        if present {
            self.log_release();
        } else {
            self.trip("power loss");
        }
    }

    fn log_release(&self) {
        if self.safety.locked() {
            info!(safety = ?self.safety, "one safety input cleared; still locked");
        } else {
            info!("safety interlock released");
        }
    }

    /// Force every actuator off. Local state is reset unconditionally; the
    /// device writes are best effort.
    fn trip(&mut self, reason: &'static str) {
        warn!(reason, coils = ?self.coils, "safety trip; forcing actuators off");
        self.coils = CoilSet::default();
        self.homing = HomingState::Idle;
        if !self.link.is_connected() {
            return;
        }
        for coil in TRIP_COILS {
            if let Err(e) = self.link.write_coil(coil.address(), false) {
                warn!(coil = %coil, error = %e, "safety write failed");
                if !self.link.is_connected() {
                    break;
                }
            }
        }
    }
}
