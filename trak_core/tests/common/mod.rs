#![allow(dead_code)]

use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};

use rand::SeedableRng;
use rand::rngs::StdRng;
use trak_core::{ControllerCfg, ControllerCore, EventBus, LinkManager};
use trak_hardware::{MotionProfile, SimulatedPlc};
use trak_traits::{Clock, SerialSettings};

/// Clock that only moves when told to.
#[derive(Clone)]
pub struct ManualClock(Arc<Mutex<Instant>>);

impl ManualClock {
    pub fn new() -> Self {
        Self(Arc::new(Mutex::new(Instant::now())))
    }

    pub fn advance(&self, d: Duration) {
        let mut now = self.0.lock().unwrap();
        *now += d;
    }
}

impl Clock for ManualClock {
    fn now(&self) -> Instant {
        *self.0.lock().unwrap()
    }
}

pub fn motion_profile() -> MotionProfile {
    MotionProfile {
        distance_register: 6116,
        insertion_coil: 2008,
        retraction_coil: 2009,
        home_coil: 2001,
        home_sensor_coil: 2010,
        step_mm: 10,
        max_mm: 1000,
    }
}

pub struct Rig {
    pub plc: SimulatedPlc,
    pub core: ControllerCore,
    pub clock: ManualClock,
    pub events: EventBus,
}

/// Core wired to a simulated device, not yet connected.
pub fn rig_with(plc: SimulatedPlc) -> Rig {
    let events = EventBus::new();
    let clock = ManualClock::new();
    let link = LinkManager::new(
        Box::new(plc.connector()),
        SerialSettings::new("SIM"),
        events.clone(),
    );
    let core = ControllerCore::new(
        ControllerCfg::default(),
        link,
        events.clone(),
        Arc::new(clock.clone()),
        StdRng::seed_from_u64(42),
    );
    Rig {
        plc,
        core,
        clock,
        events,
    }
}

/// Connected core over a plain simulated device.
pub fn connected_rig() -> Rig {
    let mut rig = rig_with(SimulatedPlc::new());
    rig.core.connect(SerialSettings::new("SIM")).unwrap();
    rig
}
