//! Example: drive a simulated fixture through a short session.

use std::time::Duration;

use trak_core::registers::{
    COIL_HOME, COIL_INSERTION, COIL_RETRACTION, DEFAULT_HOME_SENSOR_COIL, REG_DISTANCE,
};
use trak_core::{Controller, ControllerCfg, DeviceConfig, Event, HomingState};
use trak_hardware::{MotionProfile, SimulatedPlc};
use trak_traits::SerialSettings;

fn main() -> Result<(), Box<dyn std::error::Error>> {
    let plc = SimulatedPlc::new().with_motion(MotionProfile {
        distance_register: REG_DISTANCE,
        insertion_coil: COIL_INSERTION,
        retraction_coil: COIL_RETRACTION,
        home_coil: COIL_HOME,
        home_sensor_coil: DEFAULT_HOME_SENSOR_COIL,
        step_mm: 20,
        max_mm: 1000,
    });
    plc.set_register(REG_DISTANCE, 200);

    let ctl = Controller::builder()
        .with_connector(plc.connector())
        .with_settings(SerialSettings::new("SIM"))
        .with_cfg(ControllerCfg {
            poll_interval: Duration::from_millis(50),
            ..ControllerCfg::default()
        })
        .build()?;
    let events = ctl.subscribe();

    ctl.connect_default()?;
    ctl.send_device_config(DeviceConfig {
        path_length_mm: 120,
        threshold_force_mn: 4000.0,
        temperature_c: 37.5,
        retraction_length_mm: 20.0,
    })?;
    println!("{}", ctl.toggle_clamp().message);
    println!("{}", ctl.pulse_home().message);

    while ctl.homing_state() != HomingState::AtHome {
        if !ctl.is_connected() {
            return Err("link lost while homing".into());
        }
        if let Ok(Event::Sample(s)) = events.recv_timeout(Duration::from_secs(1)) {
            println!("distance {:.0} mm, home sensor {}", s.distance_mm, s.home_sensor_active);
        }
    }
    println!("at home; coils now {:?}", ctl.coils());
    Ok(())
}
