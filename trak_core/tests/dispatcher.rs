mod common;

use common::{connected_rig, rig_with};
use rstest::rstest;
use trak_core::registers::{
    COIL_CLAMP, COIL_HEATING, COIL_HOME, COIL_INSERTION, COIL_MANUAL, COIL_RETRACTION,
};
use trak_core::{CoilSet, ControlError, ControllerCore, DeviceConfig, PulseCoil};
use trak_hardware::{SimulatedPlc, WireOp};

fn coil(address: u16, on: bool) -> WireOp {
    WireOp::Coil { address, on }
}

#[test]
fn heater_toggled_twice_returns_with_two_writes() {
    let mut rig = connected_rig();
    assert_eq!(rig.core.toggle_heater(), Ok(true));
    assert_eq!(rig.core.toggle_heater(), Ok(false));
    assert!(!rig.core.coils().heater);
    assert_eq!(
        rig.plc.writes(),
        vec![coil(COIL_HEATING, true), coil(COIL_HEATING, false)]
    );
}

#[test]
fn clamp_asserts_manual_first() {
    let mut rig = connected_rig();
    assert_eq!(rig.core.toggle_clamp(), Ok(true));
    assert_eq!(
        rig.plc.writes(),
        vec![coil(COIL_MANUAL, true), coil(COIL_CLAMP, true)]
    );
}

#[test]
fn clamp_keeps_previous_state_when_second_write_fails() {
    let mut rig = connected_rig();
    rig.core.toggle_clamp().unwrap();
    rig.plc.clear_writes();
    rig.plc.fail_writes_of(COIL_CLAMP);

    let err = rig.core.toggle_clamp().unwrap_err();
    assert!(matches!(err, ControlError::IoFailure(_)));
    assert!(rig.core.coils().clamp);
    assert!(rig.core.is_connected());
    assert_eq!(rig.plc.writes(), vec![coil(COIL_MANUAL, true)]);
}

#[test]
fn unplug_during_command_drops_the_link() {
    let mut rig = connected_rig();
    rig.plc.unplug();
    assert!(matches!(
        rig.core.toggle_heater(),
        Err(ControlError::IoFailure(_))
    ));
    assert!(!rig.core.coils().heater);
    assert!(!rig.core.is_connected());
    assert_eq!(
        rig.core.toggle_heater(),
        Err(ControlError::NotConnected)
    );
}

#[test]
fn insertion_clears_retraction_first() {
    let mut rig = connected_rig();
    rig.core.toggle_retraction().unwrap();
    rig.plc.clear_writes();

    assert_eq!(rig.core.toggle_insertion(), Ok(true));
    let coils = rig.core.coils();
    assert!(coils.insertion);
    assert!(!coils.retraction);
    assert_eq!(
        rig.plc.writes(),
        vec![
            coil(COIL_MANUAL, true),
            coil(COIL_RETRACTION, false),
            coil(COIL_INSERTION, true),
        ]
    );
}

type Op = fn(&mut ControllerCore) -> trak_core::Result<bool>;

#[rstest]
#[case::heater(ControllerCore::toggle_heater)]
#[case::clamp(ControllerCore::toggle_clamp)]
#[case::insertion(ControllerCore::toggle_insertion)]
#[case::retraction(ControllerCore::toggle_retraction)]
#[case::home(ControllerCore::pulse_home)]
#[case::start(|c: &mut ControllerCore| c.pulse_coil(PulseCoil::Start))]
#[case::manual(ControllerCore::enter_manual_mode)]
fn commands_need_a_link(#[case] op: Op) {
    let mut rig = rig_with(SimulatedPlc::new());
    assert_eq!(op(&mut rig.core), Err(ControlError::NotConnected));
    assert_eq!(rig.core.coils(), CoilSet::default());
    assert!(rig.plc.writes().is_empty());
}

#[test]
fn manual_mode_turns_motion_off() {
    let mut rig = connected_rig();
    rig.core.toggle_insertion().unwrap();
    rig.core.toggle_clamp().unwrap();
    rig.plc.clear_writes();

    assert_eq!(rig.core.enter_manual_mode(), Ok(true));
    let coils = rig.core.coils();
    assert!(!coils.insertion && !coils.retraction && !coils.clamp);
    assert_eq!(
        rig.plc.writes(),
        vec![
            coil(COIL_MANUAL, true),
            coil(COIL_RETRACTION, false),
            coil(COIL_INSERTION, false),
            coil(COIL_CLAMP, false),
        ]
    );
}

#[test]
fn home_forces_motion_off_before_asserting_home() {
    let mut rig = connected_rig();
    rig.core.toggle_insertion().unwrap();
    rig.plc.clear_writes();

    assert_eq!(rig.core.pulse_home(), Ok(true));
    assert_eq!(
        rig.plc.writes(),
        vec![
            coil(COIL_INSERTION, false),
            coil(COIL_RETRACTION, false),
            coil(COIL_HOME, true),
        ]
    );
    assert!(rig.core.coils().homing);
    assert!(!rig.core.coils().insertion);
}

fn device_config() -> DeviceConfig {
    DeviceConfig {
        path_length_mm: 120,
        threshold_force_mn: 4000.0,
        temperature_c: 37.5,
        retraction_length_mm: 20.0,
    }
}

#[test]
fn device_config_is_written_in_order() {
    let mut rig = connected_rig();
    rig.core.send_device_config(&device_config()).unwrap();
    let registers: Vec<WireOp> = rig
        .plc
        .writes()
        .into_iter()
        .filter(|w| matches!(w, WireOp::Register { .. }))
        .collect();
    assert_eq!(
        registers,
        vec![
            WireOp::Register { address: 6000, value: 120 },
            WireOp::Register { address: 150, value: 4000 },
            WireOp::Register { address: 510, value: 375 },
            WireOp::Register { address: 122, value: 20 },
        ]
    );
}

#[test]
fn out_of_range_config_writes_nothing() {
    let mut rig = connected_rig();
    let cfg = DeviceConfig {
        retraction_length_mm: 70_000.0,
        ..device_config()
    };
    let err = rig.core.send_device_config(&cfg).unwrap_err();
    assert_eq!(
        err,
        ControlError::OutOfRange {
            field: "retraction_length_mm",
            value: 70_000.0
        }
    );
    assert!(rig.plc.writes().is_empty());
}

#[test]
fn readback_failure_does_not_fail_the_push() {
    let mut rig = connected_rig();
    rig.plc.fail_reads_of(510);
    assert_eq!(rig.core.send_device_config(&device_config()), Ok(()));
    assert!(rig.core.is_connected());
}

#[test]
fn debug_registers_returns_raw_words() {
    let mut rig = connected_rig();
    rig.plc.set_register(6116, 0xFFFE);
    rig.plc.set_register(54, 0x0000);
    rig.plc.set_register(55, 0x457A);
    rig.plc.set_register(501, 37);
    let raw = rig.core.debug_registers().unwrap();
    assert_eq!(raw.distance, 0xFFFE);
    assert_eq!(raw.force, [0x0000, 0x457A]);
    assert_eq!(raw.temperature, 37);
    assert!(!raw.home_sensor);
}
