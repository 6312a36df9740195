mod common;

use std::time::Duration;

use common::{connected_rig, rig_with};
use trak_core::registers::COIL_START;
use trak_core::{Event, LinkState, PulseCoil};
use trak_hardware::SimulatedPlc;
use trak_traits::SerialSettings;

const TICK: Duration = Duration::from_millis(500);

fn samples(rx: &crossbeam_channel::Receiver<Event>) -> Vec<trak_core::SensorSample> {
    rx.try_iter()
        .filter_map(|e| match e {
            Event::Sample(s) => Some(s),
            _ => None,
        })
        .collect()
}

#[test]
fn connected_tick_reads_the_device() {
    let mut rig = connected_rig();
    rig.plc.set_register(6116, 250);
    rig.plc.set_register(54, 0x0000);
    rig.plc.set_register(55, 0x457A);
    rig.plc.set_register(501, 37);
    let rx = rig.events.subscribe();

    rig.clock.advance(TICK - Duration::from_millis(1));
    rig.core.run_due_timers();
    assert!(samples(&rx).is_empty());

    rig.clock.advance(Duration::from_millis(1));
    rig.core.run_due_timers();
    let got = samples(&rx);
    assert_eq!(got.len(), 1);
    let s = &got[0];
    assert!(!s.simulated);
    assert_eq!(s.distance_mm, 250.0);
    assert_eq!(s.force_mn, 4000.0);
    assert_eq!(s.force_n(), 4.0);
    assert_eq!(s.temperature_c, 37.0);
    assert_eq!(s.position_pct, 25.0);
}

#[test]
fn negative_distance_is_signed() {
    let mut rig = connected_rig();
    rig.plc.set_register(6116, 0xFFF6);
    let s = rig.core.read_data();
    assert_eq!(s.distance_mm, -10.0);
    assert_eq!(s.position_pct, 0.0);
}

#[test]
fn one_failed_read_makes_the_whole_sample_synthetic() {
    let mut rig = connected_rig();
    rig.plc.set_register(6116, 250);
    rig.plc.fail_reads_of(55);
    let s = rig.core.read_data();
    assert!(s.simulated);
    assert!(rig.core.is_connected());
    assert!((1000.0..6000.0).contains(&s.force_mn));
}

#[test]
fn disconnected_read_is_synthetic_and_in_range() {
    let mut rig = rig_with(SimulatedPlc::new());
    for _ in 0..50 {
        let s = rig.core.read_data();
        assert!(s.simulated);
        assert!((0.0..1000.0).contains(&s.distance_mm));
        assert!((1000.0..6000.0).contains(&s.force_mn));
        assert!((20.0..30.0).contains(&s.temperature_c));
    }
    assert!(rig.plc.writes().is_empty());
}

#[test]
fn no_ticks_while_disconnected() {
    let mut rig = rig_with(SimulatedPlc::new());
    assert_eq!(rig.core.next_deadline(), None);

    rig.core.connect(SerialSettings::new("SIM")).unwrap();
    assert!(rig.core.next_deadline().is_some());

    rig.core.disconnect();
    assert_eq!(rig.core.next_deadline(), None);
}

#[test]
fn reconnect_starts_a_fresh_cadence() {
    let mut rig = connected_rig();
    let first = rig.core.next_deadline().unwrap();
    rig.clock.advance(Duration::from_millis(300));
    rig.core.reconnect().unwrap();
    assert_eq!(
        rig.core.next_deadline().unwrap(),
        first + Duration::from_millis(300)
    );
}

#[test]
fn link_loss_during_tick_stops_polling() {
    let mut rig = connected_rig();
    let rx = rig.events.subscribe();
    rig.plc.unplug();
    rig.clock.advance(TICK);
    rig.core.run_due_timers();

    let seen: Vec<Event> = rx.try_iter().collect();
    assert!(seen.contains(&Event::LinkStateChanged(LinkState::Disconnected)));
    assert!(seen.iter().any(|e| matches!(e, Event::Sample(s) if s.simulated)));
    assert_eq!(rig.core.next_deadline(), None);
}

#[test]
fn pulse_is_cleared_after_the_window() {
    let mut rig = connected_rig();
    rig.core.pulse_coil(PulseCoil::Start).unwrap();
    assert_eq!(rig.plc.coil_writes(COIL_START), vec![true]);

    rig.clock.advance(Duration::from_millis(1999));
    rig.core.run_due_timers();
    assert_eq!(rig.plc.coil_writes(COIL_START), vec![true]);

    rig.clock.advance(Duration::from_millis(1));
    rig.core.run_due_timers();
    assert_eq!(rig.plc.coil_writes(COIL_START), vec![true, false]);
}

#[test]
fn reconnect_mid_pulse_still_clears_the_coil() {
    let mut rig = connected_rig();
    rig.core.pulse_coil(PulseCoil::Start).unwrap();
    rig.clock.advance(TICK);
    rig.core.reconnect().unwrap();
    assert!(rig.core.next_deadline().is_some());

    rig.clock.advance(Duration::from_secs(5));
    rig.core.run_due_timers();
    assert!(!rig.plc.coil(COIL_START));
    assert_eq!(rig.plc.coil_writes(COIL_START), vec![true, false]);
}

#[test]
fn pulse_due_while_disconnected_is_dropped_without_writing() {
    let mut rig = connected_rig();
    rig.core.pulse_coil(PulseCoil::Start).unwrap();
    rig.core.disconnect();

    rig.clock.advance(Duration::from_secs(3));
    rig.core.run_due_timers();
    assert_eq!(rig.plc.coil_writes(COIL_START), vec![true]);
    assert_eq!(rig.core.next_deadline(), None);

    // A later reconnect does not resurrect the dropped clear.
    rig.core.connect_default().unwrap();
    rig.clock.advance(Duration::from_secs(3));
    rig.core.run_due_timers();
    assert_eq!(rig.plc.coil_writes(COIL_START), vec![true]);
}

#[test]
fn latest_sample_is_retained() {
    let mut rig = connected_rig();
    assert!(rig.core.latest_sample().is_none());
    rig.plc.set_register(501, 25);
    rig.core.read_data();
    rig.plc.set_register(501, 26);
    rig.core.read_data();
    assert_eq!(rig.core.latest_sample().unwrap().temperature_c, 26.0);
}
