//! Command execution: builds a controller over the configured backend and
//! runs one subcommand against it.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::{Duration, Instant};

use eyre::WrapErr;
use trak_config::Config;
use trak_config::profiles::{ProfileStore, TestProfile};
use trak_core::{
    CommandOutcome, ConnectionStatus, Controller, ControllerCfg, DeviceConfig, Event, HomingState,
    PulseCoil, SensorSample,
};
use trak_traits::{Connector, SerialSettings};

use crate::cli::{Cli, Commands, ProfilesCmd, PushConfigArgs};

#[cfg(feature = "hardware")]
fn connector(cfg: &Config) -> impl Connector + 'static {
    trak_hardware::SerialConnector::new(
        cfg.link.slave_id,
        Duration::from_millis(cfg.link.timeout_ms),
    )
}

/// Set to any value to make the simulated port fail to open.
#[cfg(not(feature = "hardware"))]
pub const SIM_PORT_MISSING_ENV: &str = "TRAK_SIM_PORT_MISSING";

#[cfg(not(feature = "hardware"))]
fn connector(cfg: &Config) -> impl Connector + 'static {
    use trak_core::registers::{
        COIL_HOME, COIL_INSERTION, COIL_RETRACTION, REG_DISTANCE, REG_FORCE, REG_TEMPERATURE,
    };
    use trak_hardware::sim::{MotionProfile, SimulatedPlc};

    let plc = SimulatedPlc::new().with_motion(MotionProfile {
        distance_register: REG_DISTANCE,
        insertion_coil: COIL_INSERTION,
        retraction_coil: COIL_RETRACTION,
        home_coil: COIL_HOME,
        home_sensor_coil: cfg.polling.home_sensor_coil,
        step_mm: 25,
        max_mm: cfg.polling.max_travel_mm.clamp(0.0, f64::from(i16::MAX)) as i16,
    });
    // Idle fixture: catheter partly inserted, light load, bath at room temperature.
    let (lo, hi) = trak_core::encode_f32_le(1250.0);
    plc.set_register(REG_FORCE, lo);
    plc.set_register(REG_FORCE + 1, hi);
    plc.set_register(REG_TEMPERATURE, 24);
    plc.set_register(REG_DISTANCE, 120);
    if std::env::var_os(SIM_PORT_MISSING_ENV).is_some() {
        plc.set_port_missing(true);
    }
    tracing::debug!("using simulated fixture");
    plc.connector()
}

fn build_controller(cfg: &Config, auto_connect: bool) -> eyre::Result<Controller> {
    let ctl = Controller::builder()
        .with_connector(connector(cfg))
        .with_settings(SerialSettings::from(&cfg.link))
        .with_cfg(ControllerCfg::from(cfg))
        .auto_connect(auto_connect)
        .build()?;
    Ok(ctl)
}

fn print_json<T: serde::Serialize>(value: &T) -> eyre::Result<()> {
    println!("{}", serde_json::to_string(value)?);
    Ok(())
}

fn print_sample(s: &SensorSample, json: bool) -> eyre::Result<()> {
    if json {
        return print_json(s);
    }
    println!(
        "distance {:>7.1} mm ({:>5.1}%)  force {:>8.3} N  temperature {:>5.1} °C  home {}{}",
        s.distance_mm,
        s.position_pct,
        s.force_n(),
        s.temperature_c,
        if s.home_sensor_active { "yes" } else { "no" },
        if s.simulated { "  [simulated]" } else { "" },
    );
    Ok(())
}

fn print_status(s: &ConnectionStatus, json: bool) -> eyre::Result<()> {
    if json {
        return print_json(s);
    }
    let state = if s.connected { "connected" } else { "disconnected" };
    println!("{} {state} at {}", s.port, s.timestamp.to_rfc3339());
    Ok(())
}

/// Print the outcome; a failed outcome becomes the command's error.
fn finish(outcome: CommandOutcome, json: bool) -> eyre::Result<()> {
    if json {
        print_json(&outcome)?;
    } else if outcome.success {
        println!("{}", outcome.message);
    }
    outcome.into_result()?;
    Ok(())
}

/// Open the link for a command that needs the device.
fn connect(ctl: &Controller) -> eyre::Result<()> {
    ctl.connect_default()?;
    Ok(())
}

/// Open the link if possible; sampling commands fall back to synthetic data.
fn try_connect(ctl: &Controller) {
    if let Err(e) = ctl.connect_default() {
        tracing::warn!(error = %e, "device unreachable; continuing without it");
    }
}

pub fn execute(cli: &Cli, cfg: &Config) -> eyre::Result<()> {
    let json = cli.json;
    match &cli.cmd {
        Commands::Profiles { cmd } => return profiles(cmd, cfg, json),
        Commands::Check => {
            let ctl = build_controller(cfg, false)?;
            try_connect(&ctl);
            return print_status(&ctl.check_connection()?, json);
        }
        Commands::Monitor { ticks } => {
            // Long-running: the link comes up only if [link].auto_connect says so.
            let ctl = build_controller(cfg, cfg.link.auto_connect)?;
            return monitor(&ctl, cfg, *ticks, json);
        }
        _ => {}
    }

    let ctl = build_controller(cfg, false)?;
    match &cli.cmd {
        Commands::Read => {
            try_connect(&ctl);
            print_sample(&ctl.read_data(), json)
        }
        Commands::Home { wait, wait_ms } => {
            connect(&ctl)?;
            let outcome = ctl.pulse_home();
            let ok = outcome.success;
            finish(outcome, json)?;
            if ok && *wait {
                wait_for_home(&ctl, Duration::from_millis(*wait_ms))?;
                if !json {
                    println!("home position reached");
                }
            }
            Ok(())
        }
        Commands::Clamp => one_shot(&ctl, json, Controller::toggle_clamp),
        Commands::Heater => one_shot(&ctl, json, Controller::toggle_heater),
        Commands::Insertion => one_shot(&ctl, json, Controller::toggle_insertion),
        Commands::Retraction => one_shot(&ctl, json, Controller::toggle_retraction),
        Commands::Start => pulse(&ctl, cfg, json, PulseCoil::Start),
        Commands::Stop => pulse(&ctl, cfg, json, PulseCoil::Stop),
        Commands::Reset => pulse(&ctl, cfg, json, PulseCoil::Reset),
        Commands::Manual => one_shot(&ctl, json, Controller::enter_manual_mode),
        Commands::PushConfig(args) => push_config(&ctl, cfg, args, json),
        Commands::Registers => {
            connect(&ctl)?;
            let raw = ctl.debug_registers()?;
            if json {
                return print_json(&raw);
            }
            println!(
                "distance {:#06x}  force {:#06x} {:#06x}  temperature {:#06x}  home {}",
                raw.distance, raw.force[0], raw.force[1], raw.temperature, raw.home_sensor
            );
            Ok(())
        }
        Commands::Check | Commands::Monitor { .. } | Commands::Profiles { .. } => Ok(()),
    }
}

fn one_shot(
    ctl: &Controller,
    json: bool,
    f: impl FnOnce(&Controller) -> CommandOutcome,
) -> eyre::Result<()> {
    connect(ctl)?;
    finish(f(ctl), json)
}

/// Pulse a coil and stay alive until the worker has cleared it again.
fn pulse(ctl: &Controller, cfg: &Config, json: bool, coil: PulseCoil) -> eyre::Result<()> {
    connect(ctl)?;
    finish(ctl.pulse_coil(coil), json)?;
    std::thread::sleep(Duration::from_millis(cfg.pulse.clear_ms) + Duration::from_millis(50));
    Ok(())
}

fn wait_for_home(ctl: &Controller, limit: Duration) -> eyre::Result<()> {
    let events = ctl.subscribe();
    let deadline = Instant::now() + limit;
    loop {
        if ctl.homing_state() == HomingState::AtHome {
            return Ok(());
        }
        if !ctl.is_connected() {
            return Err(eyre::Report::new(trak_core::ControlError::NotConnected))
                .wrap_err("link lost while homing");
        }
        let now = Instant::now();
        if now >= deadline {
            eyre::bail!("home sensor not reached within {} ms", limit.as_millis());
        }
        // Any event may carry the transition; re-check state after each.
        let _ = events.recv_timeout((deadline - now).min(Duration::from_millis(100)));
    }
}

fn push_config(
    ctl: &Controller,
    cfg: &Config,
    args: &PushConfigArgs,
    json: bool,
) -> eyre::Result<()> {
    let store = ProfileStore::new(&cfg.profiles.path);
    let device = match &args.profile {
        Some(name) => {
            let profile = store
                .find(name)?
                .ok_or_else(|| eyre::eyre!("no profile named {name:?} in {}", store.path().display()))?;
            DeviceConfig::from(&profile)
        }
        None => DeviceConfig {
            path_length_mm: args.path_length.unwrap_or_default(),
            threshold_force_mn: args.threshold_force.unwrap_or_default(),
            temperature_c: args.temperature.unwrap_or_default(),
            retraction_length_mm: args.retraction_length.unwrap_or_default(),
        },
    };
    // Reject unencodable values before touching the link.
    device.encode()?;

    connect(ctl)?;
    ctl.send_device_config(device)?;
    tracing::info!(?device, "device config written");

    if let Some(name) = &args.save_as {
        store.upsert(TestProfile {
            name: name.clone(),
            path_length_mm: device.path_length_mm,
            threshold_force_mn: device.threshold_force_mn,
            temperature_c: device.temperature_c,
            retraction_length_mm: device.retraction_length_mm,
            number_of_curves: 0,
            curve_distances: serde_json::Map::new(),
        })?;
    }

    if json {
        print_json(&serde_json::json!({ "success": true, "config": device }))
    } else {
        println!("device config written");
        Ok(())
    }
}

fn profiles(cmd: &ProfilesCmd, cfg: &Config, json: bool) -> eyre::Result<()> {
    let store = ProfileStore::new(&cfg.profiles.path);
    match cmd {
        ProfilesCmd::List => {
            let all = store.load()?;
            if json {
                return print_json(&all);
            }
            for p in &all {
                println!(
                    "{}: path {} mm, threshold {} mN, {} °C, retract {} mm, {} curves",
                    p.name,
                    p.path_length_mm,
                    p.threshold_force_mn,
                    p.temperature_c,
                    p.retraction_length_mm,
                    p.number_of_curves
                );
            }
            Ok(())
        }
        ProfilesCmd::Delete { name } => {
            if !store.delete(name)? {
                eyre::bail!("no profile named {name:?} in {}", store.path().display());
            }
            if json {
                print_json(&serde_json::json!({ "deleted": name }))
            } else {
                println!("deleted {name}");
                Ok(())
            }
        }
    }
}

fn print_event(event: &Event, json: bool) -> eyre::Result<()> {
    let (name, value) = match event {
        Event::Sample(s) => return print_sample(s, json),
        Event::LinkStateChanged(state) => ("link", serde_json::to_value(state)?),
        Event::HomeSensorChanged(on) => ("home_sensor", serde_json::Value::from(*on)),
        Event::EmergencyChanged(on) => ("emergency", serde_json::Value::from(*on)),
        Event::PowerChanged(present) => ("power_present", serde_json::Value::from(*present)),
    };
    if json {
        print_json(&serde_json::json!({ "event": name, "value": value }))
    } else {
        println!("{name}: {value}");
        Ok(())
    }
}

fn monitor(ctl: &Controller, cfg: &Config, ticks: Option<u64>, json: bool) -> eyre::Result<()> {
    let stop = Arc::new(AtomicBool::new(false));
    {
        let stop = stop.clone();
        ctrlc::set_handler(move || stop.store(true, Ordering::SeqCst))
            .wrap_err("install Ctrl-C handler")?;
    }

    let events = ctl.subscribe();
    let interval = Duration::from_millis(cfg.polling.interval_ms);
    let mut seen = 0u64;
    let mut last_sample = Instant::now();
    while !stop.load(Ordering::SeqCst) && ticks.is_none_or(|n| seen < n) {
        match events.recv_timeout(Duration::from_millis(100).min(interval)) {
            Ok(event) => {
                if matches!(event, Event::Sample(_)) {
                    seen += 1;
                    last_sample = Instant::now();
                }
                print_event(&event, json)?;
            }
            Err(_) => {}
        }
        // The cadence only runs while connected; sample on demand otherwise.
        if !ctl.is_connected() && last_sample.elapsed() >= interval {
            ctl.read_data();
            last_sample = Instant::now();
        }
    }
    Ok(())
}
