use assert_cmd::prelude::*;
use predicates::prelude::*;
use rstest::rstest;
use std::fs;
use std::path::{Path, PathBuf};
use std::process::Command;
use tempfile::{TempDir, tempdir};

// Fast timings so polling, pulses and homing finish quickly against the simulator.
fn write_config(dir: &TempDir) -> PathBuf {
    let profiles = dir.path().join("profiles.csv");
    let toml = format!(
        r#"
[link]
port = "SIM0"

[polling]
interval_ms = 20
max_travel_mm = 1000.0

[pulse]
clear_ms = 50

[profiles]
path = "{}"
"#,
        profiles.display().to_string().replace('\\', "/")
    );
    let path = dir.path().join("trak.toml");
    fs::write(&path, toml).unwrap();
    path
}

fn trak(cfg: &Path) -> Command {
    let mut cmd = Command::cargo_bin("trak").unwrap();
    cmd.env_remove("TRAK_SIM_PORT_MISSING")
        .env_remove("RUST_LOG")
        .arg("--config")
        .arg(cfg);
    cmd
}

#[rstest]
#[case(&["--help"], 0, "Usage:", "stdout")]
#[case(&["check"], 0, "SIM0 connected", "stdout")]
#[case(&["heater"], 0, "HEATER turned on", "stdout")]
#[case(&["clamp"], 0, "CLAMP turned on", "stdout")]
#[case(&["insertion"], 0, "INSERTION turned on", "stdout")]
#[case(&["manual"], 0, "MANUAL-MODE executed", "stdout")]
#[case(&["start"], 0, "START executed", "stdout")]
#[case(&["read"], 0, "distance", "stdout")]
#[case(&["push-config", "--path-length", "120"], 2, "required", "stderr")]
#[case(
    &["push-config", "--path-length", "120", "--threshold-force", "4000", "--temperature", "37.5", "--retraction-length", "20"],
    0,
    "device config written",
    "stdout"
)]
#[case(
    &["push-config", "--path-length", "120", "--threshold-force", "4000", "--temperature", "4000", "--retraction-length", "20"],
    6,
    "temperature_c",
    "stderr"
)]
#[case(&["push-config", "--profile", "nope"], 1, "no profile named", "stderr")]
#[case(&["profiles", "delete", "nope"], 1, "no profile named", "stderr")]
fn cli_table_cases(
    #[case] args: &[&str],
    #[case] exit_code: i32,
    #[case] needle: &str,
    #[case] stream: &str,
) {
    let dir = tempdir().unwrap();
    let cfg = write_config(&dir);
    let assert = trak(&cfg).args(args).assert().code(exit_code);
    match stream {
        "stdout" => {
            assert.stdout(predicate::str::contains(needle));
        }
        _ => {
            assert.stderr(predicate::str::contains(needle));
        }
    }
}

#[rstest]
#[case("heater", 4)]
#[case("home", 4)]
#[case("registers", 4)]
fn missing_port_maps_to_link_unavailable(#[case] command: &str, #[case] code: i32) {
    let dir = tempdir().unwrap();
    let cfg = write_config(&dir);
    trak(&cfg)
        .env("TRAK_SIM_PORT_MISSING", "1")
        .arg(command)
        .assert()
        .code(code)
        .stderr(predicate::str::contains("Could not open the serial link"));
}

#[test]
fn check_reports_disconnected_without_failing() {
    let dir = tempdir().unwrap();
    let cfg = write_config(&dir);
    let out = trak(&cfg)
        .env("TRAK_SIM_PORT_MISSING", "1")
        .args(["--json", "check"])
        .output()
        .unwrap();
    assert!(out.status.success());
    let v: serde_json::Value = serde_json::from_slice(&out.stdout).unwrap();
    assert_eq!(v["connected"], false);
    assert_eq!(v["port"], "SIM0");
}

#[test]
fn read_falls_back_to_synthetic_sample() {
    let dir = tempdir().unwrap();
    let cfg = write_config(&dir);
    let out = trak(&cfg)
        .env("TRAK_SIM_PORT_MISSING", "1")
        .args(["--json", "read"])
        .output()
        .unwrap();
    assert!(out.status.success());
    let v: serde_json::Value = serde_json::from_slice(&out.stdout).unwrap();
    assert_eq!(v["simulated"], true);
    let force = v["force_mn"].as_f64().unwrap();
    assert!((1000.0..6000.0).contains(&force), "force {force}");
}

#[test]
fn read_decodes_device_registers() {
    let dir = tempdir().unwrap();
    let cfg = write_config(&dir);
    let out = trak(&cfg).args(["--json", "read"]).output().unwrap();
    assert!(out.status.success());
    let v: serde_json::Value = serde_json::from_slice(&out.stdout).unwrap();
    assert_eq!(v["simulated"], false);
    assert_eq!(v["distance_mm"], 120.0);
    assert_eq!(v["force_mn"], 1250.0);
    assert_eq!(v["temperature_c"], 24.0);
    assert_eq!(v["home_sensor_active"], false);
}

#[test]
fn outcome_json_has_stable_fields() {
    let dir = tempdir().unwrap();
    let cfg = write_config(&dir);
    let out = trak(&cfg).args(["--json", "retraction"]).output().unwrap();
    assert!(out.status.success());
    let v: serde_json::Value = serde_json::from_slice(&out.stdout).unwrap();
    assert_eq!(v["success"], true);
    assert_eq!(v["new_state"], true);
    assert_eq!(v["message"], "RETRACTION turned on");
    assert!(v.get("error").is_none());
}

#[test]
fn json_errors_carry_reason() {
    let dir = tempdir().unwrap();
    let cfg = write_config(&dir);
    let out = trak(&cfg)
        .env("TRAK_SIM_PORT_MISSING", "1")
        .args(["--json", "clamp"])
        .output()
        .unwrap();
    assert_eq!(out.status.code(), Some(4));
    let stderr = String::from_utf8_lossy(&out.stderr);
    let line = stderr
        .lines()
        .find(|l| l.contains("\"reason\""))
        .expect("structured error line");
    let v: serde_json::Value = serde_json::from_str(line).unwrap();
    assert_eq!(v["reason"], "link_unavailable");
}

#[test]
fn home_wait_reaches_sensor() {
    let dir = tempdir().unwrap();
    let cfg = write_config(&dir);
    trak(&cfg)
        .args(["home", "--wait", "--wait-ms", "5000"])
        .assert()
        .success()
        .stdout(predicate::str::contains("HOME executed"))
        .stdout(predicate::str::contains("home position reached"));
}

#[test]
fn monitor_stops_after_ticks() {
    let dir = tempdir().unwrap();
    let cfg = write_config(&dir);
    let out = trak(&cfg)
        .args(["--json", "monitor", "--ticks", "3"])
        .output()
        .unwrap();
    assert!(out.status.success());
    let stdout = String::from_utf8_lossy(&out.stdout);
    let samples = stdout
        .lines()
        .filter_map(|l| serde_json::from_str::<serde_json::Value>(l).ok())
        .filter(|v| v.get("distance_mm").is_some())
        .count();
    assert_eq!(samples, 3);
}

#[test]
fn monitor_without_device_prints_synthetic_samples() {
    let dir = tempdir().unwrap();
    let cfg = write_config(&dir);
    trak(&cfg)
        .env("TRAK_SIM_PORT_MISSING", "1")
        .args(["monitor", "--ticks", "2"])
        .assert()
        .success()
        .stdout(predicate::str::contains("[simulated]"));
}

#[test]
fn push_config_can_save_and_reuse_a_profile() {
    let dir = tempdir().unwrap();
    let cfg = write_config(&dir);
    trak(&cfg)
        .args([
            "push-config",
            "--path-length",
            "150",
            "--threshold-force",
            "3500",
            "--temperature",
            "37",
            "--retraction-length",
            "25",
            "--save-as",
            "bench",
        ])
        .assert()
        .success();

    trak(&cfg)
        .args(["profiles", "list"])
        .assert()
        .success()
        .stdout(predicate::str::contains("bench: path 150 mm"));

    trak(&cfg)
        .args(["push-config", "--profile", "bench"])
        .assert()
        .success()
        .stdout(predicate::str::contains("device config written"));

    trak(&cfg)
        .args(["profiles", "delete", "bench"])
        .assert()
        .success();
    trak(&cfg)
        .args(["profiles", "list"])
        .assert()
        .success()
        .stdout(predicate::str::contains("bench").not());
}

#[test]
fn bad_profile_headers_are_explained() {
    let dir = tempdir().unwrap();
    let cfg = write_config(&dir);
    fs::write(dir.path().join("profiles.csv"), "name,length\nx,1\n").unwrap();
    trak(&cfg)
        .args(["profiles", "list"])
        .assert()
        .code(1)
        .stderr(predicate::str::contains("Invalid headers in profile CSV"));
}

#[test]
fn invalid_config_is_rejected() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("bad.toml");
    fs::write(&path, "[polling]\ninterval_ms = 0\n").unwrap();
    trak(&path)
        .arg("check")
        .assert()
        .code(1)
        .stderr(predicate::str::contains("polling.interval_ms"));
}

#[test]
fn file_logging_creates_log() {
    let dir = tempdir().unwrap();
    let cfg = write_config(&dir);
    let log = dir.path().join("logs").join("trak.log");
    let mut text = fs::read_to_string(&cfg).unwrap();
    text.push_str(&format!(
        "\n[logging]\nfile = \"{}\"\nlevel = \"info\"\n",
        log.display().to_string().replace('\\', "/")
    ));
    fs::write(&cfg, text).unwrap();
    trak(&cfg).arg("heater").assert().success();
    assert!(log.exists());
}
