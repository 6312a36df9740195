//! CLI argument definitions and shared statics.

use clap::{ArgAction, Args, Parser, Subcommand};
use std::path::PathBuf;
use std::sync::OnceLock;

/// Whether the user asked for JSON output (controls structured error output).
pub static JSON_MODE: OnceLock<bool> = OnceLock::new();

#[derive(Parser, Debug)]
#[command(name = "trak", version, about = "Trackability fixture controller")]
pub struct Cli {
    /// Path to config TOML; built-in defaults when omitted
    #[arg(long, value_name = "FILE")]
    pub config: Option<PathBuf>,

    /// Print results and errors as JSON lines
    #[arg(long, action = ArgAction::SetTrue)]
    pub json: bool,

    /// Console log level (error|warn|info|debug|trace); overrides [logging].level
    #[arg(long = "log-level", value_name = "LEVEL")]
    pub log_level: Option<String>,

    /// Serial port; overrides [link].port
    #[arg(long, value_name = "PORT")]
    pub port: Option<String>,

    /// Command to execute
    #[command(subcommand)]
    pub cmd: Commands,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Try to connect and report link status
    Check,
    /// Take one sensor sample (synthetic when the device is unreachable)
    Read,
    /// Print samples and state changes until Ctrl-C
    Monitor {
        /// Stop after this many samples
        #[arg(long, value_name = "N")]
        ticks: Option<u64>,
    },
    /// Drive to the home position
    Home {
        /// Wait until the home sensor reports arrival
        #[arg(long, action = ArgAction::SetTrue)]
        wait: bool,
        /// Give up waiting after this many ms (homing itself keeps running)
        #[arg(long, value_name = "MS", default_value_t = 30_000)]
        wait_ms: u64,
    },
    /// Toggle the clamp
    Clamp,
    /// Toggle the heater
    Heater,
    /// Toggle insertion motion
    Insertion,
    /// Toggle retraction motion
    Retraction,
    /// Pulse START
    Start,
    /// Pulse STOP
    Stop,
    /// Pulse RESET
    Reset,
    /// Enter manual mode with all motion off
    Manual,
    /// Push process parameters to the device
    PushConfig(PushConfigArgs),
    /// Manage stored test profiles
    Profiles {
        #[command(subcommand)]
        cmd: ProfilesCmd,
    },
    /// Dump the raw sample registers
    Registers,
}

#[derive(Args, Debug)]
pub struct PushConfigArgs {
    /// Use a stored profile instead of explicit values
    #[arg(long, value_name = "NAME", conflicts_with_all = ["path_length", "threshold_force", "temperature", "retraction_length"])]
    pub profile: Option<String>,
    /// Catheter path length (mm)
    #[arg(long, value_name = "MM", required_unless_present = "profile")]
    pub path_length: Option<i32>,
    /// Force threshold (mN)
    #[arg(long, value_name = "MN", required_unless_present = "profile")]
    pub threshold_force: Option<f64>,
    /// Bath temperature setpoint (°C)
    #[arg(long, value_name = "C", required_unless_present = "profile")]
    pub temperature: Option<f64>,
    /// Retraction length (mm)
    #[arg(long, value_name = "MM", required_unless_present = "profile")]
    pub retraction_length: Option<f64>,
    /// Also store the explicit values as a profile with this name
    #[arg(long, value_name = "NAME", conflicts_with = "profile")]
    pub save_as: Option<String>,
}

#[derive(Subcommand, Debug)]
pub enum ProfilesCmd {
    /// List stored profiles
    List,
    /// Delete a stored profile
    Delete { name: String },
}
