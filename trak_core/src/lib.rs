#![cfg_attr(all(not(debug_assertions), not(test)), deny(warnings))]
#![cfg_attr(
    all(not(debug_assertions), not(test)),
    deny(clippy::all, clippy::pedantic, clippy::nursery)
)]
#![allow(clippy::module_name_repetitions, clippy::missing_errors_doc)]
#![cfg_attr(not(test), deny(clippy::unwrap_used, clippy::expect_used))]
//! Device communication and motion-interlock controller (hardware-agnostic).
//!
//! All device traffic goes through the `trak_traits::Connector` and
//! `trak_traits::RegisterBus` seams.
//!
//! ## Architecture
//!
//! - **Codec**: register words to engineering values (`codec`)
//! - **Link**: one owned connection, link-loss detection (`link`)
//! - **Dispatcher**: coil commands with interlocks (`dispatcher`)
//! - **Poller**: periodic sampling with synthetic fallback (`poller`)
//! - **Safety**: homing and emergency/power-loss state machine (`safety`)
//! - **Controller**: worker thread serializing everything above (`controller`)
//!
//! State is owned by a single worker; `Controller` is the handle callers use.

pub mod codec;
pub mod config;
pub mod controller;
pub mod conversions;
pub mod core;
pub mod dispatcher;
pub mod error;
pub mod events;
pub mod hw_error;
pub mod link;
pub mod poller;
pub mod registers;
pub mod safety;
pub mod status;
pub mod types;

pub use codec::{decode_f32_le, decode_i16, encode_f32_le, encode_i16};
pub use config::ControllerCfg;
pub use controller::{Controller, ControllerBuilder};
pub use crate::core::ControllerCore;
pub use error::{BuildError, ControlError, Result};
pub use events::{Event, EventBus};
pub use link::LinkManager;
pub use registers::{Coil, PulseCoil};
pub use safety::SafetySignals;
pub use status::CommandOutcome;
pub use types::{
    CoilSet, ConnectionStatus, DeviceConfig, HomingState, LinkState, RawRegisters, SensorSample,
};
