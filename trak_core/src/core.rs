//! `ControllerCore`: the single owner of link, coil and homing state.
//!
//! Everything that mutates controller state runs on one thread (the worker
//! behind `Controller`), so operations are applied strictly in arrival order.
//! Command handling lives in `dispatcher`, sampling in `poller` and the
//! homing/safety machine in `safety`; this module holds the shared state, the
//! link lifecycle and the timers.

use std::sync::Arc;
use std::time::Instant;

use chrono::Utc;
use rand::rngs::StdRng;
use tracing::{debug, info, warn};
use trak_traits::{Clock, SerialSettings};

use crate::config::ControllerCfg;
use crate::error::Result;
use crate::events::EventBus;
use crate::link::LinkManager;
use crate::registers::Coil;
use crate::safety::SafetySignals;
use crate::types::{CoilSet, ConnectionStatus, HomingState, LinkState, SensorSample};

/// A pulsed coil waiting to be written back to false.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) struct PendingPulse {
    pub(crate) coil: Coil,
    pub(crate) due: Instant,
}

pub struct ControllerCore {
    pub(crate) cfg: ControllerCfg,
    pub(crate) link: LinkManager,
    pub(crate) events: EventBus,
    pub(crate) clock: Arc<dyn Clock + Send + Sync>,
    pub(crate) rng: StdRng,

    pub(crate) coils: CoilSet,
    pub(crate) homing: HomingState,
    pub(crate) safety: SafetySignals,
    pub(crate) latest: Option<SensorSample>,
    pub(crate) last_home_sensor: Option<bool>,
    pub(crate) pulses: Vec<PendingPulse>,
    pub(crate) next_tick: Option<Instant>,
    link_up: bool,
}

impl std::fmt::Debug for ControllerCore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ControllerCore")
            .field("link", &self.link)
            .field("coils", &self.coils)
            .field("homing", &self.homing)
            .field("safety", &self.safety)
            .field("pending_pulses", &self.pulses.len())
            .finish()
    }
}

impl ControllerCore {
    pub fn new(
        cfg: ControllerCfg,
        link: LinkManager,
        events: EventBus,
        clock: Arc<dyn Clock + Send + Sync>,
        rng: StdRng,
    ) -> Self {
        let link_up = link.is_connected();
        Self {
            cfg,
            link,
            events,
            clock,
            rng,
            coils: CoilSet::default(),
            homing: HomingState::Idle,
            safety: SafetySignals::default(),
            latest: None,
            last_home_sensor: None,
            pulses: Vec::new(),
            next_tick: None,
            link_up,
        }
    }

    // ── Link lifecycle ───────────────────────────────────────────────────────

    /// Open the link, closing an existing one first so the down/up
    /// transition is observed (polling stopped, fresh cadence).
    pub fn connect(&mut self, settings: SerialSettings) -> Result<()> {
        if self.link.is_connected() {
            self.disconnect();
        }
        let res = self.link.connect(settings);
        self.sync_link();
        res
    }

    /// Connect with the last used settings.
    pub fn connect_default(&mut self) -> Result<()> {
        let settings = self.link.settings().clone();
        self.connect(settings)
    }

    pub fn disconnect(&mut self) {
        self.link.disconnect();
        self.sync_link();
    }

    pub fn reconnect(&mut self) -> Result<()> {
        self.disconnect();
        self.connect_default()
    }

    pub fn link_state(&self) -> LinkState {
        self.link.state()
    }

    pub fn is_connected(&self) -> bool {
        self.link.is_connected()
    }

    pub fn check_connection(&self) -> ConnectionStatus {
        ConnectionStatus {
            connected: self.link.is_connected(),
            port: self.link.settings().port.clone(),
            timestamp: Utc::now(),
        }
    }

    /// Apply the consequences of the link going up or down since the last call.
    /// Cheap; call after anything that may have touched the link.
    pub(crate) fn sync_link(&mut self) {
        let up = self.link.is_connected();
        if up == self.link_up {
            return;
        }
        self.link_up = up;
        if up {
            // Fresh cadence on every (re)connect.
            self.next_tick = Some(self.clock.deadline_after(self.cfg.poll_interval));
            debug!(interval_ms = self.cfg.poll_interval.as_millis() as u64, "polling started");
        } else {
            // Pending pulse clears stay scheduled: a reconnect inside the
            // window must still bring the coil back to false.
            self.next_tick = None;
            self.reset_homing_on_link_down();
            info!("polling stopped");
        }
    }

    // ── Accessors ────────────────────────────────────────────────────────────

    pub fn coils(&self) -> CoilSet {
        self.coils
    }

    pub fn homing_state(&self) -> HomingState {
        self.homing
    }

    pub fn safety(&self) -> SafetySignals {
        self.safety
    }

    pub fn latest_sample(&self) -> Option<&SensorSample> {
        self.latest.as_ref()
    }

    pub fn cfg(&self) -> &ControllerCfg {
        &self.cfg
    }

    // ── Timers ───────────────────────────────────────────────────────────────

    /// Earliest instant at which `run_due_timers` has work to do.
    pub fn next_deadline(&self) -> Option<Instant> {
        let pulse = self.pulses.iter().map(|p| p.due).min();
        match (self.next_tick, pulse) {
            (Some(a), Some(b)) => Some(a.min(b)),
            (a, b) => a.or(b),
        }
    }

    /// Clear due pulses and run the poll tick if it is due.
    pub fn run_due_timers(&mut self) {
        let now = self.clock.now();
        self.clear_due_pulses(now);
        self.sync_link();
        if self.next_tick.is_some_and(|t| t <= now) {
            self.poll_tick();
            self.sync_link();
            if self.link.is_connected() {
                self.next_tick = Some(self.clock.deadline_after(self.cfg.poll_interval));
            }
        }
    }

    fn clear_due_pulses(&mut self, now: Instant) {
        if self.pulses.is_empty() {
            return;
        }
        let (due, pending): (Vec<PendingPulse>, Vec<PendingPulse>) =
            self.pulses.drain(..).partition(|p| p.due <= now);
        self.pulses = pending;
        for p in due {
            if !self.link.is_connected() {
                warn!(coil = %p.coil, "link down at pulse clear; clear not sent");
                continue;
            }
            match self.link.write_coil(p.coil.address(), false) {
                Ok(()) => debug!(coil = %p.coil, "pulse cleared"),
                Err(e) => warn!(coil = %p.coil, error = %e, "pulse clear failed"),
            }
        }
    }

    /// Stop timers and close the link. Used on shutdown.
    pub fn shutdown(&mut self) {
        if self.link.is_connected() {
            self.disconnect();
        }
        self.pulses.clear();
        self.next_tick = None;
    }
}
