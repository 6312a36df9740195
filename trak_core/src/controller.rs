//! `Controller`: thread-safe handle over a worker-owned `ControllerCore`.
//!
//! The worker thread owns the link and all controller state. Callers submit
//! closures over one FIFO channel and wait for the reply, so operations run in
//! submission order and never interleave on the wire. Between requests the
//! worker sleeps until the next poll tick or pulse clear is due.
//!
//! Dropping the handle closes the channel; the worker disconnects the link and
//! the handle joins it.

use std::marker::PhantomData;
use std::sync::Arc;
use std::thread::JoinHandle;

use crossbeam_channel as xch;
use rand::SeedableRng;
use rand::rngs::StdRng;
use tracing::{debug, error, info, warn};
use trak_traits::{Clock, Connector, MonotonicClock, SerialSettings};

use crate::config::ControllerCfg;
use crate::core::ControllerCore;
use crate::error::{BuildError, ControlError, Result};
use crate::events::{Event, EventBus};
use crate::link::LinkManager;
use crate::poller::synthesize;
use crate::registers::{Coil, PulseCoil};
use crate::safety::SafetySignals;
use crate::status::CommandOutcome;
use crate::types::{
    CoilSet, ConnectionStatus, DeviceConfig, HomingState, LinkState, RawRegisters, SensorSample,
};

type Job = Box<dyn FnOnce(&mut ControllerCore) + Send>;

pub struct Controller {
    tx: Option<xch::Sender<Job>>,
    events: EventBus,
    /// Join handle for graceful worker shutdown
    join_handle: Option<JoinHandle<()>>,
}

impl std::fmt::Debug for Controller {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Controller")
            .field("running", &self.tx.is_some())
            .field("subscribers", &self.events.subscriber_count())
            .finish()
    }
}

fn worker_gone() -> ControlError {
    error!("controller worker is not running");
    ControlError::LinkUnavailable("controller worker stopped".into())
}

impl Controller {
    /// Start building a Controller.
    pub fn builder() -> ControllerBuilder<Missing> {
        ControllerBuilder::default()
    }

    /// Run `f` on the worker and wait for its result. `None` if the worker
    /// has exited.
    fn call<T: Send + 'static>(
        &self,
        f: impl FnOnce(&mut ControllerCore) -> T + Send + 'static,
    ) -> Option<T> {
        let tx = self.tx.as_ref()?;
        let (reply_tx, reply_rx) = xch::bounded(1);
        let job: Job = Box::new(move |core| {
            let out = f(core);
            core.sync_link();
            let _ = reply_tx.send(out);
        });
        tx.send(job).ok()?;
        reply_rx.recv().ok()
    }

    fn call_result<T: Send + 'static>(
        &self,
        f: impl FnOnce(&mut ControllerCore) -> Result<T> + Send + 'static,
    ) -> Result<T> {
        self.call(f).unwrap_or_else(|| Err(worker_gone()))
    }

    fn command(
        &self,
        f: impl FnOnce(&mut ControllerCore) -> CommandOutcome + Send + 'static,
    ) -> CommandOutcome {
        let outcome = self
            .call(f)
            .unwrap_or_else(|| CommandOutcome::executed("COMMAND", Err(worker_gone())));
        if let Some(e) = &outcome.error {
            error!(kind = e.kind(), "{}", outcome.message);
        }
        outcome
    }

    // ── Link ─────────────────────────────────────────────────────────────────

    pub fn connect(&self, settings: SerialSettings) -> Result<()> {
        self.call_result(move |c| c.connect(settings))
    }

    /// Connect with the configured (or last used) settings.
    pub fn connect_default(&self) -> Result<()> {
        self.call_result(|c| c.connect_default())
    }

    pub fn disconnect(&self) {
        let _ = self.call(|c| c.disconnect());
    }

    pub fn reconnect(&self) -> Result<()> {
        self.call_result(|c| c.reconnect())
    }

    pub fn is_connected(&self) -> bool {
        self.call(|c| c.is_connected()).unwrap_or(false)
    }

    pub fn link_state(&self) -> LinkState {
        self.call(|c| c.link_state()).unwrap_or_default()
    }

    pub fn check_connection(&self) -> Result<ConnectionStatus> {
        self.call(|c| c.check_connection()).ok_or_else(worker_gone)
    }

    // ── Commands ─────────────────────────────────────────────────────────────

    pub fn toggle_heater(&self) -> CommandOutcome {
        self.command(|c| {
            let res = c.toggle_heater();
            CommandOutcome::toggle("HEATER", res, c.coils().heater)
        })
    }

    pub fn toggle_clamp(&self) -> CommandOutcome {
        self.command(|c| {
            let res = c.toggle_clamp();
            CommandOutcome::toggle("CLAMP", res, c.coils().clamp)
        })
    }

    pub fn toggle_insertion(&self) -> CommandOutcome {
        self.command(|c| {
            let res = c.toggle_insertion();
            CommandOutcome::toggle("INSERTION", res, c.coils().insertion)
        })
    }

    pub fn toggle_retraction(&self) -> CommandOutcome {
        self.command(|c| {
            let res = c.toggle_retraction();
            CommandOutcome::toggle("RETRACTION", res, c.coils().retraction)
        })
    }

    pub fn pulse_home(&self) -> CommandOutcome {
        self.command(|c| CommandOutcome::executed("HOME", c.pulse_home()))
    }

    pub fn pulse_coil(&self, coil: PulseCoil) -> CommandOutcome {
        self.command(move |c| {
            let name = Coil::from(coil).name();
            CommandOutcome::executed(name, c.pulse_coil(coil))
        })
    }

    pub fn start(&self) -> CommandOutcome {
        self.pulse_coil(PulseCoil::Start)
    }

    pub fn stop(&self) -> CommandOutcome {
        self.pulse_coil(PulseCoil::Stop)
    }

    pub fn reset(&self) -> CommandOutcome {
        self.pulse_coil(PulseCoil::Reset)
    }

    pub fn enter_manual_mode(&self) -> CommandOutcome {
        self.command(|c| CommandOutcome::executed("MANUAL-MODE", c.enter_manual_mode()))
    }

    pub fn send_device_config(&self, cfg: DeviceConfig) -> Result<()> {
        self.call_result(move |c| c.send_device_config(&cfg))
    }

    pub fn debug_registers(&self) -> Result<RawRegisters> {
        self.call_result(|c| c.debug_registers())
    }

    // ── Sampling ─────────────────────────────────────────────────────────────

    /// Take a sample now. Never fails: without a device the sample is synthetic.
    pub fn read_data(&self) -> SensorSample {
        self.call(|c| c.read_data()).unwrap_or_else(|| {
            warn!("controller worker is not running; synthesizing sample");
            synthesize(&mut rand::rng(), ControllerCfg::default().max_travel_mm)
        })
    }

    pub fn latest_sample(&self) -> Option<SensorSample> {
        self.call(|c| c.latest_sample().cloned()).flatten()
    }

    // ── Safety inputs and status ─────────────────────────────────────────────

    pub fn set_emergency(&self, active: bool) {
        let _ = self.call(move |c| c.set_emergency(active));
    }

    pub fn set_power(&self, present: bool) {
        let _ = self.call(move |c| c.set_power(present));
    }

    pub fn safety(&self) -> SafetySignals {
        self.call(|c| c.safety()).unwrap_or_default()
    }

    pub fn emergency_active(&self) -> bool {
        self.safety().emergency
    }

    pub fn power_present(&self) -> bool {
        self.safety().power_present
    }

    pub fn coils(&self) -> CoilSet {
        self.call(|c| c.coils()).unwrap_or_default()
    }

    pub fn homing_state(&self) -> HomingState {
        self.call(|c| c.homing_state()).unwrap_or_default()
    }

    /// New event stream; events published from now on are delivered in order.
    pub fn subscribe(&self) -> xch::Receiver<Event> {
        self.events.subscribe()
    }
}

impl Drop for Controller {
    fn drop(&mut self) {
        // Closing the channel is the worker's shutdown signal.
        drop(self.tx.take());
        if let Some(handle) = self.join_handle.take() {
            match handle.join() {
                Ok(()) => tracing::trace!("controller worker joined"),
                Err(e) => tracing::warn!(?e, "controller worker panicked during shutdown"),
            }
        }
    }
}

fn run_worker(mut core: ControllerCore, rx: xch::Receiver<Job>, auto_connect: bool) {
    if auto_connect {
        match core.connect_default() {
            Ok(()) => info!("auto-connect succeeded"),
            Err(e) => warn!(error = %e, "auto-connect failed; staying disconnected"),
        }
    }
    loop {
        let msg = match core.next_deadline() {
            Some(deadline) => rx.recv_deadline(deadline),
            None => rx.recv().map_err(|_| xch::RecvTimeoutError::Disconnected),
        };
        match msg {
            Ok(job) => job(&mut core),
            Err(xch::RecvTimeoutError::Timeout) => {}
            Err(xch::RecvTimeoutError::Disconnected) => break,
        }
        core.run_due_timers();
    }
    core.shutdown();
    debug!("controller worker exiting");
}

// ── Type-state markers ───────────────────────────────────────────────────────

pub struct Missing;
pub struct Set;

/// Builder for `Controller`. `build()` is only available once a connector is set.
pub struct ControllerBuilder<C> {
    connector: Option<Box<dyn Connector>>,
    settings: SerialSettings,
    cfg: ControllerCfg,
    clock: Option<Arc<dyn Clock + Send + Sync>>,
    seed: Option<u64>,
    auto_connect: bool,
    _c: PhantomData<C>,
}

impl Default for ControllerBuilder<Missing> {
    fn default() -> Self {
        Self {
            connector: None,
            settings: SerialSettings::new("COM4"),
            cfg: ControllerCfg::default(),
            clock: None,
            seed: None,
            auto_connect: false,
            _c: PhantomData,
        }
    }
}

impl ControllerBuilder<Missing> {
    pub fn with_connector(self, connector: impl Connector + 'static) -> ControllerBuilder<Set> {
        ControllerBuilder {
            connector: Some(Box::new(connector)),
            settings: self.settings,
            cfg: self.cfg,
            clock: self.clock,
            seed: self.seed,
            auto_connect: self.auto_connect,
            _c: PhantomData,
        }
    }
}

impl<C> ControllerBuilder<C> {
    /// Serial settings used by `connect_default` and auto-connect.
    pub fn with_settings(mut self, settings: SerialSettings) -> Self {
        self.settings = settings;
        self
    }

    pub fn with_cfg(mut self, cfg: ControllerCfg) -> Self {
        self.cfg = cfg;
        self
    }

    /// Clock for poll and pulse deadlines. It must advance with real time:
    /// the worker blocks until the earliest deadline.
    pub fn with_clock(mut self, clock: Arc<dyn Clock + Send + Sync>) -> Self {
        self.clock = Some(clock);
        self
    }

    /// Seed for synthetic samples; random by default.
    pub fn with_seed(mut self, seed: u64) -> Self {
        self.seed = Some(seed);
        self
    }

    /// Make one connection attempt as soon as the worker starts.
    pub fn auto_connect(mut self, enabled: bool) -> Self {
        self.auto_connect = enabled;
        self
    }
}

impl ControllerBuilder<Set> {
    pub fn build(self) -> std::result::Result<Controller, BuildError> {
        self.cfg.validate().map_err(BuildError::InvalidConfig)?;
        let connector = self.connector.ok_or(BuildError::MissingConnector)?;
        let events = EventBus::new();
        let link = LinkManager::new(connector, self.settings, events.clone());
        let clock = self
            .clock
            .unwrap_or_else(|| Arc::new(MonotonicClock::new()));
        let rng = self
            .seed
            .map_or_else(StdRng::from_os_rng, StdRng::seed_from_u64);
        let core = ControllerCore::new(self.cfg, link, events.clone(), clock, rng);

        let (tx, rx) = xch::unbounded::<Job>();
        let auto_connect = self.auto_connect;
        let join_handle = std::thread::Builder::new()
            .name("trak-controller".into())
            .spawn(move || run_worker(core, rx, auto_connect))
            .map_err(|e| BuildError::Spawn(e.to_string()))?;

        Ok(Controller {
            tx: Some(tx),
            events,
            join_handle: Some(join_handle),
        })
    }
}
