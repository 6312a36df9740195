//! Ownership of the single device link.
//!
//! `LinkManager` opens the bus through a `Connector`, serializes transactions
//! on it, and tears it down when a transaction reports that the physical link
//! is gone. State changes between connected and disconnected are published on
//! the event bus; the transient `Connecting` state is not.

use tracing::{debug, info, warn};
use trak_traits::{Connector, RegisterBus, SerialSettings};

use crate::error::{ControlError, Result};
use crate::events::{Event, EventBus};
use crate::hw_error::{is_link_lost, map_hw_error};
use crate::types::LinkState;

type BusResult<T> = std::result::Result<T, Box<dyn std::error::Error + Send + Sync>>;

pub struct LinkManager {
    connector: Box<dyn Connector>,
    bus: Option<Box<dyn RegisterBus>>,
    settings: SerialSettings,
    state: LinkState,
    events: EventBus,
}

impl std::fmt::Debug for LinkManager {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LinkManager")
            .field("port", &self.settings.port)
            .field("state", &self.state)
            .finish()
    }
}

impl LinkManager {
    pub fn new(connector: Box<dyn Connector>, settings: SerialSettings, events: EventBus) -> Self {
        Self {
            connector,
            bus: None,
            settings,
            state: LinkState::Disconnected,
            events,
        }
    }

    pub fn state(&self) -> LinkState {
        self.state
    }

    pub fn is_connected(&self) -> bool {
        self.state == LinkState::Connected
    }

    /// Settings of the current (or last attempted) connection.
    pub fn settings(&self) -> &SerialSettings {
        &self.settings
    }

    /// Open the link with `settings`, closing any existing link first.
    /// A single attempt; failure leaves the manager disconnected.
    pub fn connect(&mut self, settings: SerialSettings) -> Result<()> {
        if self.bus.is_some() {
            debug!(port = %self.settings.port, "closing existing link before reconnect");
            self.disconnect();
        }
        self.settings = settings;
        self.state = LinkState::Connecting;
        match self.connector.open(&self.settings) {
            Ok(bus) => {
                self.bus = Some(bus);
                self.set_state(LinkState::Connected);
                info!(port = %self.settings.port, baud = self.settings.baud, "link connected");
                Ok(())
            }
            Err(e) => {
                self.state = LinkState::Disconnected;
                warn!(port = %self.settings.port, error = %e, "connect failed");
                Err(ControlError::LinkUnavailable(e.to_string()))
            }
        }
    }

    /// Close the link. Idempotent.
    pub fn disconnect(&mut self) {
        if self.bus.take().is_some() {
            info!(port = %self.settings.port, "link closed");
        }
        self.set_state(LinkState::Disconnected);
    }

    pub fn read_registers(&mut self, address: u16, count: u16) -> Result<Vec<u16>> {
        let words = self.transact("read registers", |bus| {
            bus.read_holding_registers(address, count)
        })?;
        if words.len() != usize::from(count) {
            return Err(ControlError::IoFailure(format!(
                "expected {count} registers at {address}, got {}",
                words.len()
            )));
        }
        Ok(words)
    }

    pub fn read_coils(&mut self, address: u16, count: u16) -> Result<Vec<bool>> {
        let bits = self.transact("read coils", |bus| bus.read_coils(address, count))?;
        if bits.len() != usize::from(count) {
            return Err(ControlError::IoFailure(format!(
                "expected {count} coils at {address}, got {}",
                bits.len()
            )));
        }
        Ok(bits)
    }

    pub fn write_register(&mut self, address: u16, value: u16) -> Result<()> {
        self.transact("write register", |bus| {
            bus.write_single_register(address, value)
        })
    }

    pub fn write_coil(&mut self, address: u16, on: bool) -> Result<()> {
        self.transact("write coil", |bus| bus.write_single_coil(address, on))
    }

    fn transact<T>(
        &mut self,
        what: &'static str,
        op: impl FnOnce(&mut dyn RegisterBus) -> BusResult<T>,
    ) -> Result<T> {
        let Some(bus) = self.bus.as_mut() else {
            return Err(ControlError::NotConnected);
        };
        match op(bus.as_mut()) {
            Ok(v) => Ok(v),
            Err(e) => {
                let err = map_hw_error(e.as_ref());
                if is_link_lost(e.as_ref()) {
                    warn!(op = what, error = %e, "link lost");
                    self.disconnect();
                } else {
                    debug!(op = what, error = %e, "transaction failed");
                }
                Err(err)
            }
        }
    }

    fn set_state(&mut self, next: LinkState) {
        if self.state == next {
            return;
        }
        let was_connected = self.is_connected();
        self.state = next;
        if was_connected != self.is_connected() {
            self.events.publish(Event::LinkStateChanged(next));
        }
    }
}
