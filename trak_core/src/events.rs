//! Observer fan-out for state changes and samples.
//!
//! Any number of subscribers each get their own unbounded channel. Dropped
//! receivers are pruned on the next publish.

use std::sync::{Arc, Mutex};

use crossbeam_channel as xch;

use crate::types::{LinkState, SensorSample};

#[derive(Debug, Clone, PartialEq)]
pub enum Event {
    LinkStateChanged(LinkState),
    HomeSensorChanged(bool),
    EmergencyChanged(bool),
    /// `true` means supply power is present.
    PowerChanged(bool),
    Sample(SensorSample),
}

#[derive(Debug, Clone, Default)]
pub struct EventBus {
    subscribers: Arc<Mutex<Vec<xch::Sender<Event>>>>,
}

impl EventBus {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn subscribe(&self) -> xch::Receiver<Event> {
        let (tx, rx) = xch::unbounded();
        self.lock().push(tx);
        rx
    }

    pub fn publish(&self, event: Event) {
        self.lock().retain(|tx| tx.send(event.clone()).is_ok());
    }

    pub fn subscriber_count(&self) -> usize {
        self.lock().len()
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, Vec<xch::Sender<Event>>> {
        self.subscribers.lock().unwrap_or_else(|p| p.into_inner())
    }
}
