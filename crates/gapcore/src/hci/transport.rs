//! Command transport and the host's outbound queues

use super::Command;
use crate::error::{HciError, Result};
use crate::host::HostEvent;
use log::{debug, trace, warn};
use std::collections::VecDeque;

/// Sends commands to the controller
///
/// Implementations encode the command and hand it to the controller. A
/// returned error means nothing was sent.
pub trait Transport {
    fn send(&mut self, command: &Command) -> std::result::Result<(), HciError>;
}

/// Everything leaving the host core: commands for the controller and
/// events for the application
pub struct Outbox {
    transport: Box<dyn Transport + Send>,
    events: VecDeque<HostEvent>,
}

impl Outbox {
    pub fn new(transport: Box<dyn Transport + Send>) -> Self {
        Self {
            transport,
            events: VecDeque::new(),
        }
    }

    /// Send a command; on error no host state may change
    pub fn send(&mut self, command: Command) -> Result<()> {
        trace!("Sending {}: {:?}", command.name(), command);
        self.transport.send(&command).map_err(|err| {
            warn!("{} not sent: {}", command.name(), err);
            err.into()
        })
    }

    /// Queue an event for the application
    pub fn notify(&mut self, event: HostEvent) {
        debug!("Host event: {:?}", event);
        self.events.push_back(event);
    }

    pub fn poll(&mut self) -> Option<HostEvent> {
        self.events.pop_front()
    }

    pub fn drain(&mut self) -> Vec<HostEvent> {
        self.events.drain(..).collect()
    }

    pub fn pending_events(&self) -> usize {
        self.events.len()
    }
}

impl std::fmt::Debug for Outbox {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Outbox")
            .field("events", &self.events.len())
            .finish()
    }
}
