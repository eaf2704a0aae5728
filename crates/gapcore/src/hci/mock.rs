//! Recording transport for tests

use super::{Command, Transport};
use crate::error::HciError;
use std::sync::{Arc, Mutex};

#[derive(Debug, Default)]
struct Recorded {
    commands: Vec<Command>,
    fail_next: bool,
}

/// Transport that records every command instead of sending it
///
/// Clones share the same record, so a test keeps one clone while the host
/// owns the other.
#[derive(Debug, Clone, Default)]
pub struct RecordingTransport {
    inner: Arc<Mutex<Recorded>>,
}

impl RecordingTransport {
    pub fn new() -> Self {
        Self::default()
    }

    /// Make the next send fail with `HciError::SendFailed`
    pub fn fail_next_send(&self) {
        self.inner.lock().unwrap().fail_next = true;
    }

    pub fn commands(&self) -> Vec<Command> {
        self.inner.lock().unwrap().commands.clone()
    }

    pub fn last(&self) -> Option<Command> {
        self.inner.lock().unwrap().commands.last().cloned()
    }

    pub fn count(&self) -> usize {
        self.inner.lock().unwrap().commands.len()
    }

    pub fn clear(&self) {
        self.inner.lock().unwrap().commands.clear();
    }
}

impl Transport for RecordingTransport {
    fn send(&mut self, command: &Command) -> Result<(), HciError> {
        let mut inner = self.inner.lock().unwrap();
        if inner.fail_next {
            inner.fail_next = false;
            return Err(HciError::SendFailed("injected failure".to_string()));
        }
        inner.commands.push(command.clone());
        Ok(())
    }
}
