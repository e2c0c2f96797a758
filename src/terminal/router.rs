//! Frame routing for terminal sessions
//!
//! The shared channel carries status events and terminal traffic side by
//! side. [`SessionRouter`] is registered on every shared connection and hands
//! terminal frames to the single active session; status frames are left to
//! the cache sink.

use super::session::{SharedCore, lock};
use crate::transport::{ConnectionState, DecodedMessage, FrameHandler};
use std::sync::{Arc, Mutex, PoisonError};

/// Slot holding the active shared-channel session
///
/// Clones share the slot.
#[derive(Clone, Default)]
pub struct SessionRouter {
    active: Arc<Mutex<Option<SharedCore>>>,
}

impl SessionRouter {
    pub fn new() -> Self {
        Self::default()
    }

    /// Make `core` the active session, closing any session it supersedes
    pub(crate) fn attach(&self, core: SharedCore) {
        let previous = self
            .active
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .replace(core);
        if let Some(previous) = previous {
            lock(&previous).close("superseded by a new session");
        }
    }

    /// Clear the slot if `core` is still the active session
    pub(crate) fn detach(&self, core: &SharedCore) {
        let mut active = self.active.lock().unwrap_or_else(PoisonError::into_inner);
        if active.as_ref().is_some_and(|a| Arc::ptr_eq(a, core)) {
            *active = None;
        }
    }

    pub fn has_session(&self) -> bool {
        self.active
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .is_some()
    }

    fn current(&self) -> Option<SharedCore> {
        self.active
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }
}

impl FrameHandler for SessionRouter {
    fn on_message(&mut self, message: &DecodedMessage) {
        if !message.is_terminal() {
            return;
        }
        let Some(core) = self.current() else {
            tracing::debug!("Terminal frame with no active session; discarding");
            return;
        };
        let mut core = lock(&core);
        match message {
            DecodedMessage::TerminalData(data) => core.on_data(data),
            DecodedMessage::TerminalError(error) => core.on_error(error),
            _ => {}
        }
    }

    fn on_state(&mut self, state: ConnectionState) {
        if let Some(core) = self.current() {
            lock(&core).on_connection(state);
        }
    }
}

/// Frame handler of a dedicated terminal connection
pub(crate) struct DedicatedSink {
    core: SharedCore,
}

impl DedicatedSink {
    pub(crate) fn new(core: SharedCore) -> Self {
        Self { core }
    }
}

impl FrameHandler for DedicatedSink {
    fn on_message(&mut self, message: &DecodedMessage) {
        let mut core = lock(&self.core);
        match message {
            DecodedMessage::TerminalData(data) => core.on_data(data),
            DecodedMessage::TerminalError(error) => core.on_error(error),
            _ => {}
        }
    }

    fn on_state(&mut self, state: ConnectionState) {
        lock(&self.core).on_connection(state);
    }
}
