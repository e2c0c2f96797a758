//! Terminal session state
//!
//! `SessionCore` is the state shared between the user-facing
//! [`TerminalSession`] and the frame handler feeding it on the connection
//! actor. Output is pushed into an unbounded channel in receipt order.

use super::{InputDisposition, InputError, SessionOutput, SessionState, TerminalMode};
use crate::services::SubscriptionHandle;
use crate::transport::{ClientMessage, ConnectionHandle, ConnectionManager, ConnectionState};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use tokio::sync::{mpsc, watch};
use tokio::task::JoinHandle;

pub(crate) type SharedCore = Arc<Mutex<SessionCore>>;

pub(crate) fn lock(core: &Mutex<SessionCore>) -> MutexGuard<'_, SessionCore> {
    core.lock().unwrap_or_else(PoisonError::into_inner)
}

pub(crate) struct SessionCore {
    cluster_id: String,
    mode: TerminalMode,
    state: watch::Sender<SessionState>,
    link: ConnectionHandle,
    start_sent: bool,
    /// At most one line typed before the session opened
    pending: Option<String>,
    output: mpsc::UnboundedSender<SessionOutput>,
}

impl SessionCore {
    pub(crate) fn new(
        cluster_id: String,
        mode: TerminalMode,
        link: ConnectionHandle,
    ) -> (SharedCore, mpsc::UnboundedReceiver<SessionOutput>, watch::Receiver<SessionState>) {
        let (output, output_rx) = mpsc::unbounded_channel();
        let (state, state_rx) = watch::channel(SessionState::Connecting);
        let core = Self {
            cluster_id,
            mode,
            state,
            link,
            start_sent: false,
            pending: None,
            output,
        };
        (Arc::new(Mutex::new(core)), output_rx, state_rx)
    }

    pub(crate) fn cluster_id(&self) -> &str {
        &self.cluster_id
    }

    pub(crate) fn state(&self) -> SessionState {
        *self.state.borrow()
    }

    /// React to the carrying connection's lifecycle
    pub(crate) fn on_connection(&mut self, state: ConnectionState) {
        match state {
            ConnectionState::Open => match self.mode {
                TerminalMode::Shared => self.request_start(),
                // A dedicated channel is the session
                TerminalMode::Dedicated => self.mark_open(),
            },
            ConnectionState::Closing | ConnectionState::Closed => {
                self.close("connection closed");
            }
            ConnectionState::Idle | ConnectionState::Connecting => {}
        }
    }

    /// Ask the server for a terminal once per session
    pub(crate) fn request_start(&mut self) {
        if self.start_sent || self.state() == SessionState::Closed {
            return;
        }
        let sent = self.link.send(ClientMessage::StartTerminal {
            cluster_id: self.cluster_id.clone(),
        });
        if sent {
            tracing::debug!("Requested terminal for cluster {}", self.cluster_id);
            self.start_sent = true;
        }
    }

    pub(crate) fn on_data(&mut self, data: &str) {
        if self.state() == SessionState::Closed {
            return;
        }
        // The first output acknowledges the session
        self.mark_open();
        let _ = self.output.send(SessionOutput::Data(data.to_string()));
    }

    /// A terminal error is delivered verbatim and ends the session
    pub(crate) fn on_error(&mut self, message: &str) {
        if self.state() == SessionState::Closed {
            return;
        }
        let _ = self.output.send(SessionOutput::Error(message.to_string()));
        self.close("terminal error");
    }

    pub(crate) fn send_input(&mut self, data: String) -> Result<InputDisposition, InputError> {
        match self.state() {
            SessionState::Closed => Err(InputError::Closed),
            SessionState::Connecting => {
                if self.pending.is_some() {
                    return Err(InputError::NotOpen);
                }
                self.pending = Some(data);
                Ok(InputDisposition::Buffered)
            }
            SessionState::Open => {
                if self.link.send(ClientMessage::TerminalData { payload: data }) {
                    Ok(InputDisposition::Sent)
                } else {
                    Err(InputError::SendFailed)
                }
            }
        }
    }

    fn mark_open(&mut self) {
        if self.state() != SessionState::Connecting {
            return;
        }
        self.state.send_replace(SessionState::Open);
        tracing::info!("Terminal session for cluster {} open", self.cluster_id);

        if let Some(line) = self.pending.take() {
            if !self.link.send(ClientMessage::TerminalData { payload: line }) {
                let _ = self.output.send(SessionOutput::Error(
                    "buffered input could not be sent".to_string(),
                ));
            }
        }
    }

    pub(crate) fn close(&mut self, reason: &str) {
        if self.state() == SessionState::Closed {
            return;
        }
        self.state.send_replace(SessionState::Closed);
        self.pending = None;
        tracing::info!(
            "Terminal session for cluster {} closed: {}",
            self.cluster_id,
            reason
        );
        let _ = self.output.send(SessionOutput::Closed(reason.to_string()));
    }
}

/// What keeps a session's transport alive
pub(crate) enum SessionCarrier {
    /// Interest registered with the binder; the shared connection is only used
    Shared {
        subscription: SubscriptionHandle,
        router: super::SessionRouter,
    },
    /// A connection owned by this session alone
    Dedicated(ConnectionManager),
}

/// An interactive terminal stream scoped to one cluster
pub struct TerminalSession {
    core: SharedCore,
    output: Option<mpsc::UnboundedReceiver<SessionOutput>>,
    state: watch::Receiver<SessionState>,
    carrier: Option<SessionCarrier>,
}

impl TerminalSession {
    pub(crate) fn new(
        core: SharedCore,
        output: mpsc::UnboundedReceiver<SessionOutput>,
        state: watch::Receiver<SessionState>,
        carrier: SessionCarrier,
    ) -> Self {
        Self {
            core,
            output: Some(output),
            state,
            carrier: Some(carrier),
        }
    }

    pub fn cluster_id(&self) -> String {
        lock(&self.core).cluster_id().to_string()
    }

    pub fn state(&self) -> SessionState {
        *self.state.borrow()
    }

    /// Receiver that observes every state change
    pub fn watch_state(&self) -> watch::Receiver<SessionState> {
        self.state.clone()
    }

    /// Forward input to the remote side
    ///
    /// Before the session opens one line is buffered and sent on open; further
    /// input is rejected with [`InputError::NotOpen`].
    pub fn send_input(&self, data: impl Into<String>) -> Result<InputDisposition, InputError> {
        lock(&self.core).send_input(data.into())
    }

    /// Next output item in receipt order; `None` once the output was handed
    /// to [`on_output`](Self::on_output) and drained, or the session is gone
    pub async fn recv(&mut self) -> Option<SessionOutput> {
        match self.output.as_mut() {
            Some(rx) => rx.recv().await,
            None => None,
        }
    }

    /// Deliver all output to `handler` in receipt order on a background task
    pub fn on_output(
        &mut self,
        mut handler: impl FnMut(SessionOutput) + Send + 'static,
    ) -> Option<JoinHandle<()>> {
        let mut rx = self.output.take()?;
        Some(tokio::spawn(async move {
            while let Some(item) = rx.recv().await {
                let last = matches!(item, SessionOutput::Closed(_));
                handler(item);
                if last {
                    break;
                }
            }
        }))
    }

    /// Close the session. A shared connection stays up for its other users.
    pub fn close(&mut self) {
        lock(&self.core).close("closed by user");
        match self.carrier.take() {
            Some(SessionCarrier::Shared {
                subscription,
                router,
            }) => {
                router.detach(&self.core);
                subscription.dispose();
            }
            Some(SessionCarrier::Dedicated(connection)) => {
                connection.close("session closed");
            }
            None => {}
        }
    }
}

impl Drop for TerminalSession {
    fn drop(&mut self) {
        self.close();
    }
}
