//! Connection manager
//!
//! Owns exactly one transport at a time and drives it through an explicit
//! state machine:
//!
//! ```text
//! Idle ──open──▶ Connecting ──ok──▶ Open ──close(reason)──▶ Closing ──▶ Closed
//!                    ▲                 │
//!                    │            abnormal close
//!                    └── backoff ◀─────┘   (until the attempt cap)
//! ```
//!
//! All work runs on one actor task: transport frames, caller commands and the
//! backoff timer are multiplexed with `select!`, so frames are handled one at
//! a time in arrival order and handlers are never re-entered.

use super::codec::{self, ClientMessage, DecodeError, DecodedMessage};
use super::policy::{CloseCode, ReconnectDecision, ReconnectPolicy, reconnect_decision};
use super::{Connector, InboundFrame, OutboundFrame, TransportError, TransportLink, redact};
use crate::models::AuthToken;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{mpsc, watch};
use tokio::time::Instant;
use url::Url;

/// Lifecycle state of a connection
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionState {
    Idle,
    Connecting,
    Open,
    Closing,
    Closed,
}

/// Why a connection ended for good
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DisconnectReason {
    /// The caller closed it (unsubscribe, logout, session end)
    Requested(String),
    /// The server closed it with a normal closure code
    RemoteClosed,
    /// Abnormal closures exhausted the reconnect cap
    RetriesExhausted { attempts: u32 },
    /// The handshake was refused for the supplied token
    Unauthorized,
}

/// Snapshot published to observers after every transition
#[derive(Debug, Clone, PartialEq)]
pub struct ConnectionStatus {
    pub state: ConnectionState,
    pub reconnect_attempt: u32,
    pub max_attempts: u32,
    /// Set while a reconnect is scheduled
    pub next_retry: Option<Duration>,
    /// Set once the connection has ended for good
    pub outcome: Option<DisconnectReason>,
}

impl ConnectionStatus {
    fn idle(max_attempts: u32) -> Self {
        Self {
            state: ConnectionState::Idle,
            reconnect_attempt: 0,
            max_attempts,
            next_retry: None,
            outcome: None,
        }
    }

    /// Closed with no reconnect pending
    pub fn is_terminal(&self) -> bool {
        self.state == ConnectionState::Closed && self.next_retry.is_none()
    }

    /// One-line status text for the user interface
    pub fn describe(&self) -> String {
        match (&self.state, &self.next_retry, &self.outcome) {
            (ConnectionState::Idle, _, _) => "idle".to_string(),
            (ConnectionState::Connecting, _, _) if self.reconnect_attempt == 0 => {
                "connecting".to_string()
            }
            (ConnectionState::Connecting, _, _) => format!(
                "reconnecting (attempt {}/{})",
                self.reconnect_attempt, self.max_attempts
            ),
            (ConnectionState::Open, _, _) => "live".to_string(),
            (ConnectionState::Closing, _, _) => "closing".to_string(),
            (ConnectionState::Closed, Some(delay), _) => format!(
                "disconnected, retrying in {:.1}s (attempt {}/{})",
                delay.as_secs_f32(),
                self.reconnect_attempt,
                self.max_attempts
            ),
            (ConnectionState::Closed, None, Some(DisconnectReason::Requested(_)))
            | (ConnectionState::Closed, None, None) => "closed".to_string(),
            (ConnectionState::Closed, None, Some(DisconnectReason::RemoteClosed)) => {
                "closed by server".to_string()
            }
            (ConnectionState::Closed, None, Some(DisconnectReason::RetriesExhausted { attempts })) => {
                format!("disconnected after {} reconnect attempts", attempts)
            }
            (ConnectionState::Closed, None, Some(DisconnectReason::Unauthorized)) => {
                "cannot subscribe: credentials rejected".to_string()
            }
        }
    }
}

/// Framing spoken on a connection
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FrameCodec {
    /// JSON `{type, payload}` envelopes (the shared live channel)
    Envelope,
    /// Every frame is raw terminal output; input is sent as raw text
    RawStream,
}

/// Static settings of a connection
#[derive(Debug, Clone)]
pub struct ConnectionConfig {
    /// Channel URL without credentials; the token is appended on connect
    pub endpoint: Url,
    pub policy: ReconnectPolicy,
    pub codec: FrameCodec,
}

/// Receives decoded frames and state transitions on the actor task
pub trait FrameHandler: Send + 'static {
    fn on_message(&mut self, message: &DecodedMessage);

    fn on_state(&mut self, _state: ConnectionState) {}
}

enum Command {
    Open(AuthToken),
    Send(ClientMessage),
    AddHandler(Box<dyn FrameHandler>),
    Close(String),
}

/// Non-owning handle used by components that send over a connection
/// without controlling its lifetime
#[derive(Clone)]
pub struct ConnectionHandle {
    commands: mpsc::WeakUnboundedSender<Command>,
    status: watch::Receiver<ConnectionStatus>,
}

impl ConnectionHandle {
    /// Queue a message. Returns false (and logs) when the connection is not open.
    pub fn send(&self, message: ClientMessage) -> bool {
        if self.status.borrow().state != ConnectionState::Open {
            tracing::debug!("Dropping outbound message: connection is not open");
            return false;
        }
        match self.commands.upgrade() {
            Some(tx) => tx.send(Command::Send(message)).is_ok(),
            None => {
                tracing::debug!("Dropping outbound message: connection manager is gone");
                false
            }
        }
    }

    /// Close with a normal closure; a no-op once the manager is gone
    pub fn close(&self, reason: &str) {
        if let Some(tx) = self.commands.upgrade() {
            let _ = tx.send(Command::Close(reason.to_string()));
        }
    }

    pub fn status(&self) -> ConnectionStatus {
        self.status.borrow().clone()
    }

    pub fn watch(&self) -> watch::Receiver<ConnectionStatus> {
        self.status.clone()
    }
}

/// Owner of one live connection
///
/// Creating a manager spawns its actor in the `Idle` state; nothing touches
/// the network until [`open`](Self::open).
pub struct ConnectionManager {
    commands: mpsc::UnboundedSender<Command>,
    status: watch::Receiver<ConnectionStatus>,
}

impl ConnectionManager {
    pub fn new(connector: Arc<dyn Connector>, config: ConnectionConfig) -> Self {
        let (tx, rx) = mpsc::unbounded_channel();
        let (status_tx, status_rx) =
            watch::channel(ConnectionStatus::idle(config.policy.max_attempts));

        let driver = Driver {
            connector,
            config,
            handlers: Vec::new(),
            status: status_tx,
            token: None,
            attempts: 0,
            wanted: false,
        };
        tokio::spawn(driver.run(rx));

        Self {
            commands: tx,
            status: status_rx,
        }
    }

    /// Start connecting with `token`. Idempotent while a connection for the
    /// same token is connecting, open, or waiting to reconnect.
    pub fn open(&self, token: AuthToken) {
        self.command(Command::Open(token));
    }

    /// Queue a message; a no-op (logged) unless the connection is open
    pub fn send(&self, message: ClientMessage) -> bool {
        self.handle().send(message)
    }

    /// Register a handler for decoded frames, called in registration order
    pub fn on_frame(&self, handler: impl FrameHandler) {
        self.command(Command::AddHandler(Box::new(handler)));
    }

    /// Close with a normal closure; cancels any pending reconnect
    pub fn close(&self, reason: &str) {
        self.command(Command::Close(reason.to_string()));
    }

    pub fn state(&self) -> ConnectionState {
        self.status.borrow().state
    }

    pub fn status(&self) -> ConnectionStatus {
        self.status.borrow().clone()
    }

    pub fn watch(&self) -> watch::Receiver<ConnectionStatus> {
        self.status.clone()
    }

    pub fn handle(&self) -> ConnectionHandle {
        ConnectionHandle {
            commands: self.commands.downgrade(),
            status: self.status.clone(),
        }
    }

    fn command(&self, command: Command) {
        if self.commands.send(command).is_err() {
            tracing::error!("Connection actor has stopped; command ignored");
        }
    }
}

enum Phase {
    Idle,
    Connecting,
    Open(TransportLink),
    Waiting(Instant),
    Closed,
}

enum Flow {
    Continue,
    Connect,
    Shutdown(String),
}

struct Driver {
    connector: Arc<dyn Connector>,
    config: ConnectionConfig,
    handlers: Vec<Box<dyn FrameHandler>>,
    status: watch::Sender<ConnectionStatus>,
    token: Option<AuthToken>,
    attempts: u32,
    /// Still wanted by the owner; checked before any reconnect
    wanted: bool,
}

impl Driver {
    async fn run(mut self, mut commands: mpsc::UnboundedReceiver<Command>) {
        let mut phase = Phase::Idle;
        loop {
            let next = match phase {
                Phase::Idle | Phase::Closed => self.idle(&mut commands).await,
                Phase::Connecting => self.connecting(&mut commands).await,
                Phase::Open(link) => self.open(link, &mut commands).await,
                Phase::Waiting(deadline) => self.waiting(deadline, &mut commands).await,
            };
            match next {
                Some(p) => phase = p,
                None => break,
            }
        }
        tracing::debug!("Connection actor stopped");
    }

    async fn idle(&mut self, commands: &mut mpsc::UnboundedReceiver<Command>) -> Option<Phase> {
        loop {
            let command = commands.recv().await?;
            match self.on_command(command, None) {
                Flow::Continue => continue,
                Flow::Connect => return Some(Phase::Connecting),
                Flow::Shutdown(reason) => {
                    self.finish(DisconnectReason::Requested(reason));
                    return Some(Phase::Closed);
                }
            }
        }
    }

    async fn connecting(
        &mut self,
        commands: &mut mpsc::UnboundedReceiver<Command>,
    ) -> Option<Phase> {
        self.publish(ConnectionState::Connecting, None, None);

        let Some(url) = self.authorized_url() else {
            tracing::error!("Connect requested without a token");
            self.wanted = false;
            self.finish(DisconnectReason::Unauthorized);
            return Some(Phase::Closed);
        };
        tracing::debug!("Connecting to {}", redact(&url));

        let connector = self.connector.clone();
        let connect = async move { connector.connect(&url).await };
        tokio::pin!(connect);

        loop {
            tokio::select! {
                result = &mut connect => {
                    return Some(match result {
                        Ok(link) => {
                            self.attempts = 0;
                            Phase::Open(link)
                        }
                        Err(TransportError::Unauthorized(status)) => {
                            tracing::warn!("Channel handshake rejected (HTTP {}); not retrying", status);
                            self.wanted = false;
                            self.finish(DisconnectReason::Unauthorized);
                            Phase::Closed
                        }
                        Err(e) => {
                            tracing::warn!("Connection attempt failed: {}", e);
                            self.after_close(CloseCode::ABNORMAL)
                        }
                    });
                }
                command = commands.recv() => {
                    let command = command?;
                    match self.on_command(command, None) {
                        Flow::Continue | Flow::Connect => continue,
                        Flow::Shutdown(reason) => {
                            self.finish(DisconnectReason::Requested(reason));
                            return Some(Phase::Closed);
                        }
                    }
                }
            }
        }
    }

    async fn open(
        &mut self,
        mut link: TransportLink,
        commands: &mut mpsc::UnboundedReceiver<Command>,
    ) -> Option<Phase> {
        tracing::info!("Live channel open");
        self.publish(ConnectionState::Open, None, None);
        self.notify_state(ConnectionState::Open);

        loop {
            tokio::select! {
                frame = link.inbound.recv() => {
                    match frame {
                        Some(InboundFrame::Text(text)) => {
                            let decoded = self.decode_text(text);
                            self.dispatch(decoded);
                        }
                        Some(InboundFrame::Binary(bytes)) => {
                            let decoded = self.decode_binary(bytes);
                            self.dispatch(decoded);
                        }
                        Some(InboundFrame::Closed(code)) => return Some(self.after_close(code)),
                        None => return Some(self.after_close(CloseCode::ABNORMAL)),
                    }
                }
                command = commands.recv() => {
                    let Some(command) = command else {
                        self.wanted = false;
                        self.shutdown_link(link, "connection manager dropped");
                        return None;
                    };
                    match self.on_command(command, Some(&link)) {
                        Flow::Continue | Flow::Connect => continue,
                        Flow::Shutdown(reason) => {
                            self.shutdown_link(link, &reason);
                            self.finish(DisconnectReason::Requested(reason));
                            return Some(Phase::Closed);
                        }
                    }
                }
            }
        }
    }

    async fn waiting(
        &mut self,
        deadline: Instant,
        commands: &mut mpsc::UnboundedReceiver<Command>,
    ) -> Option<Phase> {
        let timer = tokio::time::sleep_until(deadline);
        tokio::pin!(timer);

        loop {
            tokio::select! {
                _ = &mut timer => {
                    // The owner may have let go while the timer was pending
                    if !self.wanted {
                        return Some(Phase::Closed);
                    }
                    return Some(Phase::Connecting);
                }
                command = commands.recv() => {
                    let command = command?;
                    match self.on_command(command, None) {
                        Flow::Continue | Flow::Connect => continue,
                        Flow::Shutdown(reason) => {
                            self.finish(DisconnectReason::Requested(reason));
                            return Some(Phase::Closed);
                        }
                    }
                }
            }
        }
    }

    fn on_command(&mut self, command: Command, link: Option<&TransportLink>) -> Flow {
        match command {
            Command::Open(token) => {
                if self.wanted {
                    if self.token.as_ref() == Some(&token) {
                        tracing::debug!("Open ignored: connection already active");
                    } else {
                        tracing::error!(
                            "Open requested for a different identity while a connection is active; ignoring"
                        );
                    }
                    return Flow::Continue;
                }
                self.token = Some(token);
                self.wanted = true;
                self.attempts = 0;
                Flow::Connect
            }
            Command::Send(message) => {
                match link {
                    Some(link) if self.status.borrow().state == ConnectionState::Open => {
                        if let Some(text) = self.encode(&message) {
                            let _ = link.outbound.send(OutboundFrame::Text(text));
                        }
                    }
                    _ => tracing::debug!("Dropping outbound message: connection is not open"),
                }
                Flow::Continue
            }
            Command::AddHandler(handler) => {
                self.handlers.push(handler);
                Flow::Continue
            }
            Command::Close(reason) => {
                self.wanted = false;
                Flow::Shutdown(reason)
            }
        }
    }

    /// Decide what follows the end of a transport
    fn after_close(&mut self, code: CloseCode) -> Phase {
        if !self.wanted {
            self.finish(DisconnectReason::Requested("closed".to_string()));
            return Phase::Closed;
        }

        match reconnect_decision(code.kind(), self.attempts, &self.config.policy) {
            ReconnectDecision::Stop => {
                tracing::info!("Server closed the channel normally");
                self.wanted = false;
                self.finish(DisconnectReason::RemoteClosed);
                Phase::Closed
            }
            ReconnectDecision::Retry { attempt, delay } => {
                tracing::warn!(
                    "Channel closed abnormally (code {}); reconnect {}/{} in {:?}",
                    code.0,
                    attempt,
                    self.config.policy.max_attempts,
                    delay
                );
                self.attempts = attempt;
                self.publish(ConnectionState::Closed, Some(delay), None);
                self.notify_state(ConnectionState::Closed);
                Phase::Waiting(Instant::now() + delay)
            }
            ReconnectDecision::GiveUp { attempts } => {
                tracing::warn!("Giving up after {} reconnect attempts", attempts);
                self.wanted = false;
                self.finish(DisconnectReason::RetriesExhausted { attempts });
                Phase::Closed
            }
        }
    }

    fn shutdown_link(&mut self, link: TransportLink, reason: &str) {
        self.publish(ConnectionState::Closing, None, None);
        self.notify_state(ConnectionState::Closing);
        let _ = link
            .outbound
            .send(OutboundFrame::Close(CloseCode::NORMAL, reason.to_string()));
    }

    fn finish(&mut self, reason: DisconnectReason) {
        self.publish(ConnectionState::Closed, None, Some(reason));
        self.notify_state(ConnectionState::Closed);
    }

    fn publish(
        &self,
        state: ConnectionState,
        next_retry: Option<Duration>,
        outcome: Option<DisconnectReason>,
    ) {
        self.status.send_replace(ConnectionStatus {
            state,
            reconnect_attempt: self.attempts,
            max_attempts: self.config.policy.max_attempts,
            next_retry,
            outcome,
        });
    }

    fn notify_state(&mut self, state: ConnectionState) {
        for handler in self.handlers.iter_mut() {
            handler.on_state(state);
        }
    }

    fn dispatch(&mut self, decoded: Result<DecodedMessage, DecodeError>) {
        match decoded {
            Ok(DecodedMessage::Heartbeat) => tracing::trace!("Heartbeat"),
            Ok(message) => {
                for handler in self.handlers.iter_mut() {
                    handler.on_message(&message);
                }
            }
            Err(e) => tracing::warn!("Discarding frame: {}", e),
        }
    }

    fn decode_text(&self, text: String) -> Result<DecodedMessage, DecodeError> {
        match self.config.codec {
            FrameCodec::Envelope => codec::decode(&text),
            FrameCodec::RawStream => Ok(DecodedMessage::TerminalData(text)),
        }
    }

    fn decode_binary(&self, bytes: Vec<u8>) -> Result<DecodedMessage, DecodeError> {
        match self.config.codec {
            FrameCodec::Envelope => codec::decode_binary(&bytes),
            FrameCodec::RawStream => Ok(DecodedMessage::TerminalData(
                String::from_utf8_lossy(&bytes).into_owned(),
            )),
        }
    }

    fn encode(&self, message: &ClientMessage) -> Option<String> {
        match (self.config.codec, message) {
            (FrameCodec::Envelope, message) => match codec::encode(message) {
                Ok(text) => Some(text),
                Err(e) => {
                    tracing::warn!("Failed to encode outbound message: {}", e);
                    None
                }
            },
            (FrameCodec::RawStream, ClientMessage::TerminalData { payload }) => {
                Some(payload.clone())
            }
            // The dedicated endpoint path already names the cluster
            (FrameCodec::RawStream, ClientMessage::StartTerminal { .. }) => None,
        }
    }

    fn authorized_url(&self) -> Option<Url> {
        let token = self.token.as_ref()?;
        let mut url = self.config.endpoint.clone();
        url.query_pairs_mut().append_pair("token", token.expose());
        Some(url)
    }
}
