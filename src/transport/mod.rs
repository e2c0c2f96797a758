//! Transport module
//!
//! Provides the live channel: a token-authenticated persistent connection
//! whose frames are decoded by [`codec`] and dispatched by a
//! [`ConnectionManager`]. The physical transport sits behind the
//! [`Connector`] trait so the state machine can run against the in-memory
//! connector without a network.

pub mod codec;
mod connection;
pub mod memory;
pub mod policy;
pub mod ws;

pub use codec::{ClientMessage, DecodeError, DecodedMessage};
pub use connection::*;
pub use memory::{MemoryConnector, RemoteEnd};
pub use policy::{CloseCode, CloseKind, ReconnectDecision, ReconnectPolicy, reconnect_decision};
pub use ws::WsConnector;

use async_trait::async_trait;
use tokio::sync::mpsc;
use url::Url;

/// Frame delivered by the transport to the connection actor
#[derive(Debug, Clone, PartialEq)]
pub enum InboundFrame {
    Text(String),
    Binary(Vec<u8>),
    /// The transport ended. Streams that end without a close frame report
    /// [`CloseCode::ABNORMAL`].
    Closed(CloseCode),
}

/// Frame handed by the connection actor to the transport
#[derive(Debug, Clone, PartialEq)]
pub enum OutboundFrame {
    Text(String),
    Close(CloseCode, String),
}

/// An established transport, as a pair of channels
///
/// Dropping the link tears the transport down.
pub struct TransportLink {
    pub outbound: mpsc::UnboundedSender<OutboundFrame>,
    pub inbound: mpsc::UnboundedReceiver<InboundFrame>,
}

/// Errors raised while establishing a transport
#[derive(Debug, Clone, thiserror::Error, PartialEq)]
pub enum TransportError {
    #[error("server is unavailable: {0}")]
    Unavailable(String),

    #[error("server rejected the credentials (HTTP {0})")]
    Unauthorized(u16),

    #[error("handshake failed: {0}")]
    Handshake(String),
}

/// Opens physical transports
#[async_trait]
pub trait Connector: Send + Sync + 'static {
    async fn connect(&self, url: &Url) -> Result<TransportLink, TransportError>;
}

/// Strip the query string so URLs can be logged without the token
pub fn redact(url: &Url) -> String {
    let mut clean = url.clone();
    clean.set_query(None);
    clean.to_string()
}
