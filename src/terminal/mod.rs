//! Interactive terminal sessions
//!
//! A session is a logical stream scoped to one cluster. It runs either over
//! the shared live channel (tagged `start_terminal` / `terminal_data` /
//! `terminal_error` envelopes, one active session per connection) or over a
//! dedicated channel of its own that carries raw terminal bytes.
//!
//! ```text
//! Connecting ──first output (shared) / channel open (dedicated)──▶ Open
//!      │                                                          │
//!      └──────── close, terminal_error, transport teardown ───────┴──▶ Closed
//! ```

mod router;
mod session;

pub use router::SessionRouter;
pub use session::TerminalSession;

use crate::api::{ApiError, Endpoints};
use crate::services::{Interest, SubscriptionBinder};
use crate::transport::{
    ConnectionConfig, ConnectionManager, Connector, FrameCodec, ReconnectPolicy,
};
use router::DedicatedSink;
use serde::{Deserialize, Serialize};
use session::{SessionCarrier, SessionCore, lock};
use std::fmt;
use std::str::FromStr;
use std::sync::Arc;

/// Transport a terminal session runs over
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TerminalMode {
    /// Multiplexed over the shared live channel
    #[default]
    Shared,
    /// A channel of its own at the terminal endpoint
    Dedicated,
}

impl fmt::Display for TerminalMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TerminalMode::Shared => f.write_str("shared"),
            TerminalMode::Dedicated => f.write_str("dedicated"),
        }
    }
}

impl FromStr for TerminalMode {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "shared" => Ok(TerminalMode::Shared),
            "dedicated" => Ok(TerminalMode::Dedicated),
            other => Err(format!(
                "Invalid terminal mode '{}'. Must be 'shared' or 'dedicated'",
                other
            )),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    Connecting,
    Open,
    Closed,
}

/// One item of session output, delivered in receipt order
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SessionOutput {
    Data(String),
    /// A `terminal_error` payload, verbatim
    Error(String),
    /// Always the last item
    Closed(String),
}

/// What happened to a piece of input
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InputDisposition {
    Sent,
    /// Held until the session opens
    Buffered,
}

#[derive(Debug, Clone, thiserror::Error, PartialEq, Eq)]
pub enum InputError {
    #[error("session is not open yet and a line is already pending")]
    NotOpen,

    #[error("session is closed")]
    Closed,

    #[error("input could not be sent: connection is not open")]
    SendFailed,
}

#[derive(Debug, thiserror::Error)]
pub enum SessionError {
    #[error("cannot start a terminal: not authorized")]
    NotAuthorized,

    #[error(transparent)]
    Endpoint(#[from] ApiError),
}

/// Starts terminal sessions over the shared channel or dedicated ones
pub struct TerminalMultiplexer {
    binder: SubscriptionBinder,
    router: SessionRouter,
    connector: Arc<dyn Connector>,
    endpoints: Endpoints,
}

impl TerminalMultiplexer {
    /// `router` must be the one registered on the binder's connections
    pub fn new(
        binder: SubscriptionBinder,
        router: SessionRouter,
        connector: Arc<dyn Connector>,
        endpoints: Endpoints,
    ) -> Self {
        Self {
            binder,
            router,
            connector,
            endpoints,
        }
    }

    pub fn start_session(
        &self,
        cluster_id: &str,
        mode: TerminalMode,
    ) -> Result<TerminalSession, SessionError> {
        match mode {
            TerminalMode::Shared => self.start_shared(cluster_id),
            TerminalMode::Dedicated => self.start_dedicated(cluster_id),
        }
    }

    fn start_shared(&self, cluster_id: &str) -> Result<TerminalSession, SessionError> {
        let subscription = self
            .binder
            .subscribe(Interest::Terminal(cluster_id.to_string()));
        if !subscription.is_active() {
            return Err(SessionError::NotAuthorized);
        }
        let link = self
            .binder
            .connection_handle()
            .ok_or(SessionError::NotAuthorized)?;

        let (core, output, state) =
            SessionCore::new(cluster_id.to_string(), TerminalMode::Shared, link);
        self.router.attach(core.clone());
        // No-op until the connection is open; the router retries on open
        lock(&core).request_start();

        Ok(TerminalSession::new(
            core,
            output,
            state,
            SessionCarrier::Shared {
                subscription,
                router: self.router.clone(),
            },
        ))
    }

    fn start_dedicated(&self, cluster_id: &str) -> Result<TerminalSession, SessionError> {
        let token = self.binder.token().ok_or(SessionError::NotAuthorized)?;
        let endpoint = self.endpoints.terminal(cluster_id)?;

        let connection = ConnectionManager::new(
            self.connector.clone(),
            ConnectionConfig {
                endpoint,
                policy: ReconnectPolicy::never(),
                codec: FrameCodec::RawStream,
            },
        );
        let (core, output, state) = SessionCore::new(
            cluster_id.to_string(),
            TerminalMode::Dedicated,
            connection.handle(),
        );
        connection.on_frame(DedicatedSink::new(core.clone()));
        self.binder.bind(connection.handle());
        connection.open(token);

        Ok(TerminalSession::new(
            core,
            output,
            state,
            SessionCarrier::Dedicated(connection),
        ))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_terminal_mode_parse() {
        assert_eq!("shared".parse::<TerminalMode>(), Ok(TerminalMode::Shared));
        assert_eq!(
            " Dedicated ".parse::<TerminalMode>(),
            Ok(TerminalMode::Dedicated)
        );
        assert!("raw".parse::<TerminalMode>().is_err());
        assert_eq!(TerminalMode::default(), TerminalMode::Shared);
    }
}
