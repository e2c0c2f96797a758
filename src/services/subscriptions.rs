//! Subscription lifecycle binder
//!
//! Decides when the shared live connection exists. The first active
//! subscription opens it with the current token, later subscriptions share
//! it, and disposing the last one closes it with a normal closure. At most
//! one connection exists per authenticated session.

use crate::models::{AuthToken, CollectionKey};
use crate::transport::{
    ConnectionConfig, ConnectionHandle, ConnectionManager, ConnectionStatus, Connector,
    DisconnectReason,
};
use std::collections::HashMap;
use std::fmt;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError, Weak};

/// What a subscriber wants from the live connection
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Interest {
    /// Live updates for a cached collection
    Collection(CollectionKey),
    /// A terminal session multiplexed over the shared channel
    Terminal(String),
}

impl fmt::Display for Interest {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Interest::Collection(key) => write!(f, "{}", key),
            Interest::Terminal(cluster_id) => write!(f, "terminal {}", cluster_id),
        }
    }
}

type Setup = dyn Fn(&ConnectionManager) + Send + Sync;

struct BinderInner {
    token: Option<AuthToken>,
    token_rejected: bool,
    connection: Option<ConnectionManager>,
    active: HashMap<u64, Interest>,
    next_id: u64,
    /// A refused subscribe has been reported since the last token change
    reported: bool,
    /// Connections opened elsewhere with the current token
    bound: Vec<ConnectionHandle>,
}

impl BinderInner {
    /// Pick up a handshake rejection observed since the last call
    fn refresh_authorization(&mut self) {
        let rejected = self
            .connection
            .as_ref()
            .is_some_and(|c| c.status().outcome == Some(DisconnectReason::Unauthorized));
        if rejected {
            tracing::warn!("Live channel credentials were rejected");
            self.token_rejected = true;
            self.connection = None;
            self.active.clear();
        }
    }

    fn release(&mut self, id: u64) {
        let Some(interest) = self.active.remove(&id) else {
            return;
        };
        tracing::debug!("Subscription {} ({}) disposed", id, interest);
        if self.active.is_empty() {
            if let Some(connection) = self.connection.take() {
                connection.close("no active subscriptions");
            }
        }
    }
}

fn lock(inner: &Mutex<BinderInner>) -> MutexGuard<'_, BinderInner> {
    inner.lock().unwrap_or_else(PoisonError::into_inner)
}

/// Owner of the decision of when the shared connection exists
///
/// Clones share state.
#[derive(Clone)]
pub struct SubscriptionBinder {
    inner: Arc<Mutex<BinderInner>>,
    connector: Arc<dyn Connector>,
    config: ConnectionConfig,
    setup: Arc<Setup>,
}

impl SubscriptionBinder {
    /// `setup` runs once for every connection the binder creates, before it
    /// opens, and registers the frame handlers.
    pub fn new(
        connector: Arc<dyn Connector>,
        config: ConnectionConfig,
        token: Option<AuthToken>,
        setup: impl Fn(&ConnectionManager) + Send + Sync + 'static,
    ) -> Self {
        Self {
            inner: Arc::new(Mutex::new(BinderInner {
                token,
                token_rejected: false,
                connection: None,
                active: HashMap::new(),
                next_id: 1,
                reported: false,
                bound: Vec::new(),
            })),
            connector,
            config,
            setup: Arc::new(setup),
        }
    }

    /// Declare interest. Without a usable token the returned handle is
    /// already disposed and no connection is attempted.
    pub fn subscribe(&self, interest: Interest) -> SubscriptionHandle {
        let mut inner = lock(&self.inner);
        inner.refresh_authorization();

        let usable = if inner.token_rejected {
            None
        } else {
            inner.token.clone()
        };
        let Some(token) = usable else {
            if !inner.reported {
                let reason = if inner.token.is_none() {
                    "no auth token"
                } else {
                    "credentials rejected"
                };
                tracing::warn!("Cannot subscribe to {}: {}", interest, reason);
                inner.reported = true;
            }
            return SubscriptionHandle::disposed(interest);
        };

        let id = inner.next_id;
        inner.next_id += 1;
        inner.active.insert(id, interest.clone());
        tracing::debug!("Subscription {} ({}) active", id, interest);

        if let Some(connection) = &inner.connection {
            // A connection that ended for good is reopened for new interest
            if connection.status().is_terminal() {
                tracing::info!("Reopening live channel for {}", interest);
                connection.open(token);
            }
        } else {
            let connection = ConnectionManager::new(self.connector.clone(), self.config.clone());
            (self.setup)(&connection);
            connection.open(token);
            inner.connection = Some(connection);
        }

        SubscriptionHandle {
            id,
            interest,
            binder: Arc::downgrade(&self.inner),
            disposed: AtomicBool::new(false),
        }
    }

    /// Replace the identity. Everything bound to the old token is released.
    pub fn login(&self, token: AuthToken) {
        self.logout();
        let mut inner = lock(&self.inner);
        inner.token = Some(token);
    }

    /// Close the connection, forget the token and deactivate every handle
    pub fn logout(&self) {
        let mut inner = lock(&self.inner);
        inner.token = None;
        inner.token_rejected = false;
        inner.reported = false;
        inner.active.clear();
        if let Some(connection) = inner.connection.take() {
            connection.close("logout");
        }
        for handle in inner.bound.drain(..) {
            handle.close("logout");
        }
    }

    /// Tie a connection that does not belong to the binder to the current
    /// identity, so that logout or a new login closes it as well.
    pub fn bind(&self, handle: ConnectionHandle) {
        let mut inner = lock(&self.inner);
        inner.bound.retain(|h| !h.status().is_terminal());
        inner.bound.push(handle);
    }

    /// Bound connections that have not ended yet
    pub fn bound_count(&self) -> usize {
        lock(&self.inner)
            .bound
            .iter()
            .filter(|h| !h.status().is_terminal())
            .count()
    }

    /// The token new connections would use; `None` when absent or rejected
    pub fn token(&self) -> Option<AuthToken> {
        let mut inner = lock(&self.inner);
        inner.refresh_authorization();
        if inner.token_rejected {
            None
        } else {
            inner.token.clone()
        }
    }

    pub fn is_rejected(&self) -> bool {
        let mut inner = lock(&self.inner);
        inner.refresh_authorization();
        inner.token_rejected
    }

    pub fn active_count(&self) -> usize {
        lock(&self.inner).active.len()
    }

    pub fn has_connection(&self) -> bool {
        lock(&self.inner).connection.is_some()
    }

    /// Status of the current connection, if one exists
    pub fn connection_status(&self) -> Option<ConnectionStatus> {
        lock(&self.inner).connection.as_ref().map(|c| c.status())
    }

    /// Non-owning handle to the current connection
    pub fn connection_handle(&self) -> Option<ConnectionHandle> {
        lock(&self.inner).connection.as_ref().map(|c| c.handle())
    }
}

/// One declared interest
///
/// Disposal runs at most once, explicitly or on drop.
pub struct SubscriptionHandle {
    id: u64,
    interest: Interest,
    binder: Weak<Mutex<BinderInner>>,
    disposed: AtomicBool,
}

impl SubscriptionHandle {
    fn disposed(interest: Interest) -> Self {
        Self {
            id: 0,
            interest,
            binder: Weak::new(),
            disposed: AtomicBool::new(true),
        }
    }

    pub fn interest(&self) -> &Interest {
        &self.interest
    }

    /// Still holding the connection open (false after dispose or logout)
    pub fn is_active(&self) -> bool {
        if self.disposed.load(Ordering::Acquire) {
            return false;
        }
        self.binder
            .upgrade()
            .is_some_and(|inner| lock(&inner).active.contains_key(&self.id))
    }

    pub fn dispose(&self) {
        if self.disposed.swap(true, Ordering::AcqRel) {
            return;
        }
        if let Some(inner) = self.binder.upgrade() {
            lock(&inner).release(self.id);
        }
    }
}

impl Drop for SubscriptionHandle {
    fn drop(&mut self) {
        self.dispose();
    }
}

impl fmt::Debug for SubscriptionHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SubscriptionHandle")
            .field("id", &self.id)
            .field("interest", &self.interest)
            .field("disposed", &self.disposed.load(Ordering::Acquire))
            .finish()
    }
}
