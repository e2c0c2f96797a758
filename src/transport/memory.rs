//! In-memory connector
//!
//! Every successful `connect` hands the far side of the link to the test as a
//! [`RemoteEnd`], which plays the server: it pushes frames, reads what the
//! client sent, and closes (or drops) the transport.

use super::policy::CloseCode;
use super::{Connector, InboundFrame, OutboundFrame, TransportError, TransportLink};
use async_trait::async_trait;
use std::collections::VecDeque;
use std::sync::{Mutex, PoisonError};
use tokio::sync::mpsc;
use url::Url;

pub struct MemoryConnector {
    remotes: mpsc::UnboundedSender<RemoteEnd>,
    failures: Mutex<VecDeque<TransportError>>,
    urls: Mutex<Vec<Url>>,
}

impl MemoryConnector {
    /// Create a connector and the stream of server ends it produces
    pub fn new() -> (Self, mpsc::UnboundedReceiver<RemoteEnd>) {
        let (tx, rx) = mpsc::unbounded_channel();
        let connector = Self {
            remotes: tx,
            failures: Mutex::new(VecDeque::new()),
            urls: Mutex::new(Vec::new()),
        };
        (connector, rx)
    }

    /// Make the next connect attempt fail with `error`
    pub fn fail_next(&self, error: TransportError) {
        self.failures
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push_back(error);
    }

    /// Number of connect attempts so far, failed ones included
    pub fn attempts(&self) -> usize {
        self.urls.lock().unwrap_or_else(PoisonError::into_inner).len()
    }

    /// URLs of every connect attempt, in order
    pub fn urls(&self) -> Vec<Url> {
        self.urls
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }
}

#[async_trait]
impl Connector for MemoryConnector {
    async fn connect(&self, url: &Url) -> Result<TransportLink, TransportError> {
        self.urls
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(url.clone());

        let failure = self
            .failures
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .pop_front();
        if let Some(error) = failure {
            return Err(error);
        }

        let (to_client, inbound) = mpsc::unbounded_channel();
        let (outbound, from_client) = mpsc::unbounded_channel();
        let remote = RemoteEnd {
            url: url.clone(),
            to_client,
            from_client,
        };
        self.remotes
            .send(remote)
            .map_err(|_| TransportError::Unavailable("memory server is gone".to_string()))?;

        Ok(TransportLink { outbound, inbound })
    }
}

/// Server side of an in-memory transport
///
/// Dropping it ends the stream without a close frame, which the client sees
/// as an abnormal closure.
pub struct RemoteEnd {
    pub url: Url,
    to_client: mpsc::UnboundedSender<InboundFrame>,
    from_client: mpsc::UnboundedReceiver<OutboundFrame>,
}

impl RemoteEnd {
    pub fn send_text(&self, text: impl Into<String>) -> bool {
        self.to_client.send(InboundFrame::Text(text.into())).is_ok()
    }

    pub fn send_binary(&self, bytes: impl Into<Vec<u8>>) -> bool {
        self.to_client
            .send(InboundFrame::Binary(bytes.into()))
            .is_ok()
    }

    /// Close the transport with a close frame carrying `code`
    pub fn close(self, code: CloseCode) {
        let _ = self.to_client.send(InboundFrame::Closed(code));
    }

    /// Next frame the client sent; `None` once the client dropped the link
    pub async fn recv(&mut self) -> Option<OutboundFrame> {
        self.from_client.recv().await
    }

    pub fn try_recv(&mut self) -> Option<OutboundFrame> {
        self.from_client.try_recv().ok()
    }

    /// The `token` query parameter the client connected with
    pub fn token(&self) -> Option<String> {
        self.url
            .query_pairs()
            .find(|(k, _)| k == "token")
            .map(|(_, v)| v.into_owned())
    }
}
