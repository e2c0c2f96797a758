//! WebSocket connector
//!
//! Establishes the physical transport with `tokio-tungstenite` and bridges
//! the split socket onto the channel pair of a [`TransportLink`]: a reader
//! task forwards frames inbound, a writer task drains the outbound queue.

use super::policy::CloseCode;
use super::{Connector, InboundFrame, OutboundFrame, TransportError, TransportLink, redact};
use async_trait::async_trait;
use futures::{SinkExt, Stream, StreamExt};
use std::time::Duration;
use tokio::sync::mpsc;
use tokio_tungstenite::tungstenite;
use tokio_tungstenite::tungstenite::protocol::CloseFrame;
use url::Url;

/// How long a closing socket waits for the peer
const CLOSE_TIMEOUT: Duration = Duration::from_secs(5);

#[derive(Debug, Clone, Default)]
pub struct WsConnector;

impl WsConnector {
    pub fn new() -> Self {
        Self
    }
}

impl TransportError {
    /// Classify a handshake failure
    pub fn from_tungstenite(err: tungstenite::Error) -> Self {
        match err {
            tungstenite::Error::Http(response) => {
                let status = response.status().as_u16();
                if status == 401 || status == 403 {
                    TransportError::Unauthorized(status)
                } else {
                    TransportError::Handshake(format!("HTTP {}", status))
                }
            }
            tungstenite::Error::Io(io_err) => TransportError::Unavailable(io_err.to_string()),
            other => TransportError::Handshake(other.to_string()),
        }
    }
}

#[async_trait]
impl Connector for WsConnector {
    async fn connect(&self, url: &Url) -> Result<TransportLink, TransportError> {
        let (ws_stream, _) = tokio_tungstenite::connect_async(url.as_str())
            .await
            .map_err(TransportError::from_tungstenite)?;
        tracing::debug!("WebSocket handshake complete: {}", redact(url));

        let (mut ws_write, mut ws_read) = ws_stream.split();
        let (inbound_tx, inbound_rx) = mpsc::unbounded_channel();
        let (outbound_tx, mut outbound_rx) = mpsc::unbounded_channel::<OutboundFrame>();

        tokio::spawn(pump_inbound(ws_read, inbound_tx));

        tokio::spawn(async move {
            while let Some(frame) = outbound_rx.recv().await {
                let message = match frame {
                    OutboundFrame::Text(text) => tungstenite::Message::Text(text.into()),
                    OutboundFrame::Close(code, reason) => {
                        let close = tungstenite::Message::Close(Some(CloseFrame {
                            code: code.0.into(),
                            reason: reason.into(),
                        }));
                        let _ = ws_write.send(close).await;
                        break;
                    }
                };
                if let Err(e) = ws_write.send(message).await {
                    tracing::debug!("WebSocket write error: {}", e);
                    break;
                }
            }
            if tokio::time::timeout(CLOSE_TIMEOUT, ws_write.close()).await.is_err() {
                tracing::debug!("WebSocket close timed out");
            }
        });

        Ok(TransportLink {
            outbound: outbound_tx,
            inbound: inbound_rx,
        })
    }
}

/// Forward socket frames until the peer closes or the link is dropped
async fn pump_inbound<S>(mut ws_read: S, inbound_tx: mpsc::UnboundedSender<InboundFrame>)
where
    S: Stream<Item = Result<tungstenite::Message, tungstenite::Error>> + Unpin,
{
    let code = loop {
        let next = tokio::select! {
            next = ws_read.next() => next,
            // Nobody reads any more, e.g. after our own close
            _ = inbound_tx.closed() => return,
        };
        match next {
            Some(Ok(tungstenite::Message::Text(text))) => {
                if inbound_tx.send(InboundFrame::Text(text.to_string())).is_err() {
                    return;
                }
            }
            Some(Ok(tungstenite::Message::Binary(bytes))) => {
                if inbound_tx.send(InboundFrame::Binary(bytes.to_vec())).is_err() {
                    return;
                }
            }
            Some(Ok(tungstenite::Message::Close(frame))) => {
                break frame
                    .map(|f| CloseCode(u16::from(f.code)))
                    .unwrap_or(CloseCode::NO_STATUS);
            }
            // Ping/pong are answered by tungstenite
            Some(Ok(_)) => {}
            Some(Err(e)) => {
                tracing::debug!("WebSocket read error: {}", e);
                break CloseCode::ABNORMAL;
            }
            None => break CloseCode::ABNORMAL,
        }
    };
    let _ = inbound_tx.send(InboundFrame::Closed(code));
}
