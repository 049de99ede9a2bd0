//! Connector seam between the channel driver and the network.
//!
//! The driver only sees [`Connector`] and [`Connection`]; the production
//! implementation is [`WsConnector`] over `tokio-tungstenite`.

use async_trait::async_trait;
use futures_util::{SinkExt, StreamExt};
use tokio::net::TcpStream;
use tokio_tungstenite::{MaybeTlsStream, WebSocketStream, connect_async, tungstenite::Message};

use super::event::SessionId;
use crate::errors::TransportError;

/// Placeholder replaced by the encoded session id in endpoint templates.
pub const SESSION_PLACEHOLDER: &str = "{session}";

/// One thing read from a live connection.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Inbound {
    /// An application frame to decode.
    Frame(String),
    /// Control traffic (ping/pong); proves the peer is alive.
    Keepalive,
    /// The peer closed the connection or the stream ended.
    Closed,
}

/// Opens connections for a session.
#[async_trait]
pub trait Connector: Send + Sync + 'static {
    /// Human-readable endpoint for `session`, used in errors and logs.
    fn endpoint(&self, session: &SessionId) -> String;

    /// Check that a connection for `session` can be attempted at all.
    fn validate(&self, _session: &SessionId) -> Result<(), TransportError> {
        Ok(())
    }

    async fn connect(&self, session: &SessionId) -> Result<Box<dyn Connection>, TransportError>;
}

/// A single established connection instance.
#[async_trait]
pub trait Connection: Send {
    /// Wait for the next inbound item. Must be cancel-safe.
    async fn recv(&mut self) -> Result<Inbound, TransportError>;

    /// Send a liveness probe.
    async fn ping(&mut self) -> Result<(), TransportError>;

    /// Best-effort close; never fails.
    async fn close(&mut self);
}

/// WebSocket connector addressing `{session}` inside a URL template.
#[derive(Debug, Clone)]
pub struct WsConnector {
    url_template: String,
}

impl WsConnector {
    pub fn new(url_template: impl Into<String>) -> Self {
        Self {
            url_template: url_template.into(),
        }
    }
}

/// Expand an endpoint template for one session. Templates without a
/// `{session}` placeholder get the id appended as the last path segment.
pub fn expand_endpoint(template: &str, session: &SessionId) -> String {
    let encoded = session.url_encoded();
    if template.contains(SESSION_PLACEHOLDER) {
        template.replace(SESSION_PLACEHOLDER, &encoded)
    } else {
        format!("{}/{}", template.trim_end_matches('/'), encoded)
    }
}

#[async_trait]
impl Connector for WsConnector {
    fn endpoint(&self, session: &SessionId) -> String {
        expand_endpoint(&self.url_template, session)
    }

    fn validate(&self, session: &SessionId) -> Result<(), TransportError> {
        let endpoint = self.endpoint(session);
        if endpoint.starts_with("ws://") || endpoint.starts_with("wss://") {
            Ok(())
        } else {
            Err(TransportError::InvalidEndpoint {
                endpoint,
                message: "expected a ws:// or wss:// URL".to_string(),
            })
        }
    }

    async fn connect(&self, session: &SessionId) -> Result<Box<dyn Connection>, TransportError> {
        self.validate(session)?;
        let endpoint = self.endpoint(session);
        let (stream, _response) =
            connect_async(endpoint.as_str())
                .await
                .map_err(|e| TransportError::Connect {
                    endpoint: endpoint.clone(),
                    message: e.to_string(),
                })?;
        Ok(Box::new(WsConnection { stream }))
    }
}

struct WsConnection {
    stream: WebSocketStream<MaybeTlsStream<TcpStream>>,
}

#[async_trait]
impl Connection for WsConnection {
    async fn recv(&mut self) -> Result<Inbound, TransportError> {
        match self.stream.next().await {
            Some(Ok(Message::Text(text))) => Ok(Inbound::Frame(text.as_str().to_owned())),
            Some(Ok(Message::Binary(bytes))) => {
                Ok(Inbound::Frame(String::from_utf8_lossy(&bytes).into_owned()))
            }
            Some(Ok(Message::Ping(_) | Message::Pong(_) | Message::Frame(_))) => {
                Ok(Inbound::Keepalive)
            }
            Some(Ok(Message::Close(_))) | None => Ok(Inbound::Closed),
            Some(Err(e)) => Err(TransportError::ConnectionLost(e.to_string())),
        }
    }

    async fn ping(&mut self) -> Result<(), TransportError> {
        self.stream
            .send(Message::Ping(Vec::new().into()))
            .await
            .map_err(|e| TransportError::ConnectionLost(e.to_string()))
    }

    async fn close(&mut self) {
        let _ = self.stream.close(None).await;
    }
}
