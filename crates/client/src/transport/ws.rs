//! WebSocket transport using tokio-tungstenite

use std::sync::Arc;

use async_trait::async_trait;
use futures_util::stream::{SplitSink, SplitStream};
use futures_util::{SinkExt, StreamExt};
use tokio::net::TcpStream;
use tokio::sync::Mutex;
use tokio_tungstenite::tungstenite::Message as WsFrame;
use tokio_tungstenite::{connect_async, MaybeTlsStream, WebSocketStream};
use url::Url;

use wiremux_protocol::Message;

use crate::config::ClientConfig;
use crate::error::TransportError;
use crate::transport::{Connector, Transport};

type WsStream = WebSocketStream<MaybeTlsStream<TcpStream>>;

/// One live WebSocket connection to the peer.
///
/// The split halves sit behind their own locks so the single read loop and
/// concurrent writers never contend with each other.
pub struct WsTransport {
    writer: Mutex<SplitSink<WsStream, WsFrame>>,
    reader: Mutex<SplitStream<WsStream>>,
    max_payload_bytes: usize,
}

impl WsTransport {
    fn new(stream: WsStream, max_payload_bytes: usize) -> Self {
        let (writer, reader) = stream.split();
        Self {
            writer: Mutex::new(writer),
            reader: Mutex::new(reader),
            max_payload_bytes,
        }
    }
}

#[async_trait]
impl Transport for WsTransport {
    async fn send(&self, message: Message) -> Result<(), TransportError> {
        let text = serde_json::to_string(&message)?;
        if text.len() > self.max_payload_bytes {
            return Err(TransportError::PayloadTooLarge {
                size: text.len(),
                limit: self.max_payload_bytes,
            });
        }
        let mut writer = self.writer.lock().await;
        writer.send(WsFrame::Text(text)).await?;
        Ok(())
    }

    async fn recv(&self) -> Result<Message, TransportError> {
        let mut reader = self.reader.lock().await;
        loop {
            match reader.next().await {
                Some(Ok(WsFrame::Text(text))) => match serde_json::from_str(&text) {
                    Ok(message) => return Ok(message),
                    Err(e) => {
                        tracing::warn!("failed to parse inbound frame: {}", e);
                    }
                },
                Some(Ok(WsFrame::Close(_))) => {
                    tracing::info!("peer closed the connection");
                    return Err(TransportError::Closed);
                }
                // Keepalive traffic; tungstenite answers pings itself.
                Some(Ok(WsFrame::Ping(_) | WsFrame::Pong(_))) => {}
                Some(Ok(frame)) => {
                    tracing::debug!("ignoring non-text frame ({} bytes)", frame.len());
                }
                Some(Err(e)) => return Err(TransportError::WebSocket(e)),
                None => return Err(TransportError::Closed),
            }
        }
    }

    async fn close(&self) -> Result<(), TransportError> {
        use tokio_tungstenite::tungstenite::Error as WsError;

        let mut writer = self.writer.lock().await;
        match writer.close().await {
            Ok(()) | Err(WsError::ConnectionClosed | WsError::AlreadyClosed) => Ok(()),
            Err(e) => Err(TransportError::WebSocket(e)),
        }
    }
}

/// Opens [`WsTransport`]s for a configured endpoint.
pub struct WsConnector {
    url: Url,
    max_payload_bytes: usize,
}

impl WsConnector {
    /// Validate the configured endpoint and build a connector for it.
    pub fn new(config: &ClientConfig) -> Result<Self, TransportError> {
        let url = Url::parse(&config.url)
            .map_err(|e| TransportError::Connect(format!("invalid url {:?}: {}", config.url, e)))?;
        Ok(Self {
            url,
            max_payload_bytes: config.max_payload_bytes,
        })
    }
}

#[async_trait]
impl Connector for WsConnector {
    async fn connect(&self) -> Result<Arc<dyn Transport>, TransportError> {
        let (stream, _) = connect_async(self.url.as_str())
            .await
            .map_err(|e| TransportError::Connect(e.to_string()))?;
        tracing::info!("connected to {}", self.url);
        Ok(Arc::new(WsTransport::new(stream, self.max_payload_bytes)))
    }
}
