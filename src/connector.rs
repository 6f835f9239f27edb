// file: src/connector.rs
// description: Socket construction behind a trait, with the tokio-tungstenite implementation

use crate::error::EventClientError;
use async_trait::async_trait;
use futures_util::{Sink, SinkExt, StreamExt, stream::BoxStream};
use std::pin::Pin;
use std::sync::Arc;
use tokio_tungstenite::{
    Connector as TlsConnector, connect_async_tls_with_config,
    tungstenite::{
        Message,
        protocol::{CloseFrame, frame::coding::CloseCode},
    },
};
use tracing::debug;
use url::Url;

/// Transport-neutral WebSocket frame.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Frame {
    Text(String),
    Binary(Vec<u8>),
    /// Ping/pong and raw frames; answered by the socket library.
    Control,
    Close(Option<String>),
}

impl From<Message> for Frame {
    fn from(message: Message) -> Self {
        match message {
            Message::Text(text) => Frame::Text(text.as_str().to_string()),
            Message::Binary(data) => Frame::Binary(data.to_vec()),
            Message::Ping(_) | Message::Pong(_) | Message::Frame(_) => Frame::Control,
            Message::Close(frame) => Frame::Close(frame.map(|f| f.reason.as_str().to_string())),
        }
    }
}

impl From<Frame> for Message {
    fn from(frame: Frame) -> Self {
        match frame {
            Frame::Text(text) => Message::Text(text.into()),
            Frame::Binary(data) => Message::Binary(data.into()),
            Frame::Control => Message::Ping(Vec::<u8>::new().into()),
            Frame::Close(reason) => Message::Close(Some(CloseFrame {
                code: CloseCode::Normal,
                reason: reason.unwrap_or_default().into(),
            })),
        }
    }
}

pub type FrameStream = BoxStream<'static, Result<Frame, EventClientError>>;
pub type FrameSink = Pin<Box<dyn Sink<Frame, Error = EventClientError> + Send>>;

/// An established socket, split into its two halves.
pub struct Socket {
    pub inbound: FrameStream,
    pub outbound: FrameSink,
}

/// Opens physical sockets for the transport. Each call yields a new socket.
#[async_trait]
pub trait Connector: Send + Sync + 'static {
    async fn connect(&self, endpoint: &Url) -> Result<Socket, EventClientError>;
}

/// WebSocket connector over tokio-tungstenite, TLS via rustls with the
/// webpki root store.
pub struct TungsteniteConnector {
    tls: Arc<rustls::ClientConfig>,
}

impl TungsteniteConnector {
    pub fn new() -> Result<Self, EventClientError> {
        let tls = rustls::ClientConfig::builder_with_provider(
            rustls::crypto::ring::default_provider().into(),
        )
        .with_safe_default_protocol_versions()?
        .with_root_certificates(rustls::RootCertStore {
            roots: webpki_roots::TLS_SERVER_ROOTS.to_vec(),
        })
        .with_no_client_auth();

        Ok(Self { tls: Arc::new(tls) })
    }
}

#[async_trait]
impl Connector for TungsteniteConnector {
    async fn connect(&self, endpoint: &Url) -> Result<Socket, EventClientError> {
        let connector = match endpoint.scheme() {
            "wss" => Some(TlsConnector::Rustls(self.tls.clone())),
            _ => Some(TlsConnector::Plain),
        };

        let (ws_stream, response) =
            connect_async_tls_with_config(endpoint.as_str(), None, false, connector).await?;
        debug!(status = %response.status(), "WebSocket handshake completed");

        let (write, read) = ws_stream.split();

        let inbound = read
            .map(|message| message.map(Frame::from).map_err(EventClientError::from))
            .boxed();

        let outbound = write
            .with(|frame: Frame| async move {
                Ok::<_, tokio_tungstenite::tungstenite::Error>(Message::from(frame))
            })
            .sink_map_err(EventClientError::from);

        Ok(Socket {
            inbound,
            outbound: Box::pin(outbound),
        })
    }
}
