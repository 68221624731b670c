//! WebSocket deliver transport.
//!
//! The proxy framing: one binary frame up carrying the signed seek
//! envelope, then binary `DeliverResponse` frames down until the seek
//! window closes. The peer endpoint and TLS server name travel as
//! query parameters.

use async_trait::async_trait;
use futures::{SinkExt, StreamExt};
use tokio::net::TcpStream;
use tokio_tungstenite::tungstenite::protocol::frame::coding::CloseCode;
use tokio_tungstenite::tungstenite::protocol::CloseFrame;
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::{connect_async, MaybeTlsStream, WebSocketStream};
use tracing::debug;

use crate::transport::{DeliverSession, DeliverTransport, TransportError};

pub struct WsDeliver {
    base_url: String,
}

impl WsDeliver {
    pub fn new(base_url: impl Into<String>) -> Self {
        WsDeliver {
            base_url: base_url.into(),
        }
    }
}

#[async_trait]
impl DeliverTransport for WsDeliver {
    async fn open(
        &self,
        target: &str,
        hostname: &str,
    ) -> Result<Box<dyn DeliverSession>, TransportError> {
        let url = format!("{}?target={}&hostname={}", self.base_url, target, hostname);
        debug!(%url, "opening deliver socket");

        let (socket, _response) = connect_async(url.as_str()).await.map_err(|e| {
            TransportError::message_only(format!("deliver socket connect failed: {e}"))
        })?;
        Ok(Box::new(WsSession { socket }))
    }
}

struct WsSession {
    socket: WebSocketStream<MaybeTlsStream<TcpStream>>,
}

#[async_trait]
impl DeliverSession for WsSession {
    async fn send(&mut self, frame: Vec<u8>) -> Result<(), TransportError> {
        self.socket
            .send(Message::Binary(frame))
            .await
            .map_err(|e| TransportError::message_only(format!("deliver socket send failed: {e}")))
    }

    async fn next_frame(&mut self) -> Option<Result<Vec<u8>, TransportError>> {
        while let Some(item) = self.socket.next().await {
            match item {
                Ok(Message::Binary(frame)) => return Some(Ok(frame)),
                Ok(Message::Ping(_)) | Ok(Message::Pong(_)) => continue,
                Ok(Message::Close(frame)) => {
                    return match frame {
                        Some(f) if f.code != CloseCode::Normal => {
                            Some(Err(TransportError::protocol(format!(
                                "deliver socket closed with code {}",
                                u16::from(f.code)
                            ))))
                        }
                        _ => None,
                    };
                }
                Ok(_) => {
                    return Some(Err(TransportError::protocol(
                        "deliver socket sent a non-binary frame",
                    )))
                }
                Err(e) => {
                    return Some(Err(TransportError::message_only(format!(
                        "deliver socket receive failed: {e}"
                    ))))
                }
            }
        }
        None
    }

    async fn close(&mut self) {
        let _ = self
            .socket
            .close(Some(CloseFrame {
                code: CloseCode::Normal,
                reason: "".into(),
            }))
            .await;
    }
}
