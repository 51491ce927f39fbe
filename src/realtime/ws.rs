//! Websocket implementation of the alert transport.

use super::transport::{AlertConnection, AlertTransport};
use super::types::Alert;
use async_trait::async_trait;
use futures_util::{SinkExt, StreamExt};
use std::time::Duration;
use tokio::net::TcpStream;
use tokio::time::timeout;
use tokio_tungstenite::tungstenite::{client::IntoClientRequest, http::header::AUTHORIZATION};
use tokio_tungstenite::{connect_async, tungstenite::Message, MaybeTlsStream, WebSocketStream};
use tracing::{debug, warn};

const CONNECT_TIMEOUT: Duration = Duration::from_secs(10);

pub struct WsAlertTransport {
    url: String,
    token: Option<String>,
}

impl WsAlertTransport {
    pub fn new(url: String, token: Option<String>) -> Self {
        Self { url, token }
    }
}

#[async_trait]
impl AlertTransport for WsAlertTransport {
    async fn connect(&self) -> anyhow::Result<Box<dyn AlertConnection>> {
        let mut request = self.url.as_str().into_client_request()?;
        if let Some(token) = &self.token {
            request
                .headers_mut()
                .insert(AUTHORIZATION, format!("Bearer {}", token).parse()?);
        }

        let (stream, _) = timeout(CONNECT_TIMEOUT, connect_async(request))
            .await
            .map_err(|_| anyhow::anyhow!("websocket connect timed out"))??;

        debug!(url = %self.url, "websocket connected");
        Ok(Box::new(WsAlertConnection { stream }))
    }
}

struct WsAlertConnection {
    stream: WebSocketStream<MaybeTlsStream<TcpStream>>,
}

#[async_trait]
impl AlertConnection for WsAlertConnection {
    async fn next_alert(&mut self) -> anyhow::Result<Option<Alert>> {
        loop {
            match self.stream.next().await {
                Some(Ok(Message::Text(text))) => match serde_json::from_str::<Alert>(&text) {
                    Ok(alert) => return Ok(Some(alert)),
                    Err(e) => {
                        // Skip frames we do not understand instead of
                        // dropping the whole connection
                        warn!(error = %e, "unparseable alert frame");
                    }
                },
                Some(Ok(Message::Close(_))) | None => return Ok(None),
                Some(Ok(_)) => {
                    // Ping, pong and binary frames carry no alerts
                }
                Some(Err(e)) => return Err(e.into()),
            }
        }
    }

    async fn ping(&mut self) -> anyhow::Result<()> {
        self.stream.send(Message::Ping(Vec::new())).await?;
        Ok(())
    }
}
