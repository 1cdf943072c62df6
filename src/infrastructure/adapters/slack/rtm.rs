//! RTM stream plumbing: connecting, reading frames, reconnecting

use async_trait::async_trait;
use futures::{SinkExt, StreamExt};
use parking_lot::Mutex;
use std::sync::Arc;
use std::time::Duration;
use tokio::net::TcpStream;
use tokio::sync::watch;
use tokio_tungstenite::tungstenite::Message as WsMessage;
use tokio_tungstenite::{client_async_tls, connect_async, MaybeTlsStream, WebSocketStream};
use tracing::{debug, error, info, trace, warn};

use super::api::SlackApi;
use super::events::InboundEvent;
use super::handler::MessageHandler;
use super::proxy::{tunnel_target, HttpProxy};
use super::ConnectionState;
use crate::application::errors::BotError;

/// Identity and endpoint of an opened RTM session
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RtmSession {
    pub url: String,
    pub self_id: String,
    pub self_name: String,
}

/// A source of raw text frames
#[async_trait]
pub trait FrameStream: Send {
    /// Next text frame, `None` at end of stream
    async fn next_frame(&mut self) -> Option<Result<String, BotError>>;

    async fn close(&mut self);
}

/// Opens RTM sessions
#[async_trait]
pub trait RtmConnector: Send + Sync {
    async fn connect(&self) -> Result<(RtmSession, Box<dyn FrameStream>), BotError>;
}

/// Connects through `rtm.connect`, then opens the returned websocket URL
pub struct WebSocketConnector {
    api: SlackApi,
    proxy: Option<HttpProxy>,
}

impl WebSocketConnector {
    pub fn new(api: SlackApi, proxy: Option<HttpProxy>) -> Self {
        Self { api, proxy }
    }

    async fn open(&self, url: &str) -> Result<WsStream, BotError> {
        let connected = match &self.proxy {
            Some(proxy) => {
                let (host, port) = tunnel_target(url)?;
                let tunnel = proxy.tunnel(&host, port).await?;
                client_async_tls(url, tunnel).await
            }
            None => connect_async(url).await,
        };

        let (stream, _response) = connected
            .map_err(|e| BotError::Network(format!("WebSocket connection failed: {}", e)))?;
        Ok(stream)
    }
}

#[async_trait]
impl RtmConnector for WebSocketConnector {
    async fn connect(&self) -> Result<(RtmSession, Box<dyn FrameStream>), BotError> {
        let response = self.api.rtm_connect().await?;
        let session = RtmSession {
            url: response.url,
            self_id: response.identity.id,
            self_name: response.identity.name,
        };

        info!("Opening RTM stream for {} ({})", session.self_name, session.self_id);
        let stream = self.open(&session.url).await?;

        Ok((session, Box::new(WsFrameStream { inner: stream })))
    }
}

type WsStream = WebSocketStream<MaybeTlsStream<TcpStream>>;

struct WsFrameStream {
    inner: WsStream,
}

#[async_trait]
impl FrameStream for WsFrameStream {
    async fn next_frame(&mut self) -> Option<Result<String, BotError>> {
        loop {
            match self.inner.next().await? {
                Ok(WsMessage::Text(text)) => return Some(Ok(text.as_str().to_owned())),
                Ok(WsMessage::Binary(data)) => {
                    return Some(Ok(String::from_utf8_lossy(&data).into_owned()))
                }
                Ok(WsMessage::Ping(data)) => {
                    trace!("Received ping, sending pong");
                    if let Err(e) = self.inner.send(WsMessage::Pong(data)).await {
                        return Some(Err(BotError::Network(e.to_string())));
                    }
                }
                Ok(WsMessage::Pong(_)) | Ok(WsMessage::Frame(_)) => {}
                Ok(WsMessage::Close(frame)) => {
                    debug!("Slack closed the RTM stream: {:?}", frame);
                    return None;
                }
                Err(e) => return Some(Err(BotError::Network(e.to_string()))),
            }
        }
    }

    async fn close(&mut self) {
        if let Err(e) = self.inner.close(None).await {
            debug!("Error while closing RTM stream: {}", e);
        }
    }
}

/// Reconnection after the stream drops, with exponential backoff
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReconnectPolicy {
    pub enabled: bool,
    pub initial_delay: Duration,
    pub max_delay: Duration,
    pub max_attempts: u32,
}

impl Default for ReconnectPolicy {
    fn default() -> Self {
        Self {
            enabled: true,
            initial_delay: Duration::from_secs(1),
            max_delay: Duration::from_secs(60),
            max_attempts: 10,
        }
    }
}

impl ReconnectPolicy {
    pub fn disabled() -> Self {
        Self {
            enabled: false,
            ..Self::default()
        }
    }

    fn next_delay(&self, current: Duration) -> Duration {
        std::cmp::min(current.saturating_mul(2), self.max_delay)
    }
}

/// The long-lived task that reads frames and feeds the handler
pub(crate) struct ReadLoop {
    pub(crate) stream: Box<dyn FrameStream>,
    pub(crate) handler: Arc<MessageHandler>,
    pub(crate) connector: Arc<dyn RtmConnector>,
    pub(crate) policy: ReconnectPolicy,
    pub(crate) shutdown_rx: watch::Receiver<bool>,
    pub(crate) state: Arc<Mutex<ConnectionState>>,
}

impl ReadLoop {
    pub(crate) async fn run(mut self) {
        loop {
            tokio::select! {
                changed = self.shutdown_rx.changed() => {
                    let stop = changed.is_err() || *self.shutdown_rx.borrow();
                    if stop {
                        info!("RTM read loop shutting down");
                        self.stream.close().await;
                        return;
                    }
                }
                frame = self.stream.next_frame() => {
                    match frame {
                        Some(Ok(text)) => self.dispatch(&text),
                        Some(Err(e)) => {
                            warn!("RTM stream error: {}", e);
                            if !self.reconnect().await {
                                break;
                            }
                        }
                        None => {
                            info!("RTM stream ended");
                            if !self.reconnect().await {
                                break;
                            }
                        }
                    }
                }
            }
        }

        let mut state = self.state.lock();
        if *state == ConnectionState::Connected {
            *state = ConnectionState::Disconnected;
        }
    }

    fn dispatch(&self, text: &str) {
        trace!(len = text.len(), "Received frame");
        match InboundEvent::parse(text) {
            Ok(event) => self.handler.handle(event),
            Err(e) => warn!("Discarding unparseable frame from Slack: {}", e),
        }
    }

    /// Replaces the stream; false when the loop should stop
    async fn reconnect(&mut self) -> bool {
        if !self.policy.enabled {
            return false;
        }

        let mut delay = self.policy.initial_delay;
        for attempt in 1..=self.policy.max_attempts {
            warn!("Reconnecting to Slack in {:?} (attempt {})", delay, attempt);
            tokio::select! {
                _ = tokio::time::sleep(delay) => {}
                _ = self.shutdown_rx.changed() => return false,
            }

            match self.connector.connect().await {
                Ok((session, stream)) => {
                    info!("Reconnected to Slack as {}", session.self_name);
                    self.stream = stream;
                    return true;
                }
                Err(e) => {
                    warn!("Reconnection failed: {}", e);
                    delay = self.policy.next_delay(delay);
                }
            }
        }

        error!(
            "Giving up on Slack after {} reconnection attempts",
            self.policy.max_attempts
        );
        false
    }
}
