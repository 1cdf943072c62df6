//! Slack adapter
//!
//! Keeps one RTM stream open, turns its frames into framework messages and
//! events, and offers the outbound operations (posting, topics, rosters)
//! on top of the Web API.

pub mod api;
pub mod events;
pub mod formatter;
pub mod handler;
pub mod proxy;
pub mod rtm;
pub mod verify;

use parking_lot::Mutex;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::watch;
use tokio::task::JoinHandle;

use crate::application::errors::BotError;
use crate::application::services::EntityResolver;
use crate::domain::entities::{RobotEvent, RoomKind, Source, User};
use crate::domain::traits::{EntityStore, Robot};
use crate::infrastructure::config::SlackConfig;

use api::SlackApi;
use handler::MessageHandler;
use proxy::HttpProxy;
use rtm::{ReadLoop, RtmConnector, WebSocketConnector};
use verify::{HttpsProbe, TlsProbe};

/// Lifecycle of the RTM connection
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionState {
    Disconnected,
    Connecting,
    Verifying,
    Connected,
    ShuttingDown,
}

impl ConnectionState {
    /// True while a connection attempt is in flight or established
    pub fn is_live(&self) -> bool {
        matches!(
            self,
            ConnectionState::Connecting | ConnectionState::Verifying | ConnectionState::Connected
        )
    }
}

/// A running read loop and the means to stop it
struct Connection {
    shutdown_tx: watch::Sender<bool>,
    task: JoinHandle<()>,
}

/// Slack bot adapter
pub struct SlackAdapter {
    config: SlackConfig,
    robot: Arc<dyn Robot>,
    resolver: EntityResolver,
    api: SlackApi,
    connector: Arc<dyn RtmConnector>,
    probe: Arc<dyn TlsProbe>,
    state: Arc<Mutex<ConnectionState>>,
    connection: Mutex<Option<Connection>>,
    /// IM channel ids by user id
    im_channels: Mutex<HashMap<String, String>>,
}

impl SlackAdapter {
    pub fn new(
        config: SlackConfig,
        robot: Arc<dyn Robot>,
        store: Arc<dyn EntityStore>,
    ) -> Result<Self, BotError> {
        let api = SlackApi::new(&config)?;
        let probe = HttpsProbe::new(config.proxy.as_deref())?;
        let proxy = config.proxy.as_deref().map(HttpProxy::parse).transpose()?;

        Ok(Self {
            connector: Arc::new(WebSocketConnector::new(api.clone(), proxy)),
            probe: Arc::new(probe),
            api,
            config,
            robot,
            resolver: EntityResolver::new(store),
            state: Arc::new(Mutex::new(ConnectionState::Disconnected)),
            connection: Mutex::new(None),
            im_channels: Mutex::new(HashMap::new()),
        })
    }

    pub fn with_connector(mut self, connector: Arc<dyn RtmConnector>) -> Self {
        self.connector = connector;
        self
    }

    pub fn with_probe(mut self, probe: Arc<dyn TlsProbe>) -> Self {
        self.probe = probe;
        self
    }

    pub fn with_api(mut self, api: SlackApi) -> Self {
        self.api = api;
        self
    }

    pub fn state(&self) -> ConnectionState {
        *self.state.lock()
    }

    pub fn resolver(&self) -> &EntityResolver {
        &self.resolver
    }

    pub fn mention_format(&self, name: &str) -> String {
        format!("@{}", name)
    }

    fn set_state(&self, state: ConnectionState) {
        *self.state.lock() = state;
    }

    /// Starts the connection. No-op while one is live or still shutting down.
    ///
    /// Blocks through the verification loop when peer verification is off.
    pub async fn run(&self) -> Result<(), BotError> {
        {
            let mut state = self.state.lock();
            if state.is_live() || *state == ConnectionState::ShuttingDown {
                tracing::debug!("Slack connection already {:?}; run is a no-op", *state);
                return Ok(());
            }
            *state = ConnectionState::Connecting;
        }

        let result = self.connect().await;
        if let Err(e) = &result {
            tracing::error!("Failed to connect to Slack: {}", e);
            self.set_state(ConnectionState::Disconnected);
        }
        result
    }

    async fn connect(&self) -> Result<(), BotError> {
        if !self.config.rtm_connection_verify_peer {
            tracing::info!("TLS connection is going to be verified before opening the RTM stream");
            self.set_state(ConnectionState::Verifying);
            verify::verify_connection(
                self.probe.as_ref(),
                &self.config.verify_host,
                &self.config.verify_policy(),
            )
            .await?;
        }

        let (session, stream) = self.connector.connect().await?;
        tracing::info!("Connected to Slack RTM as {} ({})", session.self_name, session.self_id);

        let identity = self.resolver.find_user(&session.self_id).unwrap_or_else(|| {
            User::new(&session.self_id)
                .with_name(&session.self_name)
                .with_mention_name(&session.self_name)
        });
        let identity = self.resolver.update_user(identity);
        self.robot.set_identity(&identity);

        let handler = Arc::new(MessageHandler::new(
            self.robot.clone(),
            self.resolver.clone(),
            &session.self_id,
            &self.config.supported_message_subtypes,
        ));

        let (shutdown_tx, shutdown_rx) = watch::channel(false);
        let read_loop = ReadLoop {
            stream,
            handler,
            connector: self.connector.clone(),
            policy: self.config.reconnect_policy(),
            shutdown_rx,
            state: self.state.clone(),
        };

        self.set_state(ConnectionState::Connected);
        let task = tokio::spawn(read_loop.run());
        let stale = self.connection.lock().replace(Connection { shutdown_tx, task });
        if let Some(stale) = stale {
            // the old loop closes its own stream once signalled
            let _ = stale.shutdown_tx.send(true);
        }
        Ok(())
    }

    /// Closes the stream and triggers `disconnected`. No-op without a connection.
    pub async fn shut_down(&self) {
        let connection = self.connection.lock().take();
        let Some(connection) = connection else {
            tracing::debug!("No Slack connection to shut down");
            return;
        };

        self.set_state(ConnectionState::ShuttingDown);
        let _ = connection.shutdown_tx.send(true);
        if let Err(e) = connection.task.await {
            tracing::warn!("RTM read loop ended abnormally: {}", e);
        }
        {
            let mut state = self.state.lock();
            if *state == ConnectionState::ShuttingDown {
                *state = ConnectionState::Disconnected;
            }
        }

        tracing::info!("Disconnected from Slack.");
        self.robot.trigger(RobotEvent::Disconnected);
    }

    /// Posts messages to the source's room, or to the user's IM when private
    pub async fn send_messages(&self, target: &Source, strings: &[String]) -> Result<(), BotError> {
        let channel = self.channel_for(target).await?;
        self.api.send_messages(&channel, strings).await
    }

    pub async fn set_topic(&self, target: &Source, topic: &str) -> Result<(), BotError> {
        let channel = target
            .room_id()
            .ok_or_else(|| BotError::NotFound("target has no room".to_string()))?;
        tracing::debug!("Setting topic for channel {}: {}", channel, topic);
        self.api.set_topic(channel, topic).await
    }

    /// Member ids of a room, routed by the id prefix
    pub async fn roster(&self, room_id: &str) -> Result<Vec<String>, BotError> {
        match RoomKind::from_id(room_id) {
            RoomKind::Channel => self.api.conversation_members(room_id).await,
            RoomKind::Group => {
                // private groups and MPIMs share the G prefix; try groups first
                let members = self.members_of_listed(room_id, "private_channel").await?;
                if members.is_empty() {
                    self.members_of_listed(room_id, "mpim").await
                } else {
                    Ok(members)
                }
            }
            RoomKind::DirectMessage => {
                let ims = self.api.list_conversations("im").await?;
                Ok(ims
                    .into_iter()
                    .find(|im| im.id == room_id)
                    .and_then(|im| im.user)
                    .into_iter()
                    .collect())
            }
            RoomKind::Unknown => Ok(Vec::new()),
        }
    }

    /// Members of a conversation, empty when the token cannot see it
    async fn members_of_listed(&self, room_id: &str, types: &str) -> Result<Vec<String>, BotError> {
        let listed = self.api.list_conversations(types).await?;
        if listed.iter().any(|c| c.id == room_id) {
            self.api.conversation_members(room_id).await
        } else {
            Ok(Vec::new())
        }
    }

    async fn channel_for(&self, target: &Source) -> Result<String, BotError> {
        if target.private_message {
            return self.im_for(&target.user.id).await;
        }
        target
            .room_id()
            .map(str::to_string)
            .ok_or_else(|| BotError::NotFound("target has no room".to_string()))
    }

    async fn im_for(&self, user_id: &str) -> Result<String, BotError> {
        let cached = self.im_channels.lock().get(user_id).cloned();
        if let Some(channel) = cached {
            return Ok(channel);
        }
        let channel = self.api.open_im(user_id).await?;
        self.im_channels
            .lock()
            .insert(user_id.to_string(), channel.clone());
        Ok(channel)
    }
}
